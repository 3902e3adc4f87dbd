pub mod carving;
pub mod error;
pub mod extraction;
pub mod io;
pub mod scanner;
pub mod types;

pub use carving::{
    BuildOutcome, CarveMode, CarveReport, CarveStats, CarverConfig, TruncatedPolicy, build_extent,
    carve,
};
pub use error::CarveError;
pub use extraction::{DirectorySink, ExtentSink};
pub use io::{BlockSource, ByteSource, MemorySource};
pub use types::{Extent, Offset, Signature};
