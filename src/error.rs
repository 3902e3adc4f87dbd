use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CarveError {
    /// The byte source could not be opened or sized at all. The only error
    /// that aborts a whole carving run.
    #[error("cannot open byte source {path:?}: {source}")]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A read failed mid-stream. The affected candidate degrades to the
    /// truncated policy; scanning continues past the bad region.
    #[error("read failed at offset {offset}: {source}")]
    Read {
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// A candidate outgrew the configured ceiling before an end marker was
    /// seen. The candidate is dropped; scanning continues.
    #[error("candidate at offset {start} exceeded the {limit} byte ceiling")]
    OverSize { start: u64, limit: u64 },

    /// An output destination could not be written. The extent counts as not
    /// recovered; scanning continues.
    #[error("cannot write {path:?}: {source}")]
    SinkWrite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, CarveError>;
