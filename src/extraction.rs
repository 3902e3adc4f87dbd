use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::error::CarveError;
use crate::types::{Extent, Offset};

/// Receives recovered extents one at a time, in increasing start-offset
/// order. Each extent is handed over exactly once.
pub trait ExtentSink {
    fn write_extent(&mut self, extent: &Extent) -> Result<(), CarveError>;
}

/// Destination name for an extent, derived from its start offset alone so
/// that re-running over an unchanged source rewrites identical files.
pub fn recovered_filename(start_offset: Offset) -> String {
    format!("recovered_{start_offset}.jpg")
}

/// Writes each extent verbatim into one directory, named by start offset.
pub struct DirectorySink {
    dir: PathBuf,
    written: Vec<PathBuf>,
}

impl DirectorySink {
    pub fn create(dir: impl Into<PathBuf>) -> Result<Self, CarveError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| CarveError::SinkWrite {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            written: Vec::new(),
        })
    }

    /// Paths written so far, in emission order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }
}

fn write_file(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut out = File::create(path)?;
    out.write_all(data)?;
    out.sync_all()
}

impl ExtentSink for DirectorySink {
    fn write_extent(&mut self, extent: &Extent) -> Result<(), CarveError> {
        let path = self.dir.join(recovered_filename(extent.start_offset()));
        write_file(&path, extent.data()).map_err(|source| CarveError::SinkWrite {
            path: path.clone(),
            source,
        })?;
        self.written.push(path);
        Ok(())
    }
}
