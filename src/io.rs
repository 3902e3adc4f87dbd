use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::CarveError;
use crate::types::Offset;

pub const DEFAULT_BLOCK_SIZE: usize = 512;

/// Random-access view over a sequence of raw bytes.
///
/// `read_at` fills `buf` starting at `offset`, clipped at the end of the
/// underlying data, and returns the number of bytes copied. Zero means the
/// offset is at or past the end; exhaustion is a normal return value, never
/// an error. There is no implicit cursor: every call names its offset.
pub trait ByteSource {
    fn read_at(&mut self, offset: Offset, buf: &mut [u8]) -> io::Result<usize>;

    /// Total length of the source in bytes.
    fn size(&self) -> u64;
}

/// Whole-buffer source: the entire byte range lives in memory and reads are
/// served as slice copies. Used for sources small enough to load up front.
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Loads the full contents of `path` into memory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CarveError> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|source| CarveError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { data })
    }
}

impl From<Vec<u8>> for MemorySource {
    fn from(data: Vec<u8>) -> Self {
        Self::new(data)
    }
}

impl ByteSource for MemorySource {
    fn read_at(&mut self, offset: Offset, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.data.len() as u64 {
            return Ok(0);
        }
        let start = offset as usize;
        let end = start.saturating_add(buf.len()).min(self.data.len());
        let n = end - start;
        buf[..n].copy_from_slice(&self.data[start..end]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[cfg(target_os = "linux")]
fn block_device_size(file: &File) -> io::Result<u64> {
    use std::os::unix::io::AsRawFd;

    const BLKGETSIZE64: libc::c_ulong = 0x80081272;

    let mut size: u64 = 0;
    let result = unsafe { libc::ioctl(file.as_raw_fd(), BLKGETSIZE64, &mut size) };

    if result == -1 {
        Err(io::Error::last_os_error())
    } else {
        Ok(size)
    }
}

#[cfg(not(target_os = "linux"))]
fn block_device_size(_file: &File) -> io::Result<u64> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "Not supported on this platform",
    ))
}

/// Block-addressable source over a file or raw device. Every read against
/// the medium starts on a block boundary and spans a whole number of blocks;
/// callers still see byte-granular offsets.
pub struct BlockSource {
    file: File,
    size: u64,
    block_size: usize,
    scratch: Vec<u8>,
}

impl BlockSource {
    /// Opens `path` read-only. Regular files report their metadata length;
    /// block devices fall back to the kernel's size ioctl, then to seeking
    /// the end.
    pub fn open(path: impl AsRef<Path>, block_size: usize) -> Result<Self, CarveError> {
        assert!(block_size > 0, "block size must be non-zero");

        let path = path.as_ref();
        let unavailable = |source| CarveError::SourceUnavailable {
            path: path.to_path_buf(),
            source,
        };

        let mut file = OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(unavailable)?;

        let mut size = file.metadata().map_err(unavailable)?.len();

        if size == 0 {
            if let Ok(device_size) = block_device_size(&file) {
                size = device_size;
            }
        }

        if size == 0 {
            if let Ok(end_pos) = file.seek(SeekFrom::End(0)) {
                size = end_pos;
                let _ = file.seek(SeekFrom::Start(0));
            }
        }

        Ok(Self {
            file,
            size,
            block_size,
            scratch: Vec::new(),
        })
    }

    #[inline]
    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

impl ByteSource for BlockSource {
    fn read_at(&mut self, offset: Offset, buf: &mut [u8]) -> io::Result<usize> {
        if offset >= self.size || buf.is_empty() {
            return Ok(0);
        }

        let want = (buf.len() as u64).min(self.size - offset) as usize;
        let lead = (offset % self.block_size as u64) as usize;
        let aligned = offset - lead as u64;
        let span = (lead + want).div_ceil(self.block_size) * self.block_size;

        self.scratch.resize(span, 0);
        self.file.seek(SeekFrom::Start(aligned))?;

        let mut filled = 0;
        while filled < span {
            let n = self.file.read(&mut self.scratch[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        let n = filled.saturating_sub(lead).min(want);
        buf[..n].copy_from_slice(&self.scratch[lead..lead + n]);
        Ok(n)
    }

    fn size(&self) -> u64 {
        self.size
    }
}
