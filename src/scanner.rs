use memchr::memmem;

use crate::error::CarveError;
use crate::io::ByteSource;
use crate::types::{Offset, Signature};

/// Finds the lowest offset `>= from` at which `signature` occurs in
/// `source`, or `None` once the source is exhausted without a match.
///
/// The source is consumed in `window`-byte reads. The trailing
/// `signature.len() - 1` bytes of each window are carried into the next
/// search so a match straddling a window boundary is still seen exactly
/// once, at its true offset.
pub fn find_next<S: ByteSource + ?Sized>(
    source: &mut S,
    signature: &Signature,
    from: Offset,
    window: usize,
) -> Result<Option<Offset>, CarveError> {
    let finder = memmem::Finder::new(signature.as_bytes());
    let overlap = signature.len() - 1;

    let mut chunk = vec![0u8; window.max(signature.len())];
    let mut haystack: Vec<u8> = Vec::with_capacity(chunk.len() + overlap);
    let mut pos = from;
    // Bytes at the front of `haystack` that were read before `pos`.
    let mut carried = 0usize;

    loop {
        let n = source
            .read_at(pos, &mut chunk)
            .map_err(|source| CarveError::Read {
                offset: pos,
                source,
            })?;
        if n == 0 {
            return Ok(None);
        }

        haystack.extend_from_slice(&chunk[..n]);
        if let Some(idx) = finder.find(&haystack) {
            return Ok(Some(pos - carried as u64 + idx as u64));
        }

        pos += n as u64;
        let keep = overlap.min(haystack.len());
        haystack.drain(..haystack.len() - keep);
        carried = keep;
    }
}
