use memchr::memmem;
use tracing::{debug, warn};

use crate::error::CarveError;
use crate::extraction::ExtentSink;
use crate::io::{ByteSource, DEFAULT_BLOCK_SIZE};
use crate::scanner;
use crate::types::{Extent, Offset, Signature};

pub const DEFAULT_MAX_EXTENT_BYTES: u64 = 50 * 1024 * 1024;
pub const DEFAULT_PREFIX_BYTES: u64 = 1024;

/// What to do with a candidate whose end marker never shows up before the
/// source runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TruncatedPolicy {
    /// Emit everything read so far as a best-effort extent.
    #[default]
    Emit,
    /// Drop the candidate; no extent is produced for it.
    Discard,
}

/// How an extent is closed once its start offset is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CarveMode {
    /// Read forward until the end signature, inclusive.
    #[default]
    Delimited,
    /// Triage mode: take exactly this many bytes after the start offset and
    /// never look for an end marker. Selected explicitly, never fallen
    /// back to.
    Prefix(u64),
}

#[derive(Debug, Clone)]
pub struct CarverConfig {
    pub start: Signature,
    pub end: Signature,
    pub block_size: usize,
    pub max_extent_bytes: u64,
    pub truncated: TruncatedPolicy,
    pub mode: CarveMode,
}

impl Default for CarverConfig {
    fn default() -> Self {
        Self {
            start: Signature::jpeg_start(),
            end: Signature::jpeg_end(),
            block_size: DEFAULT_BLOCK_SIZE,
            max_extent_bytes: DEFAULT_MAX_EXTENT_BYTES,
            truncated: TruncatedPolicy::Emit,
            mode: CarveMode::Delimited,
        }
    }
}

/// Result of materializing one candidate from a confirmed start offset.
#[derive(Debug)]
pub enum BuildOutcome {
    /// End marker located; the extent closes just past its final byte.
    Complete(Extent),
    /// The source ran out first. Carries the partial extent under
    /// `TruncatedPolicy::Emit`, nothing under `Discard`.
    Truncated(Option<Extent>),
    /// The candidate outgrew `max_extent_bytes` before an end marker was
    /// seen.
    OverSize,
}

/// Materializes the extent starting at `start`, which the scanner has
/// already confirmed as a signature hit.
///
/// Read failures are treated as source exhaustion for this candidate: the
/// error lands in `diagnostics` and the truncated policy decides what
/// becomes of the bytes read so far.
pub fn build_extent<S: ByteSource + ?Sized>(
    source: &mut S,
    start: Offset,
    config: &CarverConfig,
    diagnostics: &mut Vec<CarveError>,
) -> BuildOutcome {
    match config.mode {
        CarveMode::Delimited => build_delimited(source, start, config, diagnostics),
        CarveMode::Prefix(len) => build_prefix(source, start, len, diagnostics),
    }
}

fn build_delimited<S: ByteSource + ?Sized>(
    source: &mut S,
    start: Offset,
    config: &CarverConfig,
    diagnostics: &mut Vec<CarveError>,
) -> BuildOutcome {
    let end = config.end.as_bytes();
    let finder = memmem::Finder::new(end);

    let mut data: Vec<u8> = Vec::new();
    let mut chunk = vec![0u8; config.block_size];
    let mut exhausted = false;

    while !exhausted {
        if data.len() as u64 > config.max_extent_bytes {
            warn!(
                start,
                limit = config.max_extent_bytes,
                "candidate exceeded size ceiling, dropping"
            );
            diagnostics.push(CarveError::OverSize {
                start,
                limit: config.max_extent_bytes,
            });
            return BuildOutcome::OverSize;
        }

        let pos = start + data.len() as u64;
        let n = match source.read_at(pos, &mut chunk) {
            Ok(0) => {
                exhausted = true;
                0
            }
            Ok(n) => n,
            Err(e) => {
                warn!(
                    offset = pos,
                    error = %e,
                    "read failed, treating source as exhausted for this candidate"
                );
                diagnostics.push(CarveError::Read {
                    offset: pos,
                    source: e,
                });
                exhausted = true;
                0
            }
        };

        if n > 0 {
            let prev_len = data.len();
            data.extend_from_slice(&chunk[..n]);

            // Search the fresh bytes plus enough lookback to catch an end
            // marker straddling the previous increment. The start signature
            // itself is never searched, in case the two patterns overlap.
            let search_from = prev_len
                .saturating_sub(end.len() - 1)
                .max(config.start.len())
                .min(data.len());

            if let Some(idx) = finder.find(&data[search_from..]) {
                let close = search_from + idx + end.len();
                if close as u64 > config.max_extent_bytes {
                    warn!(
                        start,
                        limit = config.max_extent_bytes,
                        "candidate exceeded size ceiling, dropping"
                    );
                    diagnostics.push(CarveError::OverSize {
                        start,
                        limit: config.max_extent_bytes,
                    });
                    return BuildOutcome::OverSize;
                }
                data.truncate(close);
                return BuildOutcome::Complete(Extent::new(start, data));
            }
        }
    }

    // A confirmed hit guarantees at least the start signature was readable;
    // anything shorter means the very first read failed and there is
    // nothing worth emitting.
    match config.truncated {
        TruncatedPolicy::Emit if data.len() >= config.start.len() => {
            debug!(start, bytes = data.len(), "emitting truncated candidate");
            BuildOutcome::Truncated(Some(Extent::new(start, data)))
        }
        _ => BuildOutcome::Truncated(None),
    }
}

fn build_prefix<S: ByteSource + ?Sized>(
    source: &mut S,
    start: Offset,
    prefix_len: u64,
    diagnostics: &mut Vec<CarveError>,
) -> BuildOutcome {
    let want = prefix_len as usize;
    let mut data = vec![0u8; want];
    let mut filled = 0usize;

    while filled < want {
        let pos = start + filled as u64;
        match source.read_at(pos, &mut data[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) => {
                warn!(offset = pos, error = %e, "read failed during prefix snapshot");
                diagnostics.push(CarveError::Read {
                    offset: pos,
                    source: e,
                });
                break;
            }
        }
    }

    data.truncate(filled);
    if data.is_empty() {
        return BuildOutcome::Truncated(None);
    }
    BuildOutcome::Complete(Extent::new(start, data))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CarveStats {
    /// Extents closed by their end marker (or prefix snapshots).
    pub complete: usize,
    /// Best-effort extents emitted without an end marker.
    pub truncated: usize,
    /// Unterminated candidates dropped under `TruncatedPolicy::Discard`.
    pub discarded: usize,
    /// Candidates dropped for outgrowing the size ceiling.
    pub over_size: usize,
    /// Extents the sink failed to write.
    pub sink_failures: usize,
    /// Extents actually handed off and written.
    pub emitted: usize,
}

impl CarveStats {
    pub fn candidates(&self) -> usize {
        self.complete + self.truncated + self.discarded + self.over_size
    }
}

#[derive(Debug, Default)]
pub struct CarveReport {
    pub stats: CarveStats,
    pub diagnostics: Vec<CarveError>,
}

impl CarveReport {
    pub fn read_failures(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d, CarveError::Read { .. }))
            .count()
    }
}

/// Called with the cursor between carve iterations. Returning `false` stops
/// the run after the current iteration; an in-progress extent always runs
/// to completion or to its size bound first.
pub type ProgressFn<'a> = &'a dyn Fn(Offset) -> bool;

/// Repeatedly scans for the next start signature, builds the extent there,
/// and hands it to the sink.
///
/// The cursor only moves forward. After every candidate, recovered or not,
/// it advances to `start + 1` rather than past the whole extent. That
/// stride can emit overlapping extents, but it never silently skips a real
/// object nested behind a spurious start match. Extents reach the sink one
/// at a time, in strictly increasing start-offset order.
pub fn carve<S, K>(
    source: &mut S,
    sink: &mut K,
    config: &CarverConfig,
    progress: Option<ProgressFn<'_>>,
) -> CarveReport
where
    S: ByteSource + ?Sized,
    K: ExtentSink + ?Sized,
{
    let mut report = CarveReport::default();
    let mut cursor: Offset = 0;

    loop {
        if let Some(cb) = progress {
            if !cb(cursor) {
                break;
            }
        }

        let hit = match scanner::find_next(source, &config.start, cursor, config.block_size) {
            Ok(Some(offset)) => offset,
            Ok(None) => break,
            Err(e) => {
                let failed_at = match &e {
                    CarveError::Read { offset, .. } => *offset,
                    _ => cursor,
                };
                warn!(offset = failed_at, "scan read failed, skipping ahead one block");
                report.diagnostics.push(e);
                cursor = failed_at + config.block_size as u64;
                continue;
            }
        };

        match build_extent(source, hit, config, &mut report.diagnostics) {
            BuildOutcome::Complete(extent) => {
                report.stats.complete += 1;
                emit(sink, &extent, &mut report);
            }
            BuildOutcome::Truncated(Some(extent)) => {
                report.stats.truncated += 1;
                emit(sink, &extent, &mut report);
            }
            BuildOutcome::Truncated(None) => {
                report.stats.discarded += 1;
            }
            BuildOutcome::OverSize => {
                report.stats.over_size += 1;
            }
        }

        cursor = hit + 1;
    }

    report
}

fn emit<K: ExtentSink + ?Sized>(sink: &mut K, extent: &Extent, report: &mut CarveReport) {
    match sink.write_extent(extent) {
        Ok(()) => {
            debug!(
                offset = extent.start_offset(),
                bytes = extent.len(),
                "extent emitted"
            );
            report.stats.emitted += 1;
        }
        Err(e) => {
            warn!(offset = extent.start_offset(), error = %e, "sink write failed");
            report.stats.sink_failures += 1;
            report.diagnostics.push(e);
        }
    }
}
