//! Snapshot reassembly from flat per-level rows.
//!
//! A capture dump stores one price level per row; a logical book update is
//! spread over several consecutive rows sharing identity fields. The only
//! authoritative boundary signal is the level counter resetting to the
//! source's base value; timestamps may or may not change across a boundary
//! and are treated as advisory. [`SnapshotReader`] classifies each row
//! against a one-record lookahead buffer, merges continuations into an
//! accumulator, and hands back one [`Snapshot`] per completed update.

use log::{debug, warn};

use crate::error::ReadError;
use crate::record::{BookLevel, RawRecord, Snapshot, LEVEL_COLUMNS};
use crate::source::RecordSource;

/// Pull-based reader merging per-level rows into whole snapshots.
///
/// The reader owns its source and a single shared cursor: direct
/// [`next_snapshot`](Self::next_snapshot) calls and the iterator returned
/// by [`restart`](Self::restart) advance the same position. Only `restart`
/// rewinds it.
///
/// ```no_run
/// use std::fs::File;
/// use depth_replay::{reader::SnapshotReader, source::CsvSource};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let file = File::open("EUR.USD.dump")?;
/// let mut marketdata = SnapshotReader::new(CsvSource::new(file)?);
/// while let Some(snapshot) = marketdata.next_snapshot()? {
///     println!("{} levels", snapshot.levels.len());
/// }
/// # Ok(()) }
/// ```
pub struct SnapshotReader<S> {
    source: S,
    base_level: u32,
    lookahead: Option<RawRecord>,
}

impl<S: RecordSource> SnapshotReader<S> {
    /// Reader over `source` with the default base level of 1 (the KDB dump
    /// numbering).
    pub fn new(source: S) -> Self {
        Self {
            source,
            base_level: 1,
            lookahead: None,
        }
    }

    /// Override the level index that marks the first level of a snapshot.
    /// Dump variants disagree on 0- versus 1-based numbering.
    pub fn with_base_level(mut self, base_level: u32) -> Self {
        self.base_level = base_level;
        self
    }

    pub fn base_level(&self) -> u32 {
        self.base_level
    }

    /// 1-based line number of the most recently consumed row.
    pub fn position(&self) -> u64 {
        self.source.position()
    }

    /// Read rows until the next boundary and return the completed snapshot,
    /// or `None` once the dump is exhausted. Exhaustion is sticky: further
    /// calls keep returning `None` until [`restart`](Self::restart).
    ///
    /// A row that fails validation is left in the lookahead buffer, so a
    /// retry reproduces the same error instead of silently skipping it.
    pub fn next_snapshot(&mut self) -> Result<Option<Snapshot>, ReadError> {
        let mut acc: Option<Snapshot> = None;
        loop {
            let rec = match self.lookahead.take() {
                Some(r) => r,
                None => match self.source.next_record()? {
                    Some(r) => r,
                    None => return Ok(acc),
                },
            };

            let level = match rec.level() {
                Ok(l) => l,
                Err(e) => {
                    self.lookahead = Some(rec);
                    return Err(e);
                }
            };

            if level == self.base_level {
                // The accumulator only exists once a level was merged, so a
                // sealed snapshot is never empty; a spurious repeated base
                // row can only begin the next group.
                if let Some(done) = acc.take() {
                    // Level reset: the row belongs to the next snapshot.
                    if timestamps_unchanged(&done, &rec) {
                        warn!(
                            "level reset at line {} without a timestamp change ({})",
                            rec.line(),
                            rec.identity_summary()
                        );
                    }
                    debug!(
                        "snapshot sealed with {} levels at line {}",
                        done.levels.len(),
                        rec.line()
                    );
                    self.lookahead = Some(rec);
                    return Ok(Some(done));
                }
            }

            let book_level = match BookLevel::from_record(&rec) {
                Ok(l) => l,
                Err(e) => {
                    self.lookahead = Some(rec);
                    return Err(e);
                }
            };

            let snap = acc.get_or_insert_with(|| Snapshot::new(self.base_level));
            if snap.levels.is_empty() {
                for (k, v) in rec.iter() {
                    if !LEVEL_COLUMNS.contains(&k) {
                        snap.fields.insert(k.to_string(), v.to_string());
                    }
                }
            }
            let expected = self.base_level + snap.levels.len() as u32;
            if level != expected {
                warn!(
                    "level {} at line {} breaks the contiguous run (expected {})",
                    level,
                    rec.line(),
                    expected
                );
            }
            snap.levels.push(book_level);
        }
    }

    /// Rewind the shared cursor, discard any pending lookahead, and return
    /// a fresh traversal from the first snapshot.
    ///
    /// Fails with [`ReadError::Unsupported`] when the source cannot seek.
    pub fn restart(&mut self) -> Result<Snapshots<'_, S>, ReadError> {
        self.source.rewind()?;
        self.lookahead = None;
        Ok(Snapshots { reader: self })
    }
}

/// Both timestamp columns present on both sides and unchanged: the level
/// counter reset but the clock did not move, the disagreement the caller
/// is warned about.
fn timestamps_unchanged(prev: &Snapshot, rec: &RawRecord) -> bool {
    let mut compared = false;
    for key in ["time", "exchTime"] {
        if let (Some(a), Some(b)) = (prev.fields.get(key), rec.get(key)) {
            if a != b {
                return false;
            }
            compared = true;
        }
    }
    compared
}

/// Lazy traversal handed out by [`SnapshotReader::restart`]. Drives the
/// reader's shared cursor; dropping it early leaves the cursor wherever
/// the last emitted snapshot ended.
pub struct Snapshots<'a, S: RecordSource> {
    reader: &'a mut SnapshotReader<S>,
}

impl<S: RecordSource> Iterator for Snapshots<'_, S> {
    type Item = Result<Snapshot, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.reader.next_snapshot().transpose()
    }
}
