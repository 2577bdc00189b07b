//! Depth dump reader library.
//!
//! This crate provides the core types and logic used by the `depth_replay`
//! binary to reconstruct whole order-book snapshots from flat capture
//! dumps, where each line holds one bid/ask price level and a logical
//! update is spread over several consecutive lines:
//!
//! - `record`: raw row mappings, per-level quotes, merged
//!   [`record::Snapshot`]s with dump-vocabulary serialization
//! - `source`: the [`source::RecordSource`] capability and the delimited
//!   text implementation with delimiter sniffing and rewind support
//! - `reader`: [`reader::SnapshotReader`], boundary detection over a
//!   one-record lookahead, single-step pull and restartable iteration
//! - `error`: the typed failure taxonomy shared by all of the above
//!
//! Construct a reader over an opened file and either pull snapshots one at
//! a time (the cursor resumes where the previous call stopped) or restart
//! to iterate the whole dump from the beginning.
pub mod error;
pub mod reader;
pub mod record;
pub mod source;
