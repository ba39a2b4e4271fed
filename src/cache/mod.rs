//! Fingerprint caching.
//!
//! Fingerprints are expensive (the blur dominates), so they are persisted in
//! an append-only text log and reused while a file is unchanged.
//!
//! # Architecture
//!
//! * [`entry`]: the record type and its one-line text format.
//! * [`store`]: loading the log into an in-memory multimap, lookups, and
//!   serialized appends.
//!
//! # Cache Invalidation
//!
//! An entry is valid only while the file's size and modification time both
//! equal the recorded values. Stale entries are never removed; they simply
//! stop matching. The log is never rewritten or compacted.

pub mod entry;
pub mod store;

pub use entry::CacheEntry;
pub use store::{CacheError, CacheResult, FingerprintCache};
