//! Near-duplicate detection.
//!
//! - [`finder`]: the greedy claim pass over an ordered file list
//! - [`groups`]: group and statistics types

pub mod finder;
pub mod groups;

pub use finder::find_dupes;
pub use groups::{DedupStats, DupeGroup};
