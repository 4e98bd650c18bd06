//! Log and exit-code comparison between a recorded and a replayed run.

pub mod logs;
pub mod normalize;

pub use logs::{compare_logs, LogComparator, LogComparisonResult, MessageDiff};
pub use normalize::{builtin_normalizers, normalize, Normalizer};
