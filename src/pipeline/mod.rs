//! Batch orchestration
//!
//! - `analyze`: parallel per-file analysis with a group (album) pass
//! - `encode`: bounded-parallelism re-encoding with atomic output
//! - `progress`: cumulative progress reporting shared by both

pub mod analyze;
pub mod encode;
pub mod progress;

pub use analyze::AudioFileAnalyzer;
pub use encode::AudioFileEncoder;
pub use progress::{Progress, ProgressToken};
