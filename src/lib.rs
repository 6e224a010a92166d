//! audiobatch - Plugin-driven batch analysis and encoding of audio files
//!
//! Files are decoded, analyzed and re-encoded through interchangeable plugins
//! looked up in an explicitly built [`Registry`].
//!
//! # Architecture
//!
//! - `registry`: plugin contracts and the capability table
//! - `plugins`: built-in hound, symphonia, lofty and ReplayGain plugins
//! - `audio`: decode-with-fallback reader and lazily loaded audio files
//! - `analysis`: group synchronization shared by analyzers
//! - `pipeline`: batch analysis and encoding orchestration
//! - `metadata`: tag records and `{Field}` path templates
//! - `config`: plugin settings with schema validation, pipeline settings
//! - `discovery`: directory scanning
//!
//! # Example
//!
//! ```no_run
//! use audiobatch::{discovery, AudioFileAnalyzer, AudioFileEncoder, CancellationToken, Registry};
//! use audiobatch::config::SettingDictionary;
//! use std::path::Path;
//!
//! let registry = Registry::with_defaults();
//! let mut files = discovery::scan(&registry, Path::new("album"), false)?;
//! let cancel = CancellationToken::new();
//!
//! AudioFileAnalyzer::new(&registry, "ReplayGain", &SettingDictionary::new())?
//!     .analyze(&mut files, None, &cancel)?;
//!
//! let encoded = AudioFileEncoder::new(&registry, "Wave", &SettingDictionary::new())?
//!     .with_output_directory("converted/{Album}")?
//!     .encode(&files, None, &cancel)?;
//! println!("Wrote {} files", encoded.len());
//! # Ok::<(), audiobatch::AudioError>(())
//! ```

pub mod analysis;
pub mod audio;
pub mod cancel;
pub mod config;
pub mod discovery;
pub mod error;
pub mod metadata;
pub mod pipeline;
pub mod plugins;
pub mod registry;
pub mod types;

// Re-export key types at crate root
pub use audio::{AudioFile, TaggedAudioFile};
pub use cancel::CancellationToken;
pub use error::{AudioError, Result};
pub use metadata::{AudioMetadata, MetadataField, MetadataTemplate};
pub use pipeline::{AudioFileAnalyzer, AudioFileEncoder, Progress, ProgressToken};
pub use registry::Registry;
pub use types::{AudioInfo, SampleBlock};
