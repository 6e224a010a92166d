//! Audio file handling
//!
//! - `decoder`: decoding with fallback across registered decoders
//! - `file`: audio files with lazily loaded info and tags

pub mod decoder;
pub mod file;

pub use decoder::{decode, extension_of, probe_info};
pub use file::{read_metadata, AudioFile, TaggedAudioFile};
