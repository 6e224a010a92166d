//! Plugin contracts consumed by the pipelines
//!
//! Each trait is implemented by an independent plugin. The registry hands out a
//! fresh boxed instance per use; instances are never shared between files.

use crate::analysis::GroupToken;
use crate::config::{SettingDictionary, SettingInfoMap};
use crate::error::Result;
use crate::metadata::AudioMetadata;
use crate::types::{AudioInfo, OutputStream, SampleBlock};
use std::fs::File;

/// Stream decoder
///
/// `initialize` and `decode_samples` may fail with
/// [`AudioError::Unsupported`](crate::AudioError::Unsupported) when the content
/// is not something this decoder understands; the reader then rewinds the
/// stream and tries the next decoder registered for the extension.
pub trait Decoder: Send {
    /// Take ownership of the input positioned at its start and describe the stream
    fn initialize(&mut self, input: File) -> Result<AudioInfo>;

    /// True once every sample has been returned
    fn is_finished(&self) -> bool;

    /// Decode the next block; an empty block is allowed at end of stream
    fn decode_samples(&mut self) -> Result<SampleBlock>;
}

/// Stream encoder
pub trait Encoder: Send {
    /// Settings this encoder accepts
    fn setting_info(&self) -> SettingInfoMap;

    /// Extension of produced files, lowercase without the dot
    fn file_extension(&self) -> &str;

    /// Prepare to write; `metadata` is a copy the encoder may keep
    fn initialize(
        &mut self,
        output: Box<dyn OutputStream>,
        info: &AudioInfo,
        metadata: AudioMetadata,
        settings: &SettingDictionary,
    ) -> Result<()>;

    /// Encode one block of samples
    fn submit(&mut self, block: &SampleBlock) -> Result<()>;

    /// Finalize the stream and flush any trailer while the output is still open
    fn finish(&mut self) -> Result<()>;
}

/// Per-file analyzer with an optional cross-file (group) result
pub trait Analyzer: Send {
    /// Settings this analyzer accepts
    fn setting_info(&self) -> SettingInfoMap;

    /// Prepare for one file; every analyzer in a batch receives the same group token
    fn initialize(
        &mut self,
        info: &AudioInfo,
        settings: &SettingDictionary,
        group: &GroupToken,
    ) -> Result<()>;

    /// Analyze one block of samples
    fn submit(&mut self, block: &SampleBlock) -> Result<()>;

    /// Result for this file alone; also contributes this file to the group
    ///
    /// An analyzer that joined the group must call [`GroupMember::complete`](crate::analysis::GroupMember::complete)
    /// here. If any member is still pending once every file is analyzed, the
    /// batch fails with [`AudioError::GroupIncomplete`](crate::AudioError::GroupIncomplete) before group results
    /// are requested.
    fn result(&mut self) -> Result<AudioMetadata>;

    /// Cross-file result, available once every group member produced its result
    fn group_result(&mut self) -> Result<AudioMetadata>;
}

/// Tag reader/writer for a container format
pub trait MetadataCodec: Send {
    /// Name of the tag format handled
    fn format(&self) -> &str;

    /// Settings accepted by `write_metadata`
    fn setting_info(&self) -> SettingInfoMap;

    /// Read tags from a stream positioned at its start
    fn read_metadata(&mut self, input: &mut File) -> Result<AudioMetadata>;

    /// Replace the tags in `output`
    fn write_metadata(
        &mut self,
        output: &mut File,
        metadata: &AudioMetadata,
        settings: &SettingDictionary,
    ) -> Result<()>;
}
