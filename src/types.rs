//! Core data types for audiobatch
//!
//! These types describe decoded audio and flow between plugins and the pipelines.

use crate::error::{AudioError, Result};
use serde::{Deserialize, Serialize};
use std::io::{Seek, Write};

// =============================================================================
// Stream description
// =============================================================================

/// Highest channel count a plugin is expected to handle
pub const MAX_CHANNELS: u16 = 8;

/// Immutable description of a decoded stream
///
/// Produced once per file by the decoder that accepted it. Fields are private so
/// the value cannot change after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioInfo {
    format: String,
    channels: u16,
    bits_per_sample: u16,
    sample_rate: u32,
    frame_count: u64,
    bit_rate: u32,
}

impl AudioInfo {
    /// Describe a lossless stream; the bit rate is derived from the PCM layout
    pub fn lossless(
        format: impl Into<String>,
        channels: u16,
        bits_per_sample: u16,
        sample_rate: u32,
        frame_count: u64,
    ) -> Result<Self> {
        validate_layout(channels, sample_rate)?;
        if !(1..=32).contains(&bits_per_sample) {
            return Err(AudioError::invalid_setting(
                "BitsPerSample",
                format!("{} is outside 1..=32", bits_per_sample),
            ));
        }
        Ok(Self {
            format: format.into(),
            channels,
            bits_per_sample,
            sample_rate,
            frame_count,
            bit_rate: sample_rate
                .saturating_mul(channels as u32)
                .saturating_mul(bits_per_sample as u32),
        })
    }

    /// Describe a lossy stream; bit depth is not meaningful and reads as 0
    pub fn lossy(
        format: impl Into<String>,
        channels: u16,
        sample_rate: u32,
        frame_count: u64,
        bit_rate: u32,
    ) -> Result<Self> {
        validate_layout(channels, sample_rate)?;
        Ok(Self {
            format: format.into(),
            channels,
            bits_per_sample: 0,
            sample_rate,
            frame_count,
            bit_rate,
        })
    }

    /// Format name reported by the decoder ("Wave", "FLAC", ...)
    pub fn format(&self) -> &str {
        &self.format
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Bits per sample, or 0 for lossy formats
    pub fn bits_per_sample(&self) -> u16 {
        self.bits_per_sample
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Total frames (samples per channel), or 0 if the container does not say
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Bits per second
    pub fn bit_rate(&self) -> u32 {
        self.bit_rate
    }

    /// Play length in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frame_count as f64 / self.sample_rate as f64
    }
}

fn validate_layout(channels: u16, sample_rate: u32) -> Result<()> {
    if channels == 0 || channels > MAX_CHANNELS {
        return Err(AudioError::invalid_setting(
            "Channels",
            format!("{} is outside 1..={}", channels, MAX_CHANNELS),
        ));
    }
    if sample_rate == 0 {
        return Err(AudioError::invalid_setting("SampleRate", "must be non-zero"));
    }
    Ok(())
}

// =============================================================================
// Sample blocks
// =============================================================================

/// A block of decoded samples, interleaved and normalized to [-1.0, 1.0]
#[derive(Debug, Clone)]
pub struct SampleBlock {
    channels: u16,
    samples: Vec<f32>,
}

impl Default for SampleBlock {
    fn default() -> Self {
        Self::new(1, Vec::new())
    }
}

impl SampleBlock {
    pub fn new(channels: u16, samples: Vec<f32>) -> Self {
        Self {
            channels: channels.max(1),
            samples,
        }
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Interleaved samples [L, R, L, R, ...]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Iterate over frames as channel slices
    pub fn iter_frames(&self) -> impl Iterator<Item = &[f32]> {
        self.samples.chunks_exact(self.channels as usize)
    }
}

// =============================================================================
// Output streams
// =============================================================================

/// Seekable byte sink handed to encoders
///
/// The encoder owns the stream for its whole lifetime, so dropping the encoder
/// releases the handle after any trailer has been flushed.
pub trait OutputStream: Write + Seek + Send {}

impl<T: Write + Seek + Send> OutputStream for T {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lossless_bit_rate() {
        let info = AudioInfo::lossless("Wave", 2, 16, 44100, 44100).unwrap();
        assert_eq!(info.bit_rate(), 1_411_200);
        assert!((info.duration_secs() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_bad_layout() {
        assert!(AudioInfo::lossless("Wave", 0, 16, 44100, 0).is_err());
        assert!(AudioInfo::lossless("Wave", 2, 16, 0, 0).is_err());
        assert!(AudioInfo::lossless("Wave", 2, 40, 44100, 0).is_err());
        assert!(AudioInfo::lossy("MP3", 9, 44100, 0, 320_000).is_err());
    }

    #[test]
    fn test_block_frames() {
        let block = SampleBlock::new(2, vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6]);
        assert_eq!(block.frames(), 3);
        assert_eq!(block.iter_frames().count(), 3);
        assert_eq!(block.iter_frames().nth(1), Some(&[0.3, 0.4][..]));
    }
}
