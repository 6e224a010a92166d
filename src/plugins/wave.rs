//! PCM WAV decoding and encoding using hound

use crate::config::{SettingDictionary, SettingInfo, SettingInfoMap};
use crate::error::{AudioError, Result};
use crate::metadata::AudioMetadata;
use crate::registry::{Decoder, Encoder};
use crate::types::{AudioInfo, OutputStream, SampleBlock};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fs::File;
use std::io::BufReader;
use tracing::debug;

/// Setting key for the output bit depth
pub const BITS_PER_SAMPLE: &str = "BitsPerSample";

/// Bit depths the encoder can write
const SUPPORTED_BITS: [i64; 4] = [8, 16, 24, 32];

/// Frames returned per `decode_samples` call
const BLOCK_FRAMES: usize = 4096;

fn map_read_error(err: hound::Error) -> AudioError {
    match err {
        hound::Error::IoError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            AudioError::unsupported("", "truncated RIFF header")
        }
        hound::Error::IoError(e) => AudioError::Io(e),
        hound::Error::FormatError(reason) => AudioError::unsupported("", reason),
        hound::Error::Unsupported => AudioError::unsupported("", "unsupported WAVE encoding"),
        other => AudioError::decode_error("", other.to_string()),
    }
}

fn encode_error(err: hound::Error) -> AudioError {
    AudioError::EncodeError {
        path: Default::default(),
        reason: err.to_string(),
    }
}

// =============================================================================
// Decoder
// =============================================================================

/// Integer and float PCM reader
#[derive(Default)]
pub struct WaveDecoder {
    reader: Option<WavReader<BufReader<File>>>,
    remaining: usize,
}

impl Decoder for WaveDecoder {
    fn initialize(&mut self, input: File) -> Result<AudioInfo> {
        let reader = WavReader::new(BufReader::new(input)).map_err(map_read_error)?;
        let spec = reader.spec();
        let info = AudioInfo::lossless(
            "Wave",
            spec.channels,
            spec.bits_per_sample,
            spec.sample_rate,
            reader.duration() as u64,
        )
        .map_err(|e| AudioError::unsupported("", e.to_string()))?;

        debug!(
            "WAV stream: {} Hz, {} channels, {} bit {:?}",
            spec.sample_rate, spec.channels, spec.bits_per_sample, spec.sample_format
        );
        self.remaining = reader.len() as usize;
        self.reader = Some(reader);
        Ok(info)
    }

    fn is_finished(&self) -> bool {
        self.remaining == 0
    }

    fn decode_samples(&mut self) -> Result<SampleBlock> {
        let reader = self
            .reader
            .as_mut()
            .ok_or_else(|| AudioError::decode_error("", "decoder used before initialize"))?;
        let spec = reader.spec();
        let count = (BLOCK_FRAMES * spec.channels as usize).min(self.remaining);

        let samples = match spec.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .take(count)
                .collect::<std::result::Result<Vec<_>, _>>(),
            SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .take(count)
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<std::result::Result<Vec<_>, _>>()
            }
        }
        .map_err(|e| AudioError::decode_error("", e.to_string()))?;

        // A short read means the data chunk was smaller than declared
        self.remaining = if samples.len() < count {
            0
        } else {
            self.remaining - count
        };
        Ok(SampleBlock::new(spec.channels, samples))
    }
}

// =============================================================================
// Encoder
// =============================================================================

/// Integer PCM writer
///
/// RIFF INFO tags are not written; the metadata copy is ignored.
#[derive(Default)]
pub struct WaveEncoder {
    writer: Option<WavWriter<Box<dyn OutputStream>>>,
    max_amplitude: f32,
}

impl Encoder for WaveEncoder {
    fn setting_info(&self) -> SettingInfoMap {
        let mut info = SettingInfoMap::new();
        info.insert(
            BITS_PER_SAMPLE.to_string(),
            SettingInfo::IntChoice {
                allowed: SUPPORTED_BITS.to_vec(),
            },
        );
        info
    }

    fn file_extension(&self) -> &str {
        "wav"
    }

    fn initialize(
        &mut self,
        output: Box<dyn OutputStream>,
        info: &AudioInfo,
        _metadata: AudioMetadata,
        settings: &SettingDictionary,
    ) -> Result<()> {
        let bits = match settings.get_int(BITS_PER_SAMPLE) {
            Some(bits) => bits,
            None if SUPPORTED_BITS.contains(&(info.bits_per_sample() as i64)) => {
                info.bits_per_sample() as i64
            }
            None => 16,
        };
        if !SUPPORTED_BITS.contains(&bits) {
            return Err(AudioError::invalid_setting(
                BITS_PER_SAMPLE,
                format!("{} is not one of {:?}", bits, SUPPORTED_BITS),
            ));
        }

        let spec = WavSpec {
            channels: info.channels(),
            sample_rate: info.sample_rate(),
            bits_per_sample: bits as u16,
            sample_format: SampleFormat::Int,
        };
        debug!("Writing WAV: {} Hz, {} channels, {} bit", spec.sample_rate, spec.channels, bits);

        self.max_amplitude = ((1i64 << (bits - 1)) - 1) as f32;
        self.writer = Some(WavWriter::new(output, spec).map_err(encode_error)?);
        Ok(())
    }

    fn submit(&mut self, block: &SampleBlock) -> Result<()> {
        let writer = self.writer.as_mut().ok_or_else(|| AudioError::EncodeError {
            path: Default::default(),
            reason: "encoder used before initialize".to_string(),
        })?;
        for sample in block.samples() {
            let value = (sample.clamp(-1.0, 1.0) * self.max_amplitude).round() as i32;
            writer.write_sample(value).map_err(encode_error)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        match self.writer.take() {
            Some(writer) => writer.finalize().map_err(encode_error),
            None => Ok(()),
        }
    }
}
