//! Multi-format decoding using symphonia
//!
//! Handles FLAC, MP3, Ogg Vorbis, AAC/M4A, AIFF and WAV variants hound
//! rejects (extensible, ADPCM). Content is probed, not trusted by extension.

use crate::error::{AudioError, Result};
use crate::registry::Decoder;
use crate::types::{AudioInfo, SampleBlock};
use std::fs::File;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder as CodecDecoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, trace};

/// Errors while opening a stream: content we cannot read is declined
fn map_open_error(err: SymphoniaError) -> AudioError {
    match err {
        SymphoniaError::Unsupported(reason) => AudioError::unsupported("", reason),
        SymphoniaError::IoError(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            AudioError::unsupported("", "stream ended while probing")
        }
        SymphoniaError::IoError(e) => AudioError::Io(e),
        other => AudioError::decode_error("", other.to_string()),
    }
}

struct Stream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn CodecDecoder>,
    track_id: u32,
}

/// Probing decoder backed by symphonia's default codec and format registries
#[derive(Default)]
pub struct SymphoniaDecoder {
    stream: Option<Stream>,
    finished: bool,
}

impl Decoder for SymphoniaDecoder {
    fn initialize(&mut self, input: File) -> Result<AudioInfo> {
        let byte_len = input.metadata()?.len();
        let mss = MediaSourceStream::new(Box::new(input), Default::default());

        let probed = symphonia::default::get_probe()
            .format(&Hint::new(), mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(map_open_error)?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| AudioError::unsupported("", "no audio tracks found"))?;
        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| AudioError::unsupported("", "stream does not declare a sample rate"))?;
        let channels = params.channels.map(|c| c.count() as u16).unwrap_or(2);
        let frames = params.n_frames.unwrap_or(0);
        let codec_name = symphonia::default::get_codecs()
            .get_codec(params.codec)
            .map(|d| d.short_name.to_uppercase())
            .unwrap_or_else(|| "UNKNOWN".to_string());

        let info = match params.bits_per_sample {
            Some(bits) => AudioInfo::lossless(codec_name, channels, bits as u16, sample_rate, frames),
            None => {
                let seconds = frames as f64 / sample_rate as f64;
                let bit_rate = if seconds > 0.0 {
                    (byte_len as f64 * 8.0 / seconds) as u32
                } else {
                    0
                };
                AudioInfo::lossy(codec_name, channels, sample_rate, frames, bit_rate)
            }
        }
        .map_err(|e| AudioError::unsupported("", e.to_string()))?;

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(map_open_error)?;

        debug!(
            "Symphonia stream: {} @ {}Hz, {} channels, {} frames",
            info.format(),
            sample_rate,
            channels,
            frames
        );

        self.stream = Some(Stream {
            format,
            decoder,
            track_id,
        });
        self.finished = false;
        Ok(info)
    }

    fn is_finished(&self) -> bool {
        self.finished
    }

    fn decode_samples(&mut self) -> Result<SampleBlock> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| AudioError::decode_error("", "decoder used before initialize"))?;

        loop {
            let packet = match stream.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.finished = true;
                    return Ok(SampleBlock::default());
                }
                Err(SymphoniaError::ResetRequired) => {
                    debug!("Stream reset required; treating as end of stream");
                    self.finished = true;
                    return Ok(SampleBlock::default());
                }
                Err(e) => {
                    return Err(AudioError::decode_error("", format!("Failed to read packet: {}", e)));
                }
            };

            if packet.track_id() != stream.track_id {
                continue;
            }

            let decoded = match stream.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    trace!("Skipping corrupted frame: {}", e);
                    continue;
                }
                Err(e) => {
                    return Err(AudioError::decode_error("", format!("Decode error: {}", e)));
                }
            };

            let spec = *decoded.spec();
            let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
            sample_buf.copy_interleaved_ref(decoded);
            return Ok(SampleBlock::new(
                spec.channels.count() as u16,
                sample_buf.samples().to_vec(),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use tempfile::TempDir;

    #[test]
    fn test_decodes_wav_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for i in 0..800 {
            writer.write_sample(((i % 16) * 1000) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let mut decoder = SymphoniaDecoder::default();
        let info = decoder.initialize(File::open(&path).unwrap()).unwrap();
        assert_eq!(info.sample_rate(), 8000);
        assert_eq!(info.channels(), 1);
        assert_eq!(info.bits_per_sample(), 16);

        let mut frames = 0;
        while !decoder.is_finished() {
            frames += decoder.decode_samples().unwrap().frames();
        }
        assert_eq!(frames, 800);
    }

    #[test]
    fn test_garbage_is_declined() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("noise.flac");
        std::fs::write(&path, vec![0x5au8; 2048]).unwrap();

        let err = SymphoniaDecoder::default()
            .initialize(File::open(&path).unwrap())
            .unwrap_err();
        assert!(err.is_unsupported(), "unexpected error: {err}");
    }
}
