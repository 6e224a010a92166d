//! Decoding with fallback across registered decoders
//!
//! Both pipelines read audio through [`decode`]: the input is opened once, and
//! each decoder registered for the file's extension gets a turn, in
//! registration order, until one accepts the content.

use crate::cancel::{self, CancellationToken};
use crate::error::{AudioError, Result};
use crate::registry::{Decoder, Registry, EXTENSION};
use crate::types::{AudioInfo, SampleBlock};
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, trace};

/// Lowercase extension of `path` without the dot, or an empty string
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Describe the stream using the first decoder that accepts it
pub fn probe_info(registry: &Registry, path: &Path) -> Result<AudioInfo> {
    with_fallback(registry, path, |decoder, input| decoder.initialize(input).map_err(Attempt::from_decoder))
}

/// Decode the whole stream, passing each block to `on_block`
///
/// The token is checked before every block. A decoder that reports
/// unsupported content before any block was forwarded is skipped in favor of
/// the next one; once blocks have been forwarded, the same report is a decode
/// failure.
pub fn decode<F>(
    registry: &Registry,
    path: &Path,
    cancel: &CancellationToken,
    mut on_block: F,
) -> Result<AudioInfo>
where
    F: FnMut(&SampleBlock) -> Result<()>,
{
    with_fallback(registry, path, |decoder, input| {
        let info = decoder.initialize(input).map_err(Attempt::from_decoder)?;
        let mut forwarded = false;

        while !decoder.is_finished() {
            cancel::check(cancel).map_err(Attempt::Failed)?;

            let block = match decoder.decode_samples() {
                Ok(block) => block,
                Err(e) if e.is_unsupported() && forwarded => {
                    return Err(Attempt::Failed(AudioError::decode_error(path, e.to_string())));
                }
                Err(e) => return Err(Attempt::from_decoder(e)),
            };

            if block.is_empty() {
                continue;
            }
            trace!("Decoded block of {} frames", block.frames());
            on_block(&block).map_err(Attempt::Failed)?;
            forwarded = true;
        }

        Ok(info)
    })
}

/// Outcome of handing the stream to one decoder
enum Attempt {
    /// The decoder declined the content; try the next one
    Declined(AudioError),
    /// A real failure; stop
    Failed(AudioError),
}

impl Attempt {
    fn from_decoder(err: AudioError) -> Self {
        if err.is_unsupported() {
            Attempt::Declined(err)
        } else {
            Attempt::Failed(err)
        }
    }
}

fn with_fallback<T, F>(registry: &Registry, path: &Path, mut attempt: F) -> Result<T>
where
    F: FnMut(&mut dyn Decoder, File) -> std::result::Result<T, Attempt>,
{
    let extension = extension_of(path);
    let candidates = registry.decoders().lookup(EXTENSION, &extension);
    if candidates.is_empty() {
        return Err(AudioError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension,
        });
    }

    let mut file = File::open(path)?;

    for capability in candidates {
        file.seek(SeekFrom::Start(0))?;
        let input = file.try_clone()?;
        let mut decoder = capability.create();
        debug!("Decoding {} with '{}'", path.display(), capability.descriptor());

        match attempt(decoder.as_mut(), input) {
            Ok(value) => return Ok(value),
            Err(Attempt::Declined(reason)) => {
                debug!(
                    "Decoder '{}' declined {}: {}",
                    capability.descriptor(),
                    path.display(),
                    reason
                );
            }
            Err(Attempt::Failed(err)) => return Err(err.with_path(path)),
        }
    }

    Err(AudioError::UnsupportedFormat {
        path: path.to_path_buf(),
        extension,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CapabilityDescriptor;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Declines everything
    struct Refusing;

    impl Decoder for Refusing {
        fn initialize(&mut self, _input: File) -> Result<AudioInfo> {
            Err(AudioError::unsupported("", "refusing"))
        }

        fn is_finished(&self) -> bool {
            true
        }

        fn decode_samples(&mut self) -> Result<SampleBlock> {
            unreachable!()
        }
    }

    /// Emits the bytes of the file as mono samples, four per block
    struct Bytes {
        data: Vec<u8>,
        position: usize,
    }

    impl Decoder for Bytes {
        fn initialize(&mut self, mut input: File) -> Result<AudioInfo> {
            use std::io::Read;
            input.read_to_end(&mut self.data)?;
            AudioInfo::lossless("Bytes", 1, 8, 8000, self.data.len() as u64)
        }

        fn is_finished(&self) -> bool {
            self.position >= self.data.len()
        }

        fn decode_samples(&mut self) -> Result<SampleBlock> {
            let end = (self.position + 4).min(self.data.len());
            let samples = self.data[self.position..end]
                .iter()
                .map(|b| *b as f32 / 255.0)
                .collect();
            self.position = end;
            Ok(SampleBlock::new(1, samples))
        }
    }

    /// Accepts the stream, emits one block, then declines the rest
    #[derive(Default)]
    struct GivesUp {
        emitted: bool,
    }

    impl Decoder for GivesUp {
        fn initialize(&mut self, _input: File) -> Result<AudioInfo> {
            AudioInfo::lossless("GivesUp", 1, 8, 8000, 8)
        }

        fn is_finished(&self) -> bool {
            false
        }

        fn decode_samples(&mut self) -> Result<SampleBlock> {
            if self.emitted {
                return Err(AudioError::unsupported("", "unexpected chunk"));
            }
            self.emitted = true;
            Ok(SampleBlock::new(1, vec![0.0; 4]))
        }
    }

    fn write_file(dir: &TempDir, name: &str, contents: &[u8]) -> std::path::PathBuf {
        let path = dir.path().join(name);
        File::create(&path).unwrap().write_all(contents).unwrap();
        path
    }

    fn registry(attempts: Arc<AtomicUsize>) -> Registry {
        let counted = Arc::clone(&attempts);
        Registry::builder()
            .decoder(CapabilityDescriptor::named("Refusing").with_extensions(["raw"]), move || {
                counted.fetch_add(1, Ordering::SeqCst);
                Box::new(Refusing)
            })
            .decoder(CapabilityDescriptor::named("Bytes").with_extensions(["raw"]), || {
                Box::new(Bytes {
                    data: Vec::new(),
                    position: 0,
                })
            })
            .decoder(CapabilityDescriptor::named("Refusing").with_extensions(["bad"]), || {
                Box::new(Refusing)
            })
            .build()
    }

    #[test]
    fn test_falls_through_to_next_decoder_from_start_of_stream() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "input.raw", &[0, 51, 102, 153, 204, 255]);
        let attempts = Arc::new(AtomicUsize::new(0));
        let registry = registry(Arc::clone(&attempts));

        let mut frames = 0;
        let info = decode(&registry, &path, &CancellationToken::new(), |block| {
            frames += block.frames();
            Ok(())
        })
        .unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(info.format(), "Bytes");
        assert_eq!(info.frame_count(), 6);
        assert_eq!(frames, 6);
    }

    #[test]
    fn test_decline_after_forwarding_is_a_decode_failure() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "input.part", &[7; 8]);
        let fallbacks = Arc::new(AtomicUsize::new(0));
        let counted = Arc::clone(&fallbacks);
        let registry = Registry::builder()
            .decoder(CapabilityDescriptor::named("GivesUp").with_extensions(["part"]), || {
                Box::<GivesUp>::default()
            })
            .decoder(CapabilityDescriptor::named("Bytes").with_extensions(["part"]), move || {
                counted.fetch_add(1, Ordering::SeqCst);
                Box::new(Bytes {
                    data: Vec::new(),
                    position: 0,
                })
            })
            .build();

        let mut blocks = 0;
        let err = decode(&registry, &path, &CancellationToken::new(), |_| {
            blocks += 1;
            Ok(())
        })
        .unwrap_err();

        assert!(
            matches!(err, AudioError::DecodeError { ref path, .. } if path.ends_with("input.part")),
            "unexpected error: {err}"
        );
        assert_eq!(blocks, 1);
        assert_eq!(fallbacks.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_every_decoder_declines() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "input.bad", b"junk");
        let registry = registry(Arc::new(AtomicUsize::new(0)));

        let err = probe_info(&registry, &path).unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedFormat { ref extension, .. } if extension == "bad"));
    }

    #[test]
    fn test_unregistered_extension() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "input.xyz", b"junk");
        let registry = registry(Arc::new(AtomicUsize::new(0)));
        assert!(matches!(
            probe_info(&registry, &path),
            Err(AudioError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_cancellation_checked_before_blocks() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "input.raw", &[1; 64]);
        let registry = registry(Arc::new(AtomicUsize::new(0)));
        let token = CancellationToken::new();

        let mut blocks = 0;
        let result = decode(&registry, &path, &token, |_| {
            blocks += 1;
            if blocks == 2 {
                token.cancel();
            }
            Ok(())
        });

        assert!(matches!(result, Err(AudioError::Cancelled)));
        assert_eq!(blocks, 2);
    }

    #[test]
    fn test_sink_error_is_not_a_fallback() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, "input.raw", &[1; 8]);
        let registry = registry(Arc::new(AtomicUsize::new(0)));

        let result = decode(&registry, &path, &CancellationToken::new(), |_| {
            Err(AudioError::unsupported(&path, "sink"))
        });
        assert!(matches!(result, Err(AudioError::Unsupported { .. })));
    }
}
