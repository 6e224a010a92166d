//! Batch encoding with atomic output
//!
//! Each file is decoded once and streamed into a fresh encoder that writes a
//! hidden temporary file beside the destination. Only a fully finished file
//! is renamed onto the final path; every failure path removes the temporary.
//! A fixed pool of scoped workers drains a crossbeam job queue.

use super::analyze::first_failure;
use super::progress::{FrameReporter, Progress, ProgressTracker};
use crate::audio::{self, extension_of, AudioFile, TaggedAudioFile};
use crate::cancel::CancellationToken;
use crate::config::{PipelineSettings, SettingDictionary, ValidatingSettingDictionary};
use crate::error::{AudioError, Result};
use crate::metadata::{AudioMetadata, MetadataTemplate, INVALID_FILE_NAME_CHARS, INVALID_PATH_CHARS};
use crate::registry::{Capability, Encoder, Registry, EXTENSION};
use crate::types::{AudioInfo, OutputStream};
use crossbeam_channel::unbounded;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Re-encodes batches of files through a named encoder
pub struct AudioFileEncoder<'r> {
    registry: &'r Registry,
    capability: &'r Capability<dyn Encoder>,
    extension: String,
    settings: SettingDictionary,
    output_directory: Option<MetadataTemplate>,
    output_name: Option<MetadataTemplate>,
    overwrite: bool,
    pipeline: PipelineSettings,
}

impl<'r> AudioFileEncoder<'r> {
    /// Resolve the encoder and validate `settings` against its schema
    pub fn new(registry: &'r Registry, name: &str, settings: &SettingDictionary) -> Result<Self> {
        let capability = registry.encoders().find(name)?;
        let probe = capability.create();
        let settings =
            ValidatingSettingDictionary::from_dictionary(probe.setting_info(), settings)?.into_inner();
        Ok(Self {
            registry,
            capability,
            extension: probe.file_extension().trim_start_matches('.').to_ascii_lowercase(),
            settings,
            output_directory: None,
            output_name: None,
            overwrite: false,
            pipeline: PipelineSettings::default(),
        })
    }

    /// Directory template, e.g. `"/music/{Artist}/{Album}"`
    ///
    /// Relative results are resolved against the source file's directory.
    /// Without a template, output lands beside the source.
    pub fn with_output_directory(mut self, template: &str) -> Result<Self> {
        self.output_directory = Some(MetadataTemplate::new(template)?);
        Ok(self)
    }

    /// File name template without extension, e.g. `"{TrackNumber} - {Title}"`
    pub fn with_output_name(mut self, template: &str) -> Result<Self> {
        self.output_name = Some(MetadataTemplate::new(template)?);
        Ok(self)
    }

    /// Replace existing destination files instead of failing
    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn with_pipeline_settings(mut self, pipeline: PipelineSettings) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Destination for `source` given its metadata
    pub fn output_path(&self, source: &Path, metadata: &AudioMetadata) -> PathBuf {
        let source_dir = source.parent().map(Path::to_path_buf).unwrap_or_default();
        let directory = match &self.output_directory {
            Some(template) => source_dir.join(template.substitute(metadata, INVALID_PATH_CHARS)),
            None => source_dir,
        };
        let stem = match &self.output_name {
            Some(template) => template.substitute(metadata, INVALID_FILE_NAME_CHARS),
            None => source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };
        directory.join(format!("{}.{}", stem, self.extension))
    }

    /// Encode every file, returning the new files in input order
    ///
    /// At most `max_parallelism` files are in flight. The first failure stops
    /// new files from starting; it is returned after the in-flight files
    /// settle. Files already promoted to their final path stay on disk.
    pub fn encode(
        &self,
        files: &[TaggedAudioFile],
        progress: Option<&dyn Progress>,
        cancel: &CancellationToken,
    ) -> Result<Vec<TaggedAudioFile>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let total_frames = files.iter().try_fold(0u64, |total, file| {
            Ok::<_, AudioError>(total + file.info(self.registry)?.frame_count())
        })?;
        let granularity = self.pipeline.progress_granularity(total_frames);
        let workers = self.pipeline.effective_parallelism().min(files.len());
        info!(
            "Encoding {} files with '{}' on {} workers",
            files.len(),
            self.capability.descriptor().name(),
            workers
        );

        let (job_tx, job_rx) = unbounded::<(usize, &TaggedAudioFile)>();
        for job in files.iter().enumerate() {
            // The receiver is alive, so this cannot fail
            let _ = job_tx.send(job);
        }
        drop(job_tx);

        let (result_tx, result_rx) = unbounded::<(usize, Result<TaggedAudioFile>)>();
        let batch = cancel.child_token();
        let tracker = ProgressTracker::new(progress);

        thread::scope(|scope| {
            for worker in 0..workers {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                let (batch, tracker) = (&batch, &tracker);
                scope.spawn(move || {
                    for (index, source) in job_rx.iter() {
                        let outcome = if batch.is_cancelled() {
                            debug!("Worker {} skipping {}", worker, source.path().display());
                            Err(AudioError::Cancelled)
                        } else {
                            self.encode_file(source, tracker, granularity, batch)
                        };

                        if let Err(ref e) = outcome {
                            if !batch.is_cancelled() {
                                warn!("Encoding {} failed, cancelling batch: {}", source.path().display(), e);
                                batch.cancel();
                            }
                        }
                        if result_tx.send((index, outcome)).is_err() {
                            break;
                        }
                    }
                });
            }
        });
        drop(result_tx);

        let mut results: Vec<_> = result_rx.iter().collect();
        results.sort_by_key(|(index, _)| *index);
        let encoded = first_failure(results.into_iter().map(|(_, outcome)| outcome))?;

        info!(
            "Encoded {} files in {:.2}s",
            encoded.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(encoded)
    }

    fn encode_file(
        &self,
        source: &TaggedAudioFile,
        tracker: &ProgressTracker<'_>,
        granularity: u64,
        cancel: &CancellationToken,
    ) -> Result<TaggedAudioFile> {
        // The encoder gets its own copy; later edits to `source` cannot reach it
        let metadata = source.metadata_snapshot(self.registry)?;
        let info = source.info(self.registry)?.clone();

        let final_path = self.output_path(source.path(), &metadata);
        let directory = final_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        fs::create_dir_all(&directory).map_err(|e| AudioError::output_error(&directory, e))?;

        if final_path.exists() && !self.overwrite {
            return Err(AudioError::OutputExists(final_path));
        }

        let temp = tempfile::Builder::new()
            .prefix(".")
            .suffix(&format!(".{}.tmp", self.extension))
            .tempfile_in(&directory)
            .map_err(|e| AudioError::output_error(&directory, e))?;
        let (output, temp_path) = temp.into_parts();
        debug!("Writing {} via {}", final_path.display(), temp_path.display());

        // On any error below, dropping `temp_path` deletes the temporary file
        self.write_stream(source.path(), output, &info, metadata.clone(), tracker, granularity, cancel)
            .map_err(|e| e.with_path(&final_path))?;
        embed_metadata(self.registry, &final_path, &temp_path, &metadata)?;

        let promoted = if self.overwrite {
            temp_path.persist(&final_path)
        } else {
            temp_path.persist_noclobber(&final_path)
        };
        promoted.map_err(|e| match e.error.kind() {
            std::io::ErrorKind::AlreadyExists => AudioError::OutputExists(final_path.clone()),
            _ => AudioError::output_error(&final_path, e.error),
        })?;

        tracker.complete_file();
        debug!("Encoded {} -> {}", source.path().display(), final_path.display());
        Ok(TaggedAudioFile::with_metadata(AudioFile::new(final_path)?, metadata))
    }

    #[allow(clippy::too_many_arguments)]
    fn write_stream(
        &self,
        source: &Path,
        output: File,
        info: &AudioInfo,
        metadata: AudioMetadata,
        tracker: &ProgressTracker<'_>,
        granularity: u64,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut encoder = self.capability.create();
        let stream: Box<dyn OutputStream> = Box::new(BufWriter::new(output));
        encoder.initialize(stream, info, metadata, &self.settings)?;

        let mut reporter = FrameReporter::new(tracker, granularity);
        audio::decode(self.registry, source, cancel, |block| {
            encoder.submit(block)?;
            reporter.add(block.frames() as u64);
            Ok(())
        })?;
        reporter.flush();

        // The encoder owns the stream; dropping it after `finish` releases the file
        encoder.finish()
    }
}

/// Write tags into the finished temporary file with a codec for the output extension
fn embed_metadata(
    registry: &Registry,
    final_path: &Path,
    temp_path: &Path,
    metadata: &AudioMetadata,
) -> Result<()> {
    if metadata.is_empty() {
        return Ok(());
    }
    let extension = extension_of(final_path);
    for capability in registry.metadata_codecs().lookup(EXTENSION, &extension) {
        let mut file = File::options().read(true).write(true).open(temp_path)?;
        match capability.create().write_metadata(&mut file, metadata, &SettingDictionary::new()) {
            Ok(()) => return Ok(()),
            Err(e) if e.is_unsupported() => {
                debug!("Metadata codec '{}' declined output: {}", capability.descriptor(), e);
            }
            Err(e) => return Err(e.with_path(final_path)),
        }
    }
    debug!("No metadata codec wrote tags for '.{}'", extension);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CapabilityDescriptor;

    #[test]
    fn test_output_path_defaults_to_source_location() {
        let registry = Registry::with_defaults();
        let encoder = AudioFileEncoder::new(&registry, "Wave", &SettingDictionary::new()).unwrap();
        let path = encoder.output_path(Path::new("/music/in/song.flac"), &AudioMetadata::default());
        assert_eq!(path, Path::new("/music/in/song.wav"));
    }

    #[test]
    fn test_output_path_templates() {
        let registry = Registry::with_defaults();
        let encoder = AudioFileEncoder::new(&registry, "Wave", &SettingDictionary::new())
            .unwrap()
            .with_output_directory("/out/{Artist}")
            .unwrap()
            .with_output_name("{TrackNumber} - {Title}")
            .unwrap();
        let metadata = AudioMetadata {
            artist: "AC/DC".to_string(),
            title: "What?".to_string(),
            track_number: "1".to_string(),
            ..Default::default()
        };
        let path = encoder.output_path(Path::new("/music/in/song.flac"), &metadata);
        assert_eq!(path, Path::new("/out/AC/DC/1 - What.wav"));
    }

    #[test]
    fn test_invalid_template_fails_at_construction() {
        let registry = Registry::with_defaults();
        let result = AudioFileEncoder::new(&registry, "Wave", &SettingDictionary::new())
            .unwrap()
            .with_output_name("{Bogus}");
        assert!(matches!(result, Err(AudioError::InvalidTemplate { .. })));
    }

    #[test]
    fn test_invalid_setting_value_rejected() {
        let registry = Registry::with_defaults();
        let mut settings = SettingDictionary::new();
        settings.insert("BitsPerSample", 12);
        let err = AudioFileEncoder::new(&registry, "Wave", &settings).err().unwrap();
        assert!(matches!(err, AudioError::InvalidSetting { .. }));
    }

    #[test]
    fn test_unknown_encoder() {
        let registry = Registry::builder()
            .analyzer(CapabilityDescriptor::named("Only"), || {
                Box::<crate::plugins::ReplayGainAnalyzer>::default()
            })
            .build();
        let err = AudioFileEncoder::new(&registry, "Wave", &SettingDictionary::new()).err().unwrap();
        assert!(matches!(err, AudioError::PluginNotFound { .. }));
    }
}
