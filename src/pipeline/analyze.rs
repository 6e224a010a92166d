//! Batch analysis
//!
//! One analyzer instance per file, all sharing a [`GroupToken`]. Individual
//! passes run in parallel on the rayon pool; group results are then read in
//! file order once every member has contributed.

use super::progress::{FrameReporter, Progress, ProgressTracker};
use crate::analysis::GroupToken;
use crate::audio::{self, TaggedAudioFile};
use crate::cancel::CancellationToken;
use crate::config::{PipelineSettings, SettingDictionary, ValidatingSettingDictionary};
use crate::error::{AudioError, Result};
use crate::registry::{Analyzer, Capability, Registry};
use rayon::prelude::*;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Runs a named analyzer over a batch of files
pub struct AudioFileAnalyzer<'r> {
    registry: &'r Registry,
    capability: &'r Capability<dyn Analyzer>,
    settings: SettingDictionary,
    pipeline: PipelineSettings,
}

impl<'r> AudioFileAnalyzer<'r> {
    /// Resolve the analyzer and validate `settings` against its schema
    ///
    /// Fails with [`AudioError::PluginNotFound`] or a setting error before any
    /// file is touched.
    pub fn new(registry: &'r Registry, name: &str, settings: &SettingDictionary) -> Result<Self> {
        let capability = registry.analyzers().find(name)?;
        let schema = capability.create().setting_info();
        let settings = ValidatingSettingDictionary::from_dictionary(schema, settings)?.into_inner();
        Ok(Self {
            registry,
            capability,
            settings,
            pipeline: PipelineSettings::default(),
        })
    }

    pub fn with_pipeline_settings(mut self, pipeline: PipelineSettings) -> Self {
        self.pipeline = pipeline;
        self
    }

    /// Analyze `files` as one group, merging results into their metadata
    ///
    /// The first failure cancels the remaining work and is returned once every
    /// in-flight file has settled. Results already merged are kept.
    pub fn analyze(
        &self,
        files: &mut [TaggedAudioFile],
        progress: Option<&dyn Progress>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }

        let start = Instant::now();
        let name = self.capability.descriptor().name();
        info!("Analyzing {} files with '{}'", files.len(), name);

        // Analyzers hold their group membership; dropping them on any early
        // return releases the group.
        let group = GroupToken::new();
        let mut analyzers: Vec<Box<dyn Analyzer>> = Vec::with_capacity(files.len());
        let mut total_frames = 0u64;
        for file in files.iter_mut() {
            let info = file.info(self.registry)?.clone();
            file.metadata(self.registry)?;

            let mut analyzer = self.capability.create();
            analyzer
                .initialize(&info, &self.settings, &group)
                .map_err(|e| e.with_path(file.path()))?;
            total_frames += info.frame_count();
            analyzers.push(analyzer);
        }
        debug!("Group of {} members, {} frames", group.member_count(), total_frames);

        let batch = cancel.child_token();
        let tracker = ProgressTracker::new(progress);
        let granularity = self.pipeline.progress_granularity(total_frames);
        let registry = self.registry;

        let outcomes: Vec<Result<()>> = files
            .par_iter_mut()
            .zip(analyzers.par_iter_mut())
            .map(|(file, analyzer)| {
                let outcome = analyze_file(registry, file, analyzer.as_mut(), &tracker, granularity, &batch);
                if let Err(ref e) = outcome {
                    if !batch.is_cancelled() {
                        warn!("Analysis of {} failed, cancelling batch: {}", file.path().display(), e);
                        batch.cancel();
                    }
                }
                outcome
            })
            .collect();
        first_failure(outcomes)?;

        // A member still pending here joined but never contributed; reading
        // the aggregate would wait on it forever.
        if group.pending() > 0 {
            warn!("{} group members produced no contribution", group.pending());
            return Err(AudioError::GroupIncomplete);
        }

        for (file, analyzer) in files.iter_mut().zip(analyzers.iter_mut()) {
            let group_result = analyzer
                .group_result()
                .map_err(|e| e.with_path(file.path()))?;
            file.metadata_mut(self.registry)?.merge_from(&group_result);
        }

        info!(
            "Analyzed {} files in {:.2}s",
            files.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

fn analyze_file(
    registry: &Registry,
    file: &mut TaggedAudioFile,
    analyzer: &mut dyn Analyzer,
    tracker: &ProgressTracker<'_>,
    granularity: u64,
    cancel: &CancellationToken,
) -> Result<()> {
    let path = file.path().to_path_buf();
    let mut reporter = FrameReporter::new(tracker, granularity);

    audio::decode(registry, &path, cancel, |block| {
        analyzer.submit(block)?;
        reporter.add(block.frames() as u64);
        Ok(())
    })?;
    reporter.flush();

    let result = analyzer.result().map_err(|e| e.with_path(&path))?;
    file.metadata_mut(registry)?.merge_from(&result);
    tracker.complete_file();
    debug!("Analyzed {}", path.display());
    Ok(())
}

/// The failure that started the abort, ahead of the cancellations it caused
pub(crate) fn first_failure<T>(outcomes: impl IntoIterator<Item = Result<T>>) -> Result<Vec<T>> {
    let mut values = Vec::new();
    let mut cancelled = false;
    for outcome in outcomes {
        match outcome {
            Ok(value) => values.push(value),
            Err(AudioError::Cancelled) => cancelled = true,
            Err(e) => return Err(e),
        }
    }
    if cancelled {
        return Err(AudioError::Cancelled);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::GroupMember;
    use crate::config::{SettingInfo, SettingInfoMap};
    use crate::metadata::AudioMetadata;
    use crate::registry::CapabilityDescriptor;
    use crate::types::{AudioInfo, SampleBlock};
    use hound::{SampleFormat, WavSpec, WavWriter};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    /// Counts frames per file; the group result is the total
    #[derive(Default)]
    struct FrameCounter {
        frames: u64,
        member: Option<GroupMember>,
    }

    impl Analyzer for FrameCounter {
        fn setting_info(&self) -> SettingInfoMap {
            let mut info = SettingInfoMap::new();
            info.insert("Label".to_string(), SettingInfo::Str { allowed: vec![] });
            info
        }

        fn initialize(&mut self, _: &AudioInfo, _: &SettingDictionary, group: &GroupToken) -> Result<()> {
            self.member = Some(group.join());
            Ok(())
        }

        fn submit(&mut self, block: &SampleBlock) -> Result<()> {
            self.frames += block.frames() as u64;
            Ok(())
        }

        fn result(&mut self) -> Result<AudioMetadata> {
            let frames = self.frames;
            if let Some(member) = self.member.as_mut() {
                member.complete::<u64, _>(|total| *total += frames)?;
            }
            Ok(AudioMetadata {
                comment: frames.to_string(),
                ..Default::default()
            })
        }

        fn group_result(&mut self) -> Result<AudioMetadata> {
            let member = self.member.as_ref().ok_or(AudioError::GroupIncomplete)?;
            let total = member.aggregate::<u64, _, _>(|total| *total)?;
            Ok(AudioMetadata {
                track_count: total.to_string(),
                ..Default::default()
            })
        }
    }

    /// Joins the group in `initialize` but never contributes to it
    #[derive(Default)]
    struct SilentMember {
        member: Option<GroupMember>,
    }

    impl Analyzer for SilentMember {
        fn setting_info(&self) -> SettingInfoMap {
            SettingInfoMap::new()
        }

        fn initialize(&mut self, _: &AudioInfo, _: &SettingDictionary, group: &GroupToken) -> Result<()> {
            self.member = Some(group.join());
            Ok(())
        }

        fn submit(&mut self, _: &SampleBlock) -> Result<()> {
            Ok(())
        }

        fn result(&mut self) -> Result<AudioMetadata> {
            Ok(AudioMetadata::default())
        }

        fn group_result(&mut self) -> Result<AudioMetadata> {
            let member = self.member.as_ref().ok_or(AudioError::GroupIncomplete)?;
            member.aggregate::<u64, _, _>(|_| AudioMetadata::default())
        }
    }

    fn write_wav(dir: &Path, name: &str, frames: usize) -> PathBuf {
        let path = dir.join(name);
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for i in 0..frames {
            writer.write_sample((i % 100) as i16).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    fn registry() -> Registry {
        crate::plugins::register_defaults(Registry::builder())
            .analyzer(CapabilityDescriptor::named("FrameCounter"), || {
                Box::<FrameCounter>::default()
            })
            .analyzer(CapabilityDescriptor::named("SilentMember"), || {
                Box::<SilentMember>::default()
            })
            .build()
    }

    #[test]
    fn test_group_result_sees_every_member() {
        let dir = TempDir::new().unwrap();
        let registry = registry();
        let mut files = vec![
            TaggedAudioFile::new(write_wav(dir.path(), "a.wav", 1000)).unwrap(),
            TaggedAudioFile::new(write_wav(dir.path(), "b.wav", 3000)).unwrap(),
        ];

        AudioFileAnalyzer::new(&registry, "FrameCounter", &SettingDictionary::new())
            .unwrap()
            .analyze(&mut files, None, &CancellationToken::new())
            .unwrap();

        let a = files[0].loaded_metadata().unwrap();
        let b = files[1].loaded_metadata().unwrap();
        assert_eq!(a.comment, "1000");
        assert_eq!(b.comment, "3000");
        assert_eq!(a.track_count, "4000");
        assert_eq!(b.track_count, "4000");
    }

    #[test]
    fn test_member_without_contribution_fails_group_step() {
        let dir = TempDir::new().unwrap();
        let registry = registry();
        let mut files = vec![
            TaggedAudioFile::new(write_wav(dir.path(), "a.wav", 200)).unwrap(),
            TaggedAudioFile::new(write_wav(dir.path(), "b.wav", 200)).unwrap(),
        ];

        let err = AudioFileAnalyzer::new(&registry, "SilentMember", &SettingDictionary::new())
            .unwrap()
            .analyze(&mut files, None, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, AudioError::GroupIncomplete));
    }

    #[test]
    fn test_unknown_setting_rejected_before_io() {
        let registry = registry();
        let mut settings = SettingDictionary::new();
        settings.insert("Quality", 5);
        let err = AudioFileAnalyzer::new(&registry, "FrameCounter", &settings).err().unwrap();
        assert!(matches!(err, AudioError::UnknownSetting { .. }));
    }

    #[test]
    fn test_cancelled_token_fails_batch() {
        let dir = TempDir::new().unwrap();
        let registry = registry();
        let mut files = vec![TaggedAudioFile::new(write_wav(dir.path(), "a.wav", 500)).unwrap()];
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = AudioFileAnalyzer::new(&registry, "FrameCounter", &SettingDictionary::new())
            .unwrap()
            .analyze(&mut files, None, &cancel)
            .unwrap_err();
        assert!(matches!(err, AudioError::Cancelled));
    }

    #[test]
    fn test_first_failure_prefers_real_error() {
        let outcomes: Vec<Result<()>> = vec![
            Err(AudioError::Cancelled),
            Err(AudioError::decode_error("/a.wav", "bad")),
            Ok(()),
        ];
        assert!(matches!(first_failure(outcomes), Err(AudioError::DecodeError { .. })));
    }
}
