//! ReplayGain-style loudness analysis
//!
//! Loudness is the 95th percentile of 50 ms RMS windows. The track result
//! covers one file; the album result pools the windows of every file in the
//! batch and takes the highest peak.

use crate::analysis::{GroupMember, GroupToken};
use crate::config::{SettingDictionary, SettingInfo, SettingInfoMap};
use crate::error::{AudioError, Result};
use crate::metadata::AudioMetadata;
use crate::registry::Analyzer;
use crate::types::{AudioInfo, SampleBlock};
use tracing::debug;

/// Setting key for the target loudness in dBFS
pub const REFERENCE_LEVEL: &str = "ReferenceLevel";

const DEFAULT_REFERENCE_LEVEL: f64 = -18.0;
const WINDOW_SECONDS: f64 = 0.05;
const LOUDNESS_PERCENTILE: f64 = 0.95;

/// Floor for window energy so silence maps to a finite level
const MIN_MEAN_SQUARE: f64 = 1e-10;

/// Pooled contributions of every file in the group
#[derive(Debug, Default)]
struct AlbumLoudness {
    peak: f32,
    windows: Vec<f64>,
}

/// Level in dBFS below which `LOUDNESS_PERCENTILE` of windows fall
fn percentile_loudness(windows: &[f64]) -> Option<f64> {
    if windows.is_empty() {
        return None;
    }
    let mut sorted = windows.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let index = ((sorted.len() - 1) as f64 * LOUDNESS_PERCENTILE).round() as usize;
    Some(sorted[index])
}

fn format_gain(reference: f64, windows: &[f64]) -> String {
    percentile_loudness(windows)
        .map(|loudness| format!("{:.2}", reference - loudness))
        .unwrap_or_default()
}

#[derive(Default)]
pub struct ReplayGainAnalyzer {
    reference: f64,
    window_frames: usize,
    channels: usize,
    window_sum: f64,
    window_filled: usize,
    windows: Vec<f64>,
    peak: f32,
    member: Option<GroupMember>,
}

impl ReplayGainAnalyzer {
    fn close_window(&mut self) {
        if self.window_filled == 0 {
            return;
        }
        let mean_square = self.window_sum / (self.window_filled * self.channels) as f64;
        self.windows.push(10.0 * mean_square.max(MIN_MEAN_SQUARE).log10());
        self.window_sum = 0.0;
        self.window_filled = 0;
    }

    fn analysis_error(reason: &str) -> AudioError {
        AudioError::AnalysisError {
            path: Default::default(),
            reason: reason.to_string(),
        }
    }
}

impl Analyzer for ReplayGainAnalyzer {
    fn setting_info(&self) -> SettingInfoMap {
        let mut info = SettingInfoMap::new();
        info.insert(
            REFERENCE_LEVEL.to_string(),
            SettingInfo::Float {
                min: -30.0,
                max: -5.0,
            },
        );
        info
    }

    fn initialize(
        &mut self,
        info: &AudioInfo,
        settings: &SettingDictionary,
        group: &GroupToken,
    ) -> Result<()> {
        self.reference = settings
            .get_float(REFERENCE_LEVEL)
            .unwrap_or(DEFAULT_REFERENCE_LEVEL);
        self.window_frames = ((info.sample_rate() as f64 * WINDOW_SECONDS) as usize).max(1);
        self.channels = info.channels().max(1) as usize;
        self.member = Some(group.join());
        Ok(())
    }

    fn submit(&mut self, block: &SampleBlock) -> Result<()> {
        for frame in block.iter_frames() {
            for &sample in frame {
                self.peak = self.peak.max(sample.abs());
                self.window_sum += (sample as f64) * (sample as f64);
            }
            self.window_filled += 1;
            if self.window_filled == self.window_frames {
                self.close_window();
            }
        }
        Ok(())
    }

    fn result(&mut self) -> Result<AudioMetadata> {
        self.close_window();
        let member = self
            .member
            .as_mut()
            .ok_or_else(|| Self::analysis_error("analyzer used before initialize"))?;

        let peak = self.peak;
        let windows = &self.windows;
        member.complete::<AlbumLoudness, _>(|album| {
            album.peak = album.peak.max(peak);
            album.windows.extend_from_slice(windows);
        })?;

        debug!("Track loudness over {} windows, peak {:.6}", windows.len(), peak);
        Ok(AudioMetadata {
            track_peak: format!("{:.6}", peak),
            track_gain: format_gain(self.reference, windows),
            ..Default::default()
        })
    }

    fn group_result(&mut self) -> Result<AudioMetadata> {
        let member = self
            .member
            .as_ref()
            .ok_or_else(|| Self::analysis_error("analyzer used before initialize"))?;
        let reference = self.reference;

        let (peak, gain) = member.aggregate::<AlbumLoudness, _, _>(|album| {
            (album.peak, format_gain(reference, &album.windows))
        })?;
        Ok(AudioMetadata {
            album_peak: format!("{:.6}", peak),
            album_gain: gain,
            ..Default::default()
        })
    }
}
