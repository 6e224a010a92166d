//! Tag reading and writing using lofty
//!
//! Covers ID3v2 (MP3, WAV), Vorbis comments (FLAC, Ogg) and MP4 atoms. Cover
//! art travels as the front-cover picture; its bytes are copied, never decoded.

use crate::config::{SettingDictionary, SettingInfoMap};
use crate::error::{AudioError, Result};
use crate::metadata::{AudioMetadata, CoverArt, MetadataField};
use crate::registry::MetadataCodec;
use lofty::error::{ErrorKind, LoftyError};
use lofty::{
    Accessor, ItemKey, MimeType, Picture, PictureType, Probe, Tag, TagExt, TaggedFileExt,
};
use std::fs::File;
use std::io::{BufReader, Seek, SeekFrom};
use std::sync::Arc;
use tracing::debug;

fn map_lofty_error(err: LoftyError) -> AudioError {
    match err.kind() {
        ErrorKind::UnknownFormat => AudioError::unsupported("", "unrecognized tag container"),
        _ => AudioError::MetadataError {
            path: Default::default(),
            reason: err.to_string(),
        },
    }
}

/// Text fields with a direct lofty item key
fn item_key(field: MetadataField) -> Option<ItemKey> {
    let key = match field {
        MetadataField::Title => ItemKey::TrackTitle,
        MetadataField::Artist => ItemKey::TrackArtist,
        MetadataField::Album => ItemKey::AlbumTitle,
        MetadataField::AlbumArtist => ItemKey::AlbumArtist,
        MetadataField::Composer => ItemKey::Composer,
        MetadataField::Genre => ItemKey::Genre,
        MetadataField::Comment => ItemKey::Comment,
        MetadataField::TrackPeak => ItemKey::ReplayGainTrackPeak,
        MetadataField::AlbumPeak => ItemKey::ReplayGainAlbumPeak,
        MetadataField::TrackGain => ItemKey::ReplayGainTrackGain,
        MetadataField::AlbumGain => ItemKey::ReplayGainAlbumGain,
        MetadataField::Day
        | MetadataField::Month
        | MetadataField::Year
        | MetadataField::TrackNumber
        | MetadataField::TrackCount => return None,
    };
    Some(key)
}

/// Split a `YYYY[-MM[-DD]]` recording date
fn split_date(date: &str) -> (String, String, String) {
    let mut parts = date.trim().splitn(3, '-').map(|p| p.trim().to_string());
    let year = parts.next().unwrap_or_default();
    let month = parts.next().unwrap_or_default();
    let day = parts.next().map(|d| d.chars().take(2).collect::<String>()).unwrap_or_default();
    (year, month, day)
}

fn join_date(metadata: &AudioMetadata) -> Option<String> {
    if metadata.year.is_empty() {
        return None;
    }
    let mut date = metadata.year.clone();
    if !metadata.month.is_empty() {
        date.push_str(&format!("-{:0>2}", metadata.month));
        if !metadata.day.is_empty() {
            date.push_str(&format!("-{:0>2}", metadata.day));
        }
    }
    Some(date)
}

fn tag_to_metadata(tag: &Tag) -> AudioMetadata {
    let mut metadata = AudioMetadata::default();
    for field in MetadataField::ALL {
        if let Some(value) = item_key(field).and_then(|key| tag.get_string(&key)) {
            metadata.set(field, value);
        }
    }

    if let Some(date) = tag.get_string(&ItemKey::RecordingDate) {
        let (year, month, day) = split_date(date);
        metadata.year = year;
        metadata.month = month;
        metadata.day = day;
    } else if let Some(year) = tag.year() {
        metadata.year = year.to_string();
    }
    if let Some(track) = tag.track() {
        metadata.track_number = track.to_string();
    }
    if let Some(total) = tag.track_total() {
        metadata.track_count = total.to_string();
    }

    let picture = tag
        .get_picture_type(PictureType::CoverFront)
        .or_else(|| tag.pictures().first());
    metadata.cover_art = picture.map(|picture| CoverArt {
        mime_type: picture.mime_type().as_str().to_string(),
        data: Arc::from(picture.data()),
    });
    metadata
}

fn apply_metadata(tag: &mut Tag, metadata: &AudioMetadata) {
    for field in MetadataField::ALL {
        let Some(key) = item_key(field) else {
            continue;
        };
        let value = metadata.get(field);
        if value.is_empty() {
            tag.remove_key(&key);
        } else {
            tag.insert_text(key, value.to_string());
        }
    }

    match join_date(metadata) {
        Some(date) => {
            tag.insert_text(ItemKey::RecordingDate, date);
        }
        None => {
            tag.remove_key(&ItemKey::RecordingDate);
        }
    }
    match metadata.track_number.trim().parse::<u32>() {
        Ok(track) => tag.set_track(track),
        Err(_) => tag.remove_track(),
    }
    match metadata.track_count.trim().parse::<u32>() {
        Ok(total) => tag.set_track_total(total),
        Err(_) => tag.remove_track_total(),
    }

    // A record without a cover keeps whatever pictures the file already has
    if let Some(cover) = &metadata.cover_art {
        tag.remove_picture_type(PictureType::CoverFront);
        tag.push_picture(Picture::new_unchecked(
            PictureType::CoverFront,
            MimeType::from_str(&cover.mime_type),
            None,
            cover.data.to_vec(),
        ));
    }
}

/// Reads and writes the container's native tag format
#[derive(Debug, Default)]
pub struct LoftyMetadataCodec;

impl MetadataCodec for LoftyMetadataCodec {
    fn format(&self) -> &str {
        "Native"
    }

    fn setting_info(&self) -> SettingInfoMap {
        SettingInfoMap::new()
    }

    fn read_metadata(&mut self, input: &mut File) -> Result<AudioMetadata> {
        let tagged_file = Probe::new(BufReader::new(&mut *input))
            .guess_file_type()?
            .read()
            .map_err(map_lofty_error)?;

        match tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) {
            Some(tag) => Ok(tag_to_metadata(tag)),
            None => {
                debug!("No tags found");
                Ok(AudioMetadata::default())
            }
        }
    }

    fn write_metadata(
        &mut self,
        output: &mut File,
        metadata: &AudioMetadata,
        _settings: &SettingDictionary,
    ) -> Result<()> {
        output.seek(SeekFrom::Start(0))?;
        let tagged_file = Probe::new(BufReader::new(&mut *output))
            .guess_file_type()?
            .read()
            .map_err(map_lofty_error)?;

        let tag_type = tagged_file.primary_tag_type();
        let mut tag = tagged_file
            .primary_tag()
            .cloned()
            .unwrap_or_else(|| Tag::new(tag_type));
        apply_metadata(&mut tag, metadata);

        output.seek(SeekFrom::Start(0))?;
        tag.save_to(output).map_err(map_lofty_error)?;
        debug!("Wrote {:?} tag", tag_type);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use tempfile::TempDir;

    fn silent_wav(dir: &TempDir) -> std::path::PathBuf {
        let path = dir.path().join("silence.wav");
        let spec = WavSpec {
            channels: 1,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(&path, spec).unwrap();
        for _ in 0..800 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    #[test]
    fn test_untagged_file_reads_empty() {
        let dir = TempDir::new().unwrap();
        let path = silent_wav(&dir);
        let metadata = LoftyMetadataCodec
            .read_metadata(&mut File::open(&path).unwrap())
            .unwrap();
        assert!(metadata.title.is_empty());
    }

    #[test]
    fn test_written_tags_read_back() {
        let dir = TempDir::new().unwrap();
        let path = silent_wav(&dir);
        let metadata = AudioMetadata {
            title: "Test Title".to_string(),
            artist: "Test Artist".to_string(),
            track_gain: "-3.21".to_string(),
            ..Default::default()
        };

        let mut file = File::options().read(true).write(true).open(&path).unwrap();
        LoftyMetadataCodec
            .write_metadata(&mut file, &metadata, &SettingDictionary::new())
            .unwrap();
        drop(file);

        let read = LoftyMetadataCodec
            .read_metadata(&mut File::open(&path).unwrap())
            .unwrap();
        assert_eq!(read.title, "Test Title");
        assert_eq!(read.artist, "Test Artist");
        assert!(read.cover_art.is_none());
    }

    #[test]
    fn test_cover_art_is_written_and_read_back() {
        let dir = TempDir::new().unwrap();
        let path = silent_wav(&dir);
        let png: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let metadata = AudioMetadata {
            album: "Covered".to_string(),
            cover_art: Some(CoverArt {
                mime_type: "image/png".to_string(),
                data: Arc::from(png),
            }),
            ..Default::default()
        };

        let mut file = File::options().read(true).write(true).open(&path).unwrap();
        LoftyMetadataCodec
            .write_metadata(&mut file, &metadata, &SettingDictionary::new())
            .unwrap();
        drop(file);

        let read = LoftyMetadataCodec
            .read_metadata(&mut File::open(&path).unwrap())
            .unwrap();
        let cover = read.cover_art.expect("cover art should survive the write");
        assert_eq!(cover.mime_type, "image/png");
        assert_eq!(&cover.data[..], png);
        assert_eq!(read.album, "Covered");
    }

    #[test]
    fn test_tag_failures_are_metadata_errors() {
        let err = map_lofty_error(LoftyError::new(ErrorKind::TooMuchData));
        assert!(matches!(err, AudioError::MetadataError { .. }), "unexpected error: {err}");
    }

    #[test]
    fn test_unknown_container_is_declined() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("x.wav");
        std::fs::write(&path, b"plain text, no container here").unwrap();
        let err = LoftyMetadataCodec
            .read_metadata(&mut File::open(&path).unwrap())
            .unwrap_err();
        assert!(err.is_unsupported(), "unexpected error: {err}");
    }

    #[test]
    fn test_date_split_and_join() {
        assert_eq!(
            split_date("1999-07-04T00:00"),
            ("1999".to_string(), "07".to_string(), "04".to_string())
        );
        let metadata = AudioMetadata {
            year: "2001".to_string(),
            month: "3".to_string(),
            ..Default::default()
        };
        assert_eq!(join_date(&metadata).as_deref(), Some("2001-03"));
    }
}
