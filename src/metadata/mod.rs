//! Audio metadata records
//!
//! Every textual field is a string where empty means "absent". Fields are
//! enumerated by [`MetadataField`] in a fixed order, which is what the
//! non-destructive merge and path templates walk.

pub mod template;

pub use template::{MetadataTemplate, INVALID_FILE_NAME_CHARS, INVALID_PATH_CHARS};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Named metadata fields, in merge order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetadataField {
    Title,
    Artist,
    Album,
    AlbumArtist,
    Composer,
    Genre,
    Comment,
    Day,
    Month,
    Year,
    TrackNumber,
    TrackCount,
    TrackPeak,
    AlbumPeak,
    TrackGain,
    AlbumGain,
}

impl MetadataField {
    /// Every field in merge order
    pub const ALL: [MetadataField; 16] = [
        MetadataField::Title,
        MetadataField::Artist,
        MetadataField::Album,
        MetadataField::AlbumArtist,
        MetadataField::Composer,
        MetadataField::Genre,
        MetadataField::Comment,
        MetadataField::Day,
        MetadataField::Month,
        MetadataField::Year,
        MetadataField::TrackNumber,
        MetadataField::TrackCount,
        MetadataField::TrackPeak,
        MetadataField::AlbumPeak,
        MetadataField::TrackGain,
        MetadataField::AlbumGain,
    ];

    /// Identifier used in templates, e.g. `AlbumArtist`
    pub fn name(self) -> &'static str {
        match self {
            MetadataField::Title => "Title",
            MetadataField::Artist => "Artist",
            MetadataField::Album => "Album",
            MetadataField::AlbumArtist => "AlbumArtist",
            MetadataField::Composer => "Composer",
            MetadataField::Genre => "Genre",
            MetadataField::Comment => "Comment",
            MetadataField::Day => "Day",
            MetadataField::Month => "Month",
            MetadataField::Year => "Year",
            MetadataField::TrackNumber => "TrackNumber",
            MetadataField::TrackCount => "TrackCount",
            MetadataField::TrackPeak => "TrackPeak",
            MetadataField::AlbumPeak => "AlbumPeak",
            MetadataField::TrackGain => "TrackGain",
            MetadataField::AlbumGain => "AlbumGain",
        }
    }

    /// Parse a template identifier; exact, case-sensitive match
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }
}

impl fmt::Display for MetadataField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Embedded cover image; the bytes are shared, not inspected
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverArt {
    pub mime_type: String,
    pub data: Arc<[u8]>,
}

/// Mutable tag record for one file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioMetadata {
    pub title: String,
    pub artist: String,
    pub album: String,
    pub album_artist: String,
    pub composer: String,
    pub genre: String,
    pub comment: String,
    pub day: String,
    pub month: String,
    pub year: String,
    pub track_number: String,
    pub track_count: String,
    pub track_peak: String,
    pub album_peak: String,
    pub track_gain: String,
    pub album_gain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_art: Option<CoverArt>,
}

impl AudioMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: MetadataField) -> &str {
        match field {
            MetadataField::Title => &self.title,
            MetadataField::Artist => &self.artist,
            MetadataField::Album => &self.album,
            MetadataField::AlbumArtist => &self.album_artist,
            MetadataField::Composer => &self.composer,
            MetadataField::Genre => &self.genre,
            MetadataField::Comment => &self.comment,
            MetadataField::Day => &self.day,
            MetadataField::Month => &self.month,
            MetadataField::Year => &self.year,
            MetadataField::TrackNumber => &self.track_number,
            MetadataField::TrackCount => &self.track_count,
            MetadataField::TrackPeak => &self.track_peak,
            MetadataField::AlbumPeak => &self.album_peak,
            MetadataField::TrackGain => &self.track_gain,
            MetadataField::AlbumGain => &self.album_gain,
        }
    }

    pub fn field_mut(&mut self, field: MetadataField) -> &mut String {
        match field {
            MetadataField::Title => &mut self.title,
            MetadataField::Artist => &mut self.artist,
            MetadataField::Album => &mut self.album,
            MetadataField::AlbumArtist => &mut self.album_artist,
            MetadataField::Composer => &mut self.composer,
            MetadataField::Genre => &mut self.genre,
            MetadataField::Comment => &mut self.comment,
            MetadataField::Day => &mut self.day,
            MetadataField::Month => &mut self.month,
            MetadataField::Year => &mut self.year,
            MetadataField::TrackNumber => &mut self.track_number,
            MetadataField::TrackCount => &mut self.track_count,
            MetadataField::TrackPeak => &mut self.track_peak,
            MetadataField::AlbumPeak => &mut self.album_peak,
            MetadataField::TrackGain => &mut self.track_gain,
            MetadataField::AlbumGain => &mut self.album_gain,
        }
    }

    pub fn set(&mut self, field: MetadataField, value: impl Into<String>) {
        *self.field_mut(field) = value.into();
    }

    /// Copy every non-empty field of `source` over this record
    ///
    /// Empty source fields never clear a destination value.
    pub fn merge_from(&mut self, source: &AudioMetadata) {
        for field in MetadataField::ALL {
            let value = source.get(field);
            if !value.is_empty() {
                self.set(field, value);
            }
        }
        if let Some(cover) = &source.cover_art {
            self.cover_art = Some(cover.clone());
        }
    }

    /// True if no field is set
    pub fn is_empty(&self) -> bool {
        self.cover_art.is_none() && MetadataField::ALL.iter().all(|f| self.get(*f).is_empty())
    }
}
