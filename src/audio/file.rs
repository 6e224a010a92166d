//! Audio files with lazily loaded stream info and tags

use super::decoder::{extension_of, probe_info};
use crate::error::{AudioError, Result};
use crate::metadata::AudioMetadata;
use crate::registry::{Registry, EXTENSION};
use crate::types::AudioInfo;
use once_cell::sync::OnceCell;
use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A path plus stream info, probed on first access
#[derive(Debug, Clone)]
pub struct AudioFile {
    path: PathBuf,
    info: OnceCell<AudioInfo>,
}

impl AudioFile {
    /// Wrap an existing file
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(AudioError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: '{}'", path.display()),
            )));
        }
        Ok(Self {
            path,
            info: OnceCell::new(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stream info from the first decoder that accepts the file; probed once
    pub fn info(&self, registry: &Registry) -> Result<&AudioInfo> {
        self.info.get_or_try_init(|| probe_info(registry, &self.path))
    }
}

/// An [`AudioFile`] with a mutable tag record
///
/// Tags are read at most once, on first access, unless
/// [`reload_metadata`](TaggedAudioFile::reload_metadata) is called.
#[derive(Debug, Clone)]
pub struct TaggedAudioFile {
    file: AudioFile,
    metadata: Option<AudioMetadata>,
}

impl TaggedAudioFile {
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            file: AudioFile::new(path)?,
            metadata: None,
        })
    }

    pub(crate) fn with_metadata(file: AudioFile, metadata: AudioMetadata) -> Self {
        Self {
            file,
            metadata: Some(metadata),
        }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn audio_file(&self) -> &AudioFile {
        &self.file
    }

    pub fn info(&self, registry: &Registry) -> Result<&AudioInfo> {
        self.file.info(registry)
    }

    /// The tag record, read from disk on first access
    pub fn metadata(&mut self, registry: &Registry) -> Result<&AudioMetadata> {
        self.metadata_mut(registry).map(|m| &*m)
    }

    /// Live tag record; changes stay in memory
    pub fn metadata_mut(&mut self, registry: &Registry) -> Result<&mut AudioMetadata> {
        if self.metadata.is_none() {
            self.metadata = Some(read_metadata(registry, self.file.path())?);
        }
        Ok(self.metadata.get_or_insert_with(AudioMetadata::default))
    }

    /// The tag record if it has already been loaded
    pub fn loaded_metadata(&self) -> Option<&AudioMetadata> {
        self.metadata.as_ref()
    }

    /// Discard the cached record and read it again
    pub fn reload_metadata(&mut self, registry: &Registry) -> Result<()> {
        self.metadata = Some(read_metadata(registry, self.file.path())?);
        Ok(())
    }

    /// Independent copy of the tags: the cached record if loaded, else a fresh read
    pub fn metadata_snapshot(&self, registry: &Registry) -> Result<AudioMetadata> {
        match &self.metadata {
            Some(metadata) => Ok(metadata.clone()),
            None => read_metadata(registry, self.file.path()),
        }
    }
}

/// Read tags with the first metadata codec that accepts the file
///
/// Extensions without any registered codec have no tags to read and yield an
/// empty record.
pub fn read_metadata(registry: &Registry, path: &Path) -> Result<AudioMetadata> {
    let extension = extension_of(path);
    let candidates = registry.metadata_codecs().lookup(EXTENSION, &extension);
    if candidates.is_empty() {
        debug!("No metadata codec for '.{}', starting with empty tags", extension);
        return Ok(AudioMetadata::default());
    }

    let mut file = File::open(path)?;
    for capability in candidates {
        file.seek(SeekFrom::Start(0))?;
        match capability.create().read_metadata(&mut file) {
            Ok(metadata) => return Ok(metadata),
            Err(e) if e.is_unsupported() => {
                debug!(
                    "Metadata codec '{}' declined {}: {}",
                    capability.descriptor(),
                    path.display(),
                    e
                );
            }
            Err(e) => return Err(e.with_path(path)),
        }
    }

    Err(AudioError::UnsupportedFormat {
        path: path.to_path_buf(),
        extension,
    })
}
