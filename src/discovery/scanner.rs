//! File discovery and scanning

use crate::audio::{extension_of, TaggedAudioFile};
use crate::error::{AudioError, Result};
use crate::registry::Registry;
use std::collections::BTreeSet;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Scan a path (file or directory) for files some registered decoder accepts
///
/// Directory results are sorted by path so batches are deterministic. A single
/// file with no decoder for its extension is an error; inside a directory such
/// files are skipped.
pub fn scan(registry: &Registry, input: &Path, recursive: bool) -> Result<Vec<TaggedAudioFile>> {
    if !input.exists() {
        return Err(AudioError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("File not found: '{}'", input.display()),
        )));
    }

    let extensions = registry.decodable_extensions();

    if input.is_file() {
        if !is_decodable(&extensions, input) {
            return Err(AudioError::UnsupportedFormat {
                path: input.to_path_buf(),
                extension: extension_of(input),
            });
        }
        return Ok(vec![TaggedAudioFile::new(input)?]);
    }

    let walker = if recursive {
        WalkDir::new(input)
    } else {
        WalkDir::new(input).max_depth(1)
    };

    let mut paths = Vec::new();
    for entry in walker.into_iter() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", input.display(), e);
                continue;
            }
        };
        let path = entry.path();
        if entry.file_type().is_file() && is_decodable(&extensions, path) {
            debug!("Discovered: {}", path.display());
            paths.push(path.to_path_buf());
        }
    }
    paths.sort();

    info!("Discovered {} audio files", paths.len());
    if paths.is_empty() {
        warn!("No supported audio files found in {}", input.display());
    }

    paths.into_iter().map(TaggedAudioFile::new).collect()
}

fn is_decodable(extensions: &BTreeSet<String>, path: &Path) -> bool {
    extensions.contains(&extension_of(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"").unwrap();
    }

    #[test]
    fn test_scan_filters_and_sorts() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("b.FLAC"));
        touch(&dir.path().join("a.wav"));
        touch(&dir.path().join("notes.txt"));
        touch(&dir.path().join("sub/c.mp3"));

        let registry = Registry::with_defaults();
        let flat = scan(&registry, dir.path(), false).unwrap();
        let names: Vec<_> = flat
            .iter()
            .map(|f| f.path().file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a.wav", "b.FLAC"]);

        let deep = scan(&registry, dir.path(), true).unwrap();
        assert_eq!(deep.len(), 3);
    }

    #[test]
    fn test_single_unsupported_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("notes.txt");
        touch(&path);
        let err = scan(&Registry::with_defaults(), &path, false).unwrap_err();
        assert!(matches!(err, AudioError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_missing_input() {
        let err = scan(&Registry::with_defaults(), Path::new("/no/such/dir"), true).unwrap_err();
        assert!(matches!(err, AudioError::Io(_)));
    }
}
