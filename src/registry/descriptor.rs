//! Static key/value metadata attached to a plugin factory

use std::fmt;

/// Descriptor key holding the plugin's name
pub const NAME: &str = "Name";
/// Descriptor key holding a handled file extension (lowercase, no dot); may repeat
pub const EXTENSION: &str = "Extension";
/// Descriptor key holding a human-readable description
pub const DESCRIPTION: &str = "Description";
/// Descriptor key holding a metadata format name
pub const FORMAT: &str = "Format";

/// Immutable key/value metadata identifying a plugin
///
/// A key may appear more than once (a decoder usually handles several
/// extensions); lookups match if any pair matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapabilityDescriptor {
    entries: Vec<(String, String)>,
}

impl CapabilityDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Descriptor with just a name
    pub fn named(name: impl Into<String>) -> Self {
        Self::new().with(NAME, name)
    }

    /// Add a key/value pair
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    /// Add one `Extension` entry per item
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ext in extensions {
            let ext = ext.as_ref().trim_start_matches('.').to_ascii_lowercase();
            self.entries.push((EXTENSION.to_string(), ext));
        }
        self
    }

    /// First value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `key`, in insertion order
    pub fn get_all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// The plugin name, or an empty string
    pub fn name(&self) -> &str {
        self.get(NAME).unwrap_or_default()
    }

    /// Key matches exactly; value matches ignoring ASCII case
    pub fn matches(&self, key: &str, value: &str) -> bool {
        let value = value.trim_start_matches('.');
        self.entries
            .iter()
            .any(|(k, v)| k == key && v.eq_ignore_ascii_case(value))
    }
}

impl fmt::Display for CapabilityDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.name();
        if name.is_empty() {
            write!(f, "<unnamed>")
        } else {
            write!(f, "{}", name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multi_valued_extension() {
        let descriptor = CapabilityDescriptor::named("Symphonia").with_extensions([".FLAC", "mp3"]);
        assert!(descriptor.matches(EXTENSION, "flac"));
        assert!(descriptor.matches(EXTENSION, ".MP3"));
        assert!(!descriptor.matches(EXTENSION, "wav"));
        assert_eq!(descriptor.get_all(EXTENSION).collect::<Vec<_>>(), ["flac", "mp3"]);
    }

    #[test]
    fn test_name_lookup() {
        let descriptor = CapabilityDescriptor::named("Wave").with(DESCRIPTION, "PCM");
        assert_eq!(descriptor.name(), "Wave");
        assert!(descriptor.matches(NAME, "wave"));
        assert_eq!(descriptor.to_string(), "Wave");
        assert_eq!(CapabilityDescriptor::new().to_string(), "<unnamed>");
    }
}
