//! Metadata path templates
//!
//! A template such as `"{Artist}/{Album}"` is parsed once; unknown
//! identifiers fail at construction. Substitution is pure string work.

use super::{AudioMetadata, MetadataField};
use crate::error::{AudioError, Result};

/// Characters stripped from values substituted into a directory path
pub const INVALID_PATH_CHARS: &[char] = &['\0', '"', '<', '>', '|', '?', '*'];

/// Characters stripped from values substituted into a file name
pub const INVALID_FILE_NAME_CHARS: &[char] =
    &['\0', '"', '<', '>', '|', '?', '*', ':', '/', '\\'];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(MetadataField),
}

/// Compiled `{Field}` template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl MetadataTemplate {
    /// Parse `template`; every `{Identifier}` must name a [`MetadataField`]
    ///
    /// A `{` with no closing `}` is kept as literal text.
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let source = template.into();
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source.as_str();

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                literal.push_str(&rest[open..]);
                rest = "";
                break;
            };

            let identifier = &after[..close];
            let field = MetadataField::from_name(identifier).ok_or_else(|| {
                AudioError::InvalidTemplate {
                    template: source.clone(),
                    identifier: identifier.to_string(),
                }
            })?;

            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            segments.push(Segment::Field(field));
            rest = &after[close + 1..];
        }

        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        Ok(Self { source, segments })
    }

    /// The template text as given
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Fields referenced, in order of appearance
    pub fn fields(&self) -> impl Iterator<Item = MetadataField> + '_ {
        self.segments.iter().filter_map(|s| match s {
            Segment::Field(f) => Some(*f),
            Segment::Literal(_) => None,
        })
    }

    /// Replace each field with its value from `metadata`
    ///
    /// Empty fields become `"Unknown {Identifier}"`. Values have
    /// `invalid_chars` removed, and a double space created by a removal is
    /// collapsed; double spaces already present in the value are kept.
    pub fn substitute(&self, metadata: &AudioMetadata, invalid_chars: &[char]) -> String {
        let mut output = String::with_capacity(self.source.len() * 2);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Field(field) => {
                    let value = metadata.get(*field);
                    if value.is_empty() {
                        output.push_str("Unknown ");
                        output.push_str(field.name());
                    } else {
                        output.push_str(&strip_invalid(value, invalid_chars));
                    }
                }
            }
        }
        output
    }
}

fn strip_invalid(value: &str, invalid_chars: &[char]) -> String {
    let mut result = String::with_capacity(value.len());
    let mut stripped = false;
    for c in value.chars() {
        if invalid_chars.contains(&c) {
            stripped = true;
            continue;
        }
        if c == ' ' && stripped && result.ends_with(' ') {
            stripped = false;
            continue;
        }
        stripped = false;
        result.push(c);
    }
    result
}
