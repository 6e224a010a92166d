//! Plugin settings and their validation
//!
//! Every plugin publishes a [`SettingInfoMap`] describing the keys it accepts.
//! A [`ValidatingSettingDictionary`] checks each entry against that schema at
//! insertion time, so nothing invalid reaches the plugin.

use crate::error::{AudioError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single setting value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl SettingValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SettingValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats
    pub fn as_float(&self) -> Option<f64> {
        match self {
            SettingValue::Float(f) => Some(*f),
            SettingValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::Str(s) => Some(s),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            SettingValue::Bool(_) => "boolean",
            SettingValue::Int(_) => "integer",
            SettingValue::Float(_) => "float",
            SettingValue::Str(_) => "string",
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{}", b),
            SettingValue::Int(i) => write!(f, "{}", i),
            SettingValue::Float(v) => write!(f, "{}", v),
            SettingValue::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Int(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        SettingValue::Int(value as i64)
    }
}

impl From<f64> for SettingValue {
    fn from(value: f64) -> Self {
        SettingValue::Float(value)
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::Str(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::Str(value)
    }
}

/// Schema entry describing what a setting accepts
#[derive(Debug, Clone, PartialEq)]
pub enum SettingInfo {
    Bool,
    /// Inclusive integer range
    Int { min: i64, max: i64 },
    /// One of a fixed set of integers
    IntChoice { allowed: Vec<i64> },
    /// Inclusive float range; integers are accepted
    Float { min: f64, max: f64 },
    /// Case-insensitive match against `allowed`; an empty list accepts any string
    Str { allowed: Vec<String> },
}

impl SettingInfo {
    /// Check `value` against this entry
    pub fn validate(&self, key: &str, value: &SettingValue) -> Result<()> {
        let mismatch = |expected: &str| {
            AudioError::invalid_setting(
                key,
                format!("expected {}, got {} '{}'", expected, value.type_name(), value),
            )
        };

        match self {
            SettingInfo::Bool => value.as_bool().map(|_| ()).ok_or_else(|| mismatch("boolean")),
            SettingInfo::Int { min, max } => {
                let v = value.as_int().ok_or_else(|| mismatch("integer"))?;
                if v < *min || v > *max {
                    return Err(AudioError::invalid_setting(
                        key,
                        format!("{} is outside {}..={}", v, min, max),
                    ));
                }
                Ok(())
            }
            SettingInfo::IntChoice { allowed } => {
                let v = value.as_int().ok_or_else(|| mismatch("integer"))?;
                if !allowed.contains(&v) {
                    return Err(AudioError::invalid_setting(
                        key,
                        format!("{} is not one of {:?}", v, allowed),
                    ));
                }
                Ok(())
            }
            SettingInfo::Float { min, max } => {
                let v = value.as_float().ok_or_else(|| mismatch("number"))?;
                if !v.is_finite() || v < *min || v > *max {
                    return Err(AudioError::invalid_setting(
                        key,
                        format!("{} is outside {}..={}", v, min, max),
                    ));
                }
                Ok(())
            }
            SettingInfo::Str { allowed } => {
                let v = value.as_str().ok_or_else(|| mismatch("string"))?;
                if !allowed.is_empty() && !allowed.iter().any(|a| a.eq_ignore_ascii_case(v)) {
                    return Err(AudioError::invalid_setting(
                        key,
                        format!("'{}' is not one of {:?}", v, allowed),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Schema published by a plugin: setting key to accepted values
pub type SettingInfoMap = BTreeMap<String, SettingInfo>;

/// Plain key/value settings, as built by the host or loaded from JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingDictionary {
    entries: BTreeMap<String, SettingValue>,
}

impl SettingDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a value without validation
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        self.entries.get(key)
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(SettingValue::as_int)
    }

    pub fn get_float(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(SettingValue::as_float)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(SettingValue::as_bool)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(SettingValue::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &SettingValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Settings dictionary bound to one plugin's schema
///
/// Unknown keys and out-of-range values are rejected when inserted. Building
/// one from an existing dictionary re-validates every entry.
#[derive(Debug, Clone)]
pub struct ValidatingSettingDictionary {
    schema: SettingInfoMap,
    settings: SettingDictionary,
}

impl ValidatingSettingDictionary {
    /// Empty dictionary for `schema`
    pub fn new(schema: SettingInfoMap) -> Self {
        Self {
            schema,
            settings: SettingDictionary::new(),
        }
    }

    /// Validate every entry of `settings` against `schema`
    pub fn from_dictionary(schema: SettingInfoMap, settings: &SettingDictionary) -> Result<Self> {
        let mut validated = Self::new(schema);
        for (key, value) in settings.iter() {
            validated.set(key.clone(), value.clone())?;
        }
        Ok(validated)
    }

    /// Add a new entry; fails if the key is already present
    pub fn add(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Result<()> {
        let key = key.into();
        if self.settings.contains_key(&key) {
            return Err(AudioError::invalid_setting(key, "already set"));
        }
        self.set(key, value)
    }

    /// Insert or replace an entry
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<SettingValue>) -> Result<()> {
        let key = key.into();
        let value = value.into();
        let info = self
            .schema
            .get(&key)
            .ok_or_else(|| AudioError::UnknownSetting { key: key.clone() })?;
        info.validate(&key, &value)?;
        self.settings.insert(key, value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<SettingValue> {
        self.settings.entries.remove(key)
    }

    pub fn schema(&self) -> &SettingInfoMap {
        &self.schema
    }

    /// Validated entries
    pub fn settings(&self) -> &SettingDictionary {
        &self.settings
    }

    pub fn into_inner(self) -> SettingDictionary {
        self.settings
    }
}
