#![allow(clippy::self_named_module_files)]

use indexmap::IndexMap;
use std::fmt;

pub mod format;
pub mod reader;
pub mod writer;

pub use format::{DocumentFormat, Json, Yaml};

/// A leaf value of a configuration document
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
}

impl Scalar {
    /// Render the scalar the way it reads in a YAML file (`null` renders empty)
    pub fn to_plain_string(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(b) => b.to_string(),
            Self::Int(i) => i.to_string(),
            Self::Float(f) => format_float(*f),
            Self::String(s) => s.clone(),
        }
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 {
        format!("{f:.1}")
    } else {
        f.to_string()
    }
}

/// A node of a configuration document: scalar, sequence or nested mapping
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Scalar(Scalar),
    Sequence(Vec<ConfigValue>),
    Mapping(ConfigDocument),
}

impl ConfigValue {
    pub const fn null() -> Self {
        Self::Scalar(Scalar::Null)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::Scalar(Scalar::String(value.into()))
    }

    /// Short name of the variant, used in diagnostics
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Sequence(_) => "sequence",
            Self::Mapping(_) => "mapping",
        }
    }

    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Scalar(Scalar::Null))
    }

    pub const fn as_mapping(&self) -> Option<&ConfigDocument> {
        match self {
            Self::Mapping(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_mapping_mut(&mut self) -> Option<&mut ConfigDocument> {
        match self {
            Self::Mapping(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Self]> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_sequence_mut(&mut self) -> Option<&mut Vec<Self>> {
        match self {
            Self::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Scalar rendered as text; `None` for sequences, mappings and null
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Self::Scalar(Scalar::Null) => None,
            Self::Scalar(s) => Some(s.to_plain_string()),
            _ => None,
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::Scalar(Scalar::String(value))
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Scalar(Scalar::Int(value))
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Scalar(Scalar::Bool(value))
    }
}

impl From<ConfigDocument> for ConfigValue {
    fn from(value: ConfigDocument) -> Self {
        Self::Mapping(value)
    }
}

impl From<Vec<Self>> for ConfigValue {
    fn from(value: Vec<Self>) -> Self {
        Self::Sequence(value)
    }
}

/// Insertion-ordered mapping from string keys to [`ConfigValue`]s
///
/// Key order is kept so a document written back to disk reads the same as
/// the template it came from. Order never influences merge decisions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigDocument {
    entries: IndexMap<String, ConfigValue>,
}

impl ConfigDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ConfigValue> {
        self.entries.get_mut(key)
    }

    /// Nested mapping stored under `key`, if any
    pub fn get_mapping(&self, key: &str) -> Option<&ConfigDocument> {
        self.get(key).and_then(ConfigValue::as_mapping)
    }

    pub fn get_mapping_mut(&mut self, key: &str) -> Option<&mut ConfigDocument> {
        self.get_mut(key).and_then(ConfigValue::as_mapping_mut)
    }

    /// Scalar stored under `key` rendered as text
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(ConfigValue::scalar_text)
    }

    /// Insert or overwrite `key`; an existing key keeps its position
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConfigValue>) -> Option<ConfigValue> {
        self.entries.insert(key.into(), value.into())
    }

    /// Remove `key`, keeping the relative order of the remaining keys
    pub fn remove(&mut self, key: &str) -> Option<ConfigValue> {
        self.entries.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ConfigValue)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }
}

impl IntoIterator for ConfigDocument {
    type Item = (String, ConfigValue);
    type IntoIter = indexmap::map::IntoIter<String, ConfigValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a ConfigDocument {
    type Item = (&'a String, &'a ConfigValue);
    type IntoIter = indexmap::map::Iter<'a, String, ConfigValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<K: Into<String>, V: Into<ConfigValue>> FromIterator<(K, V)> for ConfigDocument {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { entries: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Yaml.render(self) {
            Ok(text) => f.write_str(text.trim_end()),
            Err(_) => write!(f, "{self:?}"),
        }
    }
}
