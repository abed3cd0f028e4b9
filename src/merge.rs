use crate::document::{ConfigDocument, ConfigValue};
use std::fmt;

/// Structural mismatch between a base document and a merge patch
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MergeError {
    #[error("cannot merge a {patch} patch at {path}: base is a {base}")]
    ShapeMismatch { path: KeyPath, patch: &'static str, base: &'static str },
}

/// Dotted location of a node inside a document, `<root>` for the top level
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    fn child(&self, key: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(key.to_string());
        Self(segments)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("<root>")
        } else {
            f.write_str(&self.0.join("."))
        }
    }
}

/// Merges `changes` into `base` in place.
///
/// - A sequence patch is appended to a sequence base. Entries are never
///   deduplicated, so applying the same list patch twice repeats it.
/// - A mapping patch is applied key by key: missing keys are inserted,
///   nested mappings recurse, and anything else overwrites the base value
///   (a sequence under an existing key is replaced, not appended).
///
/// # Errors
///
/// Returns [`MergeError::ShapeMismatch`] when the patch and base disagree on
/// shape: a mapping patch against a non-mapping base, a sequence patch
/// against a non-sequence base, or a bare scalar patch. Keys visited before
/// the mismatch have already been applied to `base`.
pub fn merge(base: &mut ConfigValue, changes: ConfigValue) -> Result<(), MergeError> {
    merge_at(base, changes, &KeyPath::default())
}

fn merge_at(base: &mut ConfigValue, changes: ConfigValue, path: &KeyPath) -> Result<(), MergeError> {
    match (base, changes) {
        (ConfigValue::Sequence(items), ConfigValue::Sequence(extra)) => {
            items.extend(extra);
            Ok(())
        },
        (ConfigValue::Mapping(doc), ConfigValue::Mapping(patch)) => merge_mapping(doc, patch, path),
        (base, changes) => Err(MergeError::ShapeMismatch {
            path: path.clone(),
            patch: changes.kind(),
            base: base.kind(),
        }),
    }
}

fn merge_mapping(
    base: &mut ConfigDocument,
    changes: ConfigDocument,
    path: &KeyPath,
) -> Result<(), MergeError> {
    for (key, value) in changes {
        match base.get_mut(&key) {
            None => {
                base.insert(key, value);
            },
            Some(existing) if matches!(value, ConfigValue::Mapping(_)) => {
                let child = path.child(&key);
                merge_at(existing, value, &child)?;
            },
            Some(existing) => *existing = value,
        }
    }
    Ok(())
}

impl ConfigDocument {
    /// Merges a mapping patch into this document; see [`merge`]
    ///
    /// # Errors
    ///
    /// Returns an error when a nested mapping in `changes` meets a scalar or
    /// sequence in `self`.
    pub fn merge(&mut self, changes: Self) -> Result<(), MergeError> {
        merge_mapping(self, changes, &KeyPath::default())
    }
}
