use super::{ConfigDocument, ConfigValue, Scalar};
use crate::BuildError;

/// A serialization format a [`ConfigValue`] can be loaded from and dumped to
pub trait DocumentFormat {
    /// Human readable name used in log lines and errors
    fn name(&self) -> &'static str;

    /// Parse a whole document
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid in this format or uses a
    /// construct the document model cannot hold (e.g. a mapping as a key).
    fn parse(&self, text: &str) -> Result<ConfigValue, BuildError>;

    /// Render a whole document
    ///
    /// # Errors
    ///
    /// Returns an error if the serializer rejects the value.
    fn render(&self, value: &ConfigValue) -> Result<String, BuildError>;
}

/// Block-style YAML
#[derive(Debug, Clone, Copy, Default)]
pub struct Yaml;

/// Pretty-printed JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl DocumentFormat for Yaml {
    fn name(&self) -> &'static str {
        "YAML"
    }

    /// Merge keys (`<<: *anchor`) are inlined; keys of the mapping itself win
    fn parse(&self, text: &str) -> Result<ConfigValue, BuildError> {
        let mut value: serde_yaml::Value = serde_yaml::from_str(text)?;
        value.apply_merge()?;
        from_yaml(value)
    }

    /// Null nodes are written as `key:` and `-` rather than `null`
    fn render(&self, value: &ConfigValue) -> Result<String, BuildError> {
        if value.is_null() {
            return Ok(serde_yaml::to_string(&serde_yaml::Value::Null)?);
        }
        let marker = null_marker(value);
        let text = serde_yaml::to_string(&to_yaml(value, &marker))?;
        Ok(blank_nulls(&text, &marker))
    }
}

impl DocumentFormat for Json {
    fn name(&self) -> &'static str {
        "JSON"
    }

    fn parse(&self, text: &str) -> Result<ConfigValue, BuildError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        Ok(from_json(value))
    }

    fn render(&self, value: &ConfigValue) -> Result<String, BuildError> {
        let mut text = serde_json::to_string_pretty(&to_json(value))?;
        text.push('\n');
        Ok(text)
    }
}

fn from_yaml(value: serde_yaml::Value) -> Result<ConfigValue, BuildError> {
    use serde_yaml::Value;

    Ok(match value {
        Value::Null => ConfigValue::null(),
        Value::Bool(b) => ConfigValue::Scalar(Scalar::Bool(b)),
        Value::Number(n) => ConfigValue::Scalar(yaml_number(&n)),
        Value::String(s) => ConfigValue::Scalar(Scalar::String(s)),
        Value::Sequence(items) => {
            ConfigValue::Sequence(items.into_iter().map(from_yaml).collect::<Result<_, _>>()?)
        },
        Value::Mapping(map) => {
            let mut doc = ConfigDocument::new();
            for (key, value) in map {
                doc.insert(yaml_key(key)?, from_yaml(value)?);
            }
            ConfigValue::Mapping(doc)
        },
        Value::Tagged(tagged) => from_yaml(tagged.value)?,
    })
}

fn yaml_number(n: &serde_yaml::Number) -> Scalar {
    n.as_i64().map_or_else(|| Scalar::Float(n.as_f64().unwrap_or(f64::NAN)), Scalar::Int)
}

fn yaml_key(key: serde_yaml::Value) -> Result<String, BuildError> {
    use serde_yaml::Value;

    match key {
        Value::String(s) => Ok(s),
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(yaml_number(&n).to_plain_string()),
        Value::Tagged(tagged) => yaml_key(tagged.value),
        other => Err(BuildError::Document(format!(
            "mapping keys must be scalars, found {}",
            serde_yaml::to_string(&other).unwrap_or_default().trim_end()
        ))),
    }
}

/// Converts to a `serde_yaml` tree with every null node replaced by the plain
/// scalar `null_marker`
fn to_yaml(value: &ConfigValue, null_marker: &str) -> serde_yaml::Value {
    use serde_yaml::Value;

    match value {
        ConfigValue::Scalar(Scalar::Null) => Value::String(null_marker.to_string()),
        ConfigValue::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
        ConfigValue::Scalar(Scalar::Int(i)) => Value::Number((*i).into()),
        ConfigValue::Scalar(Scalar::Float(f)) => Value::Number((*f).into()),
        ConfigValue::Scalar(Scalar::String(s)) => Value::String(s.clone()),
        ConfigValue::Sequence(items) => {
            Value::Sequence(items.iter().map(|item| to_yaml(item, null_marker)).collect())
        },
        ConfigValue::Mapping(doc) => Value::Mapping(
            doc.iter().map(|(k, v)| (Value::String(k.clone()), to_yaml(v, null_marker))).collect(),
        ),
    }
}

/// A plain scalar found in no key or string of `value`
///
/// It stands in for null nodes while rendering, so only lines ending in it
/// are real nulls; block strings and quoted text are never touched.
fn null_marker(value: &ConfigValue) -> String {
    (0_u32..)
        .map(|n| format!("sdk-buildmanager-null-{n}"))
        .find(|marker| !mentions(value, marker))
        .unwrap_or_default()
}

fn mentions(value: &ConfigValue, needle: &str) -> bool {
    match value {
        ConfigValue::Scalar(Scalar::String(s)) => s.contains(needle),
        ConfigValue::Scalar(_) => false,
        ConfigValue::Sequence(items) => items.iter().any(|item| mentions(item, needle)),
        ConfigValue::Mapping(doc) => doc.iter().any(|(k, v)| k.contains(needle) || mentions(v, needle)),
    }
}

/// Drop the marker after `key:` and `-`
fn blank_nulls(text: &str, marker: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for line in text.lines() {
        match line.strip_suffix(marker).and_then(|head| head.strip_suffix(' ')) {
            Some(head) if head.ends_with(':') || head.ends_with('-') => out.push_str(head),
            _ => out.push_str(line),
        }
        out.push('\n');
    }
    out
}

fn from_json(value: serde_json::Value) -> ConfigValue {
    use serde_json::Value;

    match value {
        Value::Null => ConfigValue::null(),
        Value::Bool(b) => ConfigValue::Scalar(Scalar::Bool(b)),
        Value::Number(n) => ConfigValue::Scalar(
            n.as_i64().map_or_else(|| Scalar::Float(n.as_f64().unwrap_or(f64::NAN)), Scalar::Int),
        ),
        Value::String(s) => ConfigValue::Scalar(Scalar::String(s)),
        Value::Array(items) => ConfigValue::Sequence(items.into_iter().map(from_json).collect()),
        Value::Object(map) => {
            ConfigValue::Mapping(map.into_iter().map(|(k, v)| (k, from_json(v))).collect())
        },
    }
}

/// Single-line JSON text of `value`
pub fn compact_json(value: &ConfigValue) -> String {
    to_json(value).to_string()
}

fn to_json(value: &ConfigValue) -> serde_json::Value {
    use serde_json::Value;

    match value {
        ConfigValue::Scalar(Scalar::Null) => Value::Null,
        ConfigValue::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
        ConfigValue::Scalar(Scalar::Int(i)) => Value::Number((*i).into()),
        ConfigValue::Scalar(Scalar::Float(f)) => {
            serde_json::Number::from_f64(*f).map_or(Value::Null, Value::Number)
        },
        ConfigValue::Scalar(Scalar::String(s)) => Value::String(s.clone()),
        ConfigValue::Sequence(items) => Value::Array(items.iter().map(to_json).collect()),
        ConfigValue::Mapping(doc) => {
            Value::Object(doc.iter().map(|(k, v)| (k.clone(), to_json(v))).collect())
        },
    }
}
