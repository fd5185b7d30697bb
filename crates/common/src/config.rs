//! Mount configuration translator
//!
//! Turns a YAML mount-configuration document into a resolved [`MountSpec`].
//!
//! # Document shape
//!
//! ```yaml
//! mountPoint: M:\           # required
//! metadata: merged.db       # required
//! writable: true            # optional, default true
//! deferCopyEnabled: true    # optional, default true
//! caseSensitive: false      # optional, default false
//! sources:                  # required, order is overlay order
//!   - source: base
//!   - source: mods.zip
//!     plugin:
//!       filename: MFPZip_x64.dll
//!       options: { password: hunter2 }
//! ```
//!
//! Required fields are strict: absent or wrongly typed fails with a
//! [`ConfigError`] naming the field. Optional fields are permissive: a wrongly
//! typed value is treated as absent and the default applies.
//!
//! Plugin options given as a scalar are passed through as their text;
//! sequences and mappings are re-serialized to compact JSON.

use std::path::{Path, PathBuf};

use serde_yaml::{Mapping, Value};

/// One backing source of a mount, in overlay order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub source: String,
    /// `None` lets the engine pick a matching plugin
    pub plugin_filename: Option<String>,
    /// Opaque option string handed to the plugin
    pub plugin_options: Option<String>,
}

/// Fully resolved mount request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountSpec {
    pub mount_point: String,
    pub metadata: String,
    pub writable: bool,
    pub defer_copy_enabled: bool,
    pub case_sensitive: bool,
    pub sources: Vec<SourceSpec>,
}

impl MountSpec {
    pub const DEFAULT_WRITABLE: bool = true;
    pub const DEFAULT_DEFER_COPY_ENABLED: bool = true;
    pub const DEFAULT_CASE_SENSITIVE: bool = false;
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("configuration document is not a mapping")]
    NotAMapping,
    #[error("missing required field: {0}")]
    MissingField(String),
    #[error("invalid value for field: {0}")]
    InvalidField(String),
}

/// Read and translate the configuration file at `path`
pub fn translate(path: &Path) -> Result<MountSpec, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    translate_str(&text)
}

/// Translate an in-memory configuration document
pub fn translate_str(text: &str) -> Result<MountSpec, ConfigError> {
    let document: Value = serde_yaml::from_str(text)?;
    let root = match untag(&document) {
        Value::Mapping(root) => root,
        _ => return Err(ConfigError::NotAMapping),
    };

    let mount_point = required_str(root, "mountPoint", "mountPoint")?;
    let metadata = required_str(root, "metadata", "metadata")?;
    let writable = optional_bool(root, "writable").unwrap_or(MountSpec::DEFAULT_WRITABLE);
    let defer_copy_enabled =
        optional_bool(root, "deferCopyEnabled").unwrap_or(MountSpec::DEFAULT_DEFER_COPY_ENABLED);
    let case_sensitive =
        optional_bool(root, "caseSensitive").unwrap_or(MountSpec::DEFAULT_CASE_SENSITIVE);

    let entries = match root.get("sources").map(untag) {
        None | Some(Value::Null) => return Err(ConfigError::MissingField("sources".to_string())),
        Some(Value::Sequence(entries)) => entries,
        Some(_) => return Err(ConfigError::InvalidField("sources".to_string())),
    };

    let sources = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| translate_source(index, entry))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MountSpec {
        mount_point,
        metadata,
        writable,
        defer_copy_enabled,
        case_sensitive,
        sources,
    })
}

fn translate_source(index: usize, entry: &Value) -> Result<SourceSpec, ConfigError> {
    let entry = match untag(entry) {
        Value::Mapping(entry) => entry,
        _ => return Err(ConfigError::InvalidField(format!("sources[{}]", index))),
    };
    let source = required_str(entry, "source", &format!("sources[{}].source", index))?;

    let plugin = match entry.get("plugin").map(untag) {
        Some(Value::Mapping(plugin)) => Some(plugin),
        _ => None,
    };
    let plugin_filename = plugin.and_then(|plugin| match plugin.get("filename").map(untag) {
        Some(Value::String(filename)) => Some(filename.clone()),
        _ => None,
    });
    let plugin_options = plugin
        .and_then(|plugin| plugin.get("options"))
        .and_then(options_text);

    Ok(SourceSpec {
        source,
        plugin_filename,
        plugin_options,
    })
}

fn untag(value: &Value) -> &Value {
    match value {
        Value::Tagged(tagged) => untag(&tagged.value),
        other => other,
    }
}

fn required_str(map: &Mapping, key: &str, field: &str) -> Result<String, ConfigError> {
    match map.get(key).map(untag) {
        None | Some(Value::Null) => Err(ConfigError::MissingField(field.to_string())),
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(ConfigError::InvalidField(field.to_string())),
    }
}

fn optional_bool(map: &Mapping, key: &str) -> Option<bool> {
    match map.get(key).map(untag) {
        Some(Value::Bool(value)) => Some(*value),
        _ => None,
    }
}

/// Render plugin options into the single string the engine accepts
///
/// Strings pass through untouched. Numbers are rendered from their parsed
/// value, so `1.50` becomes `1.5` and `0x10` becomes `16`; plugins that need
/// the literal text must have it quoted.
fn options_text(value: &Value) -> Option<String> {
    match untag(value) {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Number(number) => Some(number.to_string()),
        structured => Some(yaml_to_json(structured).to_string()),
    }
}

fn yaml_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(flag) => serde_json::Value::Bool(*flag),
        Value::Number(number) => {
            if let Some(n) = number.as_i64() {
                serde_json::Value::from(n)
            } else if let Some(n) = number.as_u64() {
                serde_json::Value::from(n)
            } else {
                number
                    .as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
        }
        Value::String(text) => serde_json::Value::String(text.clone()),
        Value::Sequence(items) => items.iter().map(yaml_to_json).collect(),
        Value::Mapping(map) => serde_json::Value::Object(
            map.iter()
                .map(|(key, value)| (key_text(key), yaml_to_json(value)))
                .collect(),
        ),
        Value::Tagged(tagged) => yaml_to_json(&tagged.value),
    }
}

fn key_text(key: &Value) -> String {
    match untag(key) {
        Value::String(text) => text.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        structured => yaml_to_json(structured).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_source_order() {
        let spec = translate_str(
            r#"
mountPoint: 'M:\'
metadata: meta.db
sources:
  - source: 'C:\A'
  - source: 'C:\B'
"#,
        )
        .unwrap();

        assert_eq!(spec.mount_point, "M:\\");
        assert!(spec.writable);
        assert!(spec.defer_copy_enabled);
        assert!(!spec.case_sensitive);
        let sources: Vec<_> = spec.sources.iter().map(|s| s.source.as_str()).collect();
        assert_eq!(sources, vec!["C:\\A", "C:\\B"]);
        assert!(spec.sources.iter().all(|s| s.plugin_filename.is_none()));
    }

    #[test]
    fn test_explicit_flags_honoured() {
        let spec = translate_str(
            "mountPoint: M\nmetadata: m\nwritable: false\ndeferCopyEnabled: false\ncaseSensitive: true\nsources: []\n",
        )
        .unwrap();
        assert!(!spec.writable);
        assert!(!spec.defer_copy_enabled);
        assert!(spec.case_sensitive);
        assert!(spec.sources.is_empty());
    }

    #[test]
    fn test_wrong_typed_optionals_fall_back() {
        let spec = translate_str(
            "mountPoint: M\nmetadata: m\nwritable: [1]\ndeferCopyEnabled: nope\ncaseSensitive: 3\nsources: []\n",
        )
        .unwrap();
        assert!(spec.writable);
        assert!(spec.defer_copy_enabled);
        assert!(!spec.case_sensitive);
    }

    #[test]
    fn test_missing_required_field_is_named() {
        let err = translate_str("metadata: m\nsources: []\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "mountPoint"));

        let err = translate_str("mountPoint: M\nmetadata: [x]\nsources: []\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidField(ref f) if f == "metadata"));

        let err = translate_str("mountPoint: M\nmetadata: m\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "sources"));

        let err = translate_str("mountPoint: M\nmetadata: m\nsources:\n  - plugin: {}\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "sources[0].source"));
    }

    #[test]
    fn test_plugin_options_rendering() {
        let spec = translate_str(
            r#"
mountPoint: M
metadata: m
sources:
  - source: raw
    plugin:
      filename: MFPZip_x64.dll
      options: 'password=abc'
  - source: structured
    plugin:
      options:
        password: abc
        levels: [1, 2]
  - source: number
    plugin:
      options: 42
  - source: float
    plugin:
      options: 1.50
  - source: hex
    plugin:
      options: 0x10
  - source: quoted
    plugin:
      options: '0x10'
"#,
        )
        .unwrap();

        assert_eq!(
            spec.sources[0].plugin_filename.as_deref(),
            Some("MFPZip_x64.dll")
        );
        assert_eq!(spec.sources[0].plugin_options.as_deref(), Some("password=abc"));

        let options: serde_json::Value =
            serde_json::from_str(spec.sources[1].plugin_options.as_deref().unwrap()).unwrap();
        assert_eq!(options, serde_json::json!({"password": "abc", "levels": [1, 2]}));
        assert!(spec.sources[1].plugin_filename.is_none());

        assert_eq!(spec.sources[2].plugin_options.as_deref(), Some("42"));
        assert_eq!(spec.sources[3].plugin_options.as_deref(), Some("1.5"));
        assert_eq!(spec.sources[4].plugin_options.as_deref(), Some("16"));
        assert_eq!(spec.sources[5].plugin_options.as_deref(), Some("0x10"));
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        let err = translate_str("mountPoint: [unterminated\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = translate(&dir.path().join("absent.mfcfg")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
