//! Settings loading: compiled defaults, deep-merged user file, then env overrides.
//!
//! Merge rules: objects merge per key, arrays and primitives are replaced,
//! `null` in the user file keeps the default.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::EaselSettings;

/// `$EASEL_SETTINGS` if set, else `~/.easel/settings.json`.
pub fn settings_path() -> PathBuf {
    if let Some(path) = std::env::var_os("EASEL_SETTINGS").filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".easel").join("settings.json")
}

pub fn load_settings() -> Result<EaselSettings> {
    load_settings_from_path(&settings_path())
}

/// Missing file yields defaults; malformed JSON is an error.
pub fn load_settings_from_path(path: &Path) -> Result<EaselSettings> {
    let mut settings = load_file_layer(path)?;
    apply_env_overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

fn load_file_layer(path: &Path) -> Result<EaselSettings> {
    let defaults = serde_json::to_value(EaselSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = if content.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&content)?
        };
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
}

pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

fn validate(settings: &EaselSettings) -> Result<()> {
    let mut seen = HashSet::new();
    for entry in &settings.providers {
        if entry.id.trim().is_empty() {
            return Err(SettingsError::InvalidValue("provider entry without an id".into()));
        }
        if !seen.insert(entry.id.as_str()) {
            return Err(SettingsError::InvalidValue(format!(
                "duplicate provider id `{}`",
                entry.id
            )));
        }
    }
    if settings.agent.max_iterations == 0 {
        return Err(SettingsError::InvalidValue("agent.maxIterations must be at least 1".into()));
    }
    Ok(())
}

pub fn apply_env_overrides(settings: &mut EaselSettings) {
    apply_overrides_with(settings, |name| std::env::var(name).ok());
}

/// Same as [`apply_env_overrides`] but with an injectable lookup.
pub fn apply_overrides_with(settings: &mut EaselSettings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = read_string(&lookup, "EASEL_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = read_parsed(&lookup, "EASEL_PORT", |s| parse_range::<u16>(s, 1, 65535)) {
        settings.server.port = v;
    }
    if let Some(v) = read_string(&lookup, "EASEL_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_parsed(&lookup, "EASEL_LOG_JSON", parse_bool) {
        settings.logging.json = v;
    }
    if let Some(v) = read_parsed(&lookup, "EASEL_MAX_ITERATIONS", |s| parse_range::<u32>(s, 1, 1_000)) {
        settings.agent.max_iterations = v;
    }
    if let Some(v) = read_parsed(&lookup, "EASEL_STATE_TIMEOUT_MS", |s| {
        parse_range::<u64>(s, 50, 600_000)
    }) {
        settings.agent.state_timeout_ms = v;
    }
}

/// Accepts (case-insensitive) `true`/`1`/`yes`/`on` and `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

pub fn parse_range<T: std::str::FromStr + PartialOrd>(val: &str, min: T, max: T) -> Option<T> {
    let n: T = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

fn read_string(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).filter(|v| !v.is_empty())
}

fn read_parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Option<T> {
    let val = lookup(name)?;
    let result = parse(&val);
    if result.is_none() {
        warn!(key = name, value = %val, "invalid env override, ignoring");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn merge_nested_override() {
        let target = json!({"server": {"port": 8080, "host": "localhost"}});
        let source = json!({"server": {"port": 9090}});
        let merged = deep_merge(target, source);
        assert_eq!(merged["server"]["port"], 9090);
        assert_eq!(merged["server"]["host"], "localhost");
    }

    #[test]
    fn merge_array_replaces() {
        let merged = deep_merge(json!({"p": [1, 2, 3]}), json!({"p": [9]}));
        assert_eq!(merged["p"], json!([9]));
    }

    #[test]
    fn merge_null_preserves_target() {
        let merged = deep_merge(json!({"a": 1}), json!({"a": null}));
        assert_eq!(merged["a"], 1);
    }

    #[test]
    fn load_missing_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_file_layer(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings.agent.max_iterations, 15);
        assert_eq!(settings.providers.len(), 3);
    }

    #[test]
    fn load_empty_file_returns_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "").unwrap();
        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.server.port, 9847);
    }

    #[test]
    fn load_partial_json_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"agent": {"stateTimeoutMs": 500}, "server": {"port": 7000}}"#).unwrap();

        let settings = load_file_layer(&path).unwrap();
        assert_eq!(settings.agent.state_timeout_ms, 500);
        assert_eq!(settings.agent.max_iterations, 15);
        assert_eq!(settings.server.port, 7000);
        assert_eq!(settings.server.host, "127.0.0.1");
    }

    #[test]
    fn user_providers_replace_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"providers": [{"id": "work", "kind": "claude", "apiKey": "k", "defaultModel": "claude-opus-4-1"}]}"#,
        )
        .unwrap();

        let settings = load_settings_from_path(&path).unwrap();
        assert_eq!(settings.providers.len(), 1);
        let work = settings.provider("work").unwrap();
        assert_eq!(work.kind, "claude");
        assert_eq!(work.default_model.as_deref(), Some("claude-opus-4-1"));
    }

    #[test]
    fn invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_settings_from_path(&path), Err(SettingsError::Json(_))));
    }

    #[test]
    fn duplicate_provider_ids_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"providers": [{"id": "a", "kind": "openai"}, {"id": "a", "kind": "gemini"}]}"#,
        )
        .unwrap();
        let err = load_settings_from_path(&path).unwrap_err();
        assert!(matches!(err, SettingsError::InvalidValue(ref m) if m.contains("duplicate")));
    }

    #[test]
    fn env_overrides_apply() {
        let mut settings = EaselSettings::default();
        apply_overrides_with(
            &mut settings,
            env(&[
                ("EASEL_PORT", "4000"),
                ("EASEL_HOST", "0.0.0.0"),
                ("EASEL_LOG_JSON", "yes"),
                ("EASEL_STATE_TIMEOUT_MS", "750"),
            ]),
        );
        assert_eq!(settings.server.port, 4000);
        assert_eq!(settings.server.host, "0.0.0.0");
        assert!(settings.logging.json);
        assert_eq!(settings.agent.state_timeout_ms, 750);
    }

    #[test]
    fn invalid_env_values_ignored() {
        let mut settings = EaselSettings::default();
        apply_overrides_with(
            &mut settings,
            env(&[("EASEL_PORT", "0"), ("EASEL_MAX_ITERATIONS", "lots"), ("EASEL_LOG_JSON", "maybe")]),
        );
        assert_eq!(settings.server.port, 9847);
        assert_eq!(settings.agent.max_iterations, 15);
        assert!(!settings.logging.json);
    }

    #[test]
    fn parse_helpers() {
        assert_eq!(parse_bool("ON"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("2"), None);
        assert_eq!(parse_range::<u16>("80", 1, 65535), Some(80));
        assert_eq!(parse_range::<u16>("70000", 1, 65535), None);
        assert_eq!(parse_range::<u64>(" 10 ", 1, 100), Some(10));
    }
}
