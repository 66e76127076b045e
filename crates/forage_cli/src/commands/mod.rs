//! CLI command implementations.

pub mod drivers;
pub mod items;

use crate::error::{CliError, CliResult};
use forage_codec::{serialize, to_json, Value};
use forage_core::Config;
use std::path::Path;

/// Reads a configuration record from a JSON file.
///
/// Missing fields keep their defaults.
pub fn load_config(path: &Path) -> CliResult<Config> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::ConfigFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

/// Renders a stored value as one line of JSON.
///
/// Top-level binary payloads have no JSON form and are shown in their
/// serialized string form instead.
pub fn render(value: &Value) -> CliResult<String> {
    let json = match value {
        Value::Binary(_) => serde_json::Value::String(serialize(value)?),
        other => to_json(other)?,
    };
    Ok(serde_json::to_string(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use forage_codec::Binary;

    #[test]
    fn config_file_uses_camel_case_and_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forage.json");
        std::fs::write(
            &path,
            r#"{"name": "app", "storeName": "cache", "driver": ["localStorageWrapper"]}"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.name, "app");
        assert_eq!(config.store_name, "cache");
        assert_eq!(
            config.driver_order,
            Some(vec!["localStorageWrapper".to_string()])
        );
        assert_eq!(config.size, Config::default().size);
    }

    #[test]
    fn missing_config_file_names_the_path() {
        let err = load_config(Path::new("/nonexistent/forage.json")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/forage.json"));
    }

    #[test]
    fn render_values() {
        let value = Value::map([("n", Value::from(1)), ("s", Value::from("x"))]);
        let line = render(&value).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, serde_json::json!({"n": 1, "s": "x"}));

        let raw = Value::Binary(Binary::array_buffer(vec![1, 2, 3]));
        assert!(render(&raw).unwrap().starts_with("\"__lfsc__:arbf"));
    }
}
