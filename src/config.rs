//! Workspace configuration.
//!
//! `runeforge.json` is read as text, environment substitution is applied
//! (`${NAME}` and `${NAME:-default}`), and the result is parsed with serde.
//! Missing keys fall back to the defaults table below, so a minimal config
//! can be a bare `{}`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Workspace configuration root.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub client: ClientConfig,
    pub databases: DatabasesConfig,
    pub server: ServerConfig,
    pub output: OutputConfig,
}

/// External client installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Absolute path to the client installation.
    pub path: PathBuf,
    /// Client locale tag, e.g. `enUS`.
    pub locale: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            locale: "enUS".to_string(),
        }
    }
}

/// The three configured databases.
///
/// `primary` is the working DBC database, `baseline` is the untouched
/// pristine copy, `world` is the server-side database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabasesConfig {
    pub primary: DbConfig,
    pub baseline: DbConfig,
    pub world: DbConfig,
}

impl Default for DatabasesConfig {
    fn default() -> Self {
        Self {
            primary: DbConfig::named("runeforge_dbc"),
            baseline: DbConfig::named("runeforge_dbc_baseline"),
            world: DbConfig::named("acore_world"),
        }
    }
}

/// Connection settings for one database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    pub name: String,
}

impl DbConfig {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            user: "root".to_string(),
            password: "root".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3306,
            name: String::new(),
        }
    }
}

/// External server installation.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Where exported DBC files must also land for the server to read.
    pub data_path: PathBuf,
    /// Server source tree (target of `server-patches/`).
    pub source_path: PathBuf,
    /// Scripts directory inside the source tree (target of `scripts/`).
    pub scripts_path: PathBuf,
}

/// Archive output names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Archive holding the exported DBC files, placed under `Data/`.
    pub primary_archive_name: String,
    /// Locale archive name; the literal `{locale}` is substituted.
    pub overlay_archive_name_template: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            primary_archive_name: "patch-rf.mpq".to_string(),
            overlay_archive_name_template: "patch-{locale}-rf.mpq".to_string(),
        }
    }
}

impl Config {
    /// Parse config text, applying environment substitution first.
    pub fn from_str(text: &str) -> Result<Self> {
        let expanded = expand_vars(text);
        serde_json::from_str(&expanded).context("Malformed workspace config")
    }

    /// Overlay archive name with `{locale}` substituted.
    pub fn overlay_archive_name(&self) -> String {
        self.output
            .overlay_archive_name_template
            .replace("{locale}", &self.client.locale)
    }
}

/// Substitute `${NAME}` and `${NAME:-default}` with environment values.
///
/// An unset variable without a default expands to the empty string. Text
/// that is not a well-formed `${...}` reference is left untouched.
pub fn expand_vars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let inner = &after[..end];
                let (name, default) = match inner.find(":-") {
                    Some(sep) => (&inner[..sep], Some(&inner[sep + 2..])),
                    None => (inner, None),
                };
                match std::env::var(name) {
                    Ok(value) => out.push_str(&value),
                    Err(_) => out.push_str(default.unwrap_or("")),
                }
                rest = &after[end + 1..];
            }
            None => {
                // No closing brace; keep the literal text.
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = Config::from_str("{}").unwrap();
        assert_eq!(config.client.locale, "enUS");
        assert_eq!(config.databases.primary.name, "runeforge_dbc");
        assert_eq!(config.databases.baseline.name, "runeforge_dbc_baseline");
        assert_eq!(config.databases.world.name, "acore_world");
        assert_eq!(config.databases.world.port, 3306);
        assert_eq!(config.output.primary_archive_name, "patch-rf.mpq");
    }

    #[test]
    fn test_partial_override_keeps_other_defaults() {
        let config = Config::from_str(
            r#"{"databases": {"world": {"name": "tc_world", "port": 3307}}}"#,
        )
        .unwrap();
        assert_eq!(config.databases.world.name, "tc_world");
        assert_eq!(config.databases.world.port, 3307);
        // Untouched sibling database keeps its defaults
        assert_eq!(config.databases.primary.name, "runeforge_dbc");
        assert_eq!(config.databases.world.host, "127.0.0.1");
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        assert!(Config::from_str("{not json").is_err());
    }

    #[test]
    fn test_expand_set_variable() {
        std::env::set_var("RUNEFORGE_TEST_SET", "hello");
        assert_eq!(expand_vars("a ${RUNEFORGE_TEST_SET} b"), "a hello b");
    }

    #[test]
    fn test_expand_unset_variable_is_empty() {
        std::env::remove_var("RUNEFORGE_TEST_UNSET");
        assert_eq!(expand_vars("[${RUNEFORGE_TEST_UNSET}]"), "[]");
    }

    #[test]
    fn test_expand_unset_variable_uses_default() {
        std::env::remove_var("RUNEFORGE_TEST_UNSET");
        assert_eq!(
            expand_vars("${RUNEFORGE_TEST_UNSET:-fallback}"),
            "fallback"
        );
    }

    #[test]
    fn test_expand_set_variable_ignores_default() {
        std::env::set_var("RUNEFORGE_TEST_SET2", "real");
        assert_eq!(expand_vars("${RUNEFORGE_TEST_SET2:-fallback}"), "real");
    }

    #[test]
    fn test_expand_leaves_plain_text_alone() {
        assert_eq!(expand_vars("no variables $HOME here"), "no variables $HOME here");
    }

    #[test]
    fn test_expand_unclosed_brace_is_literal() {
        assert_eq!(expand_vars("broken ${UNCLOSED"), "broken ${UNCLOSED");
    }

    #[test]
    fn test_overlay_archive_name_substitutes_locale() {
        let mut config = Config::default();
        config.client.locale = "deDE".to_string();
        assert_eq!(config.overlay_archive_name(), "patch-deDE-rf.mpq");
    }
}
