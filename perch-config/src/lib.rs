//! Loader for console configuration with YAML + environment overlays.
//!
//! Sources merge in order: `perch.yaml` (or any file handed to
//! [`PerchConfigLoader::with_file`]), then `PERCH_`-prefixed environment
//! variables (`PERCH_BASE_URL`, `PERCH_CREDENTIALS__ACCESS_TOKEN`, ...).
//! `${VAR}` placeholders inside string values are expanded recursively with
//! a depth cap, so a YAML file can reference tokens kept in the environment.

use config::{Config, ConfigError, Environment, File};
use perch_common::{Credentials, OutputFormat};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;

fn default_base_url() -> String {
    "https://localhost:8443".into()
}

/// Top-level console configuration.
#[derive(Debug, Deserialize)]
pub struct PerchConfig {
    /// Base URL of the backend API.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Bearer and CSRF tokens attached to requests.
    #[serde(default)]
    pub credentials: Credentials,
    #[serde(default)]
    pub http: HttpTuning,
    #[serde(default)]
    pub feed: FeedDefaults,
    /// How responses are printed.
    #[serde(default)]
    pub output: OutputFormat,
}

/// Transport knobs forwarded to the HTTP client.
#[derive(Debug, Deserialize)]
pub struct HttpTuning {
    #[serde(default = "HttpTuning::default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retry budget for imperative endpoints. Feed page loads always run
    /// with zero retries regardless of this value.
    #[serde(default = "HttpTuning::default_retries")]
    pub retries: usize,
    /// Accept invalid TLS certificates (dev backends on `https://localhost`
    /// with a self-signed cert).
    #[serde(default)]
    pub insecure: bool,
}

impl HttpTuning {
    fn default_timeout_secs() -> u64 {
        15
    }
    fn default_retries() -> usize {
        2
    }
}

impl Default for HttpTuning {
    fn default() -> Self {
        Self {
            timeout_secs: Self::default_timeout_secs(),
            retries: Self::default_retries(),
            insecure: false,
        }
    }
}

/// Defaults for feed page requests, overridable per invocation.
#[derive(Debug, Deserialize)]
pub struct FeedDefaults {
    /// Page size requested; the server clamps to its own bounds.
    #[serde(default = "FeedDefaults::default_limit")]
    pub limit: u32,
    /// Ranking window in days for the popular feed.
    #[serde(default = "FeedDefaults::default_day_count")]
    pub day_count: u32,
}

impl FeedDefaults {
    fn default_limit() -> u32 {
        30
    }
    fn default_day_count() -> u32 {
        15
    }
}

impl Default for FeedDefaults {
    fn default() -> Self {
        Self {
            limit: Self::default_limit(),
            day_count: Self::default_day_count(),
        }
    }
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hiding the `config` crate wiring (YAML file + env overrides).
pub struct PerchConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
}

impl Default for PerchConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl PerchConfigLoader {
    /// Start from `PERCH_` environment overrides alone.
    ///
    /// ```
    /// use perch_config::PerchConfigLoader;
    ///
    /// let config = PerchConfigLoader::new()
    ///     .with_yaml_str("base_url: \"https://api.example.test\"")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.base_url, "https://api.example.test");
    /// assert!(config.credentials.access_token.is_none());
    /// ```
    pub fn new() -> Self {
        let builder =
            Config::builder().add_source(Environment::with_prefix("PERCH").separator("__"));
        Self { builder }
    }

    /// Attach a config file; the `config` crate infers format by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self.builder.add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Same as [`Self::with_file`] but tolerates a missing file, so the
    /// console can run on environment variables alone.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self.builder.add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Merge an inline YAML snippet (tests and one-off CLI overrides).
    ///
    /// ```
    /// use perch_config::PerchConfigLoader;
    ///
    /// let cfg = PerchConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// base_url: "https://localhost:8443"
    /// credentials:
    ///   access_token: "example"
    /// feed:
    ///   limit: 50
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(cfg.credentials.access_token.as_deref(), Some("example"));
    /// assert_eq!(cfg.feed.limit, 50);
    /// assert_eq!(cfg.feed.day_count, 15);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources.
    ///
    /// `${VAR}` placeholders are expanded before the typed deserialize, so
    /// secrets can live in the environment while structure lives in YAML.
    ///
    /// ```
    /// use perch_config::PerchConfigLoader;
    ///
    /// unsafe { std::env::set_var("CONSOLE_TOKEN", "from-env"); }
    ///
    /// let config = PerchConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// credentials:
    ///   access_token: "${CONSOLE_TOKEN}"
    /// "#,
    ///     )
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.credentials.access_token.as_deref(), Some("from-env"));
    ///
    /// unsafe { std::env::remove_var("CONSOLE_TOKEN"); }
    /// ```
    pub fn load(self) -> Result<PerchConfig, ConfigError> {
        let cfg = self.builder.build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: PerchConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;

        Ok(typed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn expands_simple_string() {
        temp_env::with_var("FOO", Some("bar"), || {
            let mut v = json!("prefix-${FOO}-suffix");
            expand_env_in_value(&mut v);
            assert_eq!(v, json!("prefix-bar-suffix"));
        });
    }

    #[test]
    fn expands_nested_structures() {
        temp_env::with_vars([("HOST", Some("api.test")), ("PORT", Some("8443"))], || {
            let mut v = json!({
                "base_url": "https://${HOST}:${PORT}",
                "list": ["$HOST", 1, null]
            });
            expand_env_in_value(&mut v);
            assert_eq!(
                v,
                json!({
                    "base_url": "https://api.test:8443",
                    "list": ["api.test", 1, null]
                })
            );
        });
    }

    #[test]
    fn expansion_terminates_on_cycles() {
        temp_env::with_vars([("A", Some("${B}")), ("B", Some("${A}"))], || {
            let mut v = json!("x=${A}-y");
            expand_env_in_value(&mut v);
            let s = v.as_str().unwrap();
            assert!(s.starts_with("x=") && s.ends_with("-y"));
            assert!(s.contains("${"));
        });
    }

    #[test]
    fn unknown_vars_are_left_as_is() {
        let mut v = json!("hi-${DOES_NOT_EXIST}");
        expand_env_in_value(&mut v);
        assert_eq!(v, json!("hi-${DOES_NOT_EXIST}"));
    }

    #[test]
    fn defaults_fill_missing_sections() {
        let cfg = PerchConfigLoader::new()
            .with_yaml_str("base_url: \"https://localhost:8443\"")
            .load()
            .unwrap();
        assert_eq!(cfg.http.timeout_secs, 15);
        assert_eq!(cfg.http.retries, 2);
        assert_eq!(cfg.feed.limit, 30);
        assert_eq!(cfg.feed.day_count, 15);
    }
}
