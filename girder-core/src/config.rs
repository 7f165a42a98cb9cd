// Dispatcher configuration: defaults, TOML files and GIRDER_* environment variables

use crate::routing::RoutingOptions;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::env;
use std::path::Path;

/// Prefix for environment overrides, e.g. `GIRDER_DEFAULT_ACCEPT`.
pub const ENV_PREFIX: &str = "GIRDER";

/// Knobs for request resolution and negotiation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// Accept list used when a request carries no Accept header
    pub default_accept: String,
    /// Merge query parameters into the route variables
    pub merge_query_parameters: bool,
    /// Let HEAD requests resolve to GET endpoints
    pub head_matches_get: bool,
    /// Compare literal path segments ignoring ASCII case
    pub case_insensitive_paths: bool,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_accept: "*/*".to_string(),
            merge_query_parameters: true,
            head_matches_get: true,
            case_insensitive_paths: true,
        }
    }
}

impl DispatchConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)
            .map_err(|e| Error::Configuration(format!("invalid dispatch config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&source)
    }

    /// Defaults overridden by `GIRDER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().merge_vars(ENV_PREFIX, env::vars())
    }

    /// Apply `PREFIX_KEY=value` overrides on top of `self`.
    ///
    /// Unknown keys are ignored; malformed values are errors.
    pub fn merge_vars(
        mut self,
        prefix: &str,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<Self> {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter_map(|(key, value)| {
                let rest = key.strip_prefix(prefix)?.strip_prefix('_')?;
                Some((rest.to_ascii_lowercase(), value))
            })
            .collect();

        if let Some(value) = vars.get("default_accept") {
            self.default_accept = value.clone();
        }
        if let Some(value) = vars.get("merge_query_parameters") {
            self.merge_query_parameters = parse_bool("merge_query_parameters", value)?;
        }
        if let Some(value) = vars.get("head_matches_get") {
            self.head_matches_get = parse_bool("head_matches_get", value)?;
        }
        if let Some(value) = vars.get("case_insensitive_paths") {
            self.case_insensitive_paths = parse_bool("case_insensitive_paths", value)?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_accept.trim().is_empty() {
            return Err(Error::Configuration(
                "default_accept must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn routing_options(&self) -> RoutingOptions {
        RoutingOptions {
            case_insensitive: self.case_insensitive_paths,
            head_matches_get: self.head_matches_get,
        }
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Configuration(format!(
            "{} expects a boolean, got '{}'",
            key, other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = DispatchConfig::default();
        assert_eq!(config.default_accept, "*/*");
        assert!(config.merge_query_parameters);
        assert!(config.head_matches_get);
        assert!(config.case_insensitive_paths);
    }

    #[test]
    fn test_toml_partial() {
        let config = DispatchConfig::from_toml_str(
            r#"
            default_accept = "application/json"
            head_matches_get = false
            "#,
        )
        .unwrap();

        assert_eq!(config.default_accept, "application/json");
        assert!(!config.head_matches_get);
        assert!(config.merge_query_parameters);
    }

    #[test]
    fn test_toml_errors() {
        let err = DispatchConfig::from_toml_str("head_matches_get = \"maybe\"").unwrap_err();
        assert!(err.is_configuration_error());

        let err = DispatchConfig::from_toml_str("default_accept = \"  \"").unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_env_overrides() {
        let config = DispatchConfig::default()
            .merge_vars(
                "GIRDER",
                vars(&[
                    ("GIRDER_DEFAULT_ACCEPT", "text/html"),
                    ("GIRDER_CASE_INSENSITIVE_PATHS", "off"),
                    ("GIRDER_UNKNOWN", "ignored"),
                    ("OTHER_HEAD_MATCHES_GET", "false"),
                ]),
            )
            .unwrap();

        assert_eq!(config.default_accept, "text/html");
        assert!(!config.case_insensitive_paths);
        assert!(config.head_matches_get);
    }

    #[test]
    fn test_env_bad_bool() {
        let err = DispatchConfig::default()
            .merge_vars("GIRDER", vars(&[("GIRDER_HEAD_MATCHES_GET", "perhaps")]))
            .unwrap_err();
        assert!(err.to_string().contains("head_matches_get"));
    }

    #[test]
    fn test_missing_file() {
        let err = DispatchConfig::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_routing_options() {
        let config = DispatchConfig {
            case_insensitive_paths: false,
            ..Default::default()
        };
        let options = config.routing_options();
        assert!(!options.case_insensitive);
        assert!(options.head_matches_get);
    }
}
