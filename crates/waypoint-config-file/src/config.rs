//! Gateway configuration file model and loading

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use waypoint_core::{FilterSpec, RouteDefinition};
use waypoint_observability::LoggingConfig;
use waypoint_routing::{CircuitBreakerConfig, DiscoveryLocatorProperties, GatewayProperties};

use crate::error::ConfigFileError;

/// Overrides `logging.level`
pub const ENV_LOG_LEVEL: &str = "WAYPOINT_LOG_LEVEL";
/// Overrides `fail_on_route_definition_error`
pub const ENV_FAIL_FAST: &str = "WAYPOINT_FAIL_FAST";

/// Everything a gateway reads from its configuration file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub routes: Vec<RouteDefinition>,
    pub default_filters: Vec<FilterSpec>,
    pub fail_on_route_definition_error: bool,
    pub logging: LoggingConfig,
    /// Defaults for every breaker created by the circuit breaker filter
    pub circuit_breaker: CircuitBreakerConfig,
    pub discovery: DiscoveryLocatorProperties,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        let properties = GatewayProperties::default();
        Self {
            routes: properties.routes,
            default_filters: properties.default_filters,
            fail_on_route_definition_error: properties.fail_on_route_definition_error,
            logging: LoggingConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            discovery: DiscoveryLocatorProperties::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// `.toml` files are TOML, anything else is YAML
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|s| s.to_str()) {
            Some("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }

    fn name(self) -> &'static str {
        match self {
            ConfigFormat::Yaml => "YAML",
            ConfigFormat::Toml => "TOML",
        }
    }
}

/// Expand a leading `~` to the user's home directory
pub fn expand_home(path: impl Into<PathBuf>) -> Result<PathBuf, ConfigFileError> {
    let path = path.into();
    match path.strip_prefix("~") {
        Ok(rest) => Ok(dirs::home_dir()
            .ok_or(ConfigFileError::NoHomeDir)?
            .join(rest)),
        Err(_) => Ok(path),
    }
}

impl GatewayConfig {
    /// Read the file, parse it by extension and apply environment overrides
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigFileError> {
        let path = expand_home(path)?;
        let mut config = Self::load_file(&path)?;
        config.apply_env_overrides()?;
        info!(
            path = %path.display(),
            routes = config.routes.len(),
            "Loaded gateway configuration"
        );
        Ok(config)
    }

    /// Read and parse the file without environment overrides
    pub fn load_file(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Err(ConfigFileError::NotFound(path.to_path_buf()));
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigFileError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&contents, ConfigFormat::from_path(path)).map_err(|message| {
            ConfigFileError::Parse {
                format: ConfigFormat::from_path(path).name(),
                path: path.to_path_buf(),
                message,
            }
        })
    }

    pub fn parse(contents: &str, format: ConfigFormat) -> Result<Self, String> {
        match format {
            ConfigFormat::Yaml => serde_yaml::from_str(contents).map_err(|e| e.to_string()),
            ConfigFormat::Toml => toml::from_str(contents).map_err(|e| e.to_string()),
        }
    }

    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigFileError> {
        self.apply_overrides(|var| std::env::var(var).ok())
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigFileError> {
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            debug!(level = %level, "Log level overridden from environment");
            self.logging.level = level;
        }

        if let Some(value) = lookup(ENV_FAIL_FAST) {
            self.fail_on_route_definition_error = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => {
                    return Err(ConfigFileError::InvalidEnv {
                        var: ENV_FAIL_FAST,
                        value,
                    });
                }
            };
        }
        Ok(())
    }

    /// Route-level settings for the gateway builder
    pub fn properties(&self) -> GatewayProperties {
        GatewayProperties {
            routes: self.routes.clone(),
            default_filters: self.default_filters.clone(),
            fail_on_route_definition_error: self.fail_on_route_definition_error,
        }
    }

    pub fn into_properties(self) -> GatewayProperties {
        GatewayProperties {
            routes: self.routes,
            default_filters: self.default_filters,
            fail_on_route_definition_error: self.fail_on_route_definition_error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::collections::HashMap;
    use tempfile::TempDir;

    const YAML: &str = r#"
fail_on_route_definition_error: false
default_filters:
  - AddResponseHeader=X-Gateway, waypoint
logging:
  level: debug
  format: json
circuit_breaker:
  failure_threshold: 3
routes:
  - id: orders
    uri: http://orders:8080
    order: 1
    predicates:
      - Path=/orders/**
    filters:
      - name: CircuitBreaker
        args:
          fallbackUri: forward:/fallback
          statusCodes: [BAD_GATEWAY, 503]
"#;

    const TOML: &str = r#"
default_filters = ["AddResponseHeader=X-Gateway, waypoint"]

[discovery]
enabled = true
lower_case_service_id = true

[[routes]]
id = "orders"
uri = "http://orders:8080"
predicates = ["Path=/orders/**", "Method=GET,POST"]
"#;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_yaml() {
        let dir = TempDir::new().unwrap();
        let config = GatewayConfig::load_file(&write(&dir, "gateway.yaml", YAML)).unwrap();

        assert!(!config.fail_on_route_definition_error);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.circuit_breaker.failure_threshold, 3);
        assert_eq!(config.routes.len(), 1);

        let breaker = &config.routes[0].filters[0];
        assert_eq!(breaker.name, "CircuitBreaker");
        assert_eq!(breaker.args["statusCodes"], "BAD_GATEWAY,503");
        assert_eq!(config.default_filters[0].name, "AddResponseHeader");
    }

    #[test]
    fn test_load_toml() {
        let dir = TempDir::new().unwrap();
        let config = GatewayConfig::load_file(&write(&dir, "gateway.toml", TOML)).unwrap();

        assert!(config.fail_on_route_definition_error);
        assert!(config.discovery.enabled);
        assert!(config.discovery.lower_case_service_id);
        assert_eq!(config.routes[0].predicates.len(), 2);
        assert_eq!(config.routes[0].predicates[1].name, "Method");
    }

    #[test]
    fn test_missing_file() {
        let err = GatewayConfig::load_file(Path::new("/nonexistent/gateway.yaml")).unwrap_err();
        assert!(matches!(err, ConfigFileError::NotFound(_)));
    }

    #[test]
    fn test_parse_error_names_format() {
        let dir = TempDir::new().unwrap();
        let err =
            GatewayConfig::load_file(&write(&dir, "gateway.toml", "routes = [[[")).unwrap_err();
        assert!(matches!(err, ConfigFileError::Parse { format: "TOML", .. }));
    }

    #[test]
    fn test_overrides_from_lookup() {
        let vars: HashMap<&str, &str> =
            HashMap::from([(ENV_LOG_LEVEL, "trace"), (ENV_FAIL_FAST, "off")]);
        let mut config = GatewayConfig::default();
        config
            .apply_overrides(|var| vars.get(var).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.logging.level, "trace");
        assert!(!config.fail_on_route_definition_error);

        let err = config
            .apply_overrides(|var| (var == ENV_FAIL_FAST).then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigFileError::InvalidEnv { var: ENV_FAIL_FAST, .. }));
    }

    #[test]
    #[serial]
    fn test_load_applies_environment() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "gateway.yaml", "routes: []\n");

        unsafe {
            std::env::set_var(ENV_FAIL_FAST, "false");
            std::env::set_var(ENV_LOG_LEVEL, "warn");
        }
        let config = GatewayConfig::load(&path);
        unsafe {
            std::env::remove_var(ENV_FAIL_FAST);
            std::env::remove_var(ENV_LOG_LEVEL);
        }

        let config = config.unwrap();
        assert!(!config.fail_on_route_definition_error);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_into_properties() {
        let config = GatewayConfig::parse(YAML, ConfigFormat::Yaml).unwrap();
        let properties = config.clone().into_properties();
        assert_eq!(properties, config.properties());
        assert_eq!(properties.routes[0].id, "orders");
        assert!(!properties.fail_on_route_definition_error);
    }

    #[test]
    fn test_expand_home() {
        let plain = expand_home("/etc/waypoint.yaml").unwrap();
        assert_eq!(plain, PathBuf::from("/etc/waypoint.yaml"));

        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/gw.yaml").unwrap(), home.join("gw.yaml"));
        }
    }
}
