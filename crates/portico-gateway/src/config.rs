//! Configuration loading.
//!
//! Gateway configuration can be written as TOML, YAML or JSON; the format is
//! picked from the file extension.  `${VAR}` references are replaced with the
//! value of the environment variable before parsing (unset variables are
//! left verbatim), then the result is deserialized into a
//! [`GatewayConfig`] and validated.

use config::{Config as Cfg, File, FileFormat};
use portico_kernel::{GatewayConfig, GatewayError, codes};
use regex::{Captures, Regex};
use std::path::Path;

const MODULE: &str = "config";

/// Configuration loading failure.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parsing error: {0}")]
    Parse(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid configuration: {0}")]
    Invalid(#[from] GatewayError),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl From<ConfigError> for GatewayError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid(inner) => inner,
            other => GatewayError::configuration(codes::INVALID_CONFIG, MODULE, other.to_string())
                .with_source(other),
        }
    }
}

/// Detect the configuration format from the file extension.
pub fn detect_format(path: impl AsRef<Path>) -> ConfigResult<FileFormat> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

    match ext.as_str() {
        "toml" => Ok(FileFormat::Toml),
        "yaml" | "yml" => Ok(FileFormat::Yaml),
        "json" => Ok(FileFormat::Json),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

/// Replace `${VAR}` with the value of environment variable `VAR`.
pub fn substitute_env_vars(content: &str) -> ConfigResult<String> {
    let braced = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| ConfigError::Parse(e.to_string()))?;
    Ok(braced
        .replace_all(content, |caps: &Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .into_owned())
}

/// Parse and validate configuration text in an explicit format.
pub fn config_from_str(content: &str, format: FileFormat) -> ConfigResult<GatewayConfig> {
    let substituted = substitute_env_vars(content)?;
    let config: GatewayConfig = Cfg::builder()
        .add_source(File::from_str(&substituted, format))
        .build()
        .map_err(|e| ConfigError::Parse(e.to_string()))?
        .try_deserialize()
        .map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate()?;
    Ok(config)
}

/// Load, substitute, parse and validate a configuration file.
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<GatewayConfig> {
    let path = path.as_ref();
    let format = detect_format(path)?;
    let content = std::fs::read_to_string(path)?;
    config_from_str(&content, format)
}

#[cfg(test)]
mod tests {
    use super::*;
    use portico_kernel::{HttpMethod, Route, TransformPolicy};
    use std::io::Write;

    const TOML: &str = r#"
id = "edge"
wrap_response = true
response_transform_policy = "strict"
route_refresh_interval_ms = 30000

[[routes]]
path = "/api/user"
method = "GET"
target = "${PORTICO_TEST_USERS}/users"

[routes.properties]
timeout = 1500
retryCount = 1

[[routes]]
path = "/api/order"
method = "POST"
target = "bean://orders:create"
enabled = false
"#;

    #[test]
    fn detects_supported_extensions() {
        assert_eq!(detect_format("gw.toml").unwrap(), FileFormat::Toml);
        assert_eq!(detect_format("gw.YML").unwrap(), FileFormat::Yaml);
        assert_eq!(detect_format("gw.json").unwrap(), FileFormat::Json);
        assert!(matches!(
            detect_format("gw.ini"),
            Err(ConfigError::UnsupportedFormat(_))
        ));
        assert!(detect_format("gateway").is_err());
    }

    #[test]
    fn unset_variables_are_left_verbatim() {
        let out = substitute_env_vars("a=${PORTICO_TEST_SURELY_UNSET_VAR}").unwrap();
        assert_eq!(out, "a=${PORTICO_TEST_SURELY_UNSET_VAR}");
    }

    #[test]
    fn loads_toml_file_with_env_substitution() {
        // SAFETY: test-only variable with a unique name.
        unsafe { std::env::set_var("PORTICO_TEST_USERS", "http://users.internal") };

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(TOML.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.id, "edge");
        assert!(config.wrap_response);
        assert_eq!(config.response_transform_policy, TransformPolicy::Strict);
        assert_eq!(config.request_transform_policy, TransformPolicy::BestEffort);
        assert_eq!(config.route_refresh_interval_ms, Some(30_000));
        assert_eq!(config.routes.len(), 2);

        let route: Route = config.routes[0].clone().into();
        assert_eq!(route.target_url.as_deref(), Some("http://users.internal/users"));
        assert_eq!(route.method, HttpMethod::Get);
        assert_eq!(route.timeout().as_millis(), 1500);
        assert_eq!(route.retry_count(), 1);
        assert!(!config.routes[1].enabled);
    }

    #[test]
    fn loads_json_text() {
        let json = r#"{
            "id": "json-gw",
            "routes": [
                { "path": "/ping", "method": "GET", "target": "bean://health:ping" }
            ]
        }"#;
        let config = config_from_str(json, FileFormat::Json).unwrap();
        assert_eq!(config.id, "json-gw");
        assert_eq!(config.default_timeout_ms, 30_000);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let yaml = "id: bad\nroutes:\n  - path: no-slash\n    method: GET\n    target: http://x\n";
        let err = config_from_str(yaml, FileFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let gateway: GatewayError = err.into();
        assert_eq!(gateway.code, codes::INVALID_CONFIG);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
