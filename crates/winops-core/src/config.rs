//! Operation defaults for WMI-backed management calls.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

/// WS-Management resource URI prefix for the `root/cimv2` namespace. Accepted
/// by every WinRM server stack version.
pub const CIM_URI_PREFIX: &str = "http://schemas.microsoft.com/wbem/wsman/1/wmi/root/cimv2";
/// Namespace holding `Win32_OperatingSystem` and `Win32_ComputerSystem`.
pub const CIM_NAMESPACE: &str = "root/cimv2";

/// Configuration for management operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagementConfig {
    /// WMI namespace used for method invocation.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Per-operation timeout in milliseconds.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
    /// Use HTTPS for the WinRM endpoint.
    #[serde(default)]
    pub use_ssl: bool,
    /// Custom WinRM port (0 = 5985 / 5986).
    #[serde(default)]
    pub port: u16,
    /// Default authentication mechanism name (`negotiate`, `basic`, ...).
    #[serde(default = "default_authentication")]
    pub authentication: String,
    /// Skip CA certificate validation.
    #[serde(default)]
    pub skip_ca_check: bool,
    /// Skip CN / hostname verification.
    #[serde(default)]
    pub skip_cn_check: bool,
    /// Allow Basic credentials over plain HTTP.
    #[serde(default)]
    pub allow_unencrypted: bool,
}

fn default_namespace() -> String {
    CIM_NAMESPACE.to_string()
}
fn default_operation_timeout_ms() -> u64 {
    10_000
}
fn default_authentication() -> String {
    "negotiate".to_string()
}

impl Default for ManagementConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            operation_timeout_ms: default_operation_timeout_ms(),
            use_ssl: false,
            port: 0,
            authentication: default_authentication(),
            skip_ca_check: false,
            skip_cn_check: false,
            allow_unencrypted: false,
        }
    }
}

impl ManagementConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }

    /// Parse a JSON document; missing keys take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let s = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_json_str(&s)?;
        log::debug!("Loaded management config from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.operation_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "operationTimeoutMs must be greater than zero".to_string(),
            ));
        }
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::Invalid("namespace must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Failure to load a [`ManagementConfig`].
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(msg) => write!(f, "Config I/O error: {}", msg),
            Self::Parse(msg) => write!(f, "Config parse error: {}", msg),
            Self::Invalid(msg) => write!(f, "Invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
