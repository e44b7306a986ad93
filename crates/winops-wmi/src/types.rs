//! Connection configuration, method parameters and errors for the WMI
//! transport.

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WmiError {
    pub kind: WmiErrorKind,
    pub message: String,
}

impl fmt::Display for WmiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for WmiError {}

impl From<WmiError> for String {
    fn from(e: WmiError) -> Self {
        e.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WmiErrorKind {
    /// The HTTP client could not be built or the request failed.
    Transport,
    /// The server answered with a SOAP / CIM fault.
    CimFault,
    /// The server answered with a non-success HTTP status.
    HttpStatus(u16),
    /// The response could not be parsed.
    Parse,
    /// The caller cancelled the operation.
    Cancelled,
    /// The operation did not finish within its timeout.
    Timeout,
    /// Invalid connection or call parameters.
    InvalidParameter,
}

impl WmiError {
    pub fn new(kind: WmiErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn cancelled() -> Self {
        Self::new(WmiErrorKind::Cancelled, "The operation was cancelled")
    }

    /// True for failures reported by the remote CIM provider rather than
    /// the local transport.
    pub fn is_cim_fault(&self) -> bool {
        matches!(self.kind, WmiErrorKind::CimFault | WmiErrorKind::HttpStatus(_))
    }
}

pub type WmiResult<T> = Result<T, WmiError>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Connection
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Authentication mechanism requested from the WinRM listener.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum WmiAuthMethod {
    Basic,
    Ntlm,
    #[default]
    Negotiate,
    Kerberos,
    CredSsp,
    Default,
}

impl WmiAuthMethod {
    /// Parse a mechanism name case-insensitively; unknown names map to
    /// `Default`.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "basic" => Self::Basic,
            "ntlm" => Self::Ntlm,
            "negotiate" => Self::Negotiate,
            "kerberos" => Self::Kerberos,
            "credssp" => Self::CredSsp,
            _ => Self::Default,
        }
    }
}

/// Credentials for the remote host.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WmiCredential {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub domain: Option<String>,
}

impl WmiCredential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            domain: None,
        }
    }

    /// `DOMAIN\user` when a domain is set, otherwise the bare user name.
    pub fn qualified_user(&self) -> String {
        match &self.domain {
            Some(d) => format!("{}\\{}", d, self.username),
            None => self.username.clone(),
        }
    }
}

impl fmt::Debug for WmiCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WmiCredential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("domain", &self.domain)
            .finish()
    }
}

/// Everything needed to open one WS-Management session to a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WmiConnectionConfig {
    /// Target hostname or IP.
    pub computer_name: String,
    /// Credentials (None = current user).
    #[serde(default)]
    pub credential: Option<WmiCredential>,
    #[serde(default)]
    pub auth_method: WmiAuthMethod,
    /// WMI namespace, `/` or `\` separated.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub use_ssl: bool,
    /// Custom port (0 = 5985 HTTP / 5986 HTTPS).
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub skip_ca_check: bool,
    #[serde(default)]
    pub skip_cn_check: bool,
    /// Permit Basic credentials over plain HTTP (WinRM `AllowUnencrypted`).
    #[serde(default)]
    pub allow_unencrypted: bool,
    /// Operation timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_namespace() -> String {
    "root/cimv2".to_string()
}
fn default_timeout_ms() -> u64 {
    10_000
}

impl WmiConnectionConfig {
    pub fn new(computer_name: impl Into<String>) -> Self {
        Self {
            computer_name: computer_name.into(),
            credential: None,
            auth_method: WmiAuthMethod::default(),
            namespace: default_namespace(),
            use_ssl: false,
            port: 0,
            skip_ca_check: false,
            skip_cn_check: false,
            allow_unencrypted: false,
            timeout_ms: default_timeout_ms(),
        }
    }

    pub fn effective_port(&self) -> u16 {
        match (self.port, self.use_ssl) {
            (0, true) => 5986,
            (0, false) => 5985,
            (p, _) => p,
        }
    }

    /// WinRM endpoint URI. IPv6 literals are bracketed.
    pub fn endpoint_uri(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        let host = if self.computer_name.contains(':') && !self.computer_name.starts_with('[') {
            format!("[{}]", self.computer_name)
        } else {
            self.computer_name.clone()
        };
        format!("{}://{}:{}/wsman", scheme, host, self.effective_port())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Method parameters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A typed CIM method argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CimValue {
    SInt32(i32),
    UInt32(u32),
    Boolean(bool),
    String(String),
    /// Explicit `xsi:nil`.
    Null,
}

impl CimValue {
    /// Wire text for the SOAP body. `None` means the element is nil.
    pub fn to_wire(&self) -> Option<String> {
        match self {
            Self::SInt32(v) => Some(v.to_string()),
            Self::UInt32(v) => Some(v.to_string()),
            Self::Boolean(v) => Some(v.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::Null => None,
        }
    }
}

/// One named method argument. Order is preserved on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodParameter {
    pub name: String,
    pub value: CimValue,
}

impl MethodParameter {
    pub fn new(name: impl Into<String>, value: CimValue) -> Self {
        Self { name: name.into(), value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_defaults() {
        let config = WmiConnectionConfig::new("server01");
        assert_eq!(config.endpoint_uri(), "http://server01:5985/wsman");
        assert_eq!(config.effective_port(), 5985);
    }

    #[test]
    fn test_endpoint_ssl_and_ipv6() {
        let mut config = WmiConnectionConfig::new("fe80::1");
        config.use_ssl = true;
        assert_eq!(config.endpoint_uri(), "https://[fe80::1]:5986/wsman");
        config.port = 443;
        assert_eq!(config.endpoint_uri(), "https://[fe80::1]:443/wsman");
    }

    #[test]
    fn test_auth_from_name() {
        assert_eq!(WmiAuthMethod::from_name("Kerberos"), WmiAuthMethod::Kerberos);
        assert_eq!(WmiAuthMethod::from_name("CREDSSP"), WmiAuthMethod::CredSsp);
        assert_eq!(WmiAuthMethod::from_name("whatever"), WmiAuthMethod::Default);
    }

    #[test]
    fn test_credential_debug_redacts_password() {
        let mut cred = WmiCredential::new("admin", "s3cret");
        cred.domain = Some("CORP".into());
        let dbg = format!("{:?}", cred);
        assert!(!dbg.contains("s3cret"));
        assert_eq!(cred.qualified_user(), "CORP\\admin");
    }

    #[test]
    fn test_cim_value_wire() {
        assert_eq!(CimValue::SInt32(-6).to_wire().as_deref(), Some("-6"));
        assert_eq!(CimValue::Boolean(true).to_wire().as_deref(), Some("true"));
        assert_eq!(CimValue::Null.to_wire(), None);
    }

    #[test]
    fn test_error_classification() {
        assert!(WmiError::new(WmiErrorKind::CimFault, "x").is_cim_fault());
        assert!(WmiError::new(WmiErrorKind::HttpStatus(500), "x").is_cim_fault());
        assert!(!WmiError::cancelled().is_cim_fault());
    }
}
