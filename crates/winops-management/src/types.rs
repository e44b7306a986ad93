use serde::{Deserialize, Serialize};
use std::fmt;
use winops_core::resources;
use winops_wmi::{WmiAuthMethod, WmiCredential};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Errors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MgmtError {
    pub kind: MgmtErrorKind,
    pub message: String,
}

impl fmt::Display for MgmtError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}] {}", self.kind, self.message)
    }
}

impl std::error::Error for MgmtError {}

impl From<MgmtError> for String {
    fn from(e: MgmtError) -> Self {
        e.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MgmtErrorKind {
    /// A native call failed with a Win32 error code.
    Win32Error(u32),
    /// The token does not hold the requested privilege.
    PrivilegeNotHeld,
    /// The host name could not be resolved.
    Resolution,
    InvalidParameter,
    /// The operation is not supported on this platform.
    PlatformNotSupported,
}

impl MgmtError {
    pub fn new(kind: MgmtErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn platform() -> Self {
        Self::new(
            MgmtErrorKind::PlatformNotSupported,
            "This operation is only supported on Windows",
        )
    }
}

pub type MgmtResult<T> = Result<T, MgmtError>;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Results
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Outcome of a per-computer change such as a rename.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputerChangeInfo {
    pub computer_name: String,
    pub has_succeeded: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Shutdown
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The two `Win32Shutdown` arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutdownFlags {
    pub flags: i32,
    pub reserved: i32,
}

impl ShutdownFlags {
    pub const LOGOFF: i32 = 0;
    pub const SHUTDOWN: i32 = 1;
    pub const REBOOT: i32 = 2;
    pub const FORCE: i32 = 4;
    pub const POWER_OFF: i32 = 8;

    pub fn new(flags: i32) -> Self {
        Self { flags, reserved: 0 }
    }

    pub fn with_reserved(mut self, reserved: i32) -> Self {
        self.reserved = reserved;
        self
    }

    pub fn is_forced(&self) -> bool {
        self.flags & Self::FORCE != 0
    }
}

/// What a shutdown call is doing; picks the error id and message reported
/// on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ShutdownOperation {
    Stop,
    Restart,
}

impl ShutdownOperation {
    pub fn error_id(&self) -> &'static str {
        match self {
            Self::Stop => "StopComputerException",
            Self::Restart => "RestartcomputerFailed",
        }
    }

    pub fn failure_message(&self, computer_name: &str, message: &str) -> String {
        match self {
            Self::Stop => resources::stop_command_failed(computer_name, message),
            Self::Restart => resources::restart_command_failed(computer_name, message),
        }
    }

    /// Flags for a plain stop or restart, optionally forced.
    pub fn flags(&self, force: bool) -> ShutdownFlags {
        let base = match self {
            Self::Stop => ShutdownFlags::SHUTDOWN | ShutdownFlags::POWER_OFF,
            Self::Restart => ShutdownFlags::REBOOT,
        };
        ShutdownFlags::new(if force { base | ShutdownFlags::FORCE } else { base })
    }
}

/// Target and options for one `Win32Shutdown` call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShutdownRequest {
    pub computer_name: String,
    pub is_localhost: bool,
    pub flags: ShutdownFlags,
    pub operation: ShutdownOperation,
    #[serde(default)]
    pub credential: Option<WmiCredential>,
    #[serde(default)]
    pub authentication: Option<WmiAuthMethod>,
}

impl ShutdownRequest {
    pub fn new(
        computer_name: impl Into<String>,
        is_localhost: bool,
        operation: ShutdownOperation,
        flags: ShutdownFlags,
    ) -> Self {
        Self {
            computer_name: computer_name.into(),
            is_localhost,
            flags,
            operation,
            credential: None,
            authentication: None,
        }
    }

    pub fn with_credential(mut self, credential: WmiCredential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_authentication(mut self, auth: WmiAuthMethod) -> Self {
        self.authentication = Some(auth);
        self
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Rename
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameRequest {
    pub computer_name: String,
    pub is_localhost: bool,
    pub new_name: String,
    /// Account allowed to rename the computer object in the domain.
    #[serde(default)]
    pub domain_credential: Option<WmiCredential>,
    /// Connection credential for remote targets.
    #[serde(default)]
    pub credential: Option<WmiCredential>,
    #[serde(default)]
    pub authentication: Option<WmiAuthMethod>,
}

impl RenameRequest {
    pub fn new(computer_name: impl Into<String>, is_localhost: bool, new_name: impl Into<String>) -> Self {
        Self {
            computer_name: computer_name.into(),
            is_localhost,
            new_name: new_name.into(),
            domain_credential: None,
            credential: None,
            authentication: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_flags() {
        assert_eq!(ShutdownOperation::Stop.flags(false), ShutdownFlags::new(9));
        assert_eq!(ShutdownOperation::Restart.flags(true), ShutdownFlags::new(6));
        assert!(ShutdownOperation::Restart.flags(true).is_forced());
        assert_eq!(ShutdownFlags::new(2).with_reserved(7).reserved, 7);
    }

    #[test]
    fn test_operation_error_ids() {
        assert_eq!(ShutdownOperation::Stop.error_id(), "StopComputerException");
        assert_eq!(ShutdownOperation::Restart.error_id(), "RestartcomputerFailed");
        assert!(ShutdownOperation::Restart
            .failure_message("pc1", "Access is denied.")
            .contains("restart the computer 'pc1'"));
    }

    #[test]
    fn test_error_display() {
        let e = MgmtError::new(MgmtErrorKind::Win32Error(5), "denied");
        assert_eq!(e.to_string(), "[Win32Error(5)] denied");
        assert_eq!(MgmtError::platform().kind, MgmtErrorKind::PlatformNotSupported);
    }

    #[test]
    fn test_change_info_serde() {
        let info = ComputerChangeInfo { computer_name: "pc1".into(), has_succeeded: true };
        let json = serde_json::to_string(&info).unwrap();
        assert_eq!(json, r#"{"computerName":"pc1","hasSucceeded":true}"#);
    }
}
