//! Process-token privileges, enabled for the span of one operation.

use crate::types::MgmtResult;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

pub const SE_SHUTDOWN_NAME: &str = "SeShutdownPrivilege";
pub const SE_REMOTE_SHUTDOWN_NAME: &str = "SeRemoteShutdownPrivilege";

/// What `enable` changed, so `restore` can undo exactly that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivilegeState {
    /// Attributes before the call; `None` when the privilege was already
    /// enabled and nothing changed.
    pub previous_attributes: Option<u32>,
}

/// Enables and restores a named privilege on the current process token.
#[cfg_attr(test, mockall::automock)]
pub trait PrivilegeApi: Send + Sync {
    fn enable(&self, privilege: &str) -> MgmtResult<PrivilegeState>;
    fn restore(&self, privilege: &str, previous: &PrivilegeState) -> MgmtResult<()>;
}

/// Privileges of this process's own token.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokenPrivileges;

#[cfg(windows)]
impl PrivilegeApi for TokenPrivileges {
    fn enable(&self, privilege: &str) -> MgmtResult<PrivilegeState> {
        crate::token_ffi::enable_privilege(privilege)
    }

    fn restore(&self, privilege: &str, previous: &PrivilegeState) -> MgmtResult<()> {
        crate::token_ffi::restore_privilege(privilege, previous)
    }
}

#[cfg(not(windows))]
impl PrivilegeApi for TokenPrivileges {
    fn enable(&self, _privilege: &str) -> MgmtResult<PrivilegeState> {
        Err(crate::types::MgmtError::platform())
    }

    fn restore(&self, _privilege: &str, _previous: &PrivilegeState) -> MgmtResult<()> {
        Err(crate::types::MgmtError::platform())
    }
}

/// Holds a privilege enabled until dropped, then puts back the previous
/// state whatever happened in between.
pub struct PrivilegeGuard<'a> {
    api: &'a dyn PrivilegeApi,
    privilege: &'a str,
    previous: PrivilegeState,
}

impl<'a> PrivilegeGuard<'a> {
    pub fn acquire(api: &'a dyn PrivilegeApi, privilege: &'a str) -> MgmtResult<Self> {
        let previous = api.enable(privilege)?;
        debug!("Enabled {} (previous: {:?})", privilege, previous);
        Ok(Self { api, privilege, previous })
    }

    pub fn privilege(&self) -> &str {
        self.privilege
    }
}

impl Drop for PrivilegeGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.api.restore(self.privilege, &self.previous) {
            warn!("Failed to restore {}: {}", self.privilege, e);
        }
    }
}
