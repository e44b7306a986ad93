//! # winops – Computer management
//!
//! Stateless helpers behind computer-management commands:
//!
//! - **Names** – syntax checks, local/remote resolution, display formatting
//! - **Shutdown / rename** – privileged `Win32_OperatingSystem` and
//!   `Win32_ComputerSystem` calls over WMI
//! - **Privileges** – scoped enable/restore of token privileges
//! - **Drives** – system drive and fixed drive checks
//! - **Passwords** – random throwaway passwords
//!
//! Collaborators (host resolver, privilege API, WMI invoker, drive provider)
//! are traits so callers and tests can substitute them.

pub mod drives;
pub mod invoker;
pub mod names;
pub mod password;
pub mod privilege;
pub mod shutdown;
pub mod status;
pub mod types;

#[cfg(windows)]
mod token_ffi;

pub use drives::{contains_system_drive, is_valid_drive, system_drive, DriveProvider, SystemDrives};
pub use invoker::{FixedResultInvoker, InvocationTarget, MethodCall, WmiMethodInvoker, WsmanMethodInvoker};
pub use names::{
    is_computer_name_valid, local_admin_user_name, machine_names, scope_string,
    validate_computer_name, HostResolver, LocalMachineNames, NameKind, SystemResolver, ValidatedName,
};
pub use password::random_password;
pub use privilege::{PrivilegeApi, PrivilegeGuard, PrivilegeState, TokenPrivileges};
pub use shutdown::{invoke_win32_shutdown, rename_computer};
pub use status::{computer_status, skip_system_restore_for_arm, write_non_terminating_error};
pub use types::*;
