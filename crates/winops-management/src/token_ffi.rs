//! Safe wrappers around the Win32 token-privilege and drive APIs.
//!
//! Only compiled on Windows. Every handle opened here is closed before the
//! wrapping function returns.

use crate::privilege::PrivilegeState;
use crate::types::{MgmtError, MgmtErrorKind, MgmtResult};
use log::debug;

use windows::core::PCWSTR;
use windows::Win32::Foundation::{CloseHandle, GetLastError, ERROR_NOT_ALL_ASSIGNED, HANDLE, LUID};
use windows::Win32::Security::{
    AdjustTokenPrivileges, LookupPrivilegeValueW, LUID_AND_ATTRIBUTES, SE_PRIVILEGE_ENABLED,
    TOKEN_ADJUST_PRIVILEGES, TOKEN_PRIVILEGES, TOKEN_PRIVILEGES_ATTRIBUTES, TOKEN_QUERY,
};
use windows::Win32::Storage::FileSystem::{GetDriveTypeW, GetLogicalDriveStringsW};
use windows::Win32::System::Threading::{GetCurrentProcess, OpenProcessToken};

const DRIVE_FIXED: u32 = 3;

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

fn win32_error(context: &str, e: windows::core::Error) -> MgmtError {
    // HRESULT_FROM_WIN32 keeps the Win32 code in the low word.
    let code = (e.code().0 as u32) & 0xFFFF;
    MgmtError::new(MgmtErrorKind::Win32Error(code), format!("{}: {}", context, e.message()))
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Process token
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

struct ProcessToken(HANDLE);

impl ProcessToken {
    fn open() -> MgmtResult<Self> {
        let mut handle = HANDLE::default();
        // SAFETY: GetCurrentProcess returns a pseudo-handle that needs no
        // closing; `handle` is a valid out-pointer for the call.
        unsafe {
            OpenProcessToken(GetCurrentProcess(), TOKEN_ADJUST_PRIVILEGES | TOKEN_QUERY, &mut handle)
        }
        .map_err(|e| win32_error("OpenProcessToken", e))?;
        Ok(Self(handle))
    }

    /// Set the attributes of one privilege, returning the previous ones.
    fn adjust(&self, luid: LUID, attributes: TOKEN_PRIVILEGES_ATTRIBUTES) -> MgmtResult<Option<u32>> {
        let new_state = TOKEN_PRIVILEGES {
            PrivilegeCount: 1,
            Privileges: [LUID_AND_ATTRIBUTES { Luid: luid, Attributes: attributes }],
        };
        let mut previous = TOKEN_PRIVILEGES::default();
        let mut returned = 0u32;

        // SAFETY: both TOKEN_PRIVILEGES buffers hold exactly one entry and
        // the buffer length passed matches the size of `previous`.
        unsafe {
            AdjustTokenPrivileges(
                self.0,
                false,
                Some(&new_state),
                std::mem::size_of::<TOKEN_PRIVILEGES>() as u32,
                Some(&mut previous),
                Some(&mut returned),
            )
        }
        .map_err(|e| win32_error("AdjustTokenPrivileges", e))?;

        // AdjustTokenPrivileges succeeds even when the privilege is not
        // held; the real answer is in the last error.
        // SAFETY: no preconditions.
        if unsafe { GetLastError() } == ERROR_NOT_ALL_ASSIGNED {
            return Err(MgmtError::new(
                MgmtErrorKind::PrivilegeNotHeld,
                "The token does not hold the requested privilege",
            ));
        }

        Ok(if previous.PrivilegeCount == 0 {
            None
        } else {
            Some(previous.Privileges[0].Attributes.0)
        })
    }
}

impl Drop for ProcessToken {
    fn drop(&mut self) {
        // SAFETY: the handle came from OpenProcessToken and is closed once.
        let _ = unsafe { CloseHandle(self.0) };
    }
}

fn lookup_luid(privilege: &str) -> MgmtResult<LUID> {
    let name = wide(privilege);
    let mut luid = LUID::default();
    // SAFETY: `name` is NUL-terminated and outlives the call.
    unsafe { LookupPrivilegeValueW(PCWSTR::null(), PCWSTR(name.as_ptr()), &mut luid) }
        .map_err(|e| win32_error("LookupPrivilegeValueW", e))?;
    Ok(luid)
}

pub fn enable_privilege(privilege: &str) -> MgmtResult<PrivilegeState> {
    let luid = lookup_luid(privilege)?;
    let token = ProcessToken::open()?;
    let previous_attributes = token.adjust(luid, SE_PRIVILEGE_ENABLED)?;
    debug!("{} enabled, previous attributes {:?}", privilege, previous_attributes);
    Ok(PrivilegeState { previous_attributes })
}

pub fn restore_privilege(privilege: &str, previous: &PrivilegeState) -> MgmtResult<()> {
    let Some(attributes) = previous.previous_attributes else {
        return Ok(());
    };
    let luid = lookup_luid(privilege)?;
    let token = ProcessToken::open()?;
    token.adjust(luid, TOKEN_PRIVILEGES_ATTRIBUTES(attributes))?;
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Drives
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Roots of every fixed drive, e.g. `["C:\\", "D:\\"]`.
pub fn fixed_drive_roots() -> Vec<String> {
    // SAFETY: a `None` buffer asks only for the required length.
    let needed = unsafe { GetLogicalDriveStringsW(None) } as usize;
    if needed == 0 {
        return Vec::new();
    }
    let mut buf = vec![0u16; needed + 1];
    // SAFETY: `buf` is writable for its full length.
    let written = unsafe { GetLogicalDriveStringsW(Some(&mut buf)) } as usize;
    buf.truncate(written.min(buf.len()));

    buf.split(|c| *c == 0)
        .filter(|root| !root.is_empty())
        .filter_map(|root| {
            let mut z = root.to_vec();
            z.push(0);
            // SAFETY: `z` is NUL-terminated and outlives the call.
            let kind = unsafe { GetDriveTypeW(PCWSTR(z.as_ptr())) };
            (kind == DRIVE_FIXED).then(|| String::from_utf16_lossy(root))
        })
        .collect()
}
