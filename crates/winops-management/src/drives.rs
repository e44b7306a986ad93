//! Logical drive checks used by restore-point and volume operations.

/// Source of the machine's fixed drive roots (`C:\`, ...).
pub trait DriveProvider: Send + Sync {
    fn fixed_drives(&self) -> Vec<String>;
}

/// Fixed drives reported by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDrives;

#[cfg(windows)]
impl DriveProvider for SystemDrives {
    fn fixed_drives(&self) -> Vec<String> {
        crate::token_ffi::fixed_drive_roots()
    }
}

#[cfg(not(windows))]
impl DriveProvider for SystemDrives {
    fn fixed_drives(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Whether `drives` names `sysdrive`. Entries without a trailing `\` are
/// compared as if they had one.
pub fn contains_system_drive<S: AsRef<str>>(drives: &[S], sysdrive: &str) -> bool {
    drives.iter().any(|d| {
        let d = d.as_ref();
        if d.ends_with('\\') {
            d.eq_ignore_ascii_case(sysdrive)
        } else {
            format!("{}\\", d).eq_ignore_ascii_case(sysdrive)
        }
    })
}

/// Whether `drive` is one of the fixed drive roots.
pub fn is_valid_drive(provider: &dyn DriveProvider, drive: &str) -> bool {
    provider
        .fixed_drives()
        .iter()
        .any(|d| d.eq_ignore_ascii_case(drive))
}

/// The system drive root from `%SystemDrive%`, e.g. `C:\`.
pub fn system_drive() -> Option<String> {
    std::env::var("SystemDrive")
        .ok()
        .filter(|d| !d.is_empty())
        .map(|d| if d.ends_with('\\') { d } else { format!("{}\\", d) })
}
