use crate::types::ComputerChangeInfo;
use winops_core::win32::{win32_message_signed, ERROR_BAD_NETPATH};
use winops_core::{resources, ErrorCategory, ErrorRecord, ErrorSink};

/// Change outcome for a native return code (0 = success).
pub fn computer_status(error_code: i32, computer_name: &str) -> ComputerChangeInfo {
    ComputerChangeInfo {
        computer_name: computer_name.to_string(),
        has_succeeded: error_code == 0,
    }
}

/// Report a failed per-computer operation. A "network path not found"
/// code gets a reachability hint appended.
pub fn write_non_terminating_error(sink: &mut dyn ErrorSink, error_code: i32, computer_name: &str) {
    let additional = if error_code as u32 == ERROR_BAD_NETPATH {
        resources::network_path_not_found(computer_name)
    } else {
        String::new()
    };
    let message = resources::operation_failed(
        computer_name,
        &win32_message_signed(error_code),
        &additional,
    );
    sink.write_error(ErrorRecord::new(
        "InvalidOperationException",
        ErrorCategory::InvalidOperation,
        message,
        Some(computer_name),
    ));
}

/// System Restore is unavailable on ARM; reports that and returns `true`
/// when the operation has to be skipped.
pub fn skip_system_restore_for_arm(sink: &mut dyn ErrorSink) -> bool {
    skip_system_restore_for_arch(sink, std::env::consts::ARCH)
}

fn skip_system_restore_for_arch(sink: &mut dyn ErrorSink, arch: &str) -> bool {
    if !matches!(arch, "arm" | "aarch64") {
        return false;
    }
    sink.write_error(ErrorRecord::new(
        "SystemRestoreNotSupported",
        ErrorCategory::InvalidOperation,
        resources::SYSTEM_RESTORE_NOT_SUPPORTED,
        None,
    ));
    true
}
