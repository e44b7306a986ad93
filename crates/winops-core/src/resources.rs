//! Message templates for host-facing error records.

pub fn operation_failed(computer_name: &str, message: &str, additional: &str) -> String {
    if additional.is_empty() {
        format!("The operation failed on computer '{computer_name}': {message}")
    } else {
        format!("The operation failed on computer '{computer_name}': {message} {additional}")
    }
}

pub fn network_path_not_found(computer_name: &str) -> String {
    format!(
        "Verify that the computer '{computer_name}' is reachable and that file and printer sharing is enabled."
    )
}

pub fn privilege_not_enabled(computer_name: &str, privilege: &str) -> String {
    format!("Failed to enable the '{privilege}' privilege for the operation on computer '{computer_name}'.")
}

pub fn cannot_resolve_computer_name(computer_name: &str, reason: &str) -> String {
    format!("Cannot resolve the computer name '{computer_name}': {reason}")
}

pub fn invalid_new_name(new_name: &str) -> String {
    format!(
        "The new computer name '{new_name}' is not valid. Names must be shorter than 64 characters, \
         contain only letters, digits and hyphens, and cannot be all digits."
    )
}

pub fn stop_command_failed(computer_name: &str, message: &str) -> String {
    format!("Failed to stop the computer '{computer_name}' with the following error message: {message}")
}

pub fn restart_command_failed(computer_name: &str, message: &str) -> String {
    format!("Failed to restart the computer '{computer_name}' with the following error message: {message}")
}

pub fn rename_command_failed(computer_name: &str, message: &str) -> String {
    format!("Failed to rename the computer '{computer_name}' with the following error message: {message}")
}

pub const SYSTEM_RESTORE_NOT_SUPPORTED: &str =
    "System Restore is not supported on ARM platforms.";
