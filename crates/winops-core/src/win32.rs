//! Text for Win32 / WMI method return codes.

/// `ERROR_BAD_NETPATH` – the network path was not found.
pub const ERROR_BAD_NETPATH: u32 = 0x0000_0035;
/// `RPC_S_UNKNOWN_IF` – the interface is unknown.
pub const ERROR_INTERFACE_UNKNOWN: u32 = 1717;
/// `ERROR_SERVICE_ALREADY_RUNNING`.
pub const ERROR_SERVICE_ALREADY_RUNNING: u32 = 1056;

const MESSAGES: &[(u32, &str)] = &[
    (0, "The operation completed successfully."),
    (1, "Incorrect function."),
    (2, "The system cannot find the file specified."),
    (5, "Access is denied."),
    (21, "The device is not ready."),
    (53, "The network path was not found."),
    (87, "The parameter is incorrect."),
    (1115, "A system shutdown is in progress."),
    (1116, "Unable to abort the system shutdown because no shutdown was in progress."),
    (1190, "A system shutdown has already been scheduled."),
    (1191, "The system shutdown cannot be initiated because there are other users logged on to the computer."),
    (1314, "A required privilege is not held by the client."),
    (1326, "The user name or password is incorrect."),
    (1056, "An instance of the service is already running."),
    (1717, "The interface is unknown."),
    (1722, "The RPC server is unavailable."),
    (2224, "The account already exists."),
    (2691, "The machine is already joined to the domain."),
];

/// Message text for a native error code, or a generic fallback.
pub fn win32_message(code: u32) -> String {
    MESSAGES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, m)| m.to_string())
        .unwrap_or_else(|| format!("Unknown error (0x{:x})", code))
}

/// WMI methods return `uint32` codes that frequently arrive as signed
/// integers; reinterpret them bit-for-bit.
pub fn win32_message_signed(code: i32) -> String {
    win32_message(code as u32)
}
