//! # winops – Core
//!
//! Infrastructure shared by the diagnostics and computer-management crates:
//!
//! - **Error records** – host-facing non-terminating error records and sinks
//! - **Win32 errors** – human-readable text for native return codes
//! - **Resources** – message templates used when reporting failures
//! - **Configuration** – connection and operation defaults

pub mod config;
pub mod error_record;
pub mod resources;
pub mod win32;

pub use config::{ConfigError, ManagementConfig, CIM_NAMESPACE, CIM_URI_PREFIX};
pub use error_record::{CollectingSink, ErrorCategory, ErrorRecord, ErrorSink, LogSink};
