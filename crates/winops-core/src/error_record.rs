//! Non-terminating error records and the sinks that receive them.
//!
//! Helpers never let a failure escape as a panic or an `Err` across the
//! operation boundary. Instead they build an [`ErrorRecord`], hand it to the
//! host through an [`ErrorSink`], and return a plain success flag.

use log::error;
use serde::{Deserialize, Serialize};
use std::fmt;

// ─── Category ────────────────────────────────────────────────────────

/// Broad classification of a reported failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorCategory {
    /// A caller-supplied value was rejected before any native call.
    InvalidArgument,
    /// The operation could not run in the current state.
    InvalidOperation,
    /// A native call started but failed or was interrupted.
    OperationStopped,
    /// The caller lacks the rights needed for the operation.
    PermissionDenied,
    /// The operation is not available on this platform.
    NotImplemented,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::InvalidArgument => "InvalidArgument",
            Self::InvalidOperation => "InvalidOperation",
            Self::OperationStopped => "OperationStopped",
            Self::PermissionDenied => "PermissionDenied",
            Self::NotImplemented => "NotImplemented",
        };
        f.write_str(name)
    }
}

// ─── Record ──────────────────────────────────────────────────────────

/// A single failure reported to the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    /// Stable identifier (e.g. `AddressResolutionException`).
    pub error_id: String,
    pub category: ErrorCategory,
    pub message: String,
    /// Object the failure applies to, usually a computer name.
    #[serde(default)]
    pub target: Option<String>,
}

impl ErrorRecord {
    pub fn new(
        error_id: impl Into<String>,
        category: ErrorCategory,
        message: impl Into<String>,
        target: Option<&str>,
    ) -> Self {
        Self {
            error_id: error_id.into(),
            category,
            message: message.into(),
            target: target.map(str::to_string),
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.target {
            Some(t) => write!(
                f,
                "{} ({}, target '{}'): {}",
                self.error_id, self.category, t, self.message
            ),
            None => write!(f, "{} ({}): {}", self.error_id, self.category, self.message),
        }
    }
}

impl std::error::Error for ErrorRecord {}

impl From<ErrorRecord> for String {
    fn from(e: ErrorRecord) -> Self {
        e.to_string()
    }
}

// ─── Sinks ───────────────────────────────────────────────────────────

/// Host channel for non-terminating errors.
pub trait ErrorSink: Send {
    fn write_error(&mut self, record: ErrorRecord);
}

/// Keeps every record in memory, in arrival order.
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Vec<ErrorRecord>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[ErrorRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn into_records(self) -> Vec<ErrorRecord> {
        self.records
    }
}

impl ErrorSink for CollectingSink {
    fn write_error(&mut self, record: ErrorRecord) {
        self.records.push(record);
    }
}

/// Forwards records to the `log` facade at error level and counts them.
#[derive(Debug, Default)]
pub struct LogSink {
    written: usize,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> usize {
        self.written
    }
}

impl ErrorSink for LogSink {
    fn write_error(&mut self, record: ErrorRecord) {
        self.written += 1;
        error!("{}", record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_display_with_target() {
        let r = ErrorRecord::new(
            "AddressResolutionException",
            ErrorCategory::InvalidArgument,
            "cannot resolve",
            Some("srv01"),
        );
        let s = r.to_string();
        assert!(s.contains("AddressResolutionException"));
        assert!(s.contains("InvalidArgument"));
        assert!(s.contains("srv01"));
    }

    #[test]
    fn test_record_display_without_target() {
        let r = ErrorRecord::new("PrivilegeNotEnabled", ErrorCategory::InvalidOperation, "nope", None);
        assert_eq!(r.to_string(), "PrivilegeNotEnabled (InvalidOperation): nope");
    }

    #[test]
    fn test_collecting_sink_keeps_order() {
        let mut sink = CollectingSink::new();
        assert!(sink.is_empty());
        sink.write_error(ErrorRecord::new("A", ErrorCategory::InvalidArgument, "a", None));
        sink.write_error(ErrorRecord::new("B", ErrorCategory::OperationStopped, "b", None));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.records()[0].error_id, "A");
        assert_eq!(sink.into_records()[1].error_id, "B");
    }

    #[test]
    fn test_log_sink_counts() {
        let mut sink = LogSink::new();
        sink.write_error(ErrorRecord::new("A", ErrorCategory::InvalidArgument, "a", None));
        assert_eq!(sink.written(), 1);
    }

    #[test]
    fn test_record_serde_camel_case() {
        let r = ErrorRecord::new("X", ErrorCategory::OperationStopped, "m", Some("pc"));
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"errorId\":\"X\""));
        assert!(json.contains("\"operationStopped\""));
        let back: ErrorRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }
}
