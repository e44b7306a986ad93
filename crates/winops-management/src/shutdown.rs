//! Privileged `Win32_OperatingSystem` / `Win32_ComputerSystem` operations.
//!
//! Both entry points report failures through an [`ErrorSink`] and return a
//! plain outcome; nothing escapes as an `Err`.

use crate::invoker::{InvocationTarget, MethodCall, WmiMethodInvoker};
use crate::names::{is_computer_name_valid, LocalMachineNames, NETBIOS_NAME_MAX_LENGTH};
use crate::privilege::{PrivilegeApi, PrivilegeGuard, SE_REMOTE_SHUTDOWN_NAME, SE_SHUTDOWN_NAME};
use crate::status::{computer_status, write_non_terminating_error};
use crate::types::{ComputerChangeInfo, RenameRequest, ShutdownRequest};
use log::{info, warn};
use tokio_util::sync::CancellationToken;
use winops_core::win32::win32_message_signed;
use winops_core::{resources, ErrorCategory, ErrorRecord, ErrorSink, CIM_NAMESPACE};
use winops_wmi::{CimValue, MethodParameter};

pub const WMI_CLASS_OPERATING_SYSTEM: &str = "Win32_OperatingSystem";
pub const WMI_CLASS_COMPUTER_SYSTEM: &str = "Win32_ComputerSystem";
pub const SHUTDOWN_METHOD: &str = "Win32shutdown";
pub const RENAME_METHOD: &str = "Rename";

// ─── Shutdown ────────────────────────────────────────────────────────

/// Enable the shutdown privilege and call `Win32Shutdown` on the target.
///
/// Returns `true` on a zero return code. Every failure writes exactly one
/// record to `sink`. The privilege is restored before returning.
pub async fn invoke_win32_shutdown(
    sink: &mut dyn ErrorSink,
    privileges: &dyn PrivilegeApi,
    invoker: &dyn WmiMethodInvoker,
    request: &ShutdownRequest,
    cancel: &CancellationToken,
) -> bool {
    let computer = request.computer_name.as_str();
    let privilege = if request.is_localhost {
        SE_SHUTDOWN_NAME
    } else {
        SE_REMOTE_SHUTDOWN_NAME
    };

    let _guard = match PrivilegeGuard::acquire(privileges, privilege) {
        Ok(guard) => guard,
        Err(e) => {
            warn!("Could not enable {} for {}: {}", privilege, computer, e);
            sink.write_error(ErrorRecord::new(
                "PrivilegeNotEnabled",
                ErrorCategory::InvalidOperation,
                resources::privilege_not_enabled(computer, privilege),
                None,
            ));
            return false;
        }
    };

    let target = if request.is_localhost {
        InvocationTarget::localhost()
    } else {
        InvocationTarget::remote(
            computer,
            request.credential.clone(),
            request.authentication.clone(),
        )
    };
    let call = MethodCall {
        class_name: WMI_CLASS_OPERATING_SYSTEM,
        method_name: SHUTDOWN_METHOD,
        namespace: Some(CIM_NAMESPACE),
        selectors: Vec::new(),
        parameters: vec![
            MethodParameter::new("Flags", CimValue::SInt32(request.flags.flags)),
            MethodParameter::new("Reserved", CimValue::SInt32(request.flags.reserved)),
        ],
    };

    let reason = match invoker.invoke(&target, &call, cancel).await {
        Ok(0) => {
            info!("{:?} accepted by {} (flags {})", request.operation, computer, request.flags.flags);
            return true;
        }
        Ok(code) => win32_message_signed(code),
        Err(e) => e.message,
    };

    sink.write_error(ErrorRecord::new(
        request.operation.error_id(),
        ErrorCategory::OperationStopped,
        request.operation.failure_message(computer, &reason),
        Some(computer),
    ));
    false
}

// ─── Rename ──────────────────────────────────────────────────────────

/// Call `Win32_ComputerSystem.Rename` on the target. The new name only
/// takes effect after a restart. A local target is keyed by `local.short`.
pub async fn rename_computer(
    sink: &mut dyn ErrorSink,
    invoker: &dyn WmiMethodInvoker,
    local: &LocalMachineNames,
    request: &RenameRequest,
    cancel: &CancellationToken,
) -> ComputerChangeInfo {
    let computer = request.computer_name.as_str();
    let new_name = request.new_name.as_str();

    if !is_computer_name_valid(new_name) {
        sink.write_error(ErrorRecord::new(
            "InvalidNewName",
            ErrorCategory::InvalidArgument,
            resources::invalid_new_name(new_name),
            Some(new_name),
        ));
        return ComputerChangeInfo { computer_name: computer.to_string(), has_succeeded: false };
    }
    if new_name.len() > NETBIOS_NAME_MAX_LENGTH {
        warn!(
            "'{}' is longer than {} characters; its NetBIOS name will be truncated",
            new_name, NETBIOS_NAME_MAX_LENGTH
        );
    }

    let (target, key) = if request.is_localhost {
        (InvocationTarget::localhost(), local.short.as_str())
    } else {
        let target = InvocationTarget::remote(
            computer,
            request.credential.clone(),
            request.authentication.clone(),
        );
        (target, computer)
    };
    let (password, user) = match &request.domain_credential {
        Some(c) => (CimValue::String(c.password.clone()), CimValue::String(c.qualified_user())),
        None => (CimValue::Null, CimValue::Null),
    };
    let call = MethodCall {
        class_name: WMI_CLASS_COMPUTER_SYSTEM,
        method_name: RENAME_METHOD,
        namespace: Some(CIM_NAMESPACE),
        selectors: vec![("Name", key)],
        parameters: vec![
            MethodParameter::new("Name", CimValue::String(new_name.to_string())),
            MethodParameter::new("Password", password),
            MethodParameter::new("UserName", user),
        ],
    };

    match invoker.invoke(&target, &call, cancel).await {
        Ok(code) => {
            if code == 0 {
                info!("Renamed {} to {} (restart required)", computer, new_name);
            } else {
                write_non_terminating_error(sink, code, computer);
            }
            computer_status(code, computer)
        }
        Err(e) => {
            sink.write_error(ErrorRecord::new(
                "FailToRenameComputer",
                ErrorCategory::OperationStopped,
                resources::rename_command_failed(computer, &e.message),
                Some(computer),
            ));
            ComputerChangeInfo { computer_name: computer.to_string(), has_succeeded: false }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invoker::FixedResultInvoker;
    use crate::privilege::{MockPrivilegeApi, PrivilegeState};
    use crate::types::{MgmtError, MgmtErrorKind, ShutdownFlags, ShutdownOperation};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use winops_core::CollectingSink;
    use winops_wmi::{WmiCredential, WmiError, WmiErrorKind, WmiResult};

    /// Records what it was asked to do, then answers with `result`.
    struct RecordingInvoker {
        result: WmiResult<i32>,
        seen: Mutex<Vec<(String, String, Vec<MethodParameter>, bool)>>,
        keys: Mutex<Vec<(Option<String>, Vec<(String, String)>)>>,
    }

    impl RecordingInvoker {
        fn new(result: WmiResult<i32>) -> Self {
            Self { result, seen: Mutex::new(Vec::new()), keys: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl WmiMethodInvoker for RecordingInvoker {
        async fn invoke(
            &self,
            target: &InvocationTarget,
            call: &MethodCall<'_>,
            _cancel: &CancellationToken,
        ) -> WmiResult<i32> {
            self.seen.lock().unwrap().push((
                target.computer_name.clone(),
                call.method_name.to_string(),
                call.parameters.clone(),
                target.credential.is_some(),
            ));
            self.keys.lock().unwrap().push((
                call.namespace.map(str::to_string),
                call.selectors.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
            ));
            self.result.clone()
        }
    }

    fn restoring_mock(privilege: &'static str) -> MockPrivilegeApi {
        let mut api = MockPrivilegeApi::new();
        api.expect_enable()
            .withf(move |p| p == privilege)
            .times(1)
            .returning(|_| Ok(PrivilegeState { previous_attributes: Some(0) }));
        api.expect_restore()
            .withf(move |p, prev| p == privilege && prev.previous_attributes == Some(0))
            .times(1)
            .returning(|_, _| Ok(()));
        api
    }

    fn local() -> LocalMachineNames {
        LocalMachineNames::new("WS01", "ws01.corp.example.com")
    }

    fn stop_local() -> ShutdownRequest {
        ShutdownRequest::new("localhost", true, ShutdownOperation::Stop, ShutdownOperation::Stop.flags(false))
    }

    #[tokio::test]
    async fn test_zero_result_succeeds_without_records() {
        let mut sink = CollectingSink::new();
        let api = restoring_mock(SE_SHUTDOWN_NAME);
        let invoker = FixedResultInvoker::new(0);
        let ok = invoke_win32_shutdown(&mut sink, &api, &invoker, &stop_local(), &CancellationToken::new()).await;
        assert!(ok);
        assert!(sink.is_empty());
        assert_eq!(invoker.calls(), 1);
    }

    #[tokio::test]
    async fn test_non_zero_result_fails_with_one_record() {
        let mut sink = CollectingSink::new();
        let api = restoring_mock(SE_REMOTE_SHUTDOWN_NAME);
        let invoker = FixedResultInvoker::new(1191);
        let request = ShutdownRequest::new("db01", false, ShutdownOperation::Restart, ShutdownFlags::new(2));
        let ok = invoke_win32_shutdown(&mut sink, &api, &invoker, &request, &CancellationToken::new()).await;
        assert!(!ok);
        assert_eq!(sink.len(), 1);
        let r = &sink.records()[0];
        assert_eq!(r.error_id, "RestartcomputerFailed");
        assert_eq!(r.category, ErrorCategory::OperationStopped);
        assert_eq!(r.target.as_deref(), Some("db01"));
        assert!(r.message.contains("other users logged on"));
    }

    #[tokio::test]
    async fn test_invoker_error_restores_privilege() {
        let mut sink = CollectingSink::new();
        let api = restoring_mock(SE_SHUTDOWN_NAME);
        let invoker = RecordingInvoker::new(Err(WmiError::new(WmiErrorKind::CimFault, "Access denied")));
        let ok = invoke_win32_shutdown(&mut sink, &api, &invoker, &stop_local(), &CancellationToken::new()).await;
        assert!(!ok);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].error_id, "StopComputerException");
        assert!(sink.records()[0].message.contains("Access denied"));
    }

    #[tokio::test]
    async fn test_cancelled_call_reports_once() {
        let mut sink = CollectingSink::new();
        let api = restoring_mock(SE_SHUTDOWN_NAME);
        let invoker = FixedResultInvoker::new(0);
        let token = CancellationToken::new();
        token.cancel();
        let ok = invoke_win32_shutdown(&mut sink, &api, &invoker, &stop_local(), &token).await;
        assert!(!ok);
        assert_eq!(sink.len(), 1);
        assert_eq!(invoker.calls(), 0);
    }

    #[tokio::test]
    async fn test_privilege_failure_skips_invocation() {
        let mut sink = CollectingSink::new();
        let mut api = MockPrivilegeApi::new();
        api.expect_enable()
            .returning(|_| Err(MgmtError::new(MgmtErrorKind::PrivilegeNotHeld, "not held")));
        api.expect_restore().times(0);
        let invoker = FixedResultInvoker::new(0);

        let ok = invoke_win32_shutdown(&mut sink, &api, &invoker, &stop_local(), &CancellationToken::new()).await;
        assert!(!ok);
        assert_eq!(invoker.calls(), 0);
        assert_eq!(sink.len(), 1);
        let r = &sink.records()[0];
        assert_eq!(r.error_id, "PrivilegeNotEnabled");
        assert_eq!(r.category, ErrorCategory::InvalidOperation);
        assert_eq!(r.target, None);
        assert!(r.message.contains(SE_SHUTDOWN_NAME));
    }

    #[tokio::test]
    async fn test_local_target_drops_credential_and_passes_flags() {
        let mut sink = CollectingSink::new();
        let api = restoring_mock(SE_SHUTDOWN_NAME);
        let invoker = RecordingInvoker::new(Ok(0));
        let request = ShutdownRequest::new("WS01", true, ShutdownOperation::Restart, ShutdownFlags::new(6))
            .with_credential(WmiCredential::new("admin", "pw"));
        assert!(invoke_win32_shutdown(&mut sink, &api, &invoker, &request, &CancellationToken::new()).await);

        let seen = invoker.seen.lock().unwrap();
        let (target, method, params, has_cred) = &seen[0];
        assert_eq!(target, "localhost");
        assert_eq!(method, SHUTDOWN_METHOD);
        assert!(!has_cred);
        assert_eq!(params.len(), 2);
        assert_eq!(params[0], MethodParameter::new("Flags", CimValue::SInt32(6)));
        assert_eq!(params[1], MethodParameter::new("Reserved", CimValue::SInt32(0)));
        assert_eq!(invoker.keys.lock().unwrap()[0].0.as_deref(), Some(CIM_NAMESPACE));
    }

    #[tokio::test]
    async fn test_remote_target_keeps_credential() {
        let mut sink = CollectingSink::new();
        let api = restoring_mock(SE_REMOTE_SHUTDOWN_NAME);
        let invoker = RecordingInvoker::new(Ok(0));
        let request = ShutdownRequest::new("db01", false, ShutdownOperation::Stop, ShutdownFlags::new(1))
            .with_credential(WmiCredential::new("admin", "pw"));
        assert!(invoke_win32_shutdown(&mut sink, &api, &invoker, &request, &CancellationToken::new()).await);
        let seen = invoker.seen.lock().unwrap();
        assert_eq!(seen[0].0, "db01");
        assert!(seen[0].3);
    }

    #[tokio::test]
    async fn test_rename_invalid_name() {
        let mut sink = CollectingSink::new();
        let invoker = FixedResultInvoker::new(0);
        let info = rename_computer(
            &mut sink,
            &invoker,
            &local(),
            &RenameRequest::new("pc1", false, "12345"),
            &CancellationToken::new(),
        )
        .await;
        assert!(!info.has_succeeded);
        assert_eq!(invoker.calls(), 0);
        assert_eq!(sink.records()[0].error_id, "InvalidNewName");
        assert_eq!(sink.records()[0].category, ErrorCategory::InvalidArgument);
    }

    #[tokio::test]
    async fn test_rename_success() {
        let mut sink = CollectingSink::new();
        let invoker = RecordingInvoker::new(Ok(0));
        let mut request = RenameRequest::new("pc1", false, "web-01");
        request.domain_credential = Some(WmiCredential {
            username: "joiner".into(),
            password: "pw".into(),
            domain: Some("CORP".into()),
        });
        let info = rename_computer(&mut sink, &invoker, &local(), &request, &CancellationToken::new()).await;
        assert_eq!(info, ComputerChangeInfo { computer_name: "pc1".into(), has_succeeded: true });
        assert!(sink.is_empty());

        let seen = invoker.seen.lock().unwrap();
        let params = &seen[0].2;
        assert_eq!(seen[0].1, RENAME_METHOD);
        assert_eq!(params[0].value, CimValue::String("web-01".into()));
        assert_eq!(params[2].value, CimValue::String(r"CORP\joiner".into()));
    }

    #[tokio::test]
    async fn test_local_rename_keys_on_local_short_name() {
        let mut sink = CollectingSink::new();
        let invoker = RecordingInvoker::new(Ok(0));
        let request = RenameRequest::new("localhost", true, "web-01");
        let info = rename_computer(&mut sink, &invoker, &local(), &request, &CancellationToken::new()).await;
        assert!(info.has_succeeded);

        let keys = invoker.keys.lock().unwrap();
        assert_eq!(keys[0].0.as_deref(), Some(CIM_NAMESPACE));
        assert_eq!(keys[0].1, vec![("Name".to_string(), "WS01".to_string())]);
        assert_eq!(invoker.seen.lock().unwrap()[0].0, "localhost");
    }

    #[tokio::test]
    async fn test_remote_rename_keys_on_target_name() {
        let mut sink = CollectingSink::new();
        let invoker = RecordingInvoker::new(Ok(0));
        let request = RenameRequest::new("pc1", false, "web-01");
        rename_computer(&mut sink, &invoker, &local(), &request, &CancellationToken::new()).await;
        assert_eq!(invoker.keys.lock().unwrap()[0].1[0].1, "pc1");
    }

    #[tokio::test]
    async fn test_rename_non_zero_code() {
        let mut sink = CollectingSink::new();
        let invoker = FixedResultInvoker::new(53);
        let info = rename_computer(
            &mut sink,
            &invoker,
            &local(),
            &RenameRequest::new("pc1", false, "web-01"),
            &CancellationToken::new(),
        )
        .await;
        assert!(!info.has_succeeded);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.records()[0].error_id, "InvalidOperationException");
        assert!(sink.records()[0].message.contains("file and printer sharing"));
    }

    #[tokio::test]
    async fn test_rename_transport_error() {
        let mut sink = CollectingSink::new();
        let invoker = RecordingInvoker::new(Err(WmiError::new(WmiErrorKind::Timeout, "timed out")));
        let info = rename_computer(
            &mut sink,
            &invoker,
            &local(),
            &RenameRequest::new("pc1", false, "web-01"),
            &CancellationToken::new(),
        )
        .await;
        assert!(!info.has_succeeded);
        assert_eq!(sink.records()[0].error_id, "FailToRenameComputer");
    }
}
