//! WMI method invocation seam.
//!
//! Management helpers never talk to WinRM directly; they go through a
//! [`WmiMethodInvoker`]. [`WsmanMethodInvoker`] is the real one,
//! [`FixedResultInvoker`] answers every call with a preset return code.

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;
use winops_core::ManagementConfig;
use winops_wmi::{
    MethodParameter, WmiAuthMethod, WmiConnectionConfig, WmiCredential, WmiError, WmiErrorKind,
    WmiResult, WmiTransport,
};

/// Where to invoke, and as whom. `None` credential/auth means the current
/// identity and the configured default mechanism.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationTarget {
    pub computer_name: String,
    #[serde(default)]
    pub credential: Option<WmiCredential>,
    #[serde(default)]
    pub authentication: Option<WmiAuthMethod>,
}

impl InvocationTarget {
    /// The local machine, with no credential or authentication override.
    pub fn localhost() -> Self {
        Self {
            computer_name: crate::names::LOCALHOST.to_string(),
            credential: None,
            authentication: None,
        }
    }

    pub fn remote(
        computer_name: impl Into<String>,
        credential: Option<WmiCredential>,
        authentication: Option<WmiAuthMethod>,
    ) -> Self {
        Self { computer_name: computer_name.into(), credential, authentication }
    }
}

/// One WMI method call.
#[derive(Debug, Clone)]
pub struct MethodCall<'a> {
    pub class_name: &'a str,
    pub method_name: &'a str,
    /// Namespace the class lives in; `None` uses the configured namespace.
    pub namespace: Option<&'a str>,
    /// Instance keys; empty for class-level invocation.
    pub selectors: Vec<(&'a str, &'a str)>,
    pub parameters: Vec<MethodParameter>,
}

#[async_trait]
pub trait WmiMethodInvoker: Send + Sync {
    /// Invoke the method and return its `ReturnValue`.
    async fn invoke(
        &self,
        target: &InvocationTarget,
        call: &MethodCall<'_>,
        cancel: &CancellationToken,
    ) -> WmiResult<i32>;
}

// ─── WS-Management ───────────────────────────────────────────────────

/// Opens one WinRM session per call using the operation defaults from
/// [`ManagementConfig`].
#[derive(Debug, Clone, Default)]
pub struct WsmanMethodInvoker {
    config: ManagementConfig,
}

impl WsmanMethodInvoker {
    pub fn new(config: ManagementConfig) -> Self {
        Self { config }
    }

    pub fn connection_config(&self, target: &InvocationTarget) -> WmiConnectionConfig {
        let mut cfg = WmiConnectionConfig::new(&target.computer_name);
        cfg.credential = target.credential.clone();
        cfg.auth_method = target
            .authentication
            .clone()
            .unwrap_or_else(|| WmiAuthMethod::from_name(&self.config.authentication));
        cfg.namespace = self.config.namespace.clone();
        cfg.use_ssl = self.config.use_ssl;
        cfg.port = self.config.port;
        cfg.skip_ca_check = self.config.skip_ca_check;
        cfg.skip_cn_check = self.config.skip_cn_check;
        cfg.timeout_ms = self.config.operation_timeout_ms;
        cfg.allow_unencrypted = self.config.allow_unencrypted;
        cfg
    }

    /// Connection settings for one call; the call's namespace wins over the
    /// configured one.
    pub fn session_config(&self, target: &InvocationTarget, call: &MethodCall<'_>) -> WmiConnectionConfig {
        let mut cfg = self.connection_config(target);
        if let Some(ns) = call.namespace {
            cfg.namespace = ns.to_string();
        }
        cfg
    }
}

#[async_trait]
impl WmiMethodInvoker for WsmanMethodInvoker {
    async fn invoke(
        &self,
        target: &InvocationTarget,
        call: &MethodCall<'_>,
        cancel: &CancellationToken,
    ) -> WmiResult<i32> {
        let mut transport =
            WmiTransport::new(&self.session_config(target, call))?.with_cancellation(cancel.clone());
        let out = transport
            .invoke_method(call.class_name, call.method_name, &call.selectors, &call.parameters)
            .await?;
        let code = parse_return_value(out.get("ReturnValue").map(String::as_str))?;
        debug!(
            "{}.{} on {} returned {}",
            call.class_name, call.method_name, target.computer_name, code
        );
        Ok(code)
    }
}

/// `ReturnValue` is a `uint32` on the wire; keep its bit pattern as `i32`.
fn parse_return_value(raw: Option<&str>) -> WmiResult<i32> {
    let raw = raw.ok_or_else(|| WmiError::new(WmiErrorKind::Parse, "Method output has no ReturnValue"))?;
    raw.trim()
        .parse::<i64>()
        .map(|v| v as i32)
        .map_err(|e| WmiError::new(WmiErrorKind::Parse, format!("Invalid ReturnValue '{}': {}", raw, e)))
}

// ─── Fixed result ────────────────────────────────────────────────────

/// Returns `result` for every call without touching the network.
#[derive(Debug, Default)]
pub struct FixedResultInvoker {
    result: i32,
    calls: AtomicUsize,
}

impl FixedResultInvoker {
    pub fn new(result: i32) -> Self {
        Self { result, calls: AtomicUsize::new(0) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WmiMethodInvoker for FixedResultInvoker {
    async fn invoke(
        &self,
        target: &InvocationTarget,
        call: &MethodCall<'_>,
        cancel: &CancellationToken,
    ) -> WmiResult<i32> {
        if cancel.is_cancelled() {
            return Err(WmiError::cancelled());
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        debug!(
            "Fixed result {} for {}.{} on {}",
            self.result, call.class_name, call.method_name, target.computer_name
        );
        Ok(self.result)
    }
}
