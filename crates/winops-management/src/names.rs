//! Computer-name validation, resolution and formatting.

use crate::types::{MgmtError, MgmtErrorKind, MgmtResult};
use async_trait::async_trait;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use winops_core::{resources, ErrorCategory, ErrorRecord};

pub const LOCALHOST: &str = "localhost";
/// Longest name NetBIOS keeps; longer host names are truncated there.
pub const NETBIOS_NAME_MAX_LENGTH: usize = 15;
const COMPUTER_NAME_MAX_LENGTH: usize = 64;

// ─── Syntax ──────────────────────────────────────────────────────────

/// Shorter than 64 characters, only `[A-Za-z0-9-]`, and not all digits.
pub fn is_computer_name_valid(name: &str) -> bool {
    if name.len() >= COMPUTER_NAME_MAX_LENGTH {
        return false;
    }
    let mut all_digits = true;
    for c in name.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '-' => all_digits = false,
            '0'..='9' => {}
            _ => return false,
        }
    }
    !all_digits
}

// ─── Local machine ───────────────────────────────────────────────────

/// Short and fully qualified names of the machine running this process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalMachineNames {
    pub short: String,
    pub full: String,
}

impl LocalMachineNames {
    pub fn new(short: impl Into<String>, full: impl Into<String>) -> Self {
        Self { short: short.into(), full: full.into() }
    }

    /// From the OS host name. The full name comes from a reverse lookup of
    /// the host's own addresses, then `USERDNSDOMAIN`, then the host name.
    pub fn detect() -> Self {
        let host = hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().into_owned())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| LOCALHOST.to_string());
        let short = first_label(&host).to_string();
        let full = qualify_host_name(&host, &short).unwrap_or(host);
        Self { short, full }
    }

    pub fn matches(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case(&self.short) || name.eq_ignore_ascii_case(&self.full)
    }
}

fn first_label(host: &str) -> &str {
    host.split('.').next().unwrap_or(host)
}

fn qualify_host_name(host: &str, short: &str) -> Option<String> {
    if host.contains('.') {
        return Some(host.to_string());
    }
    let from_dns = dns_lookup::lookup_host(host)
        .ok()
        .into_iter()
        .flatten()
        .filter(|a| !a.is_loopback())
        .filter_map(|a| dns_lookup::lookup_addr(&a).ok())
        .find(|name| name.contains('.') && first_label(name).eq_ignore_ascii_case(short));
    if from_dns.is_some() {
        return from_dns;
    }
    match std::env::var("USERDNSDOMAIN") {
        Ok(domain) if !domain.is_empty() => Some(format!("{}.{}", host, domain.to_ascii_lowercase())),
        _ => None,
    }
}

// ─── Resolution ──────────────────────────────────────────────────────

/// Maps a name or address to the canonical host name it belongs to.
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn host_name(&self, name: &str) -> MgmtResult<String>;
}

/// Forward lookup, then reverse lookup of the first address that has a
/// record. Loopback addresses, and addresses shared with the local short
/// name, fall back to the local full name when no record is found.
#[derive(Debug, Clone)]
pub struct SystemResolver {
    local: LocalMachineNames,
}

impl SystemResolver {
    pub fn new(local: LocalMachineNames) -> Self {
        Self { local }
    }
}

#[async_trait]
impl HostResolver for SystemResolver {
    async fn host_name(&self, name: &str) -> MgmtResult<String> {
        let name = name.to_string();
        let local = self.local.clone();
        // getaddrinfo/getnameinfo block
        tokio::task::spawn_blocking(move || canonical_host_name(&name, &local))
            .await
            .map_err(|e| MgmtError::new(MgmtErrorKind::Resolution, e.to_string()))?
    }
}

fn canonical_host_name(name: &str, local: &LocalMachineNames) -> MgmtResult<String> {
    let addrs = dns_lookup::lookup_host(name)
        .map_err(|e| MgmtError::new(MgmtErrorKind::Resolution, e.to_string()))?;
    if addrs.is_empty() {
        return Err(MgmtError::new(
            MgmtErrorKind::Resolution,
            format!("No addresses found for '{}'", name),
        ));
    }

    for addr in addrs.iter().filter(|a| !a.is_loopback()) {
        match dns_lookup::lookup_addr(addr) {
            // getnameinfo hands back the numeric form when there is no record
            Ok(host) if !host.is_empty() && host.parse::<IpAddr>().is_err() => {
                debug!("'{}' resolved to {} ({})", name, host, addr);
                return Ok(host);
            }
            Ok(_) => {}
            Err(e) => debug!("No reverse record for {}: {}", addr, e),
        }
    }

    if addrs.iter().any(IpAddr::is_loopback) {
        return Ok(local.full.clone());
    }
    let local_addrs = dns_lookup::lookup_host(&local.short).unwrap_or_default();
    if addrs.iter().any(|a| local_addrs.contains(a)) {
        return Ok(local.full.clone());
    }
    Ok(name.to_string())
}

/// How a target name was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NameKind {
    /// This machine; the name is `localhost`.
    Local,
    /// A remote host the resolver knows.
    Resolved,
    /// An IP literal that could not be resolved. Reachability is unknown.
    UnverifiedAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedName {
    pub name: String,
    pub kind: NameKind,
}

impl ValidatedName {
    pub fn is_local(&self) -> bool {
        self.kind == NameKind::Local
    }
}

/// Normalise a target computer name. Local aliases become `localhost`;
/// unresolvable non-address names are reported as `AddressResolutionException`.
pub async fn validate_computer_name(
    name: &str,
    local: &LocalMachineNames,
    resolver: &dyn HostResolver,
) -> Result<ValidatedName, ErrorRecord> {
    if name == "." || name.eq_ignore_ascii_case(LOCALHOST) || local.matches(name) {
        return Ok(ValidatedName { name: LOCALHOST.to_string(), kind: NameKind::Local });
    }

    let is_ip = name.parse::<IpAddr>().is_ok();
    match resolver.host_name(name).await {
        Ok(host) if local.matches(&host) => {
            debug!("'{}' resolves to this machine", name);
            Ok(ValidatedName { name: LOCALHOST.to_string(), kind: NameKind::Local })
        }
        Ok(_) => Ok(ValidatedName { name: name.to_string(), kind: NameKind::Resolved }),
        Err(e) if is_ip => {
            warn!("Could not resolve address {}, accepting it unverified: {}", name, e.message);
            Ok(ValidatedName { name: name.to_string(), kind: NameKind::UnverifiedAddress })
        }
        Err(e) => Err(ErrorRecord::new(
            "AddressResolutionException",
            ErrorCategory::InvalidArgument,
            resources::cannot_resolve_computer_name(name, &e.message),
            Some(name),
        )),
    }
}

// ─── Formatting ──────────────────────────────────────────────────────

/// `COMPUTER\user` for a local account. A user already qualified with a
/// backslash is kept; an FQDN contributes only its first label.
pub fn local_admin_user_name(computer_name: &str, user_name: &str) -> String {
    if user_name.contains('\\') {
        return user_name.to_string();
    }
    let host = computer_name.split('.').next().unwrap_or(computer_name);
    format!("{}\\{}", host, user_name)
}

/// `\\<computer><namespace>`, with the IPv6 loopback spelled `localhost`.
pub fn scope_string(computer_name: &str, namespace: &str) -> String {
    let host = if computer_name == "::1" || computer_name == "[::1]" {
        LOCALHOST
    } else {
        computer_name
    };
    format!("\\\\{}{}", host, namespace)
}

/// Join names for display, substituting the local host name for `.` and
/// `localhost`.
pub fn machine_names<S: AsRef<str>>(names: &[S], separator: &str, local_host_name: &str) -> String {
    names
        .iter()
        .map(|n| {
            let n = n.as_ref();
            if n == "." || n.eq_ignore_ascii_case(LOCALHOST) {
                local_host_name
            } else {
                n
            }
        })
        .collect::<Vec<_>>()
        .join(separator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StaticResolver(Option<&'static str>);

    #[async_trait]
    impl HostResolver for StaticResolver {
        async fn host_name(&self, _name: &str) -> MgmtResult<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| MgmtError::new(MgmtErrorKind::Resolution, "No such host is known."))
        }
    }

    struct CountingResolver(AtomicUsize);

    #[async_trait]
    impl HostResolver for CountingResolver {
        async fn host_name(&self, name: &str) -> MgmtResult<String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(name.to_string())
        }
    }

    fn local() -> LocalMachineNames {
        LocalMachineNames::new("WS01", "ws01.corp.example.com")
    }

    #[test]
    fn test_name_length_limit() {
        assert!(!is_computer_name_valid(&"a".repeat(64)));
        assert!(!is_computer_name_valid(&"a".repeat(100)));
        assert!(is_computer_name_valid(&"a".repeat(63)));
    }

    #[test]
    fn test_all_digit_names_invalid() {
        assert!(!is_computer_name_valid("12345"));
        assert!(!is_computer_name_valid("0"));
        assert!(!is_computer_name_valid(""));
    }

    #[test]
    fn test_valid_and_invalid_characters() {
        assert!(is_computer_name_valid("web-01"));
        assert!(is_computer_name_valid("-"));
        assert!(is_computer_name_valid("1a"));
        assert!(!is_computer_name_valid("web_01"));
        assert!(!is_computer_name_valid("web.corp"));
        assert!(!is_computer_name_valid("wéb"));
    }

    #[tokio::test]
    async fn test_local_aliases_never_resolve() {
        let resolver = CountingResolver(AtomicUsize::new(0));
        for name in [".", "localhost", "LOCALHOST", "ws01", "WS01.CORP.EXAMPLE.COM"] {
            let v = validate_computer_name(name, &local(), &resolver).await.unwrap();
            assert_eq!(v.name, LOCALHOST);
            assert!(v.is_local());
        }
        assert_eq!(resolver.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dot_is_localhost_whatever_the_local_names() {
        let odd = LocalMachineNames::new("", "");
        let v = validate_computer_name(".", &odd, &StaticResolver(None)).await.unwrap();
        assert_eq!(v.name, LOCALHOST);
    }

    #[tokio::test]
    async fn test_address_of_local_machine() {
        let resolver = StaticResolver(Some("ws01.corp.example.com"));
        let v = validate_computer_name("10.0.0.5", &local(), &resolver).await.unwrap();
        assert_eq!(v, ValidatedName { name: LOCALHOST.into(), kind: NameKind::Local });
    }

    #[tokio::test]
    async fn test_remote_name_kept() {
        let resolver = StaticResolver(Some("db01.corp.example.com"));
        let v = validate_computer_name("db01", &local(), &resolver).await.unwrap();
        assert_eq!(v, ValidatedName { name: "db01".into(), kind: NameKind::Resolved });
    }

    #[tokio::test]
    async fn test_unresolvable_address_is_flagged() {
        let v = validate_computer_name("fe80::1", &local(), &StaticResolver(None)).await.unwrap();
        assert_eq!(v.kind, NameKind::UnverifiedAddress);
        assert_eq!(v.name, "fe80::1");
    }

    #[tokio::test]
    async fn test_unresolvable_name_is_error() {
        let err = validate_computer_name("nosuchhost", &local(), &StaticResolver(None))
            .await
            .unwrap_err();
        assert_eq!(err.error_id, "AddressResolutionException");
        assert_eq!(err.category, ErrorCategory::InvalidArgument);
        assert_eq!(err.target.as_deref(), Some("nosuchhost"));
        assert!(err.message.contains("No such host is known."));
    }

    #[tokio::test]
    async fn test_system_resolver_loopback() {
        let resolver = SystemResolver::new(local());
        let host = resolver.host_name("127.0.0.1").await.unwrap();
        assert_eq!(host, "ws01.corp.example.com");
    }

    #[test]
    fn test_local_admin_user_name() {
        assert_eq!(local_admin_user_name("pc1", "admin"), r"pc1\admin");
        assert_eq!(local_admin_user_name("pc1.corp.example.com", "admin"), r"pc1\admin");
        assert_eq!(local_admin_user_name("pc1", r"other\admin"), r"other\admin");
    }

    #[test]
    fn test_scope_string() {
        assert_eq!(scope_string("::1", r"\root\cimv2"), r"\\localhost\root\cimv2");
        assert_eq!(scope_string("[::1]", r"\root\cimv2"), r"\\localhost\root\cimv2");
        assert_eq!(scope_string("pc1", r"\root\default"), r"\\pc1\root\default");
    }

    #[test]
    fn test_machine_names() {
        assert_eq!(machine_names(&[".", "pc2", "LocalHost"], ",", "ws01"), "ws01,pc2,ws01");
        assert_eq!(machine_names::<&str>(&[], ";", "ws01"), "");
    }

    #[test]
    fn test_detect_matches_os_host_name() {
        let os = hostname::get().unwrap().to_string_lossy().into_owned();
        let names = LocalMachineNames::detect();
        assert!(!names.short.is_empty());
        assert!(names.short.eq_ignore_ascii_case(first_label(&os)), "{:?} vs {}", names, os);
        assert!(names.matches(&os) || names.matches(first_label(&os)));
        assert!(names.matches(&names.full));
    }

    #[test]
    fn test_canonical_name_of_unknown_host() {
        let err = canonical_host_name("no-such-host.invalid", &local()).unwrap_err();
        assert_eq!(err.kind, MgmtErrorKind::Resolution);
    }

    #[test]
    fn test_first_label() {
        assert_eq!(first_label("ws01.corp.example.com"), "ws01");
        assert_eq!(first_label("ws01"), "ws01");
    }
}
