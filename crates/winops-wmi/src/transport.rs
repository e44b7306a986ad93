//! WMI-over-WinRM SOAP/HTTP transport layer.
//!
//! Implements the WS-Management messages needed by this workspace: WMI
//! method invocation and WQL enumeration (Enumerate + Pull). Every request
//! honours an optional cancellation token and the configured operation
//! timeout.

use crate::types::*;
use crate::xml::{parse_document, xml_escape, XmlNode};
use log::{debug, error, trace, warn};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

// ─── Constants ───────────────────────────────────────────────────────

const NS_SOAP: &str = "http://www.w3.org/2003/05/soap-envelope";
const NS_WSA: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing";
const NS_WSMAN: &str = "http://schemas.dmtf.org/wbem/wsman/1/wsman.xsd";
const NS_WSEN: &str = "http://schemas.xmlsoap.org/ws/2004/09/enumeration";
const NS_XSI: &str = "http://www.w3.org/2001/XMLSchema-instance";
/// Resource URI base for WMI classes. Combined with the namespace this
/// yields e.g. `.../wmi/root/cimv2`.
pub const NS_WMI_BASE: &str = "http://schemas.microsoft.com/wbem/wsman/1/wmi";

const ACTION_ENUMERATE: &str = "http://schemas.xmlsoap.org/ws/2004/09/enumeration/Enumerate";
const ACTION_PULL: &str = "http://schemas.xmlsoap.org/ws/2004/09/enumeration/Pull";
const ANONYMOUS: &str = "http://schemas.xmlsoap.org/ws/2004/08/addressing/role/anonymous";
const WQL_DIALECT: &str = "http://schemas.microsoft.com/wbem/wsman/1/WQL";

const DEFAULT_MAX_ENVELOPE: usize = 512_000;
const DEFAULT_MAX_ELEMENTS: u32 = 100;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

// ─── Transport ───────────────────────────────────────────────────────

/// One WS-Management session to a host. Dropping it ends the session.
#[derive(Debug)]
pub struct WmiTransport {
    client: reqwest::Client,
    endpoint: String,
    auth_header: Option<String>,
    namespace: String,
    operation_timeout: Duration,
    cancel: Option<CancellationToken>,
    request_counter: u64,
}

impl WmiTransport {
    pub fn new(config: &WmiConnectionConfig) -> WmiResult<Self> {
        if config.computer_name.trim().is_empty() {
            return Err(WmiError::new(
                WmiErrorKind::InvalidParameter,
                "Computer name must not be empty",
            ));
        }

        let operation_timeout = Duration::from_millis(config.timeout_ms);
        let mut builder = reqwest::Client::builder()
            // Leave the HTTP layer some headroom past the server-side timeout.
            .timeout(operation_timeout + Duration::from_secs(5))
            .connect_timeout(CONNECT_TIMEOUT);

        if config.skip_ca_check || config.skip_cn_check {
            builder = builder.danger_accept_invalid_certs(true);
        }
        if is_loopback_host(&config.computer_name) {
            builder = builder.no_proxy();
        }

        let client = builder.build().map_err(|e| {
            WmiError::new(WmiErrorKind::Transport, format!("Failed to build HTTP client: {}", e))
        })?;

        Ok(Self {
            client,
            endpoint: config.endpoint_uri(),
            auth_header: Self::build_auth_header(config)?,
            namespace: config.namespace.replace('\\', "/"),
            operation_timeout,
            cancel: None,
            request_counter: 0,
        })
    }

    /// Attach a cancellation token observed by every subsequent request.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Build the `Authorization` header value from the configured credential.
    ///
    /// Only Basic is sent. NTLM / Negotiate / Kerberos / CredSSP need a
    /// multi-leg handshake this transport does not perform, so a credential
    /// paired with one of them is rejected. Basic over HTTP needs
    /// `allow_unencrypted`.
    pub fn build_auth_header(config: &WmiConnectionConfig) -> WmiResult<Option<String>> {
        let Some(cred) = config.credential.as_ref() else {
            return Ok(None);
        };
        if config.auth_method != WmiAuthMethod::Basic {
            return Err(WmiError::new(
                WmiErrorKind::InvalidParameter,
                format!(
                    "Authentication {:?} is not supported with explicit credentials; use Basic",
                    config.auth_method
                ),
            ));
        }
        if !config.use_ssl && !config.allow_unencrypted {
            return Err(WmiError::new(
                WmiErrorKind::InvalidParameter,
                format!(
                    "Refusing to send Basic credentials to {} over HTTP; enable SSL or allow unencrypted traffic",
                    config.computer_name
                ),
            ));
        }
        if !config.use_ssl {
            warn!("Sending Basic credentials to {} unencrypted", config.computer_name);
        }
        let encoded = base64::Engine::encode(
            &base64::engine::general_purpose::STANDARD,
            format!("{}:{}", cred.qualified_user(), cred.password),
        );
        Ok(Some(format!("Basic {}", encoded)))
    }

    /// Resource URI of a class in this session's namespace.
    pub fn resource_uri(&self, class_name: &str) -> String {
        format!("{}/{}/{}", NS_WMI_BASE, self.namespace, class_name)
    }

    /// `PT<seconds>.<millis>S` as required by `wsman:OperationTimeout`.
    fn operation_timeout_xml(&self) -> String {
        format!(
            "PT{}.{:03}S",
            self.operation_timeout.as_secs(),
            self.operation_timeout.subsec_millis()
        )
    }

    // ─── Method Invocation ───────────────────────────────────────────

    /// Invoke a WMI method and return the output parameters
    /// (`ReturnValue` plus any out-parameters).
    pub async fn invoke_method(
        &mut self,
        class_name: &str,
        method_name: &str,
        selectors: &[(&str, &str)],
        params: &[MethodParameter],
    ) -> WmiResult<HashMap<String, String>> {
        let resource_uri = self.resource_uri(class_name);
        let action = format!("{}/{}", resource_uri, method_name);
        let body = Self::method_input_xml(&resource_uri, method_name, params);
        let envelope = self.envelope(&resource_uri, &action, selectors, &body);

        debug!("Invoking {}.{} on {}", class_name, method_name, self.endpoint);
        let response = self.send(&envelope).await?;
        parse_method_response(&response, method_name)
    }

    fn method_input_xml(resource_uri: &str, method_name: &str, params: &[MethodParameter]) -> String {
        if params.is_empty() {
            return format!(r#"<p:{method_name}_INPUT xmlns:p="{resource_uri}"/>"#);
        }
        let params_xml = params
            .iter()
            .map(|p| match p.value.to_wire() {
                Some(v) => format!("<p:{name}>{value}</p:{name}>", name = p.name, value = xml_escape(&v)),
                None => format!(r#"<p:{name} xsi:nil="true"/>"#, name = p.name),
            })
            .collect::<Vec<_>>()
            .join("");
        format!(
            r#"<p:{method_name}_INPUT xmlns:p="{resource_uri}" xmlns:xsi="{NS_XSI}">{params_xml}</p:{method_name}_INPUT>"#
        )
    }

    // ─── Enumeration ─────────────────────────────────────────────────

    /// Run a WQL query and return every instance as a property map.
    pub async fn wql_query(&mut self, wql: &str) -> WmiResult<Vec<HashMap<String, String>>> {
        let resource_uri = format!("{}/{}/*", NS_WMI_BASE, self.namespace);

        let body = format!(
            r#"<wsen:Enumerate><wsman:OptimizeEnumeration/><wsman:MaxElements>{max}</wsman:MaxElements><wsman:Filter Dialect="{WQL_DIALECT}">{filter}</wsman:Filter></wsen:Enumerate>"#,
            max = DEFAULT_MAX_ELEMENTS,
            filter = xml_escape(wql),
        );
        let envelope = self.envelope(&resource_uri, ACTION_ENUMERATE, &[], &body);
        let response = self.send(&envelope).await?;
        let mut page = parse_enumeration_page(&response)?;
        let mut items = std::mem::take(&mut page.items);

        while !page.end_of_sequence {
            let Some(context) = page.context.take() else { break };
            let body = format!(
                r#"<wsen:Pull><wsen:EnumerationContext>{ctx}</wsen:EnumerationContext><wsman:MaxElements>{max}</wsman:MaxElements></wsen:Pull>"#,
                ctx = xml_escape(&context),
                max = DEFAULT_MAX_ELEMENTS,
            );
            let envelope = self.envelope(&resource_uri, ACTION_PULL, &[], &body);
            let response = self.send(&envelope).await?;
            page = parse_enumeration_page(&response)?;
            items.append(&mut page.items);
        }

        debug!("WQL query returned {} instance(s): {}", items.len(), wql);
        Ok(items)
    }

    // ─── Envelope ────────────────────────────────────────────────────

    fn envelope(
        &self,
        resource_uri: &str,
        action: &str,
        selectors: &[(&str, &str)],
        body: &str,
    ) -> String {
        let selector_set = if selectors.is_empty() {
            String::new()
        } else {
            let inner: String = selectors
                .iter()
                .map(|(k, v)| {
                    format!(r#"<wsman:Selector Name="{}">{}</wsman:Selector>"#, xml_escape(k), xml_escape(v))
                })
                .collect();
            format!("<wsman:SelectorSet>{}</wsman:SelectorSet>", inner)
        };

        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="{NS_SOAP}" xmlns:wsa="{NS_WSA}" xmlns:wsman="{NS_WSMAN}" xmlns:wsen="{NS_WSEN}">
  <s:Header>
    <wsa:To>{endpoint}</wsa:To>
    <wsman:ResourceURI s:mustUnderstand="true">{resource_uri}</wsman:ResourceURI>
    <wsa:Action s:mustUnderstand="true">{action}</wsa:Action>
    <wsa:MessageID>uuid:{msg_id}</wsa:MessageID>
    <wsman:MaxEnvelopeSize s:mustUnderstand="true">{max_env}</wsman:MaxEnvelopeSize>
    <wsman:OperationTimeout>{timeout}</wsman:OperationTimeout>
    <wsa:ReplyTo><wsa:Address>{ANONYMOUS}</wsa:Address></wsa:ReplyTo>
    {selector_set}
  </s:Header>
  <s:Body>{body}</s:Body>
</s:Envelope>"#,
            endpoint = self.endpoint,
            msg_id = Uuid::new_v4(),
            max_env = DEFAULT_MAX_ENVELOPE,
            timeout = self.operation_timeout_xml(),
        )
    }

    // ─── HTTP Layer ──────────────────────────────────────────────────

    async fn send(&mut self, envelope: &str) -> WmiResult<String> {
        match self.cancel.clone() {
            Some(token) => {
                let endpoint = self.endpoint.clone();
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        warn!("WMI request to {} cancelled", endpoint);
                        Err(WmiError::cancelled())
                    }
                    res = self.send_raw(envelope) => res,
                }
            }
            None => self.send_raw(envelope).await,
        }
    }

    async fn send_raw(&mut self, envelope: &str) -> WmiResult<String> {
        self.request_counter += 1;
        let req_id = self.request_counter;

        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static("application/soap+xml;charset=UTF-8"),
        );
        if let Some(ref auth) = self.auth_header {
            let value = HeaderValue::from_str(auth).map_err(|e| {
                WmiError::new(WmiErrorKind::InvalidParameter, format!("Invalid auth header: {}", e))
            })?;
            headers.insert(AUTHORIZATION, value);
        }

        debug!("WMI request #{} to {} ({} bytes)", req_id, self.endpoint, envelope.len());
        trace!("WMI request #{} body:\n{}", req_id, envelope);

        let resp = self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .body(envelope.to_string())
            .send()
            .await
            .map_err(|e| {
                let kind = if e.is_timeout() { WmiErrorKind::Timeout } else { WmiErrorKind::Transport };
                WmiError::new(kind, format!("WMI HTTP request failed: {}", e))
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            WmiError::new(WmiErrorKind::Transport, format!("Failed to read WMI response body: {}", e))
        })?;
        trace!("WMI response #{}: status={}, {} bytes", req_id, status, body.len());

        if let Some(fault) = extract_fault(&body) {
            error!("WMI fault from {} (HTTP {}): {}", self.endpoint, status.as_u16(), fault);
            return Err(WmiError::new(WmiErrorKind::CimFault, fault));
        }
        if !status.is_success() {
            return Err(WmiError::new(
                WmiErrorKind::HttpStatus(status.as_u16()),
                format!("WMI request failed with HTTP {}", status.as_u16()),
            ));
        }
        Ok(body)
    }
}

fn is_loopback_host(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']');
    host.eq_ignore_ascii_case("localhost")
        || host.parse::<std::net::IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}

// ─── Response Parsing ────────────────────────────────────────────────

/// One page of an enumeration.
#[derive(Debug, Default)]
pub(crate) struct EnumerationPage {
    pub items: Vec<HashMap<String, String>>,
    pub context: Option<String>,
    pub end_of_sequence: bool,
}

fn body_of(doc: &XmlNode) -> WmiResult<&XmlNode> {
    doc.find("Body")
        .ok_or_else(|| WmiError::new(WmiErrorKind::Parse, "No Body element in WMI response"))
}

/// Fault text (`s:Text`, `wsman:Message` or `faultstring`) if the reply is
/// a SOAP fault. Unparseable bodies are not treated as faults here.
pub(crate) fn extract_fault(xml: &str) -> Option<String> {
    let doc = parse_document(xml).ok()?;
    let fault = doc.find("Fault")?;
    let text = fault
        .find("Message")
        .or_else(|| fault.find("Text"))
        .or_else(|| fault.find("faultstring"))
        .map(|n| n.text.trim().to_string())
        .filter(|t| !t.is_empty());
    Some(text.unwrap_or_else(|| "Unknown SOAP fault".to_string()))
}

pub(crate) fn parse_enumeration_page(xml: &str) -> WmiResult<EnumerationPage> {
    let doc = parse_document(xml)?;
    let body = body_of(&doc)?;

    let items = body
        .find("Items")
        .map(|items| items.children.iter().map(XmlNode::properties).collect())
        .unwrap_or_default();
    let context = body
        .find("EnumerationContext")
        .map(|n| n.text.trim().to_string())
        .filter(|c| !c.is_empty());
    let end_of_sequence = body.find("EndOfSequence").is_some();

    if context.is_none() && !end_of_sequence && body.find("Items").is_none() {
        return Err(WmiError::new(
            WmiErrorKind::Parse,
            "Enumeration response carried neither items nor a context",
        ));
    }

    Ok(EnumerationPage { items, context, end_of_sequence })
}

pub(crate) fn parse_method_response(xml: &str, method_name: &str) -> WmiResult<HashMap<String, String>> {
    let doc = parse_document(xml)?;
    let body = body_of(&doc)?;
    let output_name = format!("{}_OUTPUT", method_name);

    let output = body
        .find(&output_name)
        .or_else(|| body.children.first())
        .ok_or_else(|| {
            WmiError::new(WmiErrorKind::Parse, format!("No output returned for method {}", method_name))
        })?;
    if output.name != output_name {
        warn!("Expected {} but found {} in method response", output_name, output.name);
    }
    Ok(output.properties())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport() -> WmiTransport {
        WmiTransport::new(&WmiConnectionConfig::new("server01")).unwrap()
    }

    #[test]
    fn test_empty_computer_name_rejected() {
        let err = WmiTransport::new(&WmiConnectionConfig::new("  ")).unwrap_err();
        assert_eq!(err.kind, WmiErrorKind::InvalidParameter);
    }

    #[test]
    fn test_resource_uri_normalises_namespace() {
        let mut config = WmiConnectionConfig::new("server01");
        config.namespace = r"root\cimv2".to_string();
        let t = WmiTransport::new(&config).unwrap();
        assert_eq!(
            t.resource_uri("Win32_OperatingSystem"),
            "http://schemas.microsoft.com/wbem/wsman/1/wmi/root/cimv2/Win32_OperatingSystem"
        );
    }

    #[test]
    fn test_operation_timeout_format() {
        let mut config = WmiConnectionConfig::new("server01");
        config.timeout_ms = 10_000;
        assert_eq!(WmiTransport::new(&config).unwrap().operation_timeout_xml(), "PT10.000S");
        config.timeout_ms = 2_500;
        assert_eq!(WmiTransport::new(&config).unwrap().operation_timeout_xml(), "PT2.500S");
    }

    #[test]
    fn test_auth_header_basic() {
        let mut config = WmiConnectionConfig::new("server01");
        assert_eq!(WmiTransport::build_auth_header(&config).unwrap(), None);
        config.credential = Some(WmiCredential::new("admin", "pw"));
        config.auth_method = WmiAuthMethod::Basic;
        config.use_ssl = true;
        // base64("admin:pw")
        assert_eq!(
            WmiTransport::build_auth_header(&config).unwrap().as_deref(),
            Some("Basic YWRtaW46cHc=")
        );
    }

    #[test]
    fn test_basic_over_http_needs_opt_in() {
        let mut config = WmiConnectionConfig::new("server01");
        config.credential = Some(WmiCredential::new("admin", "pw"));
        config.auth_method = WmiAuthMethod::Basic;
        let err = WmiTransport::new(&config).unwrap_err();
        assert_eq!(err.kind, WmiErrorKind::InvalidParameter);

        config.allow_unencrypted = true;
        assert!(WmiTransport::build_auth_header(&config).unwrap().is_some());
    }

    #[test]
    fn test_negotiated_mechanism_with_credential_rejected() {
        let mut config = WmiConnectionConfig::new("server01");
        config.use_ssl = true;
        config.credential = Some(WmiCredential::new("admin", "pw"));
        for method in [WmiAuthMethod::Negotiate, WmiAuthMethod::Kerberos, WmiAuthMethod::Ntlm] {
            config.auth_method = method;
            let err = WmiTransport::build_auth_header(&config).unwrap_err();
            assert_eq!(err.kind, WmiErrorKind::InvalidParameter);
        }
    }

    #[test]
    fn test_method_input_preserves_order_and_types() {
        let params = vec![
            MethodParameter::new("Flags", CimValue::SInt32(6)),
            MethodParameter::new("Reserved", CimValue::SInt32(0)),
        ];
        let xml = WmiTransport::method_input_xml("urn:x", "Win32Shutdown", &params);
        let flags = xml.find("<p:Flags>6</p:Flags>").unwrap();
        let reserved = xml.find("<p:Reserved>0</p:Reserved>").unwrap();
        assert!(flags < reserved);
        assert!(xml.starts_with("<p:Win32Shutdown_INPUT"));
    }

    #[test]
    fn test_method_input_nil_parameter() {
        let params = vec![MethodParameter::new("Password", CimValue::Null)];
        let xml = WmiTransport::method_input_xml("urn:x", "Rename", &params);
        assert!(xml.contains(r#"<p:Password xsi:nil="true"/>"#));
    }

    #[test]
    fn test_envelope_contains_selectors_and_action() {
        let t = transport();
        let env = t.envelope("urn:res", "urn:act", &[("Name", "PC<1>")], "<x/>");
        assert!(env.contains("<wsa:Action s:mustUnderstand=\"true\">urn:act</wsa:Action>"));
        assert!(env.contains(r#"<wsman:Selector Name="Name">PC&lt;1&gt;</wsman:Selector>"#));
        assert!(env.contains("<s:Body><x/></s:Body>"));
        assert!(env.contains("http://server01:5985/wsman"));
    }

    #[test]
    fn test_parse_method_response() {
        let xml = r#"<s:Envelope xmlns:s="a"><s:Body><p:Win32Shutdown_OUTPUT xmlns:p="b"><p:ReturnValue>1191</p:ReturnValue></p:Win32Shutdown_OUTPUT></s:Body></s:Envelope>"#;
        let out = parse_method_response(xml, "Win32Shutdown").unwrap();
        assert_eq!(out["ReturnValue"], "1191");
    }

    #[test]
    fn test_parse_method_response_without_body() {
        assert!(parse_method_response("<a/>", "X").is_err());
    }

    #[test]
    fn test_parse_enumeration_page_with_items() {
        let xml = r#"<s:Envelope xmlns:s="a"><s:Body><n:EnumerateResponse xmlns:n="e"><w:Items xmlns:w="m"><p:Win32_PerfRawData xmlns:p="c"><p:Name>_Total</p:Name><p:Value>42</p:Value></p:Win32_PerfRawData><p:Win32_PerfRawData xmlns:p="c"><p:Name>0</p:Name><p:Value>7</p:Value></p:Win32_PerfRawData></w:Items><w:EndOfSequence/></n:EnumerateResponse></s:Body></s:Envelope>"#;
        let page = parse_enumeration_page(xml).unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[0]["Name"], "_Total");
        assert_eq!(page.items[1]["Value"], "7");
        assert!(page.end_of_sequence);
        assert!(page.context.is_none());
    }

    #[test]
    fn test_parse_enumeration_page_context_only() {
        let xml = r#"<s:Envelope xmlns:s="a"><s:Body><n:EnumerateResponse xmlns:n="e"><n:EnumerationContext>uuid:123</n:EnumerationContext></n:EnumerateResponse></s:Body></s:Envelope>"#;
        let page = parse_enumeration_page(xml).unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.context.as_deref(), Some("uuid:123"));
        assert!(!page.end_of_sequence);
    }

    #[test]
    fn test_extract_fault() {
        let xml = r#"<s:Envelope xmlns:s="a"><s:Body><s:Fault><s:Reason><s:Text xml:lang="en-US">Access denied</s:Text></s:Reason></s:Fault></s:Body></s:Envelope>"#;
        assert_eq!(extract_fault(xml).as_deref(), Some("Access denied"));
        assert!(extract_fault("<a><b/></a>").is_none());
        assert!(extract_fault("not xml <<").is_none());
    }

    #[test]
    fn test_loopback_hosts() {
        assert!(is_loopback_host("localhost"));
        assert!(is_loopback_host("127.0.0.1"));
        assert!(is_loopback_host("[::1]"));
        assert!(!is_loopback_host("server01"));
        assert!(!is_loopback_host("10.0.0.1"));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_request_in_flight() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((sock, _)) = listener.accept().await {
                held.push(sock);
            }
        });

        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let mut config = WmiConnectionConfig::new("127.0.0.1");
        config.port = port;
        let mut t = WmiTransport::new(&config).unwrap().with_cancellation(token);
        let started = std::time::Instant::now();
        let err = t.invoke_method("Win32_OperatingSystem", "Win32Shutdown", &[], &[]).await.unwrap_err();
        assert_eq!(err.kind, WmiErrorKind::Cancelled);
        // operation timeout is 10 s
        assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let token = CancellationToken::new();
        token.cancel();
        let mut config = WmiConnectionConfig::new("192.0.2.1");
        config.timeout_ms = 500;
        let mut t = WmiTransport::new(&config).unwrap().with_cancellation(token);
        let err = t.invoke_method("Win32_OperatingSystem", "Win32Shutdown", &[], &[]).await.unwrap_err();
        assert_eq!(err.kind, WmiErrorKind::Cancelled);
    }
}
