//! One logical submission over HTTP: a direct cross-origin attempt, then
//! a single retry through a same-origin proxy that forwards the payload
//! verbatim. The two attempts never run in parallel — the external
//! services create side effects (tasks) per request, and a duplicate
//! submission means a duplicate task.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::MirageError;

/// Max response body size before decoding (2MB).
const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024;

/// How much of an upstream error body to keep in the failure message.
const ERROR_SNIPPET_BYTES: usize = 512;

/// A direct external endpoint plus its optional same-origin proxy path.
#[derive(Debug, Clone)]
pub struct EndpointPair {
    pub direct: String,
    pub proxy: Option<String>,
}

impl EndpointPair {
    pub fn direct_only(direct: impl Into<String>) -> Self {
        Self {
            direct: direct.into(),
            proxy: None,
        }
    }

    pub fn with_proxy(direct: impl Into<String>, proxy: impl Into<String>) -> Self {
        Self {
            direct: direct.into(),
            proxy: Some(proxy.into()),
        }
    }
}

/// One named part of a multipart submission.
#[derive(Debug, Clone)]
pub struct Part {
    pub name: String,
    pub value: PartValue,
}

#[derive(Debug, Clone)]
pub enum PartValue {
    Text(String),
    Bytes {
        data: Vec<u8>,
        filename: String,
        mime: String,
    },
}

impl Part {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: PartValue::Text(value.into()),
        }
    }

    pub fn bytes(
        name: impl Into<String>,
        data: Vec<u8>,
        filename: impl Into<String>,
        mime: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            value: PartValue::Bytes {
                data,
                filename: filename.into(),
                mime: mime.into(),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Json(Value),
    Multipart(Vec<Part>),
}

/// The outbound unit of work. Built fresh per user action by a gateway,
/// consumed by the transport. The payload is kept in our own
/// representation so the proxy fallback can re-send it.
pub struct GenerationRequest {
    pub method: reqwest::Method,
    pub target: EndpointPair,
    pub body: Option<RequestBody>,
    pub timeout: Duration,
    pub cancel: CancellationToken,
}

impl GenerationRequest {
    pub fn post_json(
        target: EndpointPair,
        payload: Value,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            method: reqwest::Method::POST,
            target,
            body: Some(RequestBody::Json(payload)),
            timeout,
            cancel,
        }
    }

    pub fn post_multipart(
        target: EndpointPair,
        parts: Vec<Part>,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            method: reqwest::Method::POST,
            target,
            body: Some(RequestBody::Multipart(parts)),
            timeout,
            cancel,
        }
    }

    pub fn get(target: EndpointPair, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            method: reqwest::Method::GET,
            target,
            body: None,
            timeout,
            cancel,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RawBody {
    Json(Value),
    Text(String),
    /// Image content types are returned as bytes and never JSON-parsed.
    Binary(Vec<u8>),
}

/// Opaque decoded reply, transient between transport and normalizer.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: RawBody,
}

impl RawResponse {
    pub fn as_json(&self) -> Option<&Value> {
        match &self.body {
            RawBody::Json(value) => Some(value),
            _ => None,
        }
    }
}

/// A transport performs one logical submission. Injected into each
/// gateway so tests can script replies without a network.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fails only if both the direct and the proxy attempt fail.
    async fn send(&self, request: &GenerationRequest) -> Result<RawResponse, MirageError>;
}

pub struct DirectProxyTransport {
    client: Client,
}

impl Default for DirectProxyTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectProxyTransport {
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()
            .expect("failed to build HTTP client");

        Self { client }
    }

    /// One network round trip against one URL. No internal retry.
    async fn attempt(&self, url: &str, request: &GenerationRequest) -> Result<RawResponse, MirageError> {
        let started = Instant::now();

        let mut builder = self.client.request(request.method.clone(), url);
        builder = match &request.body {
            Some(RequestBody::Json(payload)) => builder.json(payload),
            Some(RequestBody::Multipart(parts)) => builder.multipart(build_form(parts)),
            None => builder,
        };

        let roundtrip = async {
            let response = builder.send().await?;
            let status = response.status().as_u16();
            let content_type = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let bytes = response.bytes().await?;
            if bytes.len() > MAX_RESPONSE_BYTES {
                return Err(MirageError::TransportFailed {
                    status: Some(status),
                    message: format!(
                        "response too large: {} bytes (max {MAX_RESPONSE_BYTES})",
                        bytes.len()
                    ),
                });
            }

            if !(200..300).contains(&status) {
                let snippet =
                    String::from_utf8_lossy(&bytes[..bytes.len().min(ERROR_SNIPPET_BYTES)]);
                return Err(MirageError::TransportFailed {
                    status: Some(status),
                    message: format!("HTTP {status}: {snippet}"),
                });
            }

            let body = decode_body(content_type.as_deref(), &bytes, status)?;
            Ok(RawResponse {
                status,
                content_type,
                body,
            })
        };

        tokio::select! {
            biased;
            _ = request.cancel.cancelled() => Err(MirageError::Cancelled),
            outcome = tokio::time::timeout(request.timeout, roundtrip) => match outcome {
                Ok(result) => result,
                Err(_) => Err(MirageError::UpstreamTimeout {
                    elapsed_ms: started.elapsed().as_millis() as u64,
                }),
            },
        }
    }
}

#[async_trait]
impl Transport for DirectProxyTransport {
    async fn send(&self, request: &GenerationRequest) -> Result<RawResponse, MirageError> {
        let direct_err = match self.attempt(&request.target.direct, request).await {
            Ok(response) => return Ok(response),
            // Cancellation is terminal, not a transport failure —
            // it must not trigger the proxy fallback.
            Err(MirageError::Cancelled) => return Err(MirageError::Cancelled),
            Err(err) => err,
        };

        let Some(proxy) = request.target.proxy.as_deref() else {
            return Err(into_transport_failure(direct_err));
        };

        tracing::warn!(
            endpoint = %request.target.direct,
            error = %direct_err,
            "direct attempt failed, falling back to proxy"
        );

        match self.attempt(proxy, request).await {
            Ok(response) => Ok(response),
            Err(MirageError::Cancelled) => Err(MirageError::Cancelled),
            Err(proxy_err) => {
                tracing::warn!(proxy = %proxy, error = %proxy_err, "proxy attempt failed");
                Err(into_transport_failure(proxy_err))
            }
        }
    }
}

/// Decode by declared content type: JSON is parsed strictly, other text
/// gets a best-effort JSON parse falling back to the raw text, images
/// bypass parsing entirely.
fn decode_body(
    content_type: Option<&str>,
    bytes: &[u8],
    status: u16,
) -> Result<RawBody, MirageError> {
    let declared = content_type.unwrap_or("").to_ascii_lowercase();

    if declared.starts_with("image/") {
        return Ok(RawBody::Binary(bytes.to_vec()));
    }

    if declared.starts_with("application/json") {
        let value = serde_json::from_slice(bytes).map_err(|e| MirageError::TransportFailed {
            status: Some(status),
            message: format!("declared JSON failed to parse: {e}"),
        })?;
        return Ok(RawBody::Json(value));
    }

    let text = String::from_utf8_lossy(bytes).into_owned();
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(value) => Ok(RawBody::Json(value)),
        Err(_) => Ok(RawBody::Text(text)),
    }
}

fn build_form(parts: &[Part]) -> reqwest::multipart::Form {
    let mut form = reqwest::multipart::Form::new();
    for part in parts {
        form = match &part.value {
            PartValue::Text(value) => form.text(part.name.clone(), value.clone()),
            PartValue::Bytes {
                data,
                filename,
                mime,
            } => {
                let built = reqwest::multipart::Part::bytes(data.clone())
                    .file_name(filename.clone());
                let built = match built.mime_str(mime) {
                    Ok(with_mime) => with_mime,
                    Err(_) => reqwest::multipart::Part::bytes(data.clone())
                        .file_name(filename.clone()),
                };
                form.part(part.name.clone(), built)
            }
        };
    }
    form
}

/// Collapse a final attempt error into the transport failure the caller
/// sees. Timeouts keep their identity so callers can distinguish "provider
/// is slow" from "provider is down".
fn into_transport_failure(err: MirageError) -> MirageError {
    match err {
        MirageError::TransportFailed { .. }
        | MirageError::UpstreamTimeout { .. }
        | MirageError::Cancelled => err,
        MirageError::Request(e) => MirageError::TransportFailed {
            status: e.status().map(|s| s.as_u16()),
            message: e.to_string(),
        },
        other => MirageError::TransportFailed {
            status: None,
            message: other.to_string(),
        },
    }
}
