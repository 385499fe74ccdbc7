//! `HttpTransport` — the shipped [`cosmo_core::Transport`] implementation,
//! backed by `reqwest`.

use std::time::Duration;

use async_trait::async_trait;

use cosmo_core::{CosmoError, Transport, TransportResponse};

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone)]
pub struct HttpTransportConfig {
    /// Per-request timeout. The worker sets this to the cycle length so a
    /// hung request is never still in flight when the next cycle's deadline
    /// arrives.
    pub request_timeout: Duration,
}

impl Default for HttpTransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTPS transport for the Cosmopolite worker.
///
/// Owns TLS setup (rustls, TLS 1.2+ via `reqwest`'s `rustls-tls` feature)
/// and the single recognized response header check. Carries no retry or
/// circuit-breaking logic of its own — that policy lives in the session
/// worker, which is the thing deciding whether a failure is worth retrying
/// at all.
pub struct HttpTransport {
    http: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: HttpTransportConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .min_tls_version(reqwest::tls::Version::TLS_1_2)
            .build()
            .expect("failed to build reqwest client");
        Self { http }
    }

    pub fn default_transport() -> Self {
        Self::new(HttpTransportConfig::default())
    }
}

/// `true` iff the response carries a `Retry-After` header whose value is
/// exactly `0` — the only header bit the core inspects.
fn retry_after_zero(headers: &reqwest::header::HeaderMap) -> bool {
    headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim() == "0")
        .unwrap_or(false)
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, url: &str, body: String) -> Result<TransportResponse, CosmoError> {
        let resp = self
            .http
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| CosmoError::Transport(e.to_string()))?;

        let status = resp.status().as_u16();
        let retry_after_zero = retry_after_zero(resp.headers());

        let body = resp
            .text()
            .await
            .map_err(|e| CosmoError::Transport(e.to_string()))?;

        if !(200..300).contains(&status) {
            tracing::warn!(status, "cosmopolite endpoint returned non-2xx");
            return Err(CosmoError::Transport(format!("HTTP {status}: {body}")));
        }

        Ok(TransportResponse {
            status,
            body,
            retry_after_zero,
        })
    }
}
