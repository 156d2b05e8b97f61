//! Single-attempt observation of a rule's effect.
//!
//! A probe answers one question for one sampled index: is the rule routable
//! right now? `Ok(false)` means the target answered but the effect is not
//! visible yet; `Err` means the attempt failed at the transport level.

use crate::rules::RuleOptions;
use async_trait::async_trait;
use reqwest::header::HOST;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Default per-request timeout in seconds.
pub const DEFAULT_PROBE_TIMEOUT_SECONDS: u64 = 10;

/// Body marker returned by httpbin's `/get` once a route reaches it.
pub const DEFAULT_EXPECTED_MARKER: &str = "origin";

/// Probe errors. Always treated as transient by the verifier.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("No rule at index {0}")]
    UnknownIndex(usize),
}

/// One observation attempt against the system under test.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, index: usize) -> Result<bool, ProbeError>;
}

/// Probes a rule by sending `GET {proxy_url}{path}` with the rule's host.
///
/// The rule counts as observed when the proxy returns 200 with a non-empty
/// body containing the expected marker.
pub struct HttpProbe {
    url: String,
    options: RuleOptions,
    rule_count: usize,
    expected_marker: String,
    http_client: Client,
}

impl HttpProbe {
    /// Create a probe for rules generated from `options`.
    ///
    /// `rule_count` bounds the indices this probe accepts.
    pub fn new(
        proxy_url: &str,
        options: RuleOptions,
        rule_count: usize,
        timeout: Duration,
    ) -> Result<Self, ProbeError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(proxy_url, options, rule_count, http_client))
    }

    /// Create a probe with a caller-supplied HTTP client.
    pub fn with_client(
        proxy_url: &str,
        options: RuleOptions,
        rule_count: usize,
        http_client: Client,
    ) -> Self {
        let url = format!("{}{}", proxy_url.trim_end_matches('/'), options.path);
        Self {
            url,
            options,
            rule_count,
            expected_marker: DEFAULT_EXPECTED_MARKER.to_string(),
            http_client,
        }
    }

    pub fn with_expected_marker(mut self, marker: impl Into<String>) -> Self {
        self.expected_marker = marker.into();
        self
    }

    /// Full URL every probe request is sent to.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, index: usize) -> Result<bool, ProbeError> {
        if index >= self.rule_count {
            return Err(ProbeError::UnknownIndex(index));
        }

        let response = self
            .http_client
            .get(&self.url)
            .header(HOST, self.options.rule_host(index))
            .send()
            .await?;

        // Anything but 200 means the route is not serving yet (typically 404)
        if response.status() != StatusCode::OK {
            return Ok(false);
        }

        let body = response.text().await?;
        Ok(!body.is_empty() && body.contains(&self.expected_marker))
    }
}
