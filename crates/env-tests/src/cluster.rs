//! Cluster connection and health check utilities.
//!
//! This module provides the `ClusterConnection` type for validating that the
//! proxy and the Kubernetes API are reachable before a propagation run.

use propagation_harness::config::{ConfigError, HarnessConfig};
use propagation_harness::eventual::{poll_until, PollOutcome};
use propagation_harness::rules::builder::RUN_ID_LABEL;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Host no rule will ever route, used to check the proxy answers at all.
pub const UNROUTED_HOST: &str = "unrouted.propagation-harness.invalid";

/// Cluster connection errors.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("Harness configuration invalid: {0}")]
    Config(#[from] ConfigError),

    #[error("Proxy not reachable at {addr}. Check PERF_PROXY_URL and the proxy port-forward")]
    ProxyNotReachable { addr: String },

    #[error("Service health check failed: {message}")]
    HealthCheckFailed { message: String },

    #[error("kubectl {args} failed: {message}")]
    KubectlFailed { args: String, message: String },

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Connection to the cluster under test.
pub struct ClusterConnection {
    pub config: HarnessConfig,
    pub proxy_addr: SocketAddr,
    http_client: reqwest::Client,
}

impl ClusterConnection {
    /// Load `PERF_*` configuration and check the proxy socket is open.
    ///
    /// Uses a 5s TCP connect timeout.
    pub async fn new() -> Result<Self, ClusterError> {
        Self::from_config(HarnessConfig::from_env()?)
    }

    pub fn from_config(config: HarnessConfig) -> Result<Self, ClusterError> {
        let proxy_addr = proxy_socket_addr(&config.proxy_url)?;
        Self::check_tcp(proxy_addr)?;

        let http_client = reqwest::Client::builder()
            .timeout(config.probe_timeout)
            .build()
            .map_err(|e| ClusterError::HealthCheckFailed {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            config,
            proxy_addr,
            http_client,
        })
    }

    fn check_tcp(addr: SocketAddr) -> Result<(), ClusterError> {
        TcpStream::connect_timeout(&addr, Duration::from_secs(5)).map_err(|_| {
            ClusterError::ProxyNotReachable {
                addr: addr.to_string(),
            }
        })?;
        Ok(())
    }

    /// Get the HTTP client for making requests.
    pub fn http_client(&self) -> &reqwest::Client {
        &self.http_client
    }

    /// Check the proxy answers HTTP for a host it has no route for.
    ///
    /// Any response counts; ingress controllers answer unknown hosts with 404.
    pub async fn check_proxy_responds(&self) -> Result<u16, ClusterError> {
        let url = format!(
            "{}{}",
            self.config.proxy_url.trim_end_matches('/'),
            self.config.path
        );
        let response = self
            .http_client
            .get(&url)
            .header(reqwest::header::HOST, UNROUTED_HOST)
            .send()
            .await?;

        Ok(response.status().as_u16())
    }

    /// Check the configured ingress class exists.
    pub async fn check_ingress_class(&self) -> Result<(), ClusterError> {
        self.kubectl(&["get", "ingressclass", &self.config.ingress_class])
            .await
            .map(|_| ())
    }

    /// Check the backend service exists in the target namespace.
    pub async fn check_backend_service(&self) -> Result<(), ClusterError> {
        self.kubectl(&[
            "get",
            "service",
            &self.config.backend_service,
            "--namespace",
            &self.config.namespace,
        ])
        .await
        .map(|_| ())
    }

    /// Count the rules of one run that the API server holds.
    pub async fn count_run_rules(&self, run_id: &str) -> Result<usize, ClusterError> {
        let selector = format!("{}={}", RUN_ID_LABEL, run_id);
        let stdout = self
            .kubectl(&[
                "get",
                "ingress",
                "--namespace",
                &self.config.namespace,
                "--selector",
                &selector,
                "--output",
                "name",
            ])
            .await?;

        Ok(stdout.lines().filter(|l| !l.trim().is_empty()).count())
    }

    /// Delete every rule labelled with `run_id`.
    pub async fn delete_run(&self, run_id: &str) -> Result<(), ClusterError> {
        let selector = format!("{}={}", RUN_ID_LABEL, run_id);
        self.kubectl(&[
            "delete",
            "ingress",
            "--namespace",
            &self.config.namespace,
            "--selector",
            &selector,
            "--wait=false",
        ])
        .await
        .map(|_| ())
    }

    /// Wait until no rule of `run_id` remains on the API server.
    pub async fn wait_for_run_deleted(
        &self,
        run_id: &str,
        deadline: Duration,
    ) -> Result<(), ClusterError> {
        let outcome = poll_until(
            Duration::from_secs(2),
            deadline,
            || async { self.count_run_rules(run_id).await.map(|n| n == 0) },
            |attempt, e| {
                tracing::warn!(attempt, error = %e, "Listing run rules failed, retrying");
            },
        )
        .await;

        match outcome {
            PollOutcome::Satisfied { .. } => Ok(()),
            PollOutcome::Expired {
                last_error: Some(e),
                ..
            } => Err(e),
            PollOutcome::Expired { elapsed, .. } => Err(ClusterError::HealthCheckFailed {
                message: format!("Rules of run {} still present after {:?}", run_id, elapsed),
            }),
        }
    }

    async fn kubectl(&self, args: &[&str]) -> Result<String, ClusterError> {
        let mut command = Command::new(&self.config.kubectl);
        if let Some(kubeconfig) = &self.config.kubeconfig {
            command.arg("--kubeconfig").arg(kubeconfig);
        }
        command.args(args);

        let output = command
            .output()
            .await
            .map_err(|e| ClusterError::KubectlFailed {
                args: args.join(" "),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ClusterError::KubectlFailed {
                args: args.join(" "),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Resolve the socket address behind a proxy URL.
///
/// Falls back to the scheme's default port when the URL has none.
pub fn proxy_socket_addr(proxy_url: &str) -> Result<SocketAddr, ClusterError> {
    let invalid = |message: String| ClusterError::HealthCheckFailed { message };

    let url = reqwest::Url::parse(proxy_url)
        .map_err(|e| invalid(format!("Invalid proxy URL {}: {}", proxy_url, e)))?;
    let host = url
        .host_str()
        .ok_or_else(|| invalid(format!("Proxy URL {} has no host", proxy_url)))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| invalid(format!("Proxy URL {} has no port", proxy_url)))?;

    (host, port)
        .to_socket_addrs()
        .map_err(|e| invalid(format!("Cannot resolve {}: {}", host, e)))?
        .next()
        .ok_or_else(|| invalid(format!("No address for {}", host)))
}
