//! Harness configuration.
//!
//! Configuration is loaded from `PERF_*` environment variables. Only the
//! proxy URL is required; everything else falls back to the defaults used
//! for the basic 10000-rule performance run.

use crate::probe::{DEFAULT_EXPECTED_MARKER, DEFAULT_PROBE_TIMEOUT_SECONDS};
use crate::rules::builder::{
    DEFAULT_BACKEND_PORT, DEFAULT_BACKEND_SERVICE, DEFAULT_INGRESS_CLASS, DEFAULT_PATH,
};
use crate::rules::RuleOptions;
use crate::sample::DEFAULT_SAMPLE_SIZE;
use crate::submit::DEFAULT_APPLY_TIMEOUT_SECONDS;
use crate::verify::{
    VerifierSettings, DEFAULT_POLL_INTERVAL_MS, DEFAULT_PROPAGATION_TIMEOUT_SECONDS,
};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Default number of rules submitted in one batch.
pub const DEFAULT_RULE_COUNT: usize = 10_000;

/// Default kubectl binary.
pub const DEFAULT_KUBECTL: &str = "kubectl";

/// Default namespace the rules are applied to.
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {var}: {message}")]
    InvalidValue { var: String, message: String },
}

/// Propagation harness configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Base URL of the proxy under test (e.g. "http://172.18.0.240").
    pub proxy_url: String,

    /// Kubeconfig passed to kubectl; kubectl's own default when unset.
    pub kubeconfig: Option<PathBuf>,

    /// kubectl binary (default: "kubectl").
    pub kubectl: String,

    /// Namespace the rules are applied to (default: "default").
    pub namespace: String,

    /// Number of rules in the batch (default: 10000).
    pub rule_count: usize,

    /// Number of random indices verified in addition to the two boundaries (default: 10).
    pub sample_size: usize,

    /// Interval between probe attempts (default: 500ms).
    pub poll_interval: Duration,

    /// Per-rule deadline for becoming routable (default: 300s).
    pub propagation_timeout: Duration,

    /// Per-request HTTP timeout (default: 10s).
    pub probe_timeout: Duration,

    /// Timeout for the apply call (default: 600s).
    pub apply_timeout: Duration,

    pub ingress_class: String,
    pub backend_service: String,
    pub backend_port: u16,

    /// Path routed by every rule and requested by every probe (default: "/get").
    pub path: String,

    /// Body marker that proves a request reached the backend (default: "origin").
    pub expected_marker: String,

    /// Emit JSON-formatted logs.
    pub json_logs: bool,
}

impl HarnessConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let proxy_url = vars
            .get("PERF_PROXY_URL")
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar("PERF_PROXY_URL".to_string()))?
            .clone();

        if !(proxy_url.starts_with("http://") || proxy_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue {
                var: "PERF_PROXY_URL".to_string(),
                message: format!("must start with http:// or https://, got '{}'", proxy_url),
            });
        }

        let kubeconfig = vars
            .get("PERF_KUBECONFIG")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        let kubectl = string_or(vars, "PERF_KUBECTL", DEFAULT_KUBECTL);
        let namespace = string_or(vars, "PERF_NAMESPACE", DEFAULT_NAMESPACE);

        let rule_count = parse_positive(vars, "PERF_RULE_COUNT", DEFAULT_RULE_COUNT)?;

        let sample_size = match vars.get("PERF_SAMPLE_SIZE") {
            Some(value) => value.parse().map_err(|e| ConfigError::InvalidValue {
                var: "PERF_SAMPLE_SIZE".to_string(),
                message: format!("must be a non-negative integer, got '{}': {}", value, e),
            })?,
            None => DEFAULT_SAMPLE_SIZE,
        };

        let poll_interval = Duration::from_millis(parse_positive(
            vars,
            "PERF_POLL_INTERVAL_MS",
            DEFAULT_POLL_INTERVAL_MS,
        )?);

        let propagation_timeout = Duration::from_secs(parse_positive(
            vars,
            "PERF_PROPAGATION_TIMEOUT_SECS",
            DEFAULT_PROPAGATION_TIMEOUT_SECONDS,
        )?);

        let probe_timeout = Duration::from_secs(parse_positive(
            vars,
            "PERF_PROBE_TIMEOUT_SECS",
            DEFAULT_PROBE_TIMEOUT_SECONDS,
        )?);

        let apply_timeout = Duration::from_secs(parse_positive(
            vars,
            "PERF_APPLY_TIMEOUT_SECS",
            DEFAULT_APPLY_TIMEOUT_SECONDS,
        )?);

        let ingress_class = string_or(vars, "PERF_INGRESS_CLASS", DEFAULT_INGRESS_CLASS);
        let backend_service = string_or(vars, "PERF_BACKEND_SERVICE", DEFAULT_BACKEND_SERVICE);
        let backend_port = parse_positive(vars, "PERF_BACKEND_PORT", DEFAULT_BACKEND_PORT)?;

        let path = string_or(vars, "PERF_PATH", DEFAULT_PATH);
        if !path.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                var: "PERF_PATH".to_string(),
                message: format!("must start with '/', got '{}'", path),
            });
        }

        let expected_marker = string_or(vars, "PERF_EXPECTED_MARKER", DEFAULT_EXPECTED_MARKER);

        let json_logs = match vars.get("PERF_LOG_JSON").map(String::as_str) {
            None | Some("") | Some("false") | Some("0") => false,
            Some("true") | Some("1") => true,
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    var: "PERF_LOG_JSON".to_string(),
                    message: format!("must be true or false, got '{}'", other),
                })
            }
        };

        Ok(Self {
            proxy_url,
            kubeconfig,
            kubectl,
            namespace,
            rule_count,
            sample_size,
            poll_interval,
            propagation_timeout,
            probe_timeout,
            apply_timeout,
            ingress_class,
            backend_service,
            backend_port,
            path,
            expected_marker,
            json_logs,
        })
    }

    /// Rule options derived from this configuration, labelled with `run_id`.
    pub fn rule_options(&self, run_id: Uuid) -> RuleOptions {
        RuleOptions {
            namespace: Some(self.namespace.clone()),
            ingress_class: self.ingress_class.clone(),
            backend_service: self.backend_service.clone(),
            backend_port: self.backend_port,
            path: self.path.clone(),
            ..Default::default()
        }
        .with_run_id(run_id)
    }

    /// Verifier polling settings derived from this configuration.
    pub fn verifier_settings(&self) -> VerifierSettings {
        VerifierSettings {
            poll_interval: self.poll_interval,
            deadline: self.propagation_timeout,
        }
    }
}

fn string_or(vars: &HashMap<String, String>, var: &str, default: &str) -> String {
    vars.get(var)
        .filter(|v| !v.is_empty())
        .cloned()
        .unwrap_or_else(|| default.to_string())
}

fn parse_positive<T>(vars: &HashMap<String, String>, var: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let Some(value_str) = vars.get(var) else {
        return Ok(default);
    };

    let value: T = value_str.parse().map_err(|e| ConfigError::InvalidValue {
        var: var.to_string(),
        message: format!("must be a valid positive integer, got '{}': {}", value_str, e),
    })?;

    if value == T::default() {
        return Err(ConfigError::InvalidValue {
            var: var.to_string(),
            message: "must be greater than 0".to_string(),
        });
    }

    Ok(value)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        HashMap::from([(
            "PERF_PROXY_URL".to_string(),
            "http://172.18.0.240".to_string(),
        )])
    }

    #[test]
    fn test_defaults() {
        let config = HarnessConfig::from_vars(&base_vars()).unwrap();

        assert_eq!(config.proxy_url, "http://172.18.0.240");
        assert!(config.kubeconfig.is_none());
        assert_eq!(config.kubectl, "kubectl");
        assert_eq!(config.namespace, "default");
        assert_eq!(config.rule_count, 10_000);
        assert_eq!(config.sample_size, 10);
        assert_eq!(config.poll_interval, Duration::from_millis(500));
        assert_eq!(config.propagation_timeout, Duration::from_secs(300));
        assert_eq!(config.probe_timeout, Duration::from_secs(10));
        assert_eq!(config.apply_timeout, Duration::from_secs(600));
        assert_eq!(config.ingress_class, "kong");
        assert_eq!(config.backend_service, "httpbin");
        assert_eq!(config.backend_port, 80);
        assert_eq!(config.path, "/get");
        assert_eq!(config.expected_marker, "origin");
        assert!(!config.json_logs);
    }

    #[test]
    fn test_missing_proxy_url() {
        let result = HarnessConfig::from_vars(&HashMap::new());
        assert!(matches!(result, Err(ConfigError::MissingEnvVar(v)) if v == "PERF_PROXY_URL"));
    }

    #[test]
    fn test_proxy_url_requires_scheme() {
        let mut vars = base_vars();
        vars.insert("PERF_PROXY_URL".to_string(), "172.18.0.240".to_string());
        let result = HarnessConfig::from_vars(&vars);
        assert!(matches!(result, Err(ConfigError::InvalidValue { var, .. }) if var == "PERF_PROXY_URL"));
    }

    #[test]
    fn test_overrides() {
        let mut vars = base_vars();
        vars.insert("PERF_KUBECONFIG".to_string(), "/tmp/kind".to_string());
        vars.insert("PERF_RULE_COUNT".to_string(), "500".to_string());
        vars.insert("PERF_SAMPLE_SIZE".to_string(), "0".to_string());
        vars.insert("PERF_POLL_INTERVAL_MS".to_string(), "250".to_string());
        vars.insert("PERF_PROPAGATION_TIMEOUT_SECS".to_string(), "60".to_string());
        vars.insert("PERF_BACKEND_PORT".to_string(), "8080".to_string());
        vars.insert("PERF_LOG_JSON".to_string(), "true".to_string());

        let config = HarnessConfig::from_vars(&vars).unwrap();
        assert_eq!(config.kubeconfig, Some(PathBuf::from("/tmp/kind")));
        assert_eq!(config.rule_count, 500);
        assert_eq!(config.sample_size, 0);
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.propagation_timeout, Duration::from_secs(60));
        assert_eq!(config.backend_port, 8080);
        assert!(config.json_logs);
    }

    #[test]
    fn test_zero_rule_count_rejected() {
        let mut vars = base_vars();
        vars.insert("PERF_RULE_COUNT".to_string(), "0".to_string());
        let err = HarnessConfig::from_vars(&vars).unwrap_err();
        assert!(err.to_string().contains("PERF_RULE_COUNT"));
        assert!(err.to_string().contains("greater than 0"));
    }

    #[test]
    fn test_non_numeric_interval_rejected() {
        let mut vars = base_vars();
        vars.insert("PERF_POLL_INTERVAL_MS".to_string(), "fast".to_string());
        let err = HarnessConfig::from_vars(&vars).unwrap_err();
        assert!(err.to_string().contains("PERF_POLL_INTERVAL_MS"));
    }

    #[test]
    fn test_port_out_of_range_rejected() {
        let mut vars = base_vars();
        vars.insert("PERF_BACKEND_PORT".to_string(), "70000".to_string());
        assert!(HarnessConfig::from_vars(&vars).is_err());
    }

    #[test]
    fn test_path_must_be_absolute() {
        let mut vars = base_vars();
        vars.insert("PERF_PATH".to_string(), "get".to_string());
        assert!(HarnessConfig::from_vars(&vars).is_err());
    }

    #[test]
    fn test_invalid_log_json_rejected() {
        let mut vars = base_vars();
        vars.insert("PERF_LOG_JSON".to_string(), "yes".to_string());
        assert!(HarnessConfig::from_vars(&vars).is_err());
    }

    #[test]
    fn test_derived_rule_options_and_settings() {
        let config = HarnessConfig::from_vars(&base_vars()).unwrap();

        let run_id = Uuid::new_v4();
        let options = config.rule_options(run_id);
        assert_eq!(options.namespace.as_deref(), Some("default"));
        assert_eq!(options.run_id(), Some(run_id.to_string().as_str()));
        assert_eq!(options.ingress_class, "kong");
        assert_eq!(options.rule_host(5), "example-5.com");

        let settings = config.verifier_settings();
        assert_eq!(settings.poll_interval, Duration::from_millis(500));
        assert_eq!(settings.deadline, Duration::from_secs(300));
    }
}
