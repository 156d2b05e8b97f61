//! Builder for a single routing rule.
//!
//! Every field left unset resolves to a fixed default when the options are
//! constructed, so a generated rule is valid without the caller touching
//! any attribute.
//!
//! # Example
//! ```rust
//! use propagation_harness::rules::IngressRuleBuilder;
//!
//! let ingress = IngressRuleBuilder::new(7)
//!     .with_ingress_class("kong")
//!     .with_backend("httpbin", 80)
//!     .build();
//! assert_eq!(ingress.metadata.name, "test-ingress-7");
//! ```

use super::manifest::{
    HttpIngressPath, HttpIngressRuleValue, Ingress, IngressBackend, IngressRule,
    IngressServiceBackend, IngressSpec, ObjectMeta, PathType, ServiceBackendPort,
    INGRESS_API_VERSION, INGRESS_KIND,
};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Default rule name prefix; rule `i` is named `test-ingress-{i}`.
pub const DEFAULT_NAME_PREFIX: &str = "test-ingress";

/// Default host prefix; rule `i` routes host `example-{i}.com`.
pub const DEFAULT_HOST_PREFIX: &str = "example";

/// Default host domain.
pub const DEFAULT_HOST_DOMAIN: &str = "com";

/// Default ingress class.
pub const DEFAULT_INGRESS_CLASS: &str = "kong";

/// Default backend service name.
pub const DEFAULT_BACKEND_SERVICE: &str = "httpbin";

/// Default backend service port.
pub const DEFAULT_BACKEND_PORT: u16 = 80;

/// Default routed path.
pub const DEFAULT_PATH: &str = "/get";

/// Label stamped on every rule of a run so the batch can be found and
/// deleted with a single selector.
pub const RUN_ID_LABEL: &str = "propagation-harness/run-id";

/// Per-batch rule options with defaults applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOptions {
    pub name_prefix: String,
    pub host_prefix: String,
    pub host_domain: String,
    pub namespace: Option<String>,
    pub ingress_class: String,
    pub backend_service: String,
    pub backend_port: u16,
    pub path: String,
    pub path_type: PathType,
    pub labels: BTreeMap<String, String>,
}

impl Default for RuleOptions {
    fn default() -> Self {
        Self {
            name_prefix: DEFAULT_NAME_PREFIX.to_string(),
            host_prefix: DEFAULT_HOST_PREFIX.to_string(),
            host_domain: DEFAULT_HOST_DOMAIN.to_string(),
            namespace: None,
            ingress_class: DEFAULT_INGRESS_CLASS.to_string(),
            backend_service: DEFAULT_BACKEND_SERVICE.to_string(),
            backend_port: DEFAULT_BACKEND_PORT,
            path: DEFAULT_PATH.to_string(),
            path_type: PathType::default(),
            labels: BTreeMap::new(),
        }
    }
}

impl RuleOptions {
    /// Name of the rule at `index`.
    pub fn rule_name(&self, index: usize) -> String {
        format!("{}-{}", self.name_prefix, index)
    }

    /// Host routed by the rule at `index`.
    pub fn rule_host(&self, index: usize) -> String {
        format!("{}-{}.{}", self.host_prefix, index, self.host_domain)
    }

    /// Label every rule with `run_id`.
    pub fn with_run_id(mut self, run_id: Uuid) -> Self {
        self.labels
            .insert(RUN_ID_LABEL.to_string(), run_id.to_string());
        self
    }

    /// Run identifier label, if set.
    pub fn run_id(&self) -> Option<&str> {
        self.labels.get(RUN_ID_LABEL).map(String::as_str)
    }
}

/// Fluent builder for one Ingress rule.
pub struct IngressRuleBuilder {
    index: usize,
    options: RuleOptions,
}

impl IngressRuleBuilder {
    /// Start a rule at `index` with default options.
    pub fn new(index: usize) -> Self {
        Self::from_options(index, RuleOptions::default())
    }

    /// Start a rule at `index` from existing options.
    pub fn from_options(index: usize, options: RuleOptions) -> Self {
        Self { index, options }
    }

    pub fn with_ingress_class(mut self, class: &str) -> Self {
        self.options.ingress_class = class.to_string();
        self
    }

    pub fn with_backend(mut self, service: &str, port: u16) -> Self {
        self.options.backend_service = service.to_string();
        self.options.backend_port = port;
        self
    }

    pub fn with_path(mut self, path: &str, path_type: PathType) -> Self {
        self.options.path = path.to_string();
        self.options.path_type = path_type;
        self
    }

    pub fn with_namespace(mut self, namespace: &str) -> Self {
        self.options.namespace = Some(namespace.to_string());
        self
    }

    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.options.labels.insert(key.to_string(), value.to_string());
        self
    }

    /// Build the configured Ingress.
    pub fn build(self) -> Ingress {
        let RuleOptions {
            namespace,
            ingress_class,
            backend_service,
            backend_port,
            path,
            path_type,
            labels,
            ..
        } = &self.options;

        Ingress {
            api_version: INGRESS_API_VERSION,
            kind: INGRESS_KIND,
            metadata: ObjectMeta {
                name: self.options.rule_name(self.index),
                namespace: namespace.clone(),
                labels: labels.clone(),
            },
            spec: IngressSpec {
                ingress_class_name: ingress_class.clone(),
                rules: vec![IngressRule {
                    host: self.options.rule_host(self.index),
                    http: HttpIngressRuleValue {
                        paths: vec![HttpIngressPath {
                            backend: IngressBackend {
                                service: IngressServiceBackend {
                                    name: backend_service.clone(),
                                    port: ServiceBackendPort {
                                        number: *backend_port,
                                    },
                                },
                            },
                            path: path.clone(),
                            path_type: *path_type,
                        }],
                    },
                }],
            },
        }
    }
}
