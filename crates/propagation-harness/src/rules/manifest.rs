//! Kubernetes `networking.k8s.io/v1` Ingress document model.
//!
//! Only the fields a routing rule needs are modelled; serialization follows
//! the API's camelCase field names.

use serde::Serialize;
use std::collections::BTreeMap;

pub const INGRESS_API_VERSION: &str = "networking.k8s.io/v1";
pub const INGRESS_KIND: &str = "Ingress";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ingress {
    pub api_version: &'static str,
    pub kind: &'static str,
    pub metadata: ObjectMeta,
    pub spec: IngressSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngressSpec {
    pub ingress_class_name: String,
    pub rules: Vec<IngressRule>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngressRule {
    pub host: String,
    pub http: HttpIngressRuleValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpIngressRuleValue {
    pub paths: Vec<HttpIngressPath>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpIngressPath {
    pub backend: IngressBackend,
    pub path: String,
    pub path_type: PathType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngressBackend {
    pub service: IngressServiceBackend,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngressServiceBackend {
    pub name: String,
    pub port: ServiceBackendPort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceBackendPort {
    pub number: u16,
}

/// Ingress path matching mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum PathType {
    #[default]
    Exact,
    Prefix,
    ImplementationSpecific,
}

/// Render documents as one multi-document YAML stream.
pub fn to_multi_document_yaml<'a, I>(docs: I) -> Result<String, serde_yaml::Error>
where
    I: IntoIterator<Item = &'a Ingress>,
{
    let mut out = String::new();
    for doc in docs {
        out.push_str("---\n");
        out.push_str(&serde_yaml::to_string(doc)?);
    }
    Ok(out)
}
