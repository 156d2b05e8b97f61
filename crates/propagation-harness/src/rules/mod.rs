//! Rule batches and their manifest rendering.

pub mod builder;
pub mod manifest;

pub use builder::{IngressRuleBuilder, RuleOptions};
pub use manifest::{Ingress, PathType};

/// One generated rule and the identifiers derived from its index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleDescriptor {
    pub index: usize,
    pub name: String,
    pub host: String,
    pub ingress: Ingress,
}

/// Ordered, immutable batch of `n` rules indexed `0..n`.
#[derive(Debug, Clone)]
pub struct RuleSet {
    options: RuleOptions,
    rules: Vec<RuleDescriptor>,
}

impl RuleSet {
    /// Generate `n` rules from `options`.
    pub fn generate(n: usize, options: RuleOptions) -> Self {
        let rules = (0..n)
            .map(|index| RuleDescriptor {
                index,
                name: options.rule_name(index),
                host: options.rule_host(index),
                ingress: IngressRuleBuilder::from_options(index, options.clone()).build(),
            })
            .collect();

        Self { options, rules }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Options every rule was generated from.
    pub fn options(&self) -> &RuleOptions {
        &self.options
    }

    pub fn get(&self, index: usize) -> Option<&RuleDescriptor> {
        self.rules.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RuleDescriptor> {
        self.rules.iter()
    }

    /// Render the whole batch as one multi-document YAML payload.
    pub fn to_manifest(&self) -> Result<String, serde_yaml::Error> {
        manifest::to_multi_document_yaml(self.rules.iter().map(|r| &r.ingress))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_derives_identifiers_from_index() {
        let set = RuleSet::generate(3, RuleOptions::default());

        assert_eq!(set.len(), 3);
        for (i, rule) in set.iter().enumerate() {
            assert_eq!(rule.index, i);
            assert_eq!(rule.name, format!("test-ingress-{i}"));
            assert_eq!(rule.host, format!("example-{i}.com"));
            assert_eq!(rule.ingress.metadata.name, rule.name);
        }
        assert!(set.get(3).is_none());
    }

    #[test]
    fn test_generate_empty() {
        let set = RuleSet::generate(0, RuleOptions::default());
        assert!(set.is_empty());
        assert_eq!(set.to_manifest().unwrap(), "");
    }

    #[test]
    fn test_manifest_has_one_document_per_rule() {
        let set = RuleSet::generate(25, RuleOptions::default());
        let manifest = set.to_manifest().unwrap();

        assert_eq!(manifest.matches("---\n").count(), 25);
        assert_eq!(manifest.matches("kind: Ingress").count(), 25);
        assert!(manifest.contains("host: example-24.com"));
    }

    #[test]
    fn test_manifest_uses_api_field_names() {
        let set = RuleSet::generate(1, RuleOptions::default());
        let manifest = set.to_manifest().unwrap();

        assert!(manifest.contains("apiVersion: networking.k8s.io/v1"));
        assert!(manifest.contains("ingressClassName: kong"));
        assert!(manifest.contains("pathType: Exact"));
        assert!(manifest.contains("number: 80"));
        // Unset namespace and labels are omitted entirely
        assert!(!manifest.contains("namespace"));
        assert!(!manifest.contains("labels"));
    }

    #[test]
    fn test_manifest_documents_parse_back() {
        let set = RuleSet::generate(4, RuleOptions::default());
        let manifest = set.to_manifest().unwrap();

        let docs: Vec<serde_yaml::Value> = manifest
            .split("---\n")
            .filter(|d| !d.trim().is_empty())
            .map(|d| serde_yaml::from_str(d).unwrap())
            .collect();
        assert_eq!(docs.len(), 4);
        assert_eq!(docs[2]["metadata"]["name"], "test-ingress-2");
    }
}
