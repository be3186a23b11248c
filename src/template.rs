//! Test-tree templates

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::debug;

use crate::kind::TestKind;
use crate::util::files::{read_yaml, yaml_files};

/// One test definition from the test-trees directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestTemplate {
    pub name: String,
    pub worker_1_role: String,
    pub worker_2_role: String,
    /// Literals, nested mappings and `@file:` list references.
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Extra fields merged into Worker_1 of every generated entry.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub worker_1_fields: Map<String, Value>,
    /// Extra fields merged into Worker_2 of every generated entry.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub worker_2_fields: Map<String, Value>,
}

impl TestTemplate {
    pub fn kind(&self) -> TestKind {
        TestKind::from_name(&self.name)
    }
}

/// Load every template in `dir`, ordered by file name.
pub fn load_templates(dir: &Path) -> Result<Vec<TestTemplate>> {
    let mut templates = Vec::new();
    for path in yaml_files(dir)? {
        let template: TestTemplate = read_yaml(&path)?;
        debug!("Loaded test template {} from {:?}", template.name, path);
        templates.push(template);
    }
    Ok(templates)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_template() {
        let yaml = r#"
name: HTTPS_SNI
worker_1_role: client
worker_2_role: server
parameters:
  port: 443
  domain: "@file:inputs/domains.yml"
worker_2_fields:
  filter: "tcp port 443"
"#;
        let template: TestTemplate = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(template.kind(), TestKind::HttpsSni);
        assert_eq!(template.parameters.len(), 2);
        assert!(template.worker_1_fields.is_empty());
        assert_eq!(
            template.worker_2_fields.get("filter"),
            Some(&Value::from("tcp port 443"))
        );
    }

    #[test]
    fn test_parameters_default_to_empty() {
        let yaml = "name: ping\nworker_1_role: a\nworker_2_role: b\n";
        let template: TestTemplate = serde_yaml::from_str(yaml).unwrap();
        assert!(template.parameters.is_empty());
    }
}
