//! Graph files
//!
//! Loads resource graphs from JSON or YAML documents of the form
//! `{ "resources": [ ... ] }`. A sample blog graph is embedded in the binary
//! and used by the CLI and the test suite.

use super::{GraphBuilder, ResourceDescriptor, ResourceGraph};
use crate::error::DeclarationError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Embedded sample graph (compiled into the binary)
pub const SAMPLE_GRAPH: &str = include_str!("../graphs/blog.json");

/// Root structure of a graph file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphFile {
    #[serde(default)]
    pub resources: Vec<ResourceDescriptor>,
}

impl GraphFile {
    pub fn into_graph(self) -> Result<ResourceGraph, DeclarationError> {
        self.resources
            .into_iter()
            .fold(GraphBuilder::new(), GraphBuilder::resource)
            .build()
    }
}

impl ResourceGraph {
    pub fn from_json_str(content: &str) -> Result<Self, DeclarationError> {
        let file: GraphFile =
            serde_json::from_str(content).map_err(|e| DeclarationError::Parse(e.to_string()))?;
        file.into_graph()
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, DeclarationError> {
        let file: GraphFile =
            serde_yaml::from_str(content).map_err(|e| DeclarationError::Parse(e.to_string()))?;
        file.into_graph()
    }

    /// Load a graph file, choosing the format by extension (`.yaml`/`.yml`
    /// are YAML, anything else is JSON)
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        use anyhow::Context;

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read graph file {}", path.display()))?;

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"));

        let graph = if is_yaml {
            Self::from_yaml_str(&content)
        } else {
            Self::from_json_str(&content)
        };
        graph.with_context(|| format!("Invalid graph file {}", path.display()))
    }

    /// The embedded sample graph
    pub fn sample() -> Result<Self, DeclarationError> {
        Self::from_json_str(SAMPLE_GRAPH)
    }

    /// Serialize back into graph-file form
    pub fn to_file(&self) -> GraphFile {
        GraphFile {
            resources: self.resources().map(|r| (**r).clone()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Action, AssociationKind};

    #[test]
    fn test_sample_graph_loads_successfully() {
        let graph = ResourceGraph::sample().unwrap();
        assert!(!graph.is_empty(), "Sample graph should have resources");
    }

    #[test]
    fn test_post_resource_exists() {
        let graph = ResourceGraph::sample().unwrap();
        let post = graph.get("post").expect("post should exist");

        assert!(post.scope_named("published").is_some());
        assert!(post.scope_named("recent").is_some());
        assert!(post.scope_named("liked").is_none());

        let author = post.association_named("author").unwrap();
        assert_eq!(author.kind, AssociationKind::BelongsTo);
        assert_eq!(author.target, "user");
    }

    #[test]
    fn test_case_resource_overrides() {
        let graph = ResourceGraph::sample().unwrap();
        let case = graph.get("case").unwrap();
        assert_eq!(case.primary_key, "test_id");
        assert_eq!(case.collection_key(), "results");
        assert!(case.permits(Action::Create));
        assert!(!case.permits(Action::Index));
    }

    #[test]
    fn test_yaml_graph() {
        let graph = ResourceGraph::from_yaml_str(
            r#"
resources:
  - name: suite
    permitted: [name, switch]
    scopes:
      - name: switch
        rule: param
        field: switch
    associations:
      - name: cases
        kind: has_many
        target: case
        associated: true
  - name: case
    primary_key: test_id
    handles: [create, update, destroy]
"#,
        )
        .unwrap();

        let suite = graph.get("suite").unwrap();
        assert!(suite.association_named("cases").unwrap().associated);
        assert!(suite.permits(Action::Index));
        assert!(!graph.get("case").unwrap().permits(Action::Show));
    }

    #[test]
    fn test_round_trip_through_file_form() {
        let graph = ResourceGraph::sample().unwrap();
        let json = serde_json::to_string(&graph.to_file()).unwrap();
        let reloaded = ResourceGraph::from_json_str(&json).unwrap();
        assert_eq!(reloaded.len(), graph.len());
        assert_eq!(**reloaded.get("post").unwrap(), **graph.get("post").unwrap());
    }

    #[test]
    fn test_malformed_file_is_a_declaration_error() {
        let err = ResourceGraph::from_json_str("{\"resources\": 3}").unwrap_err();
        assert!(matches!(err, DeclarationError::Parse(_)));
    }
}
