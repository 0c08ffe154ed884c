use crate::value::{Parameters, Value};
use crate::{Credentials, InstanceOverrides};
use serde::{Deserialize, Serialize};

/// Ordered sequence of nodes executed with output chaining
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nodes: Vec<PipelineNode>,
    #[serde(default)]
    pub on_error: ErrorHandling,
}

impl Pipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            on_error: ErrorHandling::default(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_on_error(mut self, on_error: ErrorHandling) -> Self {
        self.on_error = on_error;
        self
    }

    pub fn then(mut self, node: PipelineNode) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn add_node(&mut self, node: PipelineNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Apply `resolve` to every credential value of every node.
    pub fn resolve_credentials<F>(&mut self, mut resolve: F)
    where
        F: FnMut(&str) -> Option<String>,
    {
        for node in &mut self.nodes {
            node.credentials.resolve_with(&mut resolve);
        }
    }
}

/// Node entry in a pipeline file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineNode {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default, skip_serializing_if = "Credentials::is_empty")]
    pub credentials: Credentials,
}

impl PipelineNode {
    pub fn new(node_type: impl Into<String>) -> Self {
        Self {
            node_type: node_type.into(),
            name: None,
            parameters: Parameters::new(),
            credentials: Credentials::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    pub fn with_credential(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.credentials.insert(key, value);
        self
    }

    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.node_type)
    }

    pub fn overrides(&self) -> InstanceOverrides {
        InstanceOverrides {
            parameters: self.parameters.clone(),
            credentials: self.credentials.clone(),
        }
    }
}

/// What the runner does when a node returns a hard failure
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorHandling {
    #[default]
    StopPipeline,
    ContinueOnError,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_pipeline_file() {
        let pipeline: Pipeline = serde_json::from_value(json!({
            "name": "notify",
            "onError": "continueOnError",
            "nodes": [
                {"type": "webhook", "parameters": {"path": "/in"}},
                {"type": "slack", "name": "Ping ops",
                 "parameters": {"channel": "#ops", "text": "hi"},
                 "credentials": {"token": "env:SLACK_TOKEN"}}
            ]
        }))
        .unwrap();

        assert_eq!(pipeline.on_error, ErrorHandling::ContinueOnError);
        assert_eq!(pipeline.nodes.len(), 2);
        assert_eq!(pipeline.nodes[1].label(), "Ping ops");
        assert!(pipeline.nodes[1].credentials.has("token"));
    }

    #[test]
    fn default_policy_stops() {
        let pipeline: Pipeline =
            serde_json::from_value(json!({"name": "x", "nodes": []})).unwrap();
        assert_eq!(pipeline.on_error, ErrorHandling::StopPipeline);
    }

    #[test]
    fn credentials_can_be_resolved_in_place() {
        let mut pipeline = Pipeline::new("p")
            .then(PipelineNode::new("slack").with_credential("token", "env:TOKEN"));
        pipeline.resolve_credentials(|v| v.strip_prefix("env:").map(|name| format!("<{name}>")));
        assert_eq!(pipeline.nodes[0].credentials.get("token"), Some("<TOKEN>"));
    }
}
