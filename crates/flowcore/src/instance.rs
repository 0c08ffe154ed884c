use crate::value::{Parameters, Value};
use crate::Credentials;
use serde::{Deserialize, Serialize};

/// A node placed in a pipeline: a type reference plus its current settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeInstance {
    pub id: String,
    pub type_id: String,
    pub parameters: Parameters,
    /// Never serialized back out; populated by the credentials collaborator.
    #[serde(default, skip_serializing)]
    pub credentials: Credentials,
}

impl NodeInstance {
    pub fn set_parameter(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.parameters.insert(name.into(), value.into());
    }

    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }
}

/// User-supplied values applied on top of a type's defaults at creation time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstanceOverrides {
    pub parameters: Parameters,
    pub credentials: Credentials,
}

impl InstanceOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_credential(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.credentials.insert(key, value);
        self
    }
}
