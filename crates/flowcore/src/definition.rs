use crate::value::{as_number, is_truthy, type_name, Parameters, Value};
use crate::NodeError;
use serde::{Deserialize, Serialize};

/// Kind of a node parameter, as rendered by the editing surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterKind {
    String,
    Number,
    Boolean,
    Json,
    Options,
    MultiOptions,
}

impl ParameterKind {
    fn label(&self) -> &'static str {
        match self {
            ParameterKind::String => "string",
            ParameterKind::Number => "number",
            ParameterKind::Boolean => "boolean",
            ParameterKind::Json => "json",
            ParameterKind::Options => "option",
            ParameterKind::MultiOptions => "list of options",
        }
    }
}

/// One entry of a node type's parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    pub name: String,
    pub kind: ParameterKind,
    pub default_value: Value,
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterSpec {
    fn new(name: impl Into<String>, kind: ParameterKind, default_value: Value) -> Self {
        Self {
            name: name.into(),
            kind,
            default_value,
            required: false,
            allowed_options: Vec::new(),
            description: None,
        }
    }

    pub fn string(name: impl Into<String>, default: &str) -> Self {
        Self::new(name, ParameterKind::String, Value::String(default.to_string()))
    }

    pub fn number(name: impl Into<String>, default: f64) -> Self {
        Self::new(name, ParameterKind::Number, serde_json::json!(default))
    }

    pub fn integer(name: impl Into<String>, default: i64) -> Self {
        Self::new(name, ParameterKind::Number, Value::from(default))
    }

    pub fn boolean(name: impl Into<String>, default: bool) -> Self {
        Self::new(name, ParameterKind::Boolean, Value::Bool(default))
    }

    pub fn json(name: impl Into<String>, default: Value) -> Self {
        Self::new(name, ParameterKind::Json, default)
    }

    pub fn options(name: impl Into<String>, options: &[&str], default: &str) -> Self {
        let mut spec = Self::new(name, ParameterKind::Options, Value::String(default.to_string()));
        spec.allowed_options = options.iter().map(|o| o.to_string()).collect();
        spec
    }

    pub fn multi_options(name: impl Into<String>, options: &[&str], defaults: &[&str]) -> Self {
        let mut spec = Self::new(
            name,
            ParameterKind::MultiOptions,
            Value::Array(defaults.iter().map(|d| Value::String(d.to_string())).collect()),
        );
        spec.allowed_options = options.iter().map(|o| o.to_string()).collect();
        spec
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check a supplied value against the kind and allowed options.
    ///
    /// `null` is always accepted here; presence is the job of `required`.
    pub fn check(&self, value: &Value) -> Result<(), NodeError> {
        if value.is_null() {
            return Ok(());
        }
        let mismatch = || NodeError::InvalidParameter {
            name: self.name.clone(),
            expected: self.kind.label().to_string(),
            actual: type_name(value).to_string(),
        };
        match self.kind {
            ParameterKind::String => match value {
                Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(()),
                _ => Err(mismatch()),
            },
            ParameterKind::Number => as_number(value).map(|_| ()).ok_or_else(mismatch),
            ParameterKind::Boolean => value.as_bool().map(|_| ()).ok_or_else(mismatch),
            ParameterKind::Json => Ok(()),
            ParameterKind::Options => {
                let chosen = value.as_str().ok_or_else(mismatch)?;
                self.check_option(chosen)
            }
            ParameterKind::MultiOptions => {
                let items = value.as_array().ok_or_else(mismatch)?;
                for item in items {
                    let chosen = item.as_str().ok_or_else(mismatch)?;
                    self.check_option(chosen)?;
                }
                Ok(())
            }
        }
    }

    fn check_option(&self, chosen: &str) -> Result<(), NodeError> {
        if self.allowed_options.iter().any(|o| o == chosen) {
            Ok(())
        } else {
            Err(NodeError::unsupported(self.name.clone(), chosen))
        }
    }
}

/// Static description of a node type: identity, grouping and parameter schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTypeDefinition {
    pub type_id: String,
    pub display_name: String,
    pub description: String,
    pub group: Vec<String>,
    pub version: u32,
    pub parameter_schema: Vec<ParameterSpec>,
}

impl NodeTypeDefinition {
    pub fn new(type_id: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            display_name: display_name.into(),
            description: String::new(),
            group: Vec::new(),
            version: 1,
            parameter_schema: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_group(mut self, tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if !self.group.contains(&tag) {
            self.group.push(tag);
        }
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn with_parameter(mut self, spec: ParameterSpec) -> Self {
        self.parameter_schema.retain(|p| p.name != spec.name);
        self.parameter_schema.push(spec);
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameter_schema.iter().find(|p| p.name == name)
    }

    pub fn in_group(&self, tag: &str) -> bool {
        self.group.iter().any(|g| g == tag)
    }

    /// Default parameter values derived from the schema.
    pub fn defaults(&self) -> Parameters {
        self.parameter_schema
            .iter()
            .map(|p| (p.name.clone(), p.default_value.clone()))
            .collect()
    }

    pub fn required_parameters(&self) -> Vec<&str> {
        self.parameter_schema
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect()
    }

    /// Defaults overlaid with `parameters`; keys outside the schema are kept.
    pub fn resolve(&self, parameters: &Parameters) -> Parameters {
        let mut resolved = self.defaults();
        for (key, value) in parameters {
            resolved.insert(key.clone(), value.clone());
        }
        resolved
    }

    /// Validate resolved parameters: all missing required names first, then kinds.
    pub fn validate(&self, parameters: &Parameters) -> Result<(), NodeError> {
        let missing: Vec<String> = self
            .parameter_schema
            .iter()
            .filter(|p| p.required && !parameters.get(&p.name).map(is_truthy).unwrap_or(false))
            .map(|p| p.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(NodeError::missing_parameters(missing));
        }
        for spec in &self.parameter_schema {
            if let Some(value) = parameters.get(&spec.name) {
                spec.check(value)?;
            }
        }
        Ok(())
    }

    pub fn config(&self) -> NodeConfig {
        NodeConfig {
            display_name: self.display_name.clone(),
            description: self.description.clone(),
            defaults: self.defaults(),
            properties: self.parameter_schema.clone(),
            group: self.group.clone(),
            version: self.version,
        }
    }
}

/// View of a node type consumed by the editing surface to render its form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub display_name: String,
    pub description: String,
    pub defaults: Parameters,
    pub properties: Vec<ParameterSpec>,
    pub group: Vec<String>,
    pub version: u32,
}

impl NodeConfig {
    /// Stand-in for a type id the registry does not know.
    pub fn placeholder(type_id: &str) -> Self {
        Self {
            display_name: "Unknown node".to_string(),
            description: format!("Node type '{}' is not registered", type_id),
            defaults: Parameters::new(),
            properties: Vec::new(),
            group: Vec::new(),
            version: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sheets() -> NodeTypeDefinition {
        NodeTypeDefinition::new("google-sheets", "Google Sheets")
            .with_group("data")
            .with_parameter(ParameterSpec::string("spreadsheetId", "").required())
            .with_parameter(ParameterSpec::string("range", "A1:B2").required())
            .with_parameter(ParameterSpec::options("operation", &["read", "append", "update"], "read"))
    }

    #[test]
    fn defaults_follow_schema() {
        let defaults = sheets().defaults();
        assert_eq!(defaults.get("range"), Some(&json!("A1:B2")));
        assert_eq!(defaults.get("operation"), Some(&json!("read")));
    }

    #[test]
    fn validate_lists_all_missing_required() {
        let def = sheets();
        let params = def.resolve(&json!({"range": ""}).as_object().cloned().unwrap());
        let err = def.validate(&params).unwrap_err();
        assert_eq!(
            err,
            NodeError::missing_parameters(vec!["spreadsheetId".into(), "range".into()])
        );
    }

    #[test]
    fn unknown_option_is_unsupported() {
        let def = sheets();
        let params = def.resolve(
            &json!({"spreadsheetId": "abc", "operation": "bogus"})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(
            def.validate(&params).unwrap_err(),
            NodeError::unsupported("operation", "bogus")
        );
    }

    #[test]
    fn number_kind_rejects_objects() {
        let spec = ParameterSpec::number("timeoutMs", 30000.0);
        assert!(spec.check(&json!("1500")).is_ok());
        assert!(matches!(
            spec.check(&json!({})),
            Err(NodeError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn placeholder_is_safe_for_unknown_types() {
        let config = NodeConfig::placeholder("gone");
        assert_eq!(config.version, 0);
        assert!(config.properties.is_empty());
    }
}
