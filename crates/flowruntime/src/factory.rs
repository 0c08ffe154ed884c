use crate::registry::NodeRegistry;
use chrono::Utc;
use flowcore::{InstanceOverrides, NodeError, NodeInstance};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Creates node instances seeded with their type's defaults
pub struct InstanceFactory {
    registry: Arc<NodeRegistry>,
    sequence: AtomicU64,
    issued: Mutex<HashSet<String>>,
}

impl InstanceFactory {
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self {
            registry,
            sequence: AtomicU64::new(0),
            issued: Mutex::new(HashSet::new()),
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Create an instance of `type_id`; `overrides` win over the type's defaults
    pub fn create_instance(
        &self,
        type_id: &str,
        overrides: Option<InstanceOverrides>,
    ) -> Result<NodeInstance, NodeError> {
        let definition = self
            .registry
            .get_definition(type_id)
            .ok_or_else(|| NodeError::UnknownNodeType(type_id.to_string()))?;

        let overrides = overrides.unwrap_or_default();
        let parameters = definition.resolve(&overrides.parameters);
        let id = self.next_id(type_id);

        tracing::debug!(node_id = %id, node_type = type_id, "created node instance");

        Ok(NodeInstance {
            id,
            type_id: type_id.to_string(),
            parameters,
            credentials: overrides.credentials,
        })
    }

    /// `<type>-<unix millis>-<sequence>`, checked against every id issued so far
    fn next_id(&self, type_id: &str) -> String {
        let mut issued = self.issued.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        loop {
            let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
            let candidate = format!("{}-{}-{}", type_id, Utc::now().timestamp_millis(), seq);
            if issued.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowcore::{NodeTypeDefinition, ParameterSpec};
    use serde_json::json;

    fn factory() -> InstanceFactory {
        let registry = NodeRegistry::from_definitions([NodeTypeDefinition::new("webhook", "Webhook")
            .with_parameter(ParameterSpec::string("path", "/webhook").required())
            .with_parameter(ParameterSpec::options("httpMethod", &["GET", "POST"], "POST"))
            .with_parameter(ParameterSpec::string("responseData", "{}"))])
        .unwrap();
        InstanceFactory::new(Arc::new(registry))
    }

    #[test]
    fn unknown_type_is_rejected() {
        let err = factory().create_instance("unknown-type", None).unwrap_err();
        assert_eq!(err, NodeError::UnknownNodeType("unknown-type".into()));
    }

    #[test]
    fn instance_is_seeded_with_defaults() {
        let instance = factory().create_instance("webhook", None).unwrap();
        assert_eq!(instance.parameters.get("path"), Some(&json!("/webhook")));
        assert_eq!(instance.parameters.get("httpMethod"), Some(&json!("POST")));
        assert!(instance.credentials.is_empty());
        assert!(instance.id.starts_with("webhook-"));
    }

    #[test]
    fn overrides_win() {
        let overrides = InstanceOverrides::new()
            .with_parameter("path", "/hooks/orders")
            .with_credential("token", "secret");
        let instance = factory().create_instance("webhook", Some(overrides)).unwrap();
        assert_eq!(instance.parameters.get("path"), Some(&json!("/hooks/orders")));
        assert_eq!(instance.parameters.get("httpMethod"), Some(&json!("POST")));
        assert_eq!(instance.credentials.get("token"), Some("secret"));
    }

    #[test]
    fn ids_are_unique_within_a_session() {
        let factory = factory();
        let ids: HashSet<String> = (0..500)
            .map(|_| factory.create_instance("webhook", None).unwrap().id)
            .collect();
        assert_eq!(ids.len(), 500);
    }
}
