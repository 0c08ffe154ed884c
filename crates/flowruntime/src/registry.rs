use flowcore::{NodeConfig, NodeTypeDefinition, PipelineError};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Read-only catalogue of node types, built once at startup.
///
/// Shared as `Arc<NodeRegistry>` by the dispatcher, the instance factory and
/// any number of concurrent pipeline runs.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    definitions: Vec<Arc<NodeTypeDefinition>>,
    index: HashMap<String, usize>,
}

impl NodeRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Build a registry from definitions, rejecting duplicate type ids
    pub fn from_definitions<I>(definitions: I) -> Result<Self, PipelineError>
    where
        I: IntoIterator<Item = NodeTypeDefinition>,
    {
        let mut builder = Self::builder();
        for definition in definitions {
            builder = builder.define(definition);
        }
        builder.build()
    }

    /// All registered type ids, in registration order
    pub fn list_types(&self) -> Vec<&str> {
        self.definitions.iter().map(|d| d.type_id.as_str()).collect()
    }

    pub fn get_definition(&self, type_id: &str) -> Option<&Arc<NodeTypeDefinition>> {
        self.index.get(type_id).map(|&i| &self.definitions[i])
    }

    pub fn contains(&self, type_id: &str) -> bool {
        self.index.contains_key(type_id)
    }

    pub fn list_by_group(&self, tag: &str) -> Vec<&Arc<NodeTypeDefinition>> {
        self.definitions.iter().filter(|d| d.in_group(tag)).collect()
    }

    /// Every group tag in use, sorted and deduplicated
    pub fn list_groups(&self) -> Vec<&str> {
        self.definitions
            .iter()
            .flat_map(|d| d.group.iter().map(String::as_str))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &Arc<NodeTypeDefinition>> {
        self.definitions.iter()
    }

    /// Form description for the editing surface; a placeholder for unknown types
    pub fn node_config(&self, type_id: &str) -> NodeConfig {
        match self.get_definition(type_id) {
            Some(definition) => definition.config(),
            None => {
                tracing::debug!("node config requested for unknown type: {}", type_id);
                NodeConfig::placeholder(type_id)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    definitions: Vec<NodeTypeDefinition>,
}

impl RegistryBuilder {
    pub fn define(mut self, definition: NodeTypeDefinition) -> Self {
        self.definitions.push(definition);
        self
    }

    pub fn build(self) -> Result<NodeRegistry, PipelineError> {
        let mut registry = NodeRegistry::default();
        for definition in self.definitions {
            if registry.index.contains_key(&definition.type_id) {
                return Err(PipelineError::DuplicateNodeType(definition.type_id));
            }
            tracing::info!("Registering node type: {}", definition.type_id);
            registry
                .index
                .insert(definition.type_id.clone(), registry.definitions.len());
            registry.definitions.push(Arc::new(definition));
        }
        Ok(registry)
    }
}
