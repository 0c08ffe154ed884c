//! Node execution runtime
//!
//! This crate provides the node definitions registry, the instance factory,
//! the dispatcher that resolves instances to executable logic, and the
//! sequential pipeline executor.

mod dispatcher;
mod executor;
mod factory;
mod registry;
mod runtime;

pub use dispatcher::NodeDispatcher;
pub use executor::{PipelineExecutor, PipelineReport, StepReport};
pub use factory::InstanceFactory;
pub use registry::{NodeRegistry, RegistryBuilder};
pub use runtime::{ConfigError, FlowRuntime, RuntimeConfig};
