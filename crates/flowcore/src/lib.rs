//! Core abstractions for the flow engine
//!
//! This crate provides the fundamental types and traits that all other
//! components depend on: node definitions and instances, execution results,
//! the error taxonomy, parameter validation and the backoff executor.
//! It performs no network I/O.

mod credentials;
mod definition;
mod error;
pub mod events;
mod instance;
mod node;
mod pipeline;
mod result;
mod retry;
pub mod validate;
pub mod value;

pub use credentials::Credentials;
pub use definition::{NodeConfig, NodeTypeDefinition, ParameterKind, ParameterSpec};
pub use error::{ErrorKind, FlowError, NodeError, PipelineError};
pub use events::*;
pub use instance::{InstanceOverrides, NodeInstance};
pub use node::{Node, NodeContext, NodeOutput};
pub use pipeline::{ErrorHandling, Pipeline, PipelineNode};
pub use result::{ExecutionError, ExecutionResult};
pub use retry::{run_with_retry, RetryPolicy};
pub use validate::require_params;
pub use value::{Parameters, Value};

/// Result type for flow operations
pub type Result<T> = std::result::Result<T, FlowError>;
