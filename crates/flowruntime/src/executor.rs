use crate::dispatcher::NodeDispatcher;
use crate::factory::InstanceFactory;
use chrono::Utc;
use flowcore::{
    ErrorHandling, ExecutionEvent, ExecutionId, ExecutionResult, FlowError, NodeInstance,
    Pipeline, Value,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// Executes pipelines node by node, feeding each node's output to the next
pub struct PipelineExecutor {
    factory: Arc<InstanceFactory>,
    dispatcher: Arc<NodeDispatcher>,
}

impl PipelineExecutor {
    pub fn new(factory: Arc<InstanceFactory>, dispatcher: Arc<NodeDispatcher>) -> Self {
        Self { factory, dispatcher }
    }

    /// Instantiate every node of the pipeline; fails on the first unknown type
    pub fn instantiate(&self, pipeline: &Pipeline) -> Result<Vec<NodeInstance>, FlowError> {
        pipeline
            .nodes
            .iter()
            .map(|node| {
                self.factory
                    .create_instance(&node.node_type, Some(node.overrides()))
                    .map_err(FlowError::from)
            })
            .collect()
    }

    /// Execute a pipeline and return the per-step report.
    ///
    /// Node N+1 starts only after node N has resolved. A hard failure either
    /// stops the run or is skipped over, as the pipeline's `on_error` says.
    pub async fn execute(
        &self,
        pipeline: &Pipeline,
        initial_input: Option<Value>,
    ) -> Result<PipelineReport, FlowError> {
        let execution_id = ExecutionId::new_v4();
        let start_time = Instant::now();
        let events = self.dispatcher.events();

        // Every type must resolve before anything runs
        let instances = self.instantiate(pipeline)?;

        events.emit(ExecutionEvent::PipelineStarted {
            execution_id,
            pipeline: pipeline.name.clone(),
            node_count: instances.len(),
            timestamp: Utc::now(),
        });

        tracing::info!("Starting pipeline execution: {} ({})", pipeline.name, execution_id);

        let mut steps = Vec::with_capacity(instances.len());
        let mut input = initial_input;
        let mut completed = true;

        for (index, (instance, spec)) in instances.iter().zip(&pipeline.nodes).enumerate() {
            let step_start = Instant::now();
            let result = self
                .dispatcher
                .execute_in(execution_id, instance, input.as_ref(), None)
                .await;
            let duration_ms = step_start.elapsed().as_millis() as u64;

            let failed = !result.success();
            if let Some(data) = result.data() {
                input = Some(data.clone());
            }

            steps.push(StepReport {
                index,
                node_id: instance.id.clone(),
                node_type: instance.type_id.clone(),
                name: spec.label().to_string(),
                duration_ms,
                result,
            });

            if failed {
                match pipeline.on_error {
                    ErrorHandling::StopPipeline => {
                        tracing::warn!("Pipeline {} stopped at step {}", pipeline.name, index);
                        completed = false;
                        break;
                    }
                    ErrorHandling::ContinueOnError => {
                        tracing::warn!(
                            "Step {} of pipeline {} failed, continuing",
                            index,
                            pipeline.name
                        );
                    }
                }
            }
        }

        let duration_ms = start_time.elapsed().as_millis() as u64;
        let success = completed && steps.iter().all(|s| s.result.success());

        events.emit(ExecutionEvent::PipelineCompleted {
            execution_id,
            pipeline: pipeline.name.clone(),
            success,
            duration_ms,
            timestamp: Utc::now(),
        });

        tracing::info!(
            "Pipeline {} finished in {}ms ({}/{} steps run)",
            pipeline.name,
            duration_ms,
            steps.len(),
            pipeline.nodes.len()
        );

        Ok(PipelineReport {
            execution_id,
            pipeline: pipeline.name.clone(),
            completed,
            duration_ms,
            output: steps.last().and_then(|s| s.result.data().cloned()),
            steps,
        })
    }
}

/// Result of a pipeline run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineReport {
    pub execution_id: ExecutionId,
    pub pipeline: String,
    /// False when the run was stopped by a failing node
    pub completed: bool,
    pub duration_ms: u64,
    /// Data of the last step, when it produced any
    pub output: Option<Value>,
    pub steps: Vec<StepReport>,
}

impl PipelineReport {
    pub fn succeeded(&self) -> bool {
        self.completed && self.steps.iter().all(|s| s.result.success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| !s.result.success())
    }

    pub fn degraded(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|s| s.result.is_degraded())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepReport {
    pub index: usize,
    pub node_id: String,
    pub node_type: String,
    pub name: String,
    pub duration_ms: u64,
    pub result: ExecutionResult,
}
