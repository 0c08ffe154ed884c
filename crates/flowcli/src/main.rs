// crates/flowcli/src/main.rs

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use flowcore::{ExecutionEvent, NodeEvent, Pipeline, PipelineNode, Value};
use flowruntime::{FlowRuntime, PipelineReport, RuntimeConfig};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "flow")]
#[command(about = "Workflow node execution engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a pipeline file
    Run {
        /// Path to pipeline JSON file
        #[arg(short, long)]
        file: PathBuf,

        /// Input for the first node, as a JSON string
        #[arg(short, long)]
        input: Option<String>,

        /// Runtime configuration JSON file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Show verbose output
        #[arg(short, long)]
        verbose: bool,
    },

    /// Validate a pipeline file
    Validate {
        /// Path to pipeline JSON file
        file: PathBuf,
    },

    /// List available node types
    Nodes {
        /// Only list types tagged with this group
        #[arg(short, long)]
        group: Option<String>,
    },

    /// Show the configuration of a node type
    Describe {
        /// Node type id, e.g. "google-sheets"
        node_type: String,
    },

    /// Create an example pipeline
    Init {
        /// Output file path
        #[arg(short, long, default_value = "pipeline.json")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            file,
            input,
            config,
            verbose,
        } => {
            let default_level = if verbose { "debug" } else { "info" };
            tracing_subscriber::fmt()
                .with_env_filter(
                    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
                )
                .init();

            run_pipeline(&file, input, config.as_deref()).await?;
        }

        Commands::Validate { file } => {
            validate_pipeline(&file)?;
        }

        Commands::Nodes { group } => {
            list_nodes(group.as_deref())?;
        }

        Commands::Describe { node_type } => {
            describe_node(&node_type)?;
        }

        Commands::Init { output } => {
            create_example_pipeline(&output)?;
        }
    }

    Ok(())
}

/// Read a pipeline file and expand `env:NAME` credential references
fn load_pipeline(file: &Path) -> Result<Pipeline> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let mut pipeline: Pipeline = serde_json::from_str(&text)
        .with_context(|| format!("{} is not a valid pipeline", file.display()))?;

    pipeline.resolve_credentials(|value| {
        let name = value.strip_prefix("env:")?;
        Some(std::env::var(name).unwrap_or_else(|_| {
            tracing::warn!("Environment variable {} is not set", name);
            String::new()
        }))
    });
    Ok(pipeline)
}

fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    let config = match path {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

fn runtime(config: RuntimeConfig) -> Result<FlowRuntime> {
    Ok(flownodes::standard_runtime(config)?)
}

async fn run_pipeline(file: &Path, input: Option<String>, config: Option<&Path>) -> Result<()> {
    println!("🚀 Loading pipeline from: {}", file.display());

    let pipeline = load_pipeline(file)?;
    println!("📋 Pipeline: {}", pipeline.name);
    println!("   Nodes: {}", pipeline.nodes.len());
    println!("   On error: {:?}", pipeline.on_error);
    println!();

    let input: Option<Value> = input
        .map(|text| serde_json::from_str(&text).context("--input must be valid JSON"))
        .transpose()?;

    let runtime = runtime(load_config(config)?)?;

    // Subscribe to events for real-time output
    let mut events = runtime.subscribe_events();
    let event_task = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let done = matches!(event, ExecutionEvent::PipelineCompleted { .. });
            print_event(event);
            if done {
                break;
            }
        }
    });

    let report = runtime.run_pipeline(&pipeline, input).await?;
    let _ = event_task.await;

    print_summary(&report)?;

    if !report.succeeded() {
        bail!("pipeline '{}' did not succeed", report.pipeline);
    }
    Ok(())
}

fn print_event(event: ExecutionEvent) {
    match event {
        ExecutionEvent::PipelineStarted { node_count, .. } => {
            println!("▶️  Pipeline started ({} nodes)", node_count);
        }
        ExecutionEvent::NodeStarted { node_id, node_type, .. } => {
            println!("  ⚡ Starting node: {} ({})", node_id, node_type);
        }
        ExecutionEvent::NodeCompleted {
            node_id,
            degraded,
            duration_ms,
            ..
        } => {
            if degraded {
                println!("  🟡 Node {} completed with fallback data in {}ms", node_id, duration_ms);
            } else {
                println!("  ✅ Node {} completed in {}ms", node_id, duration_ms);
            }
        }
        ExecutionEvent::NodeFailed { node_id, error, .. } => {
            println!("  ❌ Node {} failed: {}", node_id, error);
        }
        ExecutionEvent::NodeEvent { node_id, event, .. } => match event {
            NodeEvent::Info { message } => println!("     ℹ️  [{}] {}", node_id, message),
            NodeEvent::Warning { message } => println!("     ⚠️  [{}] {}", node_id, message),
            NodeEvent::Retrying {
                attempt,
                delay_ms,
                error,
            } => println!(
                "     🔁 [{}] attempt {} failed ({}), retrying in {}ms",
                node_id, attempt, error, delay_ms
            ),
        },
        ExecutionEvent::PipelineCompleted {
            success,
            duration_ms,
            ..
        } => {
            if success {
                println!("✨ Pipeline completed successfully in {}ms", duration_ms);
            } else {
                println!("💥 Pipeline failed after {}ms", duration_ms);
            }
        }
    }
}

fn print_summary(report: &PipelineReport) -> Result<()> {
    println!();
    println!("📊 Execution Summary:");
    println!("   Execution ID: {}", report.execution_id);
    println!("   Steps run: {}", report.steps.len());
    for step in &report.steps {
        println!(
            "   {:>2}. {:<24} {:<9} {}ms",
            step.index + 1,
            step.name,
            step.result.status(),
            step.duration_ms
        );
        if let Some(error) = step.result.error() {
            println!("       {}", error.message);
        }
    }

    if let Some(output) = &report.output {
        println!();
        println!("📤 Output:");
        println!("{}", serde_json::to_string_pretty(output)?);
    }
    Ok(())
}

fn validate_pipeline(file: &Path) -> Result<()> {
    println!("🔍 Validating pipeline: {}", file.display());

    let pipeline = load_pipeline(file)?;
    let registry = flownodes::standard_registry()?;

    let mut problems = Vec::new();
    for (index, node) in pipeline.nodes.iter().enumerate() {
        match registry.get_definition(&node.node_type) {
            None => problems.push(format!("node {} ({}): unknown node type", index + 1, node.label())),
            Some(definition) => {
                if let Err(err) = definition.validate(&definition.resolve(&node.parameters)) {
                    problems.push(format!("node {} ({}): {}", index + 1, node.label(), err));
                }
            }
        }
    }

    if !problems.is_empty() {
        println!("❌ Pipeline has {} problem(s):", problems.len());
        for problem in &problems {
            println!("   • {}", problem);
        }
        bail!("pipeline '{}' is invalid", pipeline.name);
    }

    println!("✅ Pipeline is valid:");
    println!("   Name: {}", pipeline.name);
    println!("   Nodes: {}", pipeline.nodes.len());
    for node in &pipeline.nodes {
        println!("   • {} ({})", node.label(), node.node_type);
    }

    Ok(())
}

fn list_nodes(group: Option<&str>) -> Result<()> {
    let registry = flownodes::standard_registry()?;

    match group {
        Some(tag) => println!("📦 Node Types in group '{}':", tag),
        None => println!("📦 Available Node Types:"),
    }
    println!();

    let definitions: Vec<_> = match group {
        Some(tag) => registry.list_by_group(tag),
        None => registry.definitions().collect(),
    };
    for definition in definitions {
        println!("  • {} ({})", definition.type_id, definition.group.join(", "));
        println!("    {}", definition.description);
    }

    if group.is_none() {
        println!();
        println!("Groups: {}", registry.list_groups().join(", "));
    }
    Ok(())
}

fn describe_node(node_type: &str) -> Result<()> {
    let registry = flownodes::standard_registry()?;
    if !registry.contains(node_type) {
        println!("⚠️  Unknown node type: {}", node_type);
    }
    let config = registry.node_config(node_type);
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn create_example_pipeline(output: &Path) -> Result<()> {
    let pipeline = Pipeline::new("Review Insights")
        .with_description("Cluster app reviews, summarize them and write the summary to a sheet")
        .then(
            PipelineNode::new("review-fetch")
                .with_name("Fetch Reviews")
                .with_parameter("source", "app-store")
                .with_parameter("limit", 50),
        )
        .then(
            PipelineNode::new("kmeans-cluster")
                .with_name("Cluster")
                .with_parameter("k", 3),
        )
        .then(
            PipelineNode::new("group-by")
                .with_name("Group by Cluster")
                .with_parameter("field", "cluster"),
        )
        .then(PipelineNode::new("generate-insights").with_name("Insights"))
        .then(PipelineNode::new("sheet-export").with_name("Rows"))
        .then(
            PipelineNode::new("google-sheets")
                .with_name("Write Summary")
                .with_parameter("spreadsheetId", "your-spreadsheet-id")
                .with_parameter("range", "Summary!A1")
                .with_parameter("operation", "append")
                .with_credential("accessToken", "env:GOOGLE_ACCESS_TOKEN"),
        );

    let json = serde_json::to_string_pretty(&pipeline)?;
    std::fs::write(output, json)?;

    println!("✨ Created example pipeline: {}", output.display());
    println!();
    println!("Run it with:");
    println!("  flow run --file {}", output.display());

    Ok(())
}
