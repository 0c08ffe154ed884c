use actix_cors::Cors;
use actix_web::{get, post, web, App, HttpResponse, HttpServer, Responder, Result as ActixResult};
use actix_ws::Message;
use flowcore::{
    Credentials, ExecutionError, ExecutionResult, InstanceOverrides, NodeError, Parameters,
    Pipeline, Value,
};
use flowruntime::{FlowRuntime, RuntimeConfig};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
struct AppState {
    runtime: Arc<FlowRuntime>,
}

/// Request body for instance creation and single-node execution
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeRequest {
    #[serde(rename = "type")]
    node_type: String,
    #[serde(default)]
    parameters: Parameters,
    #[serde(default)]
    credentials: Credentials,
    /// Upstream data handed to the node
    #[serde(default)]
    input: Option<Value>,
}

impl NodeRequest {
    fn overrides(&self) -> InstanceOverrides {
        InstanceOverrides {
            parameters: self.parameters.clone(),
            credentials: self.credentials.clone(),
        }
    }
}

/// Request body for pipeline execution
#[derive(Debug, Deserialize)]
struct RunPipelineRequest {
    pipeline: Pipeline,
    #[serde(default)]
    input: Option<Value>,
}

/// Error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "flowserver"
    }))
}

/// List available node types
#[get("/api/nodes")]
async fn list_node_types(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    let registry = data.runtime.registry();
    let nodes: Vec<_> = registry
        .definitions()
        .map(|definition| {
            serde_json::json!({
                "type": definition.type_id,
                "displayName": definition.display_name,
                "description": definition.description,
                "group": definition.group,
                "version": definition.version,
            })
        })
        .collect();

    Ok(HttpResponse::Ok().json(nodes))
}

/// List group tags
#[get("/api/nodes/groups")]
async fn list_node_groups(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    Ok(HttpResponse::Ok().json(data.runtime.registry().list_groups()))
}

/// Configuration of one node type; unknown types get a placeholder
#[get("/api/nodes/{node_type}")]
async fn get_node_config(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    Ok(HttpResponse::Ok().json(data.runtime.node_config(&path.into_inner())))
}

/// Create a node instance seeded with its type's defaults
#[post("/api/instances")]
async fn create_instance(
    data: web::Data<AppState>,
    req: web::Json<NodeRequest>,
) -> ActixResult<impl Responder> {
    let req = req.into_inner();
    match data.runtime.create_instance(&req.node_type, Some(req.overrides())) {
        Ok(instance) => {
            info!("Created instance {}", instance.id);
            Ok(HttpResponse::Created().json(instance))
        }
        Err(e @ NodeError::UnknownNodeType(_)) => Ok(HttpResponse::NotFound().json(ErrorResponse {
            error: e.to_string(),
        })),
        Err(e) => Ok(HttpResponse::BadRequest().json(ErrorResponse {
            error: e.to_string(),
        })),
    }
}

/// Create and execute a single node
#[post("/api/execute")]
async fn execute_node(
    data: web::Data<AppState>,
    req: web::Json<NodeRequest>,
) -> ActixResult<impl Responder> {
    let req = req.into_inner();
    let result = match data.runtime.create_instance(&req.node_type, Some(req.overrides())) {
        Ok(instance) => {
            info!("Executing node {} ({})", instance.id, instance.type_id);
            data.runtime.execute_node(&instance, req.input.as_ref(), None).await
        }
        Err(e) => ExecutionResult::Err {
            error: ExecutionError::from_node_error(&e, "", &req.node_type, &req.node_type),
        },
    };
    Ok(HttpResponse::Ok().json(result))
}

/// Execute a pipeline and return its report
#[post("/api/pipelines/run")]
async fn run_pipeline(
    data: web::Data<AppState>,
    req: web::Json<RunPipelineRequest>,
) -> ActixResult<impl Responder> {
    let RunPipelineRequest { pipeline, input } = req.into_inner();

    info!("Running pipeline: {}", pipeline.name);

    match data.runtime.run_pipeline(&pipeline, input).await {
        Ok(report) => {
            info!(
                "Pipeline {} finished: {}/{} steps run",
                report.pipeline,
                report.steps.len(),
                pipeline.nodes.len()
            );
            Ok(HttpResponse::Ok().json(report))
        }
        Err(e) => {
            error!("Pipeline {} rejected: {}", pipeline.name, e);
            Ok(HttpResponse::UnprocessableEntity().json(ErrorResponse {
                error: e.to_string(),
            }))
        }
    }
}

/// WebSocket endpoint for real-time events
#[get("/api/events")]
async fn websocket_events(
    req: actix_web::HttpRequest,
    stream: web::Payload,
    data: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let (res, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    info!("WebSocket client connected");

    let mut events = data.runtime.subscribe_events();

    actix_web::rt::spawn(async move {
        loop {
            tokio::select! {
                event = events.recv() => {
                    match event {
                        Ok(event) => {
                            if let Ok(json) = serde_json::to_string(&event) {
                                if session.text(json).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!("WebSocket client lagging, skipped {} events", skipped);
                        }
                        Err(_) => break,
                    }
                }

                Some(Ok(msg)) = msg_stream.recv() => {
                    match msg {
                        Message::Ping(bytes) => {
                            if session.pong(&bytes).await.is_err() {
                                break;
                            }
                        }
                        Message::Close(_) => break,
                        _ => {}
                    }
                }

                else => break,
            }
        }

        info!("WebSocket client disconnected");
        let _ = session.close(None).await;
    });

    Ok(res)
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("🚀 Starting flow server");

    let config = match std::env::var("FLOW_CONFIG") {
        Ok(path) => RuntimeConfig::from_file(path)?,
        Err(_) => RuntimeConfig::default(),
    }
    .with_env_overrides()?;

    let runtime = flownodes::standard_runtime(config)?;

    info!("✅ Runtime initialized with {} node types", runtime.registry().len());

    let app_state = web::Data::new(AppState {
        runtime: Arc::new(runtime),
    });

    let bind_address = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

    info!("🌐 Server starting on http://{}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .service(health_check)
            .service(list_node_types)
            .service(list_node_groups)
            .service(get_node_config)
            .service(create_instance)
            .service(execute_node)
            .service(run_pipeline)
            .service(websocket_events)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
