//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling; routing is a plain
//! path-prefix dispatch onto the route modules.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::db::MongoClient;
use crate::routes;
use crate::store::DocumentStore;
use crate::types::WardenError;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Store the cascade engine runs against (MongoDB in production, the
    /// in-memory store in dev mode)
    pub store: Arc<dyn DocumentStore>,
    /// Present when connected to MongoDB; health reporting only
    pub mongo: Option<MongoClient>,
}

impl AppState {
    pub fn new(args: Args, store: Arc<dyn DocumentStore>, mongo: Option<MongoClient>) -> Self {
        Self { args, store, mongo }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), WardenError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "timewarden listening on {} as node {}",
        state.args.listen, state.args.node_id
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - using relaxed authentication");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match path.as_str() {
        "/health" | "/healthz" => routes::health_check(state),
        "/ready" | "/readyz" => routes::readiness_check(state),
        "/version" => routes::version_info(),
        p if p.starts_with("/team/") => routes::handle_team_request(req, state, p).await,
        p if p.starts_with("/tasks/") => routes::handle_tasks_request(req, state, p).await,
        p if p.starts_with("/clients/") => routes::handle_clients_request(req, state, p).await,
        p if p.starts_with("/projects/") => routes::handle_projects_request(req, state, p).await,
        _ => not_found_response(),
    };

    Ok(response)
}

fn not_found_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(r#"{"error":"Not found"}"#)))
        .unwrap()
}
