//! HTTP server exposing a mediator over the RPC channel.
//!
//! # HTTP Endpoints
//!
//! - `POST /rpc` - Invoke a mediator method
//! - `GET /health` - Health check
//! - `GET /ready` - Readiness check (pings the wrapped mediator)

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use unitplane_core::{RpcError, RpcErrorKind, RpcRequest, RpcResponse};

use crate::protocol::{
    self, method, CreateArgs, IdArgs, ListArgs, NameArgs, UpdateArgs, UpdateIfArgs, METHODS,
};
use crate::Mediator;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    mediator: Arc<dyn Mediator>,
}

impl AppState {
    /// Create state around the mediator that serves requests.
    #[must_use]
    pub fn new(mediator: Arc<dyn Mediator>) -> Self {
        Self { mediator }
    }
}

// ============================================================================
// Health Endpoints
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
}

async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: "unitplane-mediator",
    })
}

async fn ready_handler(State(state): State<AppState>) -> impl IntoResponse {
    match state.mediator.ping().await {
        Ok(()) => (StatusCode::OK, "ready"),
        Err(e) => {
            tracing::warn!(error = %e, "Mediator not ready");
            (StatusCode::SERVICE_UNAVAILABLE, "not ready")
        }
    }
}

// ============================================================================
// RPC Endpoint
// ============================================================================

/// Invoke a mediator method.
///
/// POST /rpc
async fn rpc_handler(
    State(state): State<AppState>,
    Json(request): Json<RpcRequest>,
) -> impl IntoResponse {
    let response = match request.negotiate(METHODS) {
        Ok(_) => dispatch(state.mediator.as_ref(), &request).await,
        Err(e) => Err(e),
    };

    match response {
        Ok(result) => (StatusCode::OK, Json(RpcResponse::Result(result))),
        Err(e) => {
            tracing::debug!(
                method = %request.method,
                version = %request.version,
                kind = %e.kind,
                error = %e.message,
                "Mediator RPC failed"
            );
            let status = StatusCode::from_u16(e.kind.http_status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(RpcResponse::Error(e)))
        }
    }
}

async fn dispatch(
    mediator: &dyn Mediator,
    request: &RpcRequest,
) -> Result<serde_json::Value, RpcError> {
    match request.method.as_str() {
        method::LIST => {
            let args: ListArgs = request.decode_args()?;
            encode(mediator.list_filtered(&args.into_filter()).await)
        }
        method::GET_BY_NAME => {
            let args: NameArgs = request.decode_args()?;
            encode(mediator.get_by_name(&args.name).await)
        }
        method::GET_BY_ID => {
            let args: IdArgs = request.decode_args()?;
            encode(mediator.get_by_id(&args.id).await)
        }
        method::CREATE => {
            let args: CreateArgs = request.decode_args()?;
            encode(mediator.create(args.unit).await)
        }
        method::UPDATE => {
            let args: UpdateArgs = request.decode_args()?;
            encode(mediator.update(&args.id, &args.values).await)
        }
        method::UPDATE_IF => {
            let args: UpdateIfArgs = request.decode_args()?;
            encode(
                mediator
                    .update_if(&args.id, &args.condition, &args.values)
                    .await,
            )
        }
        method::DESTROY => {
            let args: IdArgs = request.decode_args()?;
            encode(mediator.destroy(&args.id).await)
        }
        method::PING => encode(mediator.ping().await),
        other => Err(RpcError::new(
            RpcErrorKind::BadRequest,
            format!("unknown method: {other}"),
        )),
    }
}

fn encode<T: Serialize>(
    result: crate::error::Result<T>,
) -> Result<serde_json::Value, RpcError> {
    let value = result.map_err(|e| protocol::encode_error(&e))?;
    serde_json::to_value(value).map_err(|e| RpcError::new(RpcErrorKind::Internal, e.to_string()))
}

// ============================================================================
// Router
// ============================================================================

/// Build the mediator HTTP router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health & readiness
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler))
        // RPC
        .route("/rpc", post(rpc_handler))
        .with_state(state)
}
