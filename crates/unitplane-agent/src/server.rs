//! HTTP server accepting commands for this agent's worker.
//!
//! # HTTP Endpoints
//!
//! - `POST /rpc` - `create_unit` (call) and `activate_unit`, `deactivate_unit`,
//!   `start_unit`, `stop_unit`, `destroy_unit` (casts)
//! - `GET /health` - Health check

use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use unitplane_core::{RpcError, RpcErrorKind, RpcRequest, RpcResponse};

use crate::error::AgentError;
use crate::protocol::{self, Accepted, CreateUnitArgs, UnitArgs, CREATE_UNIT, METHODS};
use crate::types::UnitCommand;
use crate::worker::WorkerHandle;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    worker: WorkerHandle,
}

impl AppState {
    /// Create state around the local worker.
    #[must_use]
    pub const fn new(worker: WorkerHandle) -> Self {
        Self { worker }
    }
}

// ============================================================================
// Health Endpoints
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    host: String,
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        service: "unitplane-agent",
        host: state.worker.host().to_string(),
    })
}

// ============================================================================
// RPC Endpoint
// ============================================================================

/// Invoke a worker method.
///
/// POST /rpc
async fn rpc_handler(
    State(state): State<AppState>,
    Json(request): Json<RpcRequest>,
) -> impl IntoResponse {
    let response = match request.negotiate(METHODS) {
        Ok(_) => dispatch(&state.worker, &request).await,
        Err(e) => Err(e),
    };

    match response {
        Ok(result) => (StatusCode::OK, Json(RpcResponse::Result(result))),
        Err(e) => {
            tracing::warn!(
                method = %request.method,
                kind = %e.kind,
                error = %e.message,
                "Agent RPC failed"
            );
            let status = StatusCode::from_u16(e.kind.http_status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            (status, Json(RpcResponse::Error(e)))
        }
    }
}

async fn dispatch(
    worker: &WorkerHandle,
    request: &RpcRequest,
) -> Result<serde_json::Value, RpcError> {
    if request.method == CREATE_UNIT {
        let args: CreateUnitArgs = request.decode_args()?;
        args.request
            .validate()
            .map_err(|reason| RpcError::new(RpcErrorKind::BadRequest, reason))?;
        let unit = worker
            .create(&args.context, args.request)
            .await
            .map_err(|e| encode_error(&e))?;
        return to_value(&unit);
    }

    let action = protocol::action_for(&request.method).ok_or_else(|| {
        RpcError::new(
            RpcErrorKind::BadRequest,
            format!("unknown method: {}", request.method),
        )
    })?;
    let args: UnitArgs = request.decode_args()?;
    worker
        .cast(UnitCommand::new(action, args.unit_id))
        .map_err(|e| encode_error(&e))?;

    to_value(&Accepted { accepted: true })
}

fn to_value<T: Serialize>(value: &T) -> Result<serde_json::Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::new(RpcErrorKind::Internal, e.to_string()))
}

fn encode_error(err: &AgentError) -> RpcError {
    match err {
        AgentError::Mediator(e) => unitplane_mediator::protocol::encode_error(e),
        AgentError::Config(_) => RpcError::new(RpcErrorKind::BadRequest, err.to_string()),
        AgentError::WorkFailed { .. } | AgentError::QueueFull | AgentError::QueueClosed => {
            RpcError::new(RpcErrorKind::Internal, err.to_string())
        }
    }
}

// ============================================================================
// Router
// ============================================================================

/// Build the agent HTTP router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health
        .route("/health", get(health_handler))
        // Worker RPC
        .route("/rpc", post(rpc_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use unitplane_core::{RequestContext, RpcVersion, UnitId};
    use unitplane_mediator::Mediator;
    use unitplane_store::{Unit, UnitState};

    use crate::manager::tests::{test_manager, test_mediator};
    use crate::types::CreateUnitRequest;
    use crate::worker::Worker;

    async fn post_rpc(url: &str, request: &RpcRequest) -> (StatusCode, RpcResponse) {
        let response = reqwest::Client::new()
            .post(format!("{url}/rpc"))
            .json(request)
            .send()
            .await
            .unwrap();
        let status = response.status();
        (status, response.json().await.unwrap())
    }

    #[tokio::test]
    async fn create_then_cast() {
        let (mediator, _dir) = test_mediator();
        let (worker, _join) = Worker::spawn(test_manager(Arc::clone(&mediator), 1), 8);
        let app = create_router(AppState::new(worker));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let create = RpcRequest::new(
            CREATE_UNIT,
            RpcVersion::new(1, 0),
            &CreateUnitArgs {
                context: RequestContext::new("alice", "proj"),
                request: CreateUnitRequest::new("unit-1", "acme"),
            },
        )
        .unwrap();
        let (status, body) = post_rpc(&url, &create).await;
        assert_eq!(status, StatusCode::OK);
        let unit: Unit = body.into_result().unwrap();
        assert_eq!(unit.host.as_str(), "agent-1");

        let activate = RpcRequest::new(
            "activate_unit",
            RpcVersion::new(1, 0),
            &UnitArgs { unit_id: unit.id },
        )
        .unwrap();
        let (status, body) = post_rpc(&url, &activate).await;
        assert_eq!(status, StatusCode::OK);
        let accepted: Accepted = body.into_result().unwrap();
        assert!(accepted.accepted);

        for _ in 0..200 {
            let current = mediator.get_by_id(&unit.id).await.unwrap();
            if current.state == UnitState::Active {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("unit never became active");
    }

    #[tokio::test]
    async fn rejects_invalid_requests() {
        let (mediator, _dir) = test_mediator();
        let (worker, _join) = Worker::spawn(test_manager(mediator, 1), 8);
        let app = create_router(AppState::new(worker));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let empty_name = RpcRequest::new(
            CREATE_UNIT,
            RpcVersion::new(1, 0),
            &json!({
                "context": {"user_id": "alice", "project_id": "proj"},
                "request": {"display_name": "", "vendor_tag": "acme"},
            }),
        )
        .unwrap();
        let (status, _) = post_rpc(&url, &empty_name).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let unknown = RpcRequest::new(
            "reboot_unit",
            RpcVersion::new(1, 0),
            &UnitArgs {
                unit_id: UnitId::generate(),
            },
        )
        .unwrap();
        let (status, _) = post_rpc(&url, &unknown).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let too_new = RpcRequest::new(
            "stop_unit",
            RpcVersion::new(1, 5),
            &UnitArgs {
                unit_id: UnitId::generate(),
            },
        )
        .unwrap();
        let (status, body) = post_rpc(&url, &too_new).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let err = body.into_result::<Accepted>().unwrap_err();
        assert_eq!(err.kind, RpcErrorKind::VersionMismatch);
    }
}
