use std::collections::BTreeMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::api::health::HealthState;
use crate::api::latency::{LatencyStats, Percentiles};
use crate::api::socket::ws_handler;
use crate::broadcast::{Broadcaster, SubscriptionManager};
use crate::error::AppError;
use crate::ingest::IngestGateway;
use crate::state::StatusStore;
use crate::types::now_ms;

#[derive(Clone)]
pub struct ApiState {
    pub gateway: IngestGateway,
    pub subscriptions: SubscriptionManager,
    pub store: Arc<StatusStore>,
    pub broadcaster: Arc<Broadcaster>,
    pub health: Arc<HealthState>,
    pub latency: Arc<LatencyStats>,
}

impl ApiState {
    pub fn new(store: Arc<StatusStore>, broadcaster: Arc<Broadcaster>) -> Self {
        let health = Arc::new(HealthState::new());
        let latency = Arc::new(LatencyStats::new());
        let gateway = IngestGateway::new(
            Arc::clone(&store),
            Arc::clone(&broadcaster),
            Arc::clone(&health),
            Arc::clone(&latency),
        );
        let subscriptions = SubscriptionManager::new(Arc::clone(&store), Arc::clone(&broadcaster));
        Self { gateway, subscriptions, store, broadcaster, health, latency }
    }
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(ws_handler))
        .route("/ws", get(ws_handler))
        .route("/api/monitoring", post(post_monitoring))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .layer(cors)
        .with_state(state)
}

/// Serve the relay on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    state: ApiState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct IngestAck {
    pub status: &'static str,
    pub timestamp: u64,
}

#[derive(Serialize)]
pub struct IngestCounters {
    pub accepted: u64,
    pub rejected: u64,
    pub ignored: u64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    /// Seconds.
    pub uptime: f64,
    pub connections: usize,
    pub last_update: u64,
    pub ingest: IngestCounters,
    pub broadcasts: u64,
}

#[derive(Serialize)]
pub struct LatencyResponse {
    #[serde(flatten)]
    pub overall: Percentiles,
    pub by_kind: BTreeMap<String, Percentiles>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Unknown kinds are acknowledged like any other well-formed document.
async fn post_monitoring(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<IngestAck>, AppError> {
    state.gateway.handle_raw(&body)?;
    Ok(Json(IngestAck {
        status: "received",
        timestamp: now_ms(),
    }))
}

async fn get_health(State(state): State<ApiState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        uptime: state.health.uptime_secs(),
        connections: state.broadcaster.subscriber_count(),
        last_update: state.store.last_update(),
        ingest: IngestCounters {
            accepted: state.health.accepted(),
            rejected: state.health.rejected(),
            ignored: state.health.ignored(),
        },
        broadcasts: state.broadcaster.frames_broadcast(),
    })
}

async fn get_stats_latency(State(state): State<ApiState>) -> Json<LatencyResponse> {
    Json(LatencyResponse {
        overall: state.latency.overall(),
        by_kind: state.latency.by_kind(),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
