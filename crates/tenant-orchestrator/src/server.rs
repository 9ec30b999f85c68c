//! HTTP surface of the tenant orchestrator.
//!
//! Lifecycle endpoints only schedule work and acknowledge with `202`;
//! callers poll the tenant health endpoint to observe the outcome.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::cluster::ClusterApi;
use crate::config::Config;
use crate::error::{HealthError, SubmitError};
use crate::health::HealthAggregator;
use crate::lifecycle::{Orchestrator, Workflow};
use crate::registry::TenantRegistry;
use crate::tenant::{normalize_company_code, TenantRecord};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub registry: Arc<dyn TenantRegistry>,
    pub cluster: Arc<dyn ClusterApi>,
    pub health: Arc<HealthAggregator>,
    pub orchestrator: Orchestrator,
}

/// Build the HTTP router.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health/tenant/{code}", get(tenant_health))
        .route("/health/cluster", get(cluster_health))
        .route("/config/{code}", get(tenant_public_config))
        .route("/tenants", get(list_tenants))
        .route("/tenants/{code}", axum::routing::delete(delete_tenant))
        .route("/tenants/{code}/deploy", post(deploy_tenant))
        .route("/tenants/{code}/stop", post(stop_tenant))
        .route("/tenants/{code}/start", post(start_tenant));

    Router::new()
        .nest("/api", api)
        .route("/health", get(liveness))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

async fn liveness() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn tenant_health(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    let code = normalize_company_code(&code);
    match state.health.check(&code).await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(HealthError::Config(e)) => {
            info!(company_code = %code, reason = %e, "Health check for unresolvable tenant");
            (
                StatusCode::NOT_FOUND,
                Json(json!({ "status": "NOT_READY", "message": e.to_string() })),
            )
                .into_response()
        }
        Err(e) => {
            error!(company_code = %code, error = %e, "Tenant health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "status": "NOT_READY",
                    "message": "Internal error during health check.",
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

async fn cluster_health(State(state): State<AppState>) -> Response {
    match state.cluster.server_version().await {
        Ok(version) => Json(json!({
            "status": "ok",
            "message": "Connected to Kubernetes cluster",
            "clusterVersion": version,
        }))
        .into_response(),
        Err(e) => {
            warn!(error = %e, "Cluster health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "error",
                    "message": "Failed to connect to Kubernetes cluster or get version info",
                    "error": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

async fn tenant_public_config(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    let code = normalize_company_code(&code);
    match state.registry.find_by_code(&code).await {
        Ok(Some(tenant)) => Json(json!({
            "company_code": tenant.company_code,
            "logo_url": tenant.logo_url,
        }))
        .into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Tenant configuration not found" })),
        )
            .into_response(),
        Err(e) => {
            error!(company_code = %code, error = %e, "Failed to fetch tenant configuration");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Error fetching tenant configuration" })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListQuery {
    page: Option<String>,
    page_size: Option<String>,
}

fn positive(value: Option<&str>, default: u32) -> Option<u32> {
    match value {
        None => Some(default),
        Some(raw) => raw.trim().parse::<u32>().ok().filter(|n| *n >= 1),
    }
}

fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
}

fn tenant_summary(config: &Config, tenant: &TenantRecord) -> Value {
    json!({
        "companyCode": tenant.company_code,
        "name": tenant.name,
        "status": tenant.status,
        "namespace": tenant.namespace,
        "accessUrl": tenant
            .namespace
            .as_ref()
            .map(|_| format!("http://{}", config.frontend_host(&tenant.company_code))),
    })
}

async fn list_tenants(State(state): State<AppState>, Query(query): Query<ListQuery>) -> Response {
    let Some(page) = positive(query.page.as_deref(), 1) else {
        return bad_request("Invalid 'page' parameter. Must be a positive integer.");
    };
    let Some(page_size) = positive(query.page_size.as_deref(), 10) else {
        return bad_request("Invalid 'pageSize' parameter. Must be a positive integer.");
    };

    match state.registry.list(page, page_size).await {
        Ok(listing) => {
            let tenants: Vec<Value> = listing
                .records
                .iter()
                .map(|t| tenant_summary(&state.config, t))
                .collect();
            Json(json!({
                "tenants": tenants,
                "pagination": {
                    "currentPage": page,
                    "pageSize": page_size,
                    "totalItems": listing.total,
                    "totalPages": listing.total.div_ceil(u64::from(page_size)),
                },
            }))
            .into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to list tenants");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "Internal server error fetching tenant list.",
                    "details": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}

/// Schedule a workflow and acknowledge immediately.
fn accept(state: &AppState, workflow: Workflow, code: &str) -> Response {
    let code = normalize_company_code(code);
    match state.orchestrator.submit(workflow, &code) {
        Ok(_handle) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "status": workflow.initial_status(),
                "message": format!(
                    "Tenant {workflow} initiated for {code}. \
                     Poll the health endpoint for progress."
                ),
            })),
        )
            .into_response(),
        Err(e @ SubmitError::InProgress { .. }) => (
            StatusCode::CONFLICT,
            Json(json!({ "error": e.to_string() })),
        )
            .into_response(),
    }
}

async fn deploy_tenant(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    accept(&state, Workflow::Deploy, &code)
}

async fn stop_tenant(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    accept(&state, Workflow::Stop, &code)
}

async fn start_tenant(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    accept(&state, Workflow::Start, &code)
}

async fn delete_tenant(State(state): State<AppState>, Path(code): Path<String>) -> Response {
    accept(&state, Workflow::Delete, &code)
}
