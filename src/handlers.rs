use crate::compliance::{self, ComplianceReport};
use crate::config::Config;
use crate::errors::AppError;
use crate::map_view::{MapViewPlanner, ViewPlan, ViewRequest};
use crate::models::{Cluster, Property};
use axum::{
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Validated clustering and view-mode policy.
    pub planner: MapViewPlanner,
}

impl AppState {
    /// Builds the state, failing on degenerate thresholds.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let planner = MapViewPlanner::from_config(&config)?;
        Ok(Self { config, planner })
    }
}

/// Request body carrying a bare property list.
#[derive(Debug, Deserialize)]
pub struct PropertiesRequest {
    pub properties: Vec<Property>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ClustersResponse {
    pub clusters: Vec<Cluster>,
    /// Properties skipped for lack of coordinates.
    pub unlocatable: usize,
}

/// API routes; `main` adds rate limiting and the outer layers.
pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/v1/map/clusters", post(build_clusters))
        .route("/api/v1/map/view", post(plan_view))
        .route("/api/v1/properties/compliance", post(compliance_reports))
        .with_state(state)
}

/// Health check endpoint.
///
/// Returns the service status, version, and health information.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "site-qualify-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// POST /api/v1/map/clusters
///
/// Clusters the locatable subset of the posted properties. Properties
/// without coordinates are skipped and counted; duplicate ids are a 400.
pub async fn build_clusters(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PropertiesRequest>,
) -> Result<Json<ClustersResponse>, AppError> {
    tracing::info!("POST /map/clusters - {} properties", body.properties.len());

    let located = body.properties.iter().filter(|p| p.is_locatable()).count();
    let clusters = state.planner.clusters(&body.properties)?;

    tracing::info!(
        "Built {} clusters from {} located properties",
        clusters.len(),
        located
    );

    Ok(Json(ClustersResponse {
        clusters,
        unlocatable: body.properties.len() - located,
    }))
}

/// POST /api/v1/map/view
///
/// Computes render mode, camera directive and clusters or heat points for
/// one map render.
pub async fn plan_view(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ViewRequest>,
) -> Result<Json<ViewPlan>, AppError> {
    tracing::info!(
        "POST /map/view - {} properties, zoom {}, selected {:?}",
        request.properties.len(),
        request.zoom,
        request.selected_property_id
    );

    if !request.zoom.is_finite() || request.zoom < 0.0 {
        return Err(AppError::BadRequest(format!(
            "zoom must be a non-negative number, got {}",
            request.zoom
        )));
    }

    let plan = state.planner.plan(&request);
    if plan.degraded {
        tracing::warn!(
            "View plan degraded ({} duplicate ids)",
            plan.duplicate_ids.len()
        );
    }

    Ok(Json(plan))
}

/// POST /api/v1/properties/compliance
///
/// Evaluates the school-siting checklist for each posted property.
pub async fn compliance_reports(
    State(state): State<Arc<AppState>>,
    Json(body): Json<PropertiesRequest>,
) -> Result<Json<Vec<ComplianceReport>>, AppError> {
    tracing::info!(
        "POST /properties/compliance - {} properties",
        body.properties.len()
    );

    let rules = state.planner.rules();
    let reports: Vec<ComplianceReport> = body
        .properties
        .iter()
        .map(|p| compliance::report(p, rules))
        .collect();

    let stale = reports.iter().filter(|r| r.stale).count();
    if stale > 0 {
        tracing::debug!("{} properties carry a stale stored status", stale);
    }

    Ok(Json(reports))
}
