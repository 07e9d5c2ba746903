//! HTTP route handlers.

use axum::body::Bytes;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Local;
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use crate::domain::{ScheduleTime, StopId};
use crate::planner::{JourneyRequest, SearchError};

use super::dto::*;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/journey/plan", post(plan_journey))
        .route("/stops/nearby", get(nearby_stops))
        .route("/stops/:id/tree", get(stop_tree))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Plan a journey between two points.
async fn plan_journey(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<JourneyResult>, AppError> {
    // Parse JSON manually so we can log the body on failure
    let req: PlanJourneyRequest = serde_json::from_slice(&body).map_err(|e| {
        debug!(body = %String::from_utf8_lossy(&body), "invalid plan request");
        AppError::BadRequest {
            message: format!("invalid JSON: {e}"),
        }
    })?;

    let from = req.from.to_coord().ok_or_else(|| AppError::BadRequest {
        message: "origin coordinates must be finite".to_string(),
    })?;
    let to = req.to.to_coord().ok_or_else(|| AppError::BadRequest {
        message: "destination coordinates must be finite".to_string(),
    })?;
    let departure = req
        .departure
        .unwrap_or_else(|| ScheduleTime::from_naive_time(Local::now().time()));

    let request = JourneyRequest {
        from,
        to,
        departure,
        person: req.person,
    };

    // The search is CPU-bound; keep it off the async workers
    let router = state.router.clone();
    let itinerary = tokio::task::spawn_blocking(move || router.plan(&request))
        .await
        .map_err(|e| AppError::Internal {
            message: format!("search failed: {e}"),
        })?;

    itinerary
        .as_ref()
        .and_then(JourneyResult::from_itinerary)
        .map(Json)
        .ok_or_else(|| AppError::NotFound {
            message: "unreachable".to_string(),
        })
}

/// Stops near a point, nearest first.
async fn nearby_stops(
    State(state): State<AppState>,
    Query(req): Query<NearbyStopsRequest>,
) -> Result<Json<NearbyStopsResponse>, AppError> {
    let point = PointDto { x: req.x, y: req.y }
        .to_coord()
        .ok_or_else(|| AppError::BadRequest {
            message: "coordinates must be finite".to_string(),
        })?;
    let radius = req.radius.unwrap_or(state.router.config().search_radius);
    if !(radius.is_finite() && radius >= 0.0) {
        return Err(AppError::BadRequest {
            message: format!("invalid radius: {radius}"),
        });
    }

    let schedule = state.router.schedule();
    let stops = state
        .router
        .resolver()
        .nearby(point, radius)
        .into_iter()
        .map(|(stop, distance)| NearbyStop::from_stop(schedule, stop, distance))
        .collect();

    Ok(Json(NearbyStopsResponse { stops }))
}

/// Best arrival at every stop reachable from one stop.
async fn stop_tree(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(req): Query<TreeRequest>,
) -> Result<Json<TreeResponse>, AppError> {
    let id = StopId::parse(&id).map_err(|e| AppError::BadRequest {
        message: e.to_string(),
    })?;
    let stop = state
        .router
        .schedule()
        .stop_index(&id)
        .ok_or_else(|| SearchError::UnknownStop(id.clone()))?;
    let departure = req
        .departure
        .unwrap_or_else(|| ScheduleTime::from_naive_time(Local::now().time()));

    let router = state.router.clone();
    let trees = state.trees.clone();
    let tree = tokio::task::spawn_blocking(move || {
        trees.get_or_compute(stop, departure, &mut router.worker())
    })
    .await
    .map_err(|e| AppError::Internal {
        message: format!("search failed: {e}"),
    })?;

    Ok(Json(TreeResponse::from_tree(
        state.router.schedule(),
        id,
        departure,
        &tree,
    )))
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest { message: String },
    NotFound { message: String },
    Internal { message: String },
}

impl From<SearchError> for AppError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::UnknownStop(_) => AppError::NotFound {
                message: e.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest { message } => (StatusCode::BAD_REQUEST, message),
            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message),
            AppError::Internal { message } => (StatusCode::INTERNAL_SERVER_ERROR, message),
        };

        if status.is_server_error() {
            warn!(%status, %message, "request failed");
        } else {
            debug!(%status, %message, "request rejected");
        }

        let body = Json(ErrorResponse { error: message });
        (status, body).into_response()
    }
}
