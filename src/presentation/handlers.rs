// HTTP request handlers
use crate::domain::metric::MetricKey;
use crate::domain::series::{RenderGeometry, TimeSeriesBuffer};
use crate::domain::view::View;
use crate::presentation::app_state::AppState;
use crate::presentation::panel::{
    device_detail, farm_summary, panel_label, summarize, DeviceDetail, DeviceSummary, FarmSummary,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::time::Instant;

const DEFAULT_SPARKLINE_WIDTH: f64 = 120.0;
const DEFAULT_SPARKLINE_HEIGHT: f64 = 32.0;
const DEFAULT_SPARKLINE_PADDING: f64 = 2.0;

#[derive(Deserialize)]
pub struct SparklineQuery {
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub padding: Option<f64>,
}

#[derive(Serialize)]
pub struct PanelResponse {
    pub view: View,
    pub label: String,
    pub paused: bool,
}

#[derive(Serialize)]
pub struct SampleView {
    /// Seconds before the request.
    pub age_secs: f64,
    pub value: Option<f64>,
}

#[derive(Serialize)]
pub struct SparklineResponse {
    pub device_id: String,
    pub metric: MetricKey,
    pub window_secs: u64,
    pub samples: Vec<SampleView>,
    pub geometry: RenderGeometry,
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

fn not_found(id: &str) -> Response {
    error_response(StatusCode::NOT_FOUND, format!("unknown device '{}'", id))
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Panel label for the default view
pub async fn panel(State(state): State<Arc<AppState>>) -> Json<PanelResponse> {
    let settings = state.session.settings().current();
    let context = state.session.read().await;
    let view = context.registry.resolve_view(settings.default_view);
    let label = panel_label(&context.registry, &view, &settings);

    Json(PanelResponse {
        view,
        label,
        paused: state.scheduler.is_paused(),
    })
}

/// List configured devices with their status
pub async fn list_devices(State(state): State<Arc<AppState>>) -> Json<Vec<DeviceSummary>> {
    let context = state.session.read().await;
    let devices = context
        .registry
        .devices()
        .iter()
        .map(|device| summarize(&context.registry, device))
        .collect();
    Json(devices)
}

pub async fn get_device(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<DeviceDetail>, Response> {
    let unit = state.session.settings().current().hashrate_unit;
    let context = state.session.read().await;
    let device = context.registry.device(&id).ok_or_else(|| not_found(&id))?;
    Ok(Json(device_detail(&context.registry, device, unit)))
}

/// Sparkline geometry for one metric of one device
pub async fn get_sparkline(
    Path((id, metric)): Path<(String, String)>,
    Query(query): Query<SparklineQuery>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<SparklineResponse>, Response> {
    let metric: MetricKey = metric
        .parse()
        .map_err(|e: crate::domain::metric::UnknownMetric| error_response(StatusCode::BAD_REQUEST, e.to_string()))?;

    let width = query.width.unwrap_or(DEFAULT_SPARKLINE_WIDTH);
    let height = query.height.unwrap_or(DEFAULT_SPARKLINE_HEIGHT);
    let padding = query.padding.unwrap_or(DEFAULT_SPARKLINE_PADDING);
    if ![width, height, padding].iter().all(|v| v.is_finite() && *v >= 0.0) {
        return Err(error_response(
            StatusCode::BAD_REQUEST,
            "width, height and padding must be non-negative numbers".to_string(),
        ));
    }

    let context = state.session.read().await;
    if context.registry.device(&id).is_none() {
        return Err(not_found(&id));
    }

    let empty;
    let buffer = match context.series(&id, metric) {
        Some(buffer) => buffer,
        None => {
            empty = TimeSeriesBuffer::new(context.window_secs());
            &empty
        }
    };

    let now = Instant::now();
    let samples = buffer
        .snapshot()
        .into_iter()
        .map(|sample| SampleView {
            age_secs: now.saturating_duration_since(sample.timestamp).as_secs_f64(),
            value: sample.value,
        })
        .collect();

    Ok(Json(SparklineResponse {
        device_id: id,
        metric,
        window_secs: buffer.window().as_secs(),
        samples,
        geometry: buffer.compute_render_geometry(width, height, padding),
    }))
}

/// Aggregate over online devices
pub async fn farm(State(state): State<Arc<AppState>>) -> Json<FarmSummary> {
    let unit = state.session.settings().current().hashrate_unit;
    let context = state.session.read().await;
    Json(farm_summary(&context.registry, unit))
}

/// Trigger a cycle outside the cadence
pub async fn refresh(State(state): State<Arc<AppState>>) -> StatusCode {
    state.scheduler.refresh_now();
    StatusCode::ACCEPTED
}

/// Remember the device shown by the single view
pub async fn select_device(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Response {
    if state.session.select_device(&id).await {
        StatusCode::NO_CONTENT.into_response()
    } else {
        not_found(&id)
    }
}
