use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use shuttle_axum::axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::curator::{CurationDiff, Curator};
use crate::history::{History, RunEntry};
use crate::poll::{self, PollContext};
use crate::registry::{self, LintWarning, SourceCounts};
use crate::report::{self, Report, ReportHandle, ReportSummary};
use crate::scoring::StateMetrics;

#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<PollContext>,
    pub report: ReportHandle,
    pub history: Arc<History>,
    /// The CSV the curator regenerates after every registry mutation.
    pub export_path: PathBuf,
}

type ApiError = (StatusCode, String);

/// Read surface for the dashboard plus the two operator-only admin routes.
/// `/metrics` is merged in by the caller so tests can build the router
/// without installing a Prometheus recorder.
pub fn create_router(state: AppState) -> Router {
    let exports_dir = state
        .export_path
        .parent()
        .map(std::path::Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("exports"));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/report", get(get_report))
        .route("/report/summary", get(get_report_summary))
        .route("/report/states/{code}", get(get_state_metrics))
        .route("/registry/summary", get(get_registry_summary))
        .route("/history", get(get_history))
        .route("/admin/poll", post(admin_poll))
        .route("/admin/curate", post(admin_curate))
        .nest_service("/exports", ServeDir::new(exports_dir))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Latest in-memory report, falling back to the persisted artifact so the
/// dashboard has data right after a restart.
fn current_report(state: &AppState) -> Option<Report> {
    state
        .report
        .get()
        .or_else(|| report::read_report(&state.ctx.report_path))
}

async fn get_report(State(state): State<AppState>) -> Result<Json<Report>, ApiError> {
    current_report(&state)
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "no report yet".to_string()))
}

async fn get_report_summary(
    State(state): State<AppState>,
) -> Result<Json<ReportSummary>, ApiError> {
    current_report(&state)
        .map(|r| Json(r.summary()))
        .ok_or((StatusCode::NOT_FOUND, "no report yet".to_string()))
}

async fn get_state_metrics(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<StateMetrics>, ApiError> {
    let report = current_report(&state)
        .ok_or((StatusCode::NOT_FOUND, "no report yet".to_string()))?;
    report
        .metrics_by_state
        .get(&code)
        .cloned()
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, format!("no metrics for `{code}`")))
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct RegistrySummary {
    fingerprint: String,
    total_sources: usize,
    counts_by_state: BTreeMap<String, SourceCounts>,
    lint_warnings: Vec<LintWarning>,
}

async fn get_registry_summary(
    State(state): State<AppState>,
) -> Result<Json<RegistrySummary>, ApiError> {
    let reg = state
        .ctx
        .store
        .load()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("{e}")))?;
    let counts_by_state = reg
        .states
        .keys()
        .filter_map(|code| Some((code.clone(), reg.count_sources(code)?)))
        .collect();
    Ok(Json(RegistrySummary {
        fingerprint: reg.fingerprint(),
        total_sources: reg.total_sources(),
        counts_by_state,
        lint_warnings: registry::lint_near_duplicates(&reg),
    }))
}

#[derive(serde::Deserialize)]
struct HistoryQuery {
    #[serde(default = "default_history_n")]
    n: usize,
}

fn default_history_n() -> usize {
    10
}

async fn get_history(
    State(state): State<AppState>,
    Query(q): Query<HistoryQuery>,
) -> Json<Vec<RunEntry>> {
    Json(state.history.snapshot_last_n(q.n.min(100)))
}

/// Manual trigger: run one cycle now and publish its report exactly the way
/// the scheduler would.
async fn admin_poll(State(state): State<AppState>) -> Result<Json<ReportSummary>, ApiError> {
    let report = poll::run_poll_cycle(&state.ctx)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")))?;
    let summary = report.summary();
    state.history.push(&report);
    state.report.set(report);
    Ok(Json(summary))
}

#[derive(serde::Deserialize, Default)]
struct CurateReq {
    /// Explicit override list. Absent (`{}`) means "use the latest report's
    /// problematic set".
    #[serde(default)]
    states: Option<Vec<String>>,
}

async fn admin_curate(
    State(state): State<AppState>,
    Json(req): Json<CurateReq>,
) -> Result<Json<CurationDiff>, ApiError> {
    let codes: BTreeSet<String> = match req.states {
        Some(list) => list.into_iter().collect(),
        None => current_report(&state)
            .ok_or((
                StatusCode::BAD_REQUEST,
                "no report yet; pass an explicit `states` list".to_string(),
            ))?
            .problematic_states,
    };

    let curator = Curator::new(state.ctx.store.clone(), &state.export_path);
    match curator.apply(&codes) {
        Ok(diff) => Ok(Json(diff)),
        Err(registry::RegistryError::WriteConflict) => Err((
            StatusCode::CONFLICT,
            "another curation is in progress".to_string(),
        )),
        Err(e) => Err((StatusCode::INTERNAL_SERVER_ERROR, format!("{e}"))),
    }
}
