use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::ApiError;
use crate::server::AppState;
use crate::validate::{
    check_licence, validate_create_schedule, validate_create_senior, validate_generate_report,
    validate_update_schedule, validate_update_senior, validate_upload_results,
    CreateSchedulePayload, CreateSeniorPayload, GenerateReportPayload, UpdateSchedulePayload,
    UpdateSeniorPayload, UploadResultsPayload,
};
use crate::{analysis, dashboard, db, monitoring, report, storage};

fn require_auth(headers: &HeaderMap, state: &AppState) -> Result<(), ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(ApiError::Unauthorized("Missing authorization header"))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or(ApiError::Unauthorized("Missing authorization header"))?;

    if token != state.api_token {
        return Err(ApiError::Unauthorized("Unauthorized"));
    }
    Ok(())
}

pub async fn create_senior(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateSeniorPayload>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &state)?;

    let new_senior = validate_create_senior(payload, Utc::now().date_naive())?;

    let org = db::fetch_organisation(&state.pool, new_senior.org_id)
        .await?
        .ok_or(ApiError::NotFound("Organization"))?;
    let current = db::count_seniors(&state.pool, org.id).await?;
    check_licence(current, org.licence_seats)?;

    let senior = db::insert_senior(&state.pool, &new_senior).await?;
    info!(senior_id = %senior.id, org_id = %org.id, "senior created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "senior": senior,
            "message": "Senior created successfully",
        })),
    ))
}

pub async fn list_seniors(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &state)?;
    let seniors = db::list_seniors(&state.pool).await?;
    Ok(Json(seniors))
}

pub async fn update_senior(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSeniorPayload>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &state)?;
    let patch = validate_update_senior(payload, Utc::now().date_naive())?;
    let senior = db::update_senior(&state.pool, id, &patch)
        .await?
        .ok_or(ApiError::NotFound("Senior"))?;
    Ok(Json(json!({ "success": true, "senior": senior })))
}

pub async fn delete_senior(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &state)?;
    if !db::delete_senior(&state.pool, id).await? {
        return Err(ApiError::NotFound("Senior"));
    }
    Ok(Json(json!({ "success": true })))
}

pub async fn list_schedules(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &state)?;
    let schedules = db::list_schedules(&state.pool).await?;
    Ok(Json(schedules))
}

pub async fn create_schedule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<CreateSchedulePayload>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &state)?;
    let new_schedule = validate_create_schedule(payload)?;

    db::senior_name(&state.pool, new_schedule.senior_id)
        .await?
        .ok_or(ApiError::NotFound("Senior"))?;

    let schedule = db::insert_schedule(&state.pool, &new_schedule)
        .await
        .map_err(map_active_conflict)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "schedule": schedule })),
    ))
}

pub async fn update_schedule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSchedulePayload>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &state)?;
    let patch = validate_update_schedule(payload)?;
    let schedule = db::update_schedule(&state.pool, id, &patch)
        .await
        .map_err(map_active_conflict)?
        .ok_or(ApiError::NotFound("Schedule"))?;
    Ok(Json(json!({ "success": true, "schedule": schedule })))
}

pub async fn delete_schedule(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &state)?;
    if !db::delete_schedule(&state.pool, id).await? {
        return Err(ApiError::NotFound("Schedule"));
    }
    Ok(Json(json!({ "success": true })))
}

fn map_active_conflict(err: anyhow::Error) -> ApiError {
    if db::is_unique_violation(&err) {
        ApiError::Validation("Senior already has an active schedule".to_string())
    } else {
        ApiError::Internal(err)
    }
}

pub async fn upload_results(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<UploadResultsPayload>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &state)?;
    let new_result = validate_upload_results(payload)?;

    db::senior_name(&state.pool, new_result.senior_id)
        .await?
        .ok_or(ApiError::NotFound("Senior"))?;

    let result_id = db::insert_result(&state.pool, &new_result).await?;
    info!(%result_id, kind = %new_result.kind, "training result saved");

    // Placeholder until the real report is generated; a failed stub must
    // not fail the upload.
    if let Err(err) = db::insert_report_stub(&state.pool, result_id).await {
        warn!(%result_id, error = %err, "report stub insert failed");
    }

    Ok(Json(json!({
        "success": true,
        "result_id": result_id,
        "message": "Training result uploaded successfully",
    })))
}

pub async fn generate_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<GenerateReportPayload>,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &state)?;
    let (session_id, kind) = validate_generate_report(payload)?;

    let session = db::fetch_session(&state.pool, kind, session_id)
        .await?
        .ok_or(ApiError::NotFound("Session"))?;

    let video_url = match &state.storage {
        Some(storage) => storage.public_url(&session.video_key),
        None => session.video_key.clone(),
    };

    info!(%session_id, %kind, "starting report generation");
    let analysis = analysis::analyze_session(
        &state.http,
        state.gemini_api_key.as_deref(),
        kind,
        &video_url,
        &session.raw,
    )
    .await;

    let now = Utc::now();
    let rendered = report::render_report(
        &analysis,
        &session.senior_name,
        &session.created_at.format("%Y-%m-%d").to_string(),
        now,
    );
    let bytes = report::to_pdf_bytes(&rendered);

    let storage_config = state
        .storage
        .as_ref()
        .ok_or_else(|| ApiError::Upstream("report storage is not configured".to_string()))?;
    let key = format!("report_{}_{}.pdf", session.id, now.timestamp_millis());
    let report_url = storage::upload_report(&state.http, storage_config, &key, bytes)
        .await
        .map_err(|err| ApiError::Upstream(format!("report upload failed: {err:#}")))?;

    db::upsert_report(&state.pool, session.id, &report_url).await?;
    info!(%session_id, %report_url, "report generated");

    Ok(Json(json!({
        "success": true,
        "report_url": report_url,
        "analysis": analysis,
        "message": "Report generated successfully",
    })))
}

pub async fn list_reports(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &state)?;
    let reports = db::list_reports(&state.pool).await?;
    Ok(Json(reports))
}

pub async fn monitoring_snapshot(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &state)?;

    // One clock reading drives every boundary below.
    let now = Utc::now();
    let window = monitoring::week_window(now);

    let roster = db::fetch_active_roster(&state.pool).await?;
    let week_events = db::fetch_results_between(&state.pool, window.start, window.end).await?;
    let last_sessions = db::fetch_last_sessions(&state.pool).await?;

    Ok(Json(monitoring::assemble(
        now,
        &roster,
        &week_events,
        &last_sessions,
    )))
}

pub async fn dashboard_snapshot(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    require_auth(&headers, &state)?;

    let now = Utc::now();
    let seniors = db::fetch_senior_activity(&state.pool).await?;
    let licence_seats = db::first_licence_seats(&state.pool).await?;
    let recent_events =
        db::fetch_results_between(&state.pool, now - chrono::Duration::days(7), now).await?;
    let last_sessions = db::fetch_last_sessions(&state.pool).await?;

    Ok(Json(dashboard::assemble(
        now,
        &seniors,
        licence_seats,
        &recent_events,
        &last_sessions,
    )))
}
