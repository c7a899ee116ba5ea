//! API service routes

use axum::{
    Extension, Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{StatusCode, header},
    middleware,
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use common::records::JobKind;
use passkit::{AttendanceState, Event};
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    AppState,
    error::{ApiError, ApiResult},
    live::PresentCount,
    middleware::{AuthUser, require_admin, require_staff},
    models::{
        AttendanceActionRequest, AttendeeWithAttendance, CreateAttendeeRequest,
        CreateEventRequest, DeskScanRequest, ImportResponse, PassPreview, ScanRequest,
        ScanResponse, StationAttendee, UpdateEventRequest, UpdateLayoutRequest,
    },
    spreadsheet,
    validation::{validate_date, validate_email, validate_name, validate_template_url, validate_time},
    verification::VerifyRequest,
};

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let staff_routes = Router::new()
        .route("/events/active", get(list_active_events))
        .route("/events/:id/scan", post(scan_pass))
        .route(
            "/events/:id/attendance/:attendee_id",
            post(record_attendance),
        )
        .route("/events/:id/attendance/count", get(present_count))
        .route("/events/:id/attendance/live", get(live_attendance))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_staff));

    let admin_routes = Router::new()
        .route("/events", get(list_events).post(create_event))
        .route(
            "/events/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
        .route("/events/:id/layout", put(update_layout))
        .route(
            "/events/:id/attendees",
            get(list_attendees).post(create_attendee),
        )
        .route("/events/:id/attendees/import", post(import_attendees))
        .route(
            "/events/:id/attendees/:attendee_id",
            delete(delete_attendee),
        )
        .route("/events/:id/attendance/export", get(export_attendance))
        .route("/events/:id/passes/preview", get(preview_passes))
        .route("/events/:id/passes/generate", post(enqueue_generate))
        .route("/events/:id/passes/email", post(enqueue_email))
        .route("/jobs/:id", get(get_job))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check))
        .route("/verify", post(verify_pass))
        .route("/verify/scan", post(verify_scan))
        .merge(staff_routes)
        .merge(admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "gatepass-api"
    }))
}

/// Health check that also reaches the database
pub async fn readiness_check(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    if common::database::health_check(&state.db_pool).await? {
        Ok(Json(json!({"status": "ok", "database": "ok"})))
    } else {
        Ok(Json(json!({"status": "degraded", "database": "unreachable"})))
    }
}

async fn require_event(state: &AppState, id: &str) -> ApiResult<Event> {
    state
        .events
        .find(id)
        .await
        .map_err(|e| ApiError::internal("Failed to get event", e))?
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))
}

// Check-in station

pub async fn list_active_events(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let events = state
        .events
        .list_active()
        .await
        .map_err(|e| ApiError::internal("Failed to list active events", e))?;

    Ok(Json(events))
}

/// Resolve a scanned code; never changes attendance
pub async fn scan_pass(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(payload): Json<ScanRequest>,
) -> ApiResult<impl IntoResponse> {
    if !state
        .debouncer
        .accept(&payload.station, &payload.payload)
        .await
    {
        return Ok(Json(ScanResponse::Ignored));
    }

    let review = state.scanner.scan(&event_id, &payload.payload).await?;

    Ok(Json(ScanResponse::Review {
        attendee: StationAttendee::from(&review.attendee),
        record: review.record,
        state: review.state,
        actions: review.actions,
    }))
}

/// Apply the operator's check-in or check-out decision
pub async fn record_attendance(
    State(state): State<AppState>,
    Extension(operator): Extension<AuthUser>,
    Path((event_id, attendee_id)): Path<(String, String)>,
    Json(payload): Json<AttendanceActionRequest>,
) -> ApiResult<impl IntoResponse> {
    let applied = state
        .scanner
        .apply(&event_id, &attendee_id, payload.action)
        .await?;
    info!(
        "Operator {} applied {} for attendee: {}",
        operator.id,
        payload.action.as_str(),
        attendee_id
    );

    let present = state
        .attendance
        .present_count(&event_id)
        .await
        .map_err(|e| ApiError::internal("Failed to count attendance", e))?;
    state.live.publish(PresentCount {
        event_id: event_id.clone(),
        present,
    });

    Ok(Json(json!({
        "record": applied.record,
        "state": applied.state,
        "message": applied.message,
        "present": present,
    })))
}

pub async fn present_count(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let present = state
        .attendance
        .present_count(&event_id)
        .await
        .map_err(|e| ApiError::internal("Failed to count attendance", e))?;

    Ok(Json(PresentCount { event_id, present }))
}

/// Server-sent stream of the present count
pub async fn live_attendance(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let present = state
        .attendance
        .present_count(&event_id)
        .await
        .map_err(|e| ApiError::internal("Failed to count attendance", e))?;

    info!("Opening live attendance feed for event: {}", event_id);
    Ok(state.live.sse(PresentCount { event_id, present }))
}

// Event administration

fn validate_event_fields(
    name: Option<&str>,
    date: Option<&str>,
    time: Option<&str>,
) -> ApiResult<()> {
    if let Some(name) = name {
        validate_name("Event name", name).map_err(ApiError::BadRequest)?;
    }
    if let Some(date) = date {
        validate_date(date).map_err(ApiError::BadRequest)?;
    }
    if let Some(time) = time.filter(|t| !t.is_empty()) {
        validate_time(time).map_err(ApiError::BadRequest)?;
    }
    Ok(())
}

pub async fn list_events(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let events = state
        .events
        .list()
        .await
        .map_err(|e| ApiError::internal("Failed to list events", e))?;

    Ok(Json(events))
}

pub async fn create_event(
    State(state): State<AppState>,
    Json(payload): Json<CreateEventRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_event_fields(
        Some(&payload.name),
        Some(&payload.date),
        payload.time.as_deref(),
    )?;
    validate_template_url(payload.pass_template_url.trim()).map_err(ApiError::BadRequest)?;

    let event = state
        .events
        .create(&payload)
        .await
        .map_err(|e| ApiError::internal("Failed to create event", e))?;

    info!("Created event: {}", event.id);
    Ok((StatusCode::CREATED, Json(event)))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(require_event(&state, &id).await?))
}

pub async fn update_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateEventRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_event_fields(
        payload.name.as_deref(),
        payload.date.as_deref(),
        payload.time.as_deref(),
    )?;

    let event = state
        .events
        .update(&id, &payload)
        .await
        .map_err(|e| ApiError::internal("Failed to update event", e))?
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?;

    Ok(Json(event))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let deleted = state
        .events
        .delete(&id)
        .await
        .map_err(|e| ApiError::internal("Failed to delete event", e))?;

    if deleted {
        info!("Deleted event: {}", id);
        Ok(Json(json!({"message": "Event deleted successfully"})))
    } else {
        Err(ApiError::NotFound("Event not found".to_string()))
    }
}

/// Replace template and geometry; passes rendered before become outdated
pub async fn update_layout(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateLayoutRequest>,
) -> ApiResult<impl IntoResponse> {
    if payload.pass_template_url.trim().is_empty() {
        return Err(ApiError::BadRequest("Pass template is required.".to_string()));
    }
    validate_template_url(payload.pass_template_url.trim()).map_err(ApiError::BadRequest)?;

    let event = state
        .events
        .update_layout(&id, &payload)
        .await
        .map_err(|e| ApiError::internal("Failed to update layout", e))?
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?;

    let preview = PassPreview::of(
        &event,
        &state
            .attendees
            .list(&id)
            .await
            .map_err(|e| ApiError::internal("Failed to list attendees", e))?,
    );

    Ok(Json(json!({
        "event": event,
        "passes": preview,
    })))
}

// Attendees

pub async fn list_attendees(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    require_event(&state, &event_id).await?;

    let attendees = state
        .attendees
        .list(&event_id)
        .await
        .map_err(|e| ApiError::internal("Failed to list attendees", e))?;
    let mut records = state
        .attendance
        .list(&event_id)
        .await
        .map_err(|e| ApiError::internal("Failed to list attendance", e))?;

    let rows: Vec<AttendeeWithAttendance> = attendees
        .into_iter()
        .map(|attendee| {
            let attendance = records.remove(&attendee.id);
            AttendeeWithAttendance {
                state: AttendanceState::of(attendance.as_ref()),
                attendee,
                attendance,
            }
        })
        .collect();

    Ok(Json(rows))
}

pub async fn create_attendee(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(payload): Json<CreateAttendeeRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_name("Name", &payload.name).map_err(ApiError::BadRequest)?;
    validate_email(payload.email.trim()).map_err(ApiError::BadRequest)?;
    require_event(&state, &event_id).await?;

    let attendee = state
        .attendees
        .create(&event_id, &payload)
        .await
        .map_err(|e| ApiError::internal("Failed to create attendee", e))?;

    Ok((StatusCode::CREATED, Json(attendee)))
}

/// Bulk registration from a CSV sheet (`Name, Email, Branch, Year, Section`)
pub async fn import_attendees(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let sheet = spreadsheet::parse_attendees(body.as_ref())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    require_event(&state, &event_id).await?;

    let (rows, invalid): (Vec<_>, Vec<_>) = sheet.rows.into_iter().partition(|row| {
        validate_name("Name", &row.name).is_ok() && validate_email(&row.email).is_ok()
    });
    for row in &invalid {
        warn!("Skipping invalid attendee row: {}", row.email);
    }

    let imported = state
        .attendees
        .import(&event_id, &rows)
        .await
        .map_err(|e| ApiError::internal("Failed to import attendees", e))?;

    info!("Imported {} attendees into event: {}", imported, event_id);
    Ok(Json(ImportResponse {
        imported,
        skipped: sheet.skipped + invalid.len(),
    }))
}

pub async fn delete_attendee(
    State(state): State<AppState>,
    Path((event_id, attendee_id)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let deleted = state
        .attendees
        .delete(&event_id, &attendee_id)
        .await
        .map_err(|e| ApiError::internal("Failed to delete attendee", e))?;

    if deleted {
        Ok(Json(json!({"message": "Attendee deleted successfully"})))
    } else {
        Err(ApiError::NotFound("Attendee not found".to_string()))
    }
}

/// Attendance report as a CSV download
pub async fn export_attendance(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let event = require_event(&state, &event_id).await?;

    let attendees = state
        .attendees
        .list(&event_id)
        .await
        .map_err(|e| ApiError::internal("Failed to list attendees", e))?;
    let records = state
        .attendance
        .list(&event_id)
        .await
        .map_err(|e| ApiError::internal("Failed to list attendance", e))?;

    let csv = spreadsheet::write_report(&attendees, &records)
        .map_err(|e| ApiError::internal("Failed to write attendance report", e))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!(
                    "attachment; filename=\"{}\"",
                    spreadsheet::report_file_name(&event.name)
                ),
            ),
        ],
        csv,
    ))
}

// Passes

pub async fn preview_passes(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let event = require_event(&state, &event_id).await?;
    let attendees = state
        .attendees
        .list(&event_id)
        .await
        .map_err(|e| ApiError::internal("Failed to list attendees", e))?;

    Ok(Json(PassPreview::of(&event, &attendees)))
}

async fn enqueue(state: &AppState, event_id: &str, kind: JobKind) -> ApiResult<impl IntoResponse + use<>> {
    let event = require_event(state, event_id).await?;
    if kind == JobKind::Generate && !event.has_template() {
        return Err(ApiError::BadRequest("Pass template is required.".to_string()));
    }

    let (job, created) = state
        .jobs
        .enqueue(event_id, kind)
        .await
        .map_err(|e| ApiError::internal("Failed to enqueue job", e))?;

    if created {
        info!("Queued {} job {} for event: {}", kind, job.id, event_id);
    }

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "job": job,
            "created": created,
        })),
    ))
}

pub async fn enqueue_generate(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    enqueue(&state, &event_id, JobKind::Generate).await
}

pub async fn enqueue_email(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    enqueue(&state, &event_id, JobKind::Email).await
}

pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    let job = state
        .jobs
        .get(id)
        .await
        .map_err(|e| ApiError::internal("Failed to get job", e))?
        .ok_or_else(|| ApiError::NotFound("Job not found".to_string()))?;

    Ok(Json(job))
}

// Public verification

pub async fn verify_pass(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.verifier.verify(&payload).await?))
}

pub async fn verify_scan(
    State(state): State<AppState>,
    Json(payload): Json<DeskScanRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.verifier.verify_scan(&payload.code).await?))
}
