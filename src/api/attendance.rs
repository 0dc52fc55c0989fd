use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::config::Config;
use crate::engine::session::{self, PunchInCommand, PunchOutCommand};
use crate::events::EventBus;
use crate::model::geofence::GeoPoint;
use crate::model::session::{BreakKind, PunchMethod, SessionSnapshot, SessionStatus};

#[derive(Deserialize, ToSchema)]
pub struct PunchInRequest {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = 7)]
    pub workplace_id: u64,
    #[schema(example = 23.8103)]
    pub lat: f64,
    #[schema(example = 90.4125)]
    pub lng: f64,
    /// GPS accuracy radius in meters, when the client reports one
    #[schema(example = 12.5)]
    pub accuracy: Option<f64>,
    /// Defaults to the server clock when omitted
    #[schema(example = "2026-08-06T09:00:00Z", value_type = Option<String>, format = "date-time")]
    pub timestamp: Option<DateTime<Utc>>,
    #[schema(example = "gps")]
    pub method: PunchMethod,
}

#[derive(Serialize, ToSchema)]
pub struct PunchInResponse {
    pub session_id: u64,
    pub status: SessionStatus,
    pub geofence_compliant: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct PunchOutRequest {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = 23.8103)]
    pub lat: f64,
    #[schema(example = 90.4125)]
    pub lng: f64,
    #[schema(example = "2026-08-06T17:30:00Z", value_type = Option<String>, format = "date-time")]
    pub timestamp: Option<DateTime<Utc>>,
    #[schema(example = "gps")]
    pub method: PunchMethod,
}

#[derive(Serialize, ToSchema)]
pub struct PunchOutResponse {
    pub session_id: u64,
    #[schema(example = 8.5)]
    pub total_hours: f64,
    #[schema(example = 0.5)]
    pub break_hours: f64,
    #[schema(example = 8.0)]
    pub net_hours: f64,
    #[schema(example = 0.0)]
    pub overtime_hours: f64,
    pub flagged_for_review: bool,
}

#[derive(Deserialize, ToSchema)]
pub struct StartBreakRequest {
    #[schema(example = 42)]
    pub session_id: u64,
    #[schema(example = "meal")]
    pub kind: BreakKind,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize, ToSchema)]
pub struct EndBreakRequest {
    #[schema(example = 17)]
    pub break_id: u64,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct StatusQuery {
    /// Employee to project the current status for
    #[schema(example = 1000)]
    pub employee_id: u64,
}

#[derive(Serialize, ToSchema)]
pub struct CurrentStatusResponse {
    pub is_active: bool,
    pub session: Option<SessionSnapshot>,
}

fn hours(minutes: i64) -> f64 {
    minutes as f64 / 60.0
}

/// Punch-in endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/punch-in",
    request_body = PunchInRequest,
    responses(
        (status = 200, description = "Session opened", body = PunchInResponse),
        (status = 404, description = "Unknown workplace"),
        (status = 409, description = "Session already exists for today"),
        (status = 422, description = "Outside geofence (strict deployments only)")
    ),
    tag = "Attendance"
)]
pub async fn punch_in(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    bus: web::Data<EventBus>,
    payload: web::Json<PunchInRequest>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let cmd = PunchInCommand {
        employee_id: payload.employee_id,
        workplace_id: payload.workplace_id,
        point: GeoPoint::new(payload.lat, payload.lng),
        at: payload.timestamp.unwrap_or_else(Utc::now),
        method: payload.method,
        accuracy_m: payload.accuracy,
    };

    let session = session::punch_in(pool.get_ref(), config.policy, bus.get_ref(), cmd).await?;

    Ok(HttpResponse::Ok().json(PunchInResponse {
        session_id: session.id,
        status: session.status,
        geofence_compliant: session.punch_in_compliant,
    }))
}

/// Punch-out endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/punch-out",
    request_body = PunchOutRequest,
    responses(
        (status = 200, description = "Session completed", body = PunchOutResponse),
        (status = 409, description = "No open session for today"),
        (status = 422, description = "A break is still open")
    ),
    tag = "Attendance"
)]
pub async fn punch_out(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    bus: web::Data<EventBus>,
    payload: web::Json<PunchOutRequest>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let cmd = PunchOutCommand {
        employee_id: payload.employee_id,
        point: GeoPoint::new(payload.lat, payload.lng),
        at: payload.timestamp.unwrap_or_else(Utc::now),
        method: payload.method,
    };

    let session = session::punch_out(pool.get_ref(), config.policy, bus.get_ref(), cmd).await?;

    Ok(HttpResponse::Ok().json(PunchOutResponse {
        session_id: session.id,
        total_hours: hours(session.total_minutes),
        break_hours: hours(session.break_minutes),
        net_hours: hours(session.net_minutes),
        overtime_hours: hours(session.overtime_minutes),
        flagged_for_review: session.flagged_for_review,
    }))
}

/// Start-break endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/break/start",
    request_body = StartBreakRequest,
    responses(
        (status = 200, description = "Break opened", body = Object, example = json!({"break_id": 17})),
        (status = 409, description = "No active session or a break is already open")
    ),
    tag = "Attendance"
)]
pub async fn start_break(
    pool: web::Data<MySqlPool>,
    bus: web::Data<EventBus>,
    payload: web::Json<StartBreakRequest>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let brk = session::start_break(
        pool.get_ref(),
        bus.get_ref(),
        payload.session_id,
        payload.kind,
        payload.timestamp.unwrap_or_else(Utc::now),
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "break_id": brk.id })))
}

/// End-break endpoint
#[utoipa::path(
    post,
    path = "/api/v1/attendance/break/end",
    request_body = EndBreakRequest,
    responses(
        (status = 200, description = "Break closed", body = Object, example = json!({"duration_minutes": 30})),
        (status = 409, description = "No open break to close")
    ),
    tag = "Attendance"
)]
pub async fn end_break(
    pool: web::Data<MySqlPool>,
    bus: web::Data<EventBus>,
    payload: web::Json<EndBreakRequest>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let brk = session::end_break(
        pool.get_ref(),
        bus.get_ref(),
        payload.break_id,
        payload.timestamp.unwrap_or_else(Utc::now),
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "duration_minutes": brk.duration_minutes })))
}

/// Current-status endpoint. Live net hours for open sessions are computed
/// against the server clock and never persisted.
#[utoipa::path(
    get,
    path = "/api/v1/attendance/current-status",
    params(StatusQuery),
    responses(
        (status = 200, description = "Current status projection", body = CurrentStatusResponse)
    ),
    tag = "Attendance"
)]
pub async fn current_status(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    query: web::Query<StatusQuery>,
) -> actix_web::Result<impl Responder> {
    let snapshot =
        session::current_status(pool.get_ref(), config.policy, query.employee_id, Utc::now())
            .await?;

    let is_active = snapshot
        .as_ref()
        .map(|s| s.status != SessionStatus::Completed)
        .unwrap_or(false);

    Ok(HttpResponse::Ok().json(CurrentStatusResponse { is_active, session: snapshot }))
}
