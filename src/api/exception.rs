use actix_web::{HttpResponse, Responder, web};
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::config::Config;
use crate::engine::exception::{self, ExceptionCommand, ResolveCommand};
use crate::events::EventBus;
use crate::model::exception::{Decision, ExceptionKind, ExceptionStatus};

#[derive(Deserialize, ToSchema)]
pub struct CreateExceptionRequest {
    #[schema(example = 42)]
    pub session_id: u64,
    #[schema(example = "late")]
    pub kind: ExceptionKind,
    #[schema(example = "Metro line was down this morning")]
    pub reason: String,
    #[schema(example = 1000)]
    pub requested_by: u64,
}

#[derive(Serialize, ToSchema)]
pub struct ExceptionResponse {
    pub request_id: u64,
    pub status: ExceptionStatus,
}

#[derive(Deserialize, ToSchema)]
pub struct ResolveExceptionRequest {
    #[schema(example = "approve")]
    pub decision: Decision,
    #[schema(example = 2000)]
    pub resolved_by: u64,
    #[schema(example = "Confirmed with the line manager")]
    pub notes: Option<String>,
}

/// File an exception request against a session
#[utoipa::path(
    post,
    path = "/api/v1/exception",
    request_body = CreateExceptionRequest,
    responses(
        (status = 200, description = "Request filed (or auto-approved)", body = ExceptionResponse),
        (status = 404, description = "Session not found"),
        (status = 409, description = "A pending request of this kind already exists")
    ),
    tag = "Exception"
)]
pub async fn request_exception(
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
    bus: web::Data<EventBus>,
    payload: web::Json<CreateExceptionRequest>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let cmd = ExceptionCommand {
        session_id: payload.session_id,
        kind: payload.kind,
        reason: payload.reason,
        requested_by: payload.requested_by,
    };

    let request =
        exception::request_exception(pool.get_ref(), config.policy, bus.get_ref(), cmd).await?;

    Ok(HttpResponse::Ok().json(ExceptionResponse { request_id: request.id, status: request.status }))
}

/// Resolve a pending exception request
#[utoipa::path(
    put,
    path = "/api/v1/exception/{request_id}/resolve",
    params(
        ("request_id" = u64, Path, description = "Exception request to resolve")
    ),
    request_body = ResolveExceptionRequest,
    responses(
        (status = 200, description = "Request resolved", body = ExceptionResponse),
        (status = 403, description = "Approver lacks capability"),
        (status = 404, description = "Request not found"),
        (status = 409, description = "Request already resolved")
    ),
    tag = "Exception"
)]
pub async fn resolve_exception(
    pool: web::Data<MySqlPool>,
    bus: web::Data<EventBus>,
    path: web::Path<u64>,
    payload: web::Json<ResolveExceptionRequest>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let cmd = ResolveCommand {
        request_id: path.into_inner(),
        decision: payload.decision,
        resolved_by: payload.resolved_by,
        notes: payload.notes,
    };

    let request = exception::resolve_exception(pool.get_ref(), bus.get_ref(), cmd).await?;

    Ok(HttpResponse::Ok().json(ExceptionResponse { request_id: request.id, status: request.status }))
}
