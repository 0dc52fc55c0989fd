use actix_web::{HttpResponse, Responder, web};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::engine::ledger::{self, LeaveRequestCommand};
use crate::events::EventBus;
use crate::model::leave::{LeaveBalance, LeaveStatus};

#[derive(Deserialize, ToSchema)]
pub struct CreateLeaveRequest {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = 3)]
    pub leave_type_id: u64,
    #[schema(example = "2026-09-01", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2026-09-05", format = "date", value_type = String)]
    pub end_date: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveRequestResponse {
    pub request_id: u64,
    #[schema(example = 5.0)]
    pub day_count: f64,
    pub status: LeaveStatus,
}

#[derive(Deserialize, ToSchema)]
pub struct ApproveLeaveRequest {
    #[schema(example = 2000)]
    pub approver_id: u64,
}

#[derive(Deserialize, ToSchema)]
pub struct RejectLeaveRequest {
    #[schema(example = 2000)]
    pub approver_id: u64,
}

#[derive(Deserialize, ToSchema)]
pub struct CancelLeaveRequest {
    #[schema(example = 1000)]
    pub employee_id: u64,
}

#[derive(Deserialize, ToSchema)]
pub struct InitializeBalanceRequest {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = 3)]
    pub leave_type_id: u64,
    #[schema(example = 2026)]
    pub year: i32,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct BalanceQuery {
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = 3)]
    pub leave_type_id: u64,
    #[schema(example = 2026)]
    pub year: i32,
}

#[derive(Serialize, ToSchema)]
pub struct BalanceResponse {
    pub balance_id: u64,
    pub employee_id: u64,
    pub leave_type_id: u64,
    pub year: i32,
    #[schema(example = 15.0)]
    pub initial_days: f64,
    #[schema(example = 2.5)]
    pub accrued_days: f64,
    #[schema(example = 4.0)]
    pub used_days: f64,
    #[schema(example = 13.5)]
    pub current_days: f64,
}

impl From<LeaveBalance> for BalanceResponse {
    fn from(b: LeaveBalance) -> Self {
        BalanceResponse {
            balance_id: b.id,
            employee_id: b.employee_id,
            leave_type_id: b.leave_type_id,
            year: b.year,
            initial_days: b.initial_days,
            accrued_days: b.accrued_days,
            used_days: b.used_days,
            current_days: b.current_days,
        }
    }
}

/// Submit a leave request
#[utoipa::path(
    post,
    path = "/api/v1/leave",
    request_body = CreateLeaveRequest,
    responses(
        (status = 200, description = "Leave request submitted", body = LeaveRequestResponse),
        (status = 400, description = "start_date after end_date"),
        (status = 404, description = "Leave type not found")
    ),
    tag = "Leave"
)]
pub async fn create_leave(
    pool: web::Data<MySqlPool>,
    bus: web::Data<EventBus>,
    payload: web::Json<CreateLeaveRequest>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();
    let cmd = LeaveRequestCommand {
        employee_id: payload.employee_id,
        leave_type_id: payload.leave_type_id,
        start_date: payload.start_date,
        end_date: payload.end_date,
    };

    let request = ledger::create_leave_request(pool.get_ref(), bus.get_ref(), cmd).await?;

    Ok(HttpResponse::Ok().json(LeaveRequestResponse {
        request_id: request.id,
        day_count: request.day_count,
        status: request.status,
    }))
}

/// Approve a leave request, debiting the balance exactly once
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/approve",
    params(
        ("leave_id" = u64, Path, description = "Leave request to approve")
    ),
    request_body = ApproveLeaveRequest,
    responses(
        (status = 200, description = "Leave approved, balance debited", body = BalanceResponse),
        (status = 403, description = "Approver lacks capability"),
        (status = 409, description = "Request already resolved"),
        (status = 422, description = "Insufficient balance")
    ),
    tag = "Leave"
)]
pub async fn approve_leave(
    pool: web::Data<MySqlPool>,
    bus: web::Data<EventBus>,
    path: web::Path<u64>,
    payload: web::Json<ApproveLeaveRequest>,
) -> actix_web::Result<impl Responder> {
    let balance = ledger::approve_leave_request(
        pool.get_ref(),
        bus.get_ref(),
        path.into_inner(),
        payload.approver_id,
    )
    .await?;

    Ok(HttpResponse::Ok().json(BalanceResponse::from(balance)))
}

/// Reject a leave request (no balance effect)
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/reject",
    params(
        ("leave_id" = u64, Path, description = "Leave request to reject")
    ),
    request_body = RejectLeaveRequest,
    responses(
        (status = 200, description = "Leave rejected", body = LeaveRequestResponse),
        (status = 403, description = "Approver lacks capability"),
        (status = 409, description = "Request already resolved")
    ),
    tag = "Leave"
)]
pub async fn reject_leave(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<RejectLeaveRequest>,
) -> actix_web::Result<impl Responder> {
    let request =
        ledger::reject_leave_request(pool.get_ref(), path.into_inner(), payload.approver_id)
            .await?;

    Ok(HttpResponse::Ok().json(LeaveRequestResponse {
        request_id: request.id,
        day_count: request.day_count,
        status: request.status,
    }))
}

/// Cancel one's own pending leave request
#[utoipa::path(
    put,
    path = "/api/v1/leave/{leave_id}/cancel",
    params(
        ("leave_id" = u64, Path, description = "Leave request to cancel")
    ),
    request_body = CancelLeaveRequest,
    responses(
        (status = 200, description = "Leave cancelled", body = LeaveRequestResponse),
        (status = 403, description = "Not the requester"),
        (status = 409, description = "Request already resolved")
    ),
    tag = "Leave"
)]
pub async fn cancel_leave(
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<CancelLeaveRequest>,
) -> actix_web::Result<impl Responder> {
    let request =
        ledger::cancel_leave_request(pool.get_ref(), path.into_inner(), payload.employee_id)
            .await?;

    Ok(HttpResponse::Ok().json(LeaveRequestResponse {
        request_id: request.id,
        day_count: request.day_count,
        status: request.status,
    }))
}

/// Create the default balance for (employee, leave type, year)
#[utoipa::path(
    post,
    path = "/api/v1/leave/balance",
    request_body = InitializeBalanceRequest,
    responses(
        (status = 200, description = "Balance created", body = BalanceResponse),
        (status = 404, description = "Leave type not found"),
        (status = 409, description = "Balance already exists")
    ),
    tag = "Leave"
)]
pub async fn initialize_balance(
    pool: web::Data<MySqlPool>,
    payload: web::Json<InitializeBalanceRequest>,
) -> actix_web::Result<impl Responder> {
    let balance = ledger::initialize_balance(
        pool.get_ref(),
        payload.employee_id,
        payload.leave_type_id,
        payload.year,
    )
    .await?;

    Ok(HttpResponse::Ok().json(BalanceResponse::from(balance)))
}

/// Fetch a balance row
#[utoipa::path(
    get,
    path = "/api/v1/leave/balance",
    params(BalanceQuery),
    responses(
        (status = 200, description = "Balance found", body = BalanceResponse),
        (status = 404, description = "No balance for that key")
    ),
    tag = "Leave"
)]
pub async fn get_balance(
    pool: web::Data<MySqlPool>,
    query: web::Query<BalanceQuery>,
) -> actix_web::Result<impl Responder> {
    let balance = ledger::current_balance(
        pool.get_ref(),
        query.employee_id,
        query.leave_type_id,
        query.year,
    )
    .await?;

    match balance {
        Some(b) => Ok(HttpResponse::Ok().json(BalanceResponse::from(b))),
        None => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "No balance for that employee, leave type and year"
        }))),
    }
}
