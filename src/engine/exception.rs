//! Exception approval workflow: late / early-leave / overtime /
//! break-extension requests tied to a session. Approval updates session
//! verification metadata; computed durations are never altered here.

use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

use crate::config::EnginePolicy;
use crate::engine::{lookup_role, require_approver};
use crate::error::EngineError;
use crate::events::{DomainEvent, EventBus, EventKind};
use crate::model::employee::is_privileged_role;
use crate::model::exception::{Decision, ExceptionKind, ExceptionRequest, ExceptionStatus};
use crate::model::session::VerificationStatus;

const REQUEST_COLUMNS: &str = "id, session_id, kind, reason, status, requested_by, resolved_by, \
     resolution_notes, created_at, resolved_at";

#[derive(Debug, Clone)]
pub struct ExceptionCommand {
    pub session_id: u64,
    pub kind: ExceptionKind,
    pub reason: String,
    pub requested_by: u64,
}

#[derive(Debug, Clone)]
pub struct ResolveCommand {
    pub request_id: u64,
    pub decision: Decision,
    pub resolved_by: u64,
    pub notes: Option<String>,
}

fn should_auto_approve(policy: EnginePolicy, requester_role: Option<&str>) -> bool {
    policy.auto_approve_privileged && requester_role.map(is_privileged_role).unwrap_or(false)
}

async fn fetch_request<'e, E>(executor: E, id: u64) -> Result<ExceptionRequest, EngineError>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    let sql = format!("SELECT {} FROM exception_requests WHERE id = ?", REQUEST_COLUMNS);
    Ok(sqlx::query_as::<_, ExceptionRequest>(&sql)
        .bind(id)
        .fetch_one(executor)
        .await?)
}

async fn mark_session_verified<'e, E>(
    executor: E,
    session_id: u64,
    approver_id: u64,
) -> Result<(), EngineError>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    sqlx::query("UPDATE attendance_sessions SET verification_status = ?, approved_by = ? WHERE id = ?")
        .bind(VerificationStatus::Approved)
        .bind(approver_id)
        .bind(session_id)
        .execute(executor)
        .await?;
    Ok(())
}

/// File an exception against a session. At most one pending request of a
/// given kind per session, checked under the session row lock. Privileged
/// requesters are auto-approved in the same transaction when the
/// deployment enables it, with the requester attributed as approver.
pub async fn request_exception(
    pool: &MySqlPool,
    policy: EnginePolicy,
    bus: &EventBus,
    cmd: ExceptionCommand,
) -> Result<ExceptionRequest, EngineError> {
    if cmd.reason.trim().is_empty() {
        return Err(EngineError::validation("reason must not be empty"));
    }

    let mut tx = pool.begin().await?;

    let session = sqlx::query_as::<_, (u64, u64)>(
        "SELECT id, employee_id FROM attendance_sessions WHERE id = ? FOR UPDATE",
    )
    .bind(cmd.session_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or(EngineError::NotFound("attendance session"))?;
    let (session_id, employee_id) = session;

    let pending = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM exception_requests WHERE session_id = ? AND kind = ? AND status = 'pending'",
    )
    .bind(session_id)
    .bind(cmd.kind)
    .fetch_one(&mut *tx)
    .await?;
    if pending > 0 {
        return Err(EngineError::DuplicatePendingRequest);
    }

    let requester_role = lookup_role(&mut *tx, cmd.requested_by).await?;
    let auto = should_auto_approve(policy, requester_role.as_deref());

    let now: DateTime<Utc> = Utc::now();
    let (status, resolved_by, resolved_at) = if auto {
        (ExceptionStatus::Approved, Some(cmd.requested_by), Some(now))
    } else {
        (ExceptionStatus::Pending, None, None)
    };

    let result = sqlx::query(
        r#"
        INSERT INTO exception_requests
            (session_id, kind, reason, status, requested_by, resolved_by, created_at, resolved_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(session_id)
    .bind(cmd.kind)
    .bind(&cmd.reason)
    .bind(status)
    .bind(cmd.requested_by)
    .bind(resolved_by)
    .bind(now)
    .bind(resolved_at)
    .execute(&mut *tx)
    .await?;

    if auto && cmd.kind.updates_session_verification() {
        mark_session_verified(&mut *tx, session_id, cmd.requested_by).await?;
    }

    let request = fetch_request(&mut *tx, result.last_insert_id()).await?;
    tx.commit().await?;

    if auto {
        tracing::info!(
            request_id = request.id,
            session_id,
            requested_by = cmd.requested_by,
            "exception auto-approved for privileged requester"
        );
        bus.emit(DomainEvent::new(EventKind::ExceptionResolved, employee_id, Some(session_id)));
    }
    Ok(request)
}

/// Resolve a pending request. Fails `AlreadyResolved` on terminal
/// requests and `Unauthorized` when the approver's role lacks approval
/// capability.
pub async fn resolve_exception(
    pool: &MySqlPool,
    bus: &EventBus,
    cmd: ResolveCommand,
) -> Result<ExceptionRequest, EngineError> {
    let mut tx = pool.begin().await?;

    let sql = format!("SELECT {} FROM exception_requests WHERE id = ? FOR UPDATE", REQUEST_COLUMNS);
    let request = sqlx::query_as::<_, ExceptionRequest>(&sql)
        .bind(cmd.request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(EngineError::NotFound("exception request"))?;

    if request.status != ExceptionStatus::Pending {
        return Err(EngineError::AlreadyResolved);
    }

    require_approver(&mut *tx, cmd.resolved_by).await?;

    let status = cmd.decision.into_status();
    sqlx::query(
        "UPDATE exception_requests SET status = ?, resolved_by = ?, resolution_notes = ?, resolved_at = ? WHERE id = ?",
    )
    .bind(status)
    .bind(cmd.resolved_by)
    .bind(&cmd.notes)
    .bind(Utc::now())
    .bind(cmd.request_id)
    .execute(&mut *tx)
    .await?;

    if status == ExceptionStatus::Approved && request.kind.updates_session_verification() {
        mark_session_verified(&mut *tx, request.session_id, cmd.resolved_by).await?;
    }

    let employee_id = sqlx::query_scalar::<_, u64>(
        "SELECT employee_id FROM attendance_sessions WHERE id = ?",
    )
    .bind(request.session_id)
    .fetch_one(&mut *tx)
    .await?;

    let updated = fetch_request(&mut *tx, cmd.request_id).await?;
    tx.commit().await?;

    bus.emit(DomainEvent::new(EventKind::ExceptionResolved, employee_id, Some(request.session_id)));
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(auto: bool) -> EnginePolicy {
        EnginePolicy {
            standard_day_minutes: 480,
            strict_geofence: false,
            auto_approve_privileged: auto,
        }
    }

    #[test]
    fn auto_approval_needs_both_toggle_and_privilege() {
        assert!(should_auto_approve(policy(true), Some("manager")));
        assert!(!should_auto_approve(policy(false), Some("manager")));
        assert!(!should_auto_approve(policy(true), Some("employee")));
        assert!(!should_auto_approve(policy(true), None));
    }

    #[test]
    fn break_extension_does_not_touch_session_verification() {
        assert!(ExceptionKind::Late.updates_session_verification());
        assert!(ExceptionKind::EarlyLeave.updates_session_verification());
        assert!(ExceptionKind::Overtime.updates_session_verification());
        assert!(!ExceptionKind::BreakExtension.updates_session_verification());
    }

    #[test]
    fn decision_maps_to_terminal_status() {
        assert_eq!(Decision::Approve.into_status(), ExceptionStatus::Approved);
        assert_eq!(Decision::Reject.into_status(), ExceptionStatus::Rejected);
    }
}
