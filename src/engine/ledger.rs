//! Leave accrual and consumption ledger. Balances are mutated only here:
//! by the periodic accrual job and by leave-request approval. Requests
//! follow Pending -> Approved (debits exactly once, terminal) or
//! Pending -> Rejected/Cancelled (terminal, no ledger effect).

use chrono::{Datelike, NaiveDate, Utc};
use futures_util::StreamExt;
use sqlx::MySqlPool;

use crate::engine::require_approver;
use crate::error::{EngineError, is_unique_violation};
use crate::events::{DomainEvent, EventBus, EventKind};
use crate::model::leave::{LeaveBalance, LeaveRequest, LeaveStatus, LeaveType};

const BALANCE_COLUMNS: &str =
    "id, employee_id, leave_type_id, year, initial_days, accrued_days, used_days, current_days";

const REQUEST_COLUMNS: &str = "id, employee_id, leave_type_id, start_date, end_date, day_count, \
     status, approver_id, created_at, resolved_at";

const TYPE_COLUMNS: &str =
    "id, name, default_allotment_days, monthly_accrual_days, cap_days, paid, requires_approval";

#[derive(Debug, Clone)]
pub struct LeaveRequestCommand {
    pub employee_id: u64,
    pub leave_type_id: u64,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// One period's accrual: add the rate, recompute the running balance,
/// clamp to the cap when one is defined.
pub fn apply_accrual(
    initial: f64,
    accrued: f64,
    used: f64,
    rate: f64,
    cap: Option<f64>,
) -> (f64, f64) {
    let accrued = accrued + rate;
    let mut current = initial + accrued - used;
    if let Some(cap) = cap {
        current = current.min(cap);
    }
    (accrued, current)
}

/// Reject over-draw instead of letting a balance go negative.
fn ensure_sufficient(current: f64, requested: f64) -> Result<(), EngineError> {
    if current < requested {
        return Err(EngineError::InsufficientBalance { requested, available: current });
    }
    Ok(())
}

/// Terminal requests admit no further transition.
fn ensure_pending(status: LeaveStatus) -> Result<(), EngineError> {
    if status.is_terminal() {
        return Err(EngineError::AlreadyResolved);
    }
    Ok(())
}

/// Leave ranges are inclusive on both ends.
fn day_count_for_range(start: NaiveDate, end: NaiveDate) -> f64 {
    ((end - start).num_days() + 1) as f64
}

/// `period` is `YYYY-MM`; returns the year it belongs to.
fn parse_period(period: &str) -> Result<i32, EngineError> {
    let parse = || -> Option<i32> {
        let (year, month) = period.split_once('-')?;
        let year: i32 = year.parse().ok()?;
        let month: u32 = month.parse().ok()?;
        (1..=12).contains(&month).then_some(year)
    };
    parse().ok_or_else(|| EngineError::validation("period must be formatted as YYYY-MM"))
}

#[derive(sqlx::FromRow)]
struct AccrualRow {
    id: u64,
    initial_days: f64,
    accrued_days: f64,
    used_days: f64,
    monthly_accrual_days: f64,
    cap_days: Option<f64>,
}

async fn fetch_request<'e, E>(executor: E, id: u64) -> Result<LeaveRequest, EngineError>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    let sql = format!("SELECT {} FROM leave_requests WHERE id = ?", REQUEST_COLUMNS);
    Ok(sqlx::query_as::<_, LeaveRequest>(&sql).bind(id).fetch_one(executor).await?)
}

async fn fetch_balance<'e, E>(executor: E, id: u64) -> Result<LeaveBalance, EngineError>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    let sql = format!("SELECT {} FROM leave_balances WHERE id = ?", BALANCE_COLUMNS);
    Ok(sqlx::query_as::<_, LeaveBalance>(&sql).bind(id).fetch_one(executor).await?)
}

/// Create a zeroed/default balance for (employee, leave type, year).
pub async fn initialize_balance(
    pool: &MySqlPool,
    employee_id: u64,
    leave_type_id: u64,
    year: i32,
) -> Result<LeaveBalance, EngineError> {
    let sql = format!("SELECT {} FROM leave_types WHERE id = ?", TYPE_COLUMNS);
    let leave_type = sqlx::query_as::<_, LeaveType>(&sql)
        .bind(leave_type_id)
        .fetch_optional(pool)
        .await?
        .ok_or(EngineError::NotFound("leave type"))?;

    let mut initial = leave_type.default_allotment_days;
    if let Some(cap) = leave_type.cap_days {
        initial = initial.min(cap);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO leave_balances
            (employee_id, leave_type_id, year, initial_days, accrued_days, used_days, current_days)
        VALUES (?, ?, ?, ?, 0, 0, ?)
        "#,
    )
    .bind(employee_id)
    .bind(leave_type_id)
    .bind(year)
    .bind(initial)
    .bind(initial)
    .execute(pool)
    .await;

    let result = match result {
        Ok(r) => r,
        Err(e) if is_unique_violation(&e) => return Err(EngineError::AlreadyExists),
        Err(e) => return Err(e.into()),
    };

    fetch_balance(pool, result.last_insert_id()).await
}

/// Apply one period's accrual to every balance of an accruing leave type
/// in the period's year. NOT idempotent per call: each invocation adds a
/// full increment. The scheduler claims the period before calling so the
/// system accrues exactly once per period.
pub async fn accrue(pool: &MySqlPool, period: &str) -> Result<u64, EngineError> {
    let year = parse_period(period)?;

    let mut rows = sqlx::query_as::<_, AccrualRow>(
        r#"
        SELECT b.id, b.initial_days, b.accrued_days, b.used_days,
               t.monthly_accrual_days, t.cap_days
        FROM leave_balances b
        JOIN leave_types t ON t.id = b.leave_type_id
        WHERE b.year = ? AND t.monthly_accrual_days > 0
        "#,
    )
    .bind(year)
    .fetch(pool);

    let mut count = 0u64;
    while let Some(row) = rows.next().await {
        let row = row?;
        let (accrued, current) = apply_accrual(
            row.initial_days,
            row.accrued_days,
            row.used_days,
            row.monthly_accrual_days,
            row.cap_days,
        );
        sqlx::query("UPDATE leave_balances SET accrued_days = ?, current_days = ? WHERE id = ?")
            .bind(accrued)
            .bind(current)
            .bind(row.id)
            .execute(pool)
            .await?;
        count += 1;
    }

    log::info!("Leave accrual for {}: {} balances updated", period, count);
    Ok(count)
}

/// Submit a leave request. Types that do not require approval are
/// approved (and debited) immediately through the same path an approver
/// would take.
pub async fn create_leave_request(
    pool: &MySqlPool,
    bus: &EventBus,
    cmd: LeaveRequestCommand,
) -> Result<LeaveRequest, EngineError> {
    if cmd.start_date > cmd.end_date {
        return Err(EngineError::validation("start_date cannot be after end_date"));
    }

    let sql = format!("SELECT {} FROM leave_types WHERE id = ?", TYPE_COLUMNS);
    let leave_type = sqlx::query_as::<_, LeaveType>(&sql)
        .bind(cmd.leave_type_id)
        .fetch_optional(pool)
        .await?
        .ok_or(EngineError::NotFound("leave type"))?;

    let day_count = day_count_for_range(cmd.start_date, cmd.end_date);

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (employee_id, leave_type_id, start_date, end_date, day_count, status, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(cmd.employee_id)
    .bind(cmd.leave_type_id)
    .bind(cmd.start_date)
    .bind(cmd.end_date)
    .bind(day_count)
    .bind(LeaveStatus::Pending)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    let mut request = fetch_request(pool, result.last_insert_id()).await?;

    if !leave_type.requires_approval {
        match debit_on_approval(pool, bus, request.id, None).await {
            Ok(_) => request = fetch_request(pool, request.id).await?,
            Err(EngineError::InsufficientBalance { requested, available }) => {
                tracing::warn!(
                    request_id = request.id,
                    requested,
                    available,
                    "auto-approval skipped, request left pending"
                );
            }
            Err(e) => return Err(e),
        }
    }

    Ok(request)
}

/// Approver-facing approval: capability check, then the debit.
pub async fn approve_leave_request(
    pool: &MySqlPool,
    bus: &EventBus,
    request_id: u64,
    approver_id: u64,
) -> Result<LeaveBalance, EngineError> {
    require_approver(pool, approver_id).await?;
    debit_on_approval(pool, bus, request_id, Some(approver_id)).await
}

/// Transition a pending request to approved and debit its balance exactly
/// once. The balance row is locked and the UPDATE carries a non-negative
/// guard, so racing approvals serialize and the balance never goes
/// negative. Re-approving a terminal request fails `AlreadyResolved`
/// without touching the ledger.
pub async fn debit_on_approval(
    pool: &MySqlPool,
    bus: &EventBus,
    request_id: u64,
    approver_id: Option<u64>,
) -> Result<LeaveBalance, EngineError> {
    let mut tx = pool.begin().await?;

    let sql = format!("SELECT {} FROM leave_requests WHERE id = ? FOR UPDATE", REQUEST_COLUMNS);
    let request = sqlx::query_as::<_, LeaveRequest>(&sql)
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(EngineError::NotFound("leave request"))?;
    ensure_pending(request.status)?;

    let year = request.start_date.year();
    let sql = format!(
        "SELECT {} FROM leave_balances WHERE employee_id = ? AND leave_type_id = ? AND year = ? FOR UPDATE",
        BALANCE_COLUMNS
    );
    let balance = sqlx::query_as::<_, LeaveBalance>(&sql)
        .bind(request.employee_id)
        .bind(request.leave_type_id)
        .bind(year)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(EngineError::NotFound("leave balance"))?;

    ensure_sufficient(balance.current_days, request.day_count)?;

    let updated = sqlx::query(
        "UPDATE leave_balances SET used_days = used_days + ?, current_days = current_days - ? \
         WHERE id = ? AND current_days >= ?",
    )
    .bind(request.day_count)
    .bind(request.day_count)
    .bind(balance.id)
    .bind(request.day_count)
    .execute(&mut *tx)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(EngineError::InsufficientBalance {
            requested: request.day_count,
            available: balance.current_days,
        });
    }

    sqlx::query("UPDATE leave_requests SET status = ?, approver_id = ?, resolved_at = ? WHERE id = ?")
        .bind(LeaveStatus::Approved)
        .bind(approver_id)
        .bind(Utc::now())
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

    let debited = fetch_balance(&mut *tx, balance.id).await?;
    tx.commit().await?;

    bus.emit(DomainEvent::new(EventKind::LeaveDebited, request.employee_id, None));
    Ok(debited)
}

pub async fn reject_leave_request(
    pool: &MySqlPool,
    request_id: u64,
    approver_id: u64,
) -> Result<LeaveRequest, EngineError> {
    require_approver(pool, approver_id).await?;

    let mut tx = pool.begin().await?;
    let sql = format!("SELECT {} FROM leave_requests WHERE id = ? FOR UPDATE", REQUEST_COLUMNS);
    let request = sqlx::query_as::<_, LeaveRequest>(&sql)
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(EngineError::NotFound("leave request"))?;
    ensure_pending(request.status)?;

    sqlx::query("UPDATE leave_requests SET status = ?, approver_id = ?, resolved_at = ? WHERE id = ?")
        .bind(LeaveStatus::Rejected)
        .bind(approver_id)
        .bind(Utc::now())
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

    let updated = fetch_request(&mut *tx, request_id).await?;
    tx.commit().await?;
    Ok(updated)
}

/// Requester-initiated withdrawal of a still-pending request.
pub async fn cancel_leave_request(
    pool: &MySqlPool,
    request_id: u64,
    employee_id: u64,
) -> Result<LeaveRequest, EngineError> {
    let mut tx = pool.begin().await?;
    let sql = format!("SELECT {} FROM leave_requests WHERE id = ? FOR UPDATE", REQUEST_COLUMNS);
    let request = sqlx::query_as::<_, LeaveRequest>(&sql)
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(EngineError::NotFound("leave request"))?;
    if request.employee_id != employee_id {
        return Err(EngineError::Unauthorized);
    }
    ensure_pending(request.status)?;

    sqlx::query("UPDATE leave_requests SET status = ?, resolved_at = ? WHERE id = ?")
        .bind(LeaveStatus::Cancelled)
        .bind(Utc::now())
        .bind(request_id)
        .execute(&mut *tx)
        .await?;

    let updated = fetch_request(&mut *tx, request_id).await?;
    tx.commit().await?;
    Ok(updated)
}

pub async fn current_balance(
    pool: &MySqlPool,
    employee_id: u64,
    leave_type_id: u64,
    year: i32,
) -> Result<Option<LeaveBalance>, EngineError> {
    let sql = format!(
        "SELECT {} FROM leave_balances WHERE employee_id = ? AND leave_type_id = ? AND year = ?",
        BALANCE_COLUMNS
    );
    Ok(sqlx::query_as::<_, LeaveBalance>(&sql)
        .bind(employee_id)
        .bind(leave_type_id)
        .bind(year)
        .fetch_optional(pool)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accrual_maintains_the_balance_equation() {
        let (accrued, current) = apply_accrual(10.0, 2.0, 4.0, 1.5, None);
        assert_eq!(accrued, 3.5);
        assert_eq!(current, 10.0 + 3.5 - 4.0);
    }

    #[test]
    fn accrual_clamps_to_cap() {
        let (accrued, current) = apply_accrual(18.0, 2.0, 0.0, 1.5, Some(20.0));
        assert_eq!(accrued, 3.5);
        assert_eq!(current, 20.0);
    }

    #[test]
    fn accrual_without_cap_is_unbounded() {
        let (_, current) = apply_accrual(18.0, 2.0, 0.0, 1.5, None);
        assert_eq!(current, 21.5);
    }

    #[test]
    fn overdraw_is_rejected() {
        // 5 days against a balance of 3 must fail and leave the balance
        // untouched.
        let err = ensure_sufficient(3.0, 5.0).unwrap_err();
        match err {
            EngineError::InsufficientBalance { requested, available } => {
                assert_eq!(requested, 5.0);
                assert_eq!(available, 3.0);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(ensure_sufficient(5.0, 5.0).is_ok());
    }

    #[test]
    fn terminal_requests_cannot_transition() {
        assert!(ensure_pending(LeaveStatus::Pending).is_ok());
        for status in [LeaveStatus::Approved, LeaveStatus::Rejected, LeaveStatus::Cancelled] {
            assert!(matches!(ensure_pending(status), Err(EngineError::AlreadyResolved)));
        }
    }

    #[test]
    fn day_count_is_inclusive() {
        let start = NaiveDate::from_ymd_opt(2026, 8, 3).unwrap();
        assert_eq!(day_count_for_range(start, start), 1.0);
        let end = NaiveDate::from_ymd_opt(2026, 8, 7).unwrap();
        assert_eq!(day_count_for_range(start, end), 5.0);
    }

    #[test]
    fn period_parsing() {
        assert_eq!(parse_period("2026-08").unwrap(), 2026);
        assert!(parse_period("2026").is_err());
        assert!(parse_period("2026-13").is_err());
        assert!(parse_period("august").is_err());
    }
}
