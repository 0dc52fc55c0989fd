//! Attendance session state machine: NoSession -> Active -> OnBreak ->
//! Active -> Completed. Every mutating operation runs as one transaction
//! against the backing store, commits, invalidates the status cache and
//! then emits a domain event. Duplicate punch-ins resolve through the
//! (employee_id, date) unique key, not application-level locking.

use chrono::{DateTime, Utc};
use sqlx::MySqlPool;

use crate::config::EnginePolicy;
use crate::engine::{geofence, worktime};
use crate::engine::worktime::{BreakSpan, Durations};
use crate::error::{EngineError, is_unique_violation};
use crate::events::{DomainEvent, EventBus, EventKind};
use crate::model::geofence::GeoPoint;
use crate::model::session::{
    AttendanceSession, Break, BreakKind, PunchMethod, SessionSnapshot, SessionStatus,
};
use crate::model::workplace::Workplace;
use crate::utils::status_cache;

const SESSION_COLUMNS: &str = "id, employee_id, workplace_id, date, punched_in_at, punched_out_at, \
     status, total_minutes, break_minutes, net_minutes, overtime_minutes, punch_in_compliant, \
     punch_out_compliant, punch_in_method, punch_out_method, punch_in_accuracy_m, \
     verification_status, approved_by, flagged_for_review";

const BREAK_COLUMNS: &str = "id, session_id, kind, started_at, ended_at, duration_minutes";

#[derive(Debug, Clone)]
pub struct PunchInCommand {
    pub employee_id: u64,
    pub workplace_id: u64,
    pub point: GeoPoint,
    pub at: DateTime<Utc>,
    pub method: PunchMethod,
    pub accuracy_m: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct PunchOutCommand {
    pub employee_id: u64,
    pub point: GeoPoint,
    pub at: DateTime<Utc>,
    pub method: PunchMethod,
}

/// A break may start only while the session is plainly active.
fn ensure_break_can_start(status: SessionStatus) -> Result<(), EngineError> {
    match status {
        SessionStatus::Active => Ok(()),
        SessionStatus::OnBreak => Err(EngineError::BreakAlreadyOpen),
        SessionStatus::Completed => Err(EngineError::NoActiveSession),
    }
}

/// Punch-out with an open break fails rather than silently closing it.
fn ensure_can_punch_out(status: SessionStatus, open_breaks: i64) -> Result<(), EngineError> {
    if status == SessionStatus::Completed {
        return Err(EngineError::NoActiveSession);
    }
    if open_breaks > 0 {
        return Err(EngineError::OpenBreakPending);
    }
    Ok(())
}

fn make_snapshot(session: &AttendanceSession, d: Durations, provisional: bool) -> SessionSnapshot {
    SessionSnapshot {
        session_id: session.id,
        employee_id: session.employee_id,
        workplace_id: session.workplace_id,
        date: session.date,
        status: session.status,
        punched_in_at: session.punched_in_at,
        punched_out_at: session.punched_out_at,
        total_minutes: d.total_minutes,
        break_minutes: d.break_minutes,
        net_minutes: d.net_minutes,
        overtime_minutes: d.overtime_minutes,
        punch_in_compliant: session.punch_in_compliant,
        punch_out_compliant: session.punch_out_compliant,
        flagged_for_review: session.flagged_for_review || d.clock_skew,
        provisional,
    }
}

async fn fetch_session<'e, E>(executor: E, id: u64) -> Result<AttendanceSession, EngineError>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    let sql = format!("SELECT {} FROM attendance_sessions WHERE id = ?", SESSION_COLUMNS);
    Ok(sqlx::query_as::<_, AttendanceSession>(&sql)
        .bind(id)
        .fetch_one(executor)
        .await?)
}

async fn fetch_break_spans<'e, E>(executor: E, session_id: u64) -> Result<Vec<BreakSpan>, EngineError>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    let sql = format!("SELECT {} FROM breaks WHERE session_id = ?", BREAK_COLUMNS);
    let breaks = sqlx::query_as::<_, Break>(&sql)
        .bind(session_id)
        .fetch_all(executor)
        .await?;
    Ok(breaks.iter().map(BreakSpan::from).collect())
}

async fn count_open_breaks<'e, E>(executor: E, session_id: u64) -> Result<i64, EngineError>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    Ok(sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM breaks WHERE session_id = ? AND ended_at IS NULL",
    )
    .bind(session_id)
    .fetch_one(executor)
    .await?)
}

/// Open a session for (employee, today). Geofence failure is recorded on
/// the session rather than rejecting the punch, unless the deployment
/// runs with strict geofencing.
pub async fn punch_in(
    pool: &MySqlPool,
    policy: EnginePolicy,
    bus: &EventBus,
    cmd: PunchInCommand,
) -> Result<AttendanceSession, EngineError> {
    cmd.point.validate()?;

    let workplace = sqlx::query_as::<_, Workplace>("SELECT id, name FROM workplaces WHERE id = ?")
        .bind(cmd.workplace_id)
        .fetch_optional(pool)
        .await?;
    if workplace.is_none() {
        return Err(EngineError::UnknownWorkplace);
    }

    let compliant =
        geofence::check_compliance(pool, cmd.workplace_id, cmd.point, cmd.method).await?;
    if policy.strict_geofence && !compliant {
        return Err(EngineError::OutOfGeofence);
    }

    let result = sqlx::query(
        r#"
        INSERT INTO attendance_sessions
            (employee_id, workplace_id, date, punched_in_at, status,
             punch_in_compliant, punch_in_method, punch_in_accuracy_m)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(cmd.employee_id)
    .bind(cmd.workplace_id)
    .bind(cmd.at.date_naive())
    .bind(cmd.at)
    .bind(SessionStatus::Active)
    .bind(compliant)
    .bind(cmd.method)
    .bind(cmd.accuracy_m)
    .execute(pool)
    .await;

    let result = match result {
        Ok(r) => r,
        Err(e) if is_unique_violation(&e) => return Err(EngineError::DuplicateSession),
        Err(e) => return Err(e.into()),
    };

    let session = fetch_session(pool, result.last_insert_id()).await?;

    if !compliant {
        tracing::warn!(
            employee_id = cmd.employee_id,
            workplace_id = cmd.workplace_id,
            "punch-in outside geofence, recorded for audit"
        );
    }

    status_cache::invalidate(cmd.employee_id).await;
    bus.emit(DomainEvent::new(EventKind::SessionPunchedIn, cmd.employee_id, Some(session.id)));
    Ok(session)
}

pub async fn start_break(
    pool: &MySqlPool,
    bus: &EventBus,
    session_id: u64,
    kind: BreakKind,
    at: DateTime<Utc>,
) -> Result<Break, EngineError> {
    let mut tx = pool.begin().await?;

    let sql = format!("SELECT {} FROM attendance_sessions WHERE id = ? FOR UPDATE", SESSION_COLUMNS);
    let session = sqlx::query_as::<_, AttendanceSession>(&sql)
        .bind(session_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(EngineError::NoActiveSession)?;

    ensure_break_can_start(session.status)?;
    if at < session.punched_in_at {
        return Err(EngineError::validation("break cannot start before punch-in"));
    }
    // one open break per session at a time
    if count_open_breaks(&mut *tx, session_id).await? > 0 {
        return Err(EngineError::BreakAlreadyOpen);
    }

    let result = sqlx::query("INSERT INTO breaks (session_id, kind, started_at) VALUES (?, ?, ?)")
        .bind(session_id)
        .bind(kind)
        .bind(at)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE attendance_sessions SET status = ? WHERE id = ?")
        .bind(SessionStatus::OnBreak)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

    let sql = format!("SELECT {} FROM breaks WHERE id = ?", BREAK_COLUMNS);
    let brk = sqlx::query_as::<_, Break>(&sql)
        .bind(result.last_insert_id())
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    status_cache::invalidate(session.employee_id).await;
    bus.emit(DomainEvent::new(EventKind::BreakStarted, session.employee_id, Some(session_id)));
    Ok(brk)
}

/// Close the open break identified by `break_id` and return the session
/// to Active. The mobile client holds the break id it got from
/// `start_break`.
pub async fn end_break(
    pool: &MySqlPool,
    bus: &EventBus,
    break_id: u64,
    at: DateTime<Utc>,
) -> Result<Break, EngineError> {
    let mut tx = pool.begin().await?;

    let sql = format!("SELECT {} FROM breaks WHERE id = ? FOR UPDATE", BREAK_COLUMNS);
    let brk = sqlx::query_as::<_, Break>(&sql)
        .bind(break_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(EngineError::NoOpenBreak)?;
    if brk.ended_at.is_some() {
        return Err(EngineError::NoOpenBreak);
    }

    let sql = format!("SELECT {} FROM attendance_sessions WHERE id = ? FOR UPDATE", SESSION_COLUMNS);
    let session = sqlx::query_as::<_, AttendanceSession>(&sql)
        .bind(brk.session_id)
        .fetch_one(&mut *tx)
        .await?;
    if session.status == SessionStatus::Completed {
        return Err(EngineError::NoOpenBreak);
    }

    if at < brk.started_at {
        return Err(EngineError::validation("break cannot end before it started"));
    }
    let duration_minutes = (at - brk.started_at).num_minutes();

    sqlx::query("UPDATE breaks SET ended_at = ?, duration_minutes = ? WHERE id = ?")
        .bind(at)
        .bind(duration_minutes)
        .bind(break_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE attendance_sessions SET status = ? WHERE id = ?")
        .bind(SessionStatus::Active)
        .bind(brk.session_id)
        .execute(&mut *tx)
        .await?;

    let sql = format!("SELECT {} FROM breaks WHERE id = ?", BREAK_COLUMNS);
    let updated = sqlx::query_as::<_, Break>(&sql)
        .bind(break_id)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;

    status_cache::invalidate(session.employee_id).await;
    bus.emit(DomainEvent::new(EventKind::BreakEnded, session.employee_id, Some(session.id)));
    Ok(updated)
}

/// Close today's session: derive durations, persist them, transition to
/// Completed. Clock skew (out before in) zeroes the durations and flags
/// the session for manual review instead of failing the clock-out.
pub async fn punch_out(
    pool: &MySqlPool,
    policy: EnginePolicy,
    bus: &EventBus,
    cmd: PunchOutCommand,
) -> Result<AttendanceSession, EngineError> {
    cmd.point.validate()?;

    let mut tx = pool.begin().await?;

    let sql = format!(
        "SELECT {} FROM attendance_sessions WHERE employee_id = ? AND date = ? \
         AND status IN ('active', 'on_break') FOR UPDATE",
        SESSION_COLUMNS
    );
    let session = sqlx::query_as::<_, AttendanceSession>(&sql)
        .bind(cmd.employee_id)
        .bind(cmd.at.date_naive())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(EngineError::NoActiveSession)?;

    let open_breaks = count_open_breaks(&mut *tx, session.id).await?;
    ensure_can_punch_out(session.status, open_breaks)?;

    // Punch-out is never blocked by the geofence; non-compliance is
    // recorded for audit even in strict deployments.
    let compliant =
        geofence::check_compliance(&mut *tx, session.workplace_id, cmd.point, cmd.method).await?;

    let spans = fetch_break_spans(&mut *tx, session.id).await?;
    let d = worktime::compute_durations(
        session.punched_in_at,
        Some(cmd.at),
        &spans,
        policy.standard_day_minutes,
    );
    if d.clock_skew {
        tracing::warn!(
            employee_id = cmd.employee_id,
            session_id = session.id,
            "punch-out precedes punch-in, session flagged for review"
        );
    }

    sqlx::query(
        r#"
        UPDATE attendance_sessions
        SET punched_out_at = ?, status = ?, total_minutes = ?, break_minutes = ?,
            net_minutes = ?, overtime_minutes = ?, punch_out_compliant = ?,
            punch_out_method = ?, flagged_for_review = flagged_for_review OR ?
        WHERE id = ?
        "#,
    )
    .bind(cmd.at)
    .bind(SessionStatus::Completed)
    .bind(d.total_minutes)
    .bind(d.break_minutes)
    .bind(d.net_minutes)
    .bind(d.overtime_minutes)
    .bind(compliant)
    .bind(cmd.method)
    .bind(d.clock_skew)
    .bind(session.id)
    .execute(&mut *tx)
    .await?;

    let updated = fetch_session(&mut *tx, session.id).await?;
    tx.commit().await?;

    status_cache::invalidate(cmd.employee_id).await;
    bus.emit(DomainEvent::new(EventKind::SessionPunchedOut, cmd.employee_id, Some(session.id)));
    Ok(updated)
}

/// Read-only projection of today's session. Open sessions get durations
/// computed with "now" as a provisional punch-out; nothing is persisted.
/// Served through a short-TTL cache which is never the source of truth
/// for a mutating decision.
pub async fn current_status(
    pool: &MySqlPool,
    policy: EnginePolicy,
    employee_id: u64,
    now: DateTime<Utc>,
) -> Result<Option<SessionSnapshot>, EngineError> {
    if let Some(snapshot) = status_cache::get(employee_id).await {
        return Ok(Some(snapshot));
    }

    let sql = format!(
        "SELECT {} FROM attendance_sessions WHERE employee_id = ? AND date = ?",
        SESSION_COLUMNS
    );
    let Some(session) = sqlx::query_as::<_, AttendanceSession>(&sql)
        .bind(employee_id)
        .bind(now.date_naive())
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };

    let snapshot = if session.status == SessionStatus::Completed {
        let stored = Durations {
            total_minutes: session.total_minutes,
            break_minutes: session.break_minutes,
            net_minutes: session.net_minutes,
            overtime_minutes: session.overtime_minutes,
            clock_skew: false,
        };
        make_snapshot(&session, stored, false)
    } else {
        let spans = fetch_break_spans(pool, session.id).await?;
        let d = worktime::compute_durations(
            session.punched_in_at,
            Some(now),
            &spans,
            policy.standard_day_minutes,
        );
        make_snapshot(&session, d, true)
    };

    status_cache::put(snapshot.clone()).await;
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn session(status: SessionStatus) -> AttendanceSession {
        AttendanceSession {
            id: 42,
            employee_id: 1000,
            workplace_id: 7,
            date: chrono::NaiveDate::from_ymd_opt(2026, 8, 6).unwrap(),
            punched_in_at: Utc.with_ymd_and_hms(2026, 8, 6, 9, 0, 0).unwrap(),
            punched_out_at: None,
            status,
            total_minutes: 0,
            break_minutes: 0,
            net_minutes: 0,
            overtime_minutes: 0,
            punch_in_compliant: true,
            punch_out_compliant: None,
            punch_in_method: PunchMethod::Gps,
            punch_out_method: None,
            punch_in_accuracy_m: None,
            verification_status: crate::model::session::VerificationStatus::Unverified,
            approved_by: None,
            flagged_for_review: false,
        }
    }

    #[test]
    fn break_starts_only_from_active() {
        assert!(ensure_break_can_start(SessionStatus::Active).is_ok());
        assert!(matches!(
            ensure_break_can_start(SessionStatus::OnBreak),
            Err(EngineError::BreakAlreadyOpen)
        ));
        assert!(matches!(
            ensure_break_can_start(SessionStatus::Completed),
            Err(EngineError::NoActiveSession)
        ));
    }

    #[test]
    fn punch_out_blocked_while_break_open() {
        assert!(matches!(
            ensure_can_punch_out(SessionStatus::OnBreak, 1),
            Err(EngineError::OpenBreakPending)
        ));
        // A stray open break row blocks even when the status says active.
        assert!(matches!(
            ensure_can_punch_out(SessionStatus::Active, 1),
            Err(EngineError::OpenBreakPending)
        ));
        assert!(ensure_can_punch_out(SessionStatus::Active, 0).is_ok());
    }

    #[test]
    fn punch_out_of_completed_session_fails() {
        assert!(matches!(
            ensure_can_punch_out(SessionStatus::Completed, 0),
            Err(EngineError::NoActiveSession)
        ));
    }

    #[test]
    fn provisional_snapshot_computes_live_net_hours() {
        let s = session(SessionStatus::Active);
        let now = Utc.with_ymd_and_hms(2026, 8, 6, 13, 0, 0).unwrap();
        let d = worktime::compute_durations(s.punched_in_at, Some(now), &[], 480);
        let snap = make_snapshot(&s, d, true);
        assert!(snap.provisional);
        assert_eq!(snap.net_minutes, 240);
        assert_eq!(snap.overtime_minutes, 0);
    }

    #[test]
    fn clock_skew_flags_snapshot_for_review() {
        let s = session(SessionStatus::Active);
        let d = Durations { clock_skew: true, ..Durations::default() };
        let snap = make_snapshot(&s, d, false);
        assert!(snap.flagged_for_review);
    }
}
