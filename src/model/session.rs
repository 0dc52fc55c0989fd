use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Lifecycle state of a single day's attendance record.
///
/// Openness is a tagged state, never inferred from nullable timestamps.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Display, EnumString,
    ToSchema,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    Active,
    OnBreak,
    Completed,
}

/// How a punch location was captured.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Display, EnumString,
    ToSchema,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PunchMethod {
    Gps,
    Wifi,
    Beacon,
    Manual,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Display, EnumString,
    ToSchema,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BreakKind {
    Meal,
    Short,
    Rest,
    Other,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Display, EnumString,
    ToSchema,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VerificationStatus {
    Unverified,
    Approved,
}

/// One employee's attendance record for one calendar date.
/// Unique per (employee_id, date); the database key enforces it.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceSession {
    pub id: u64,
    pub employee_id: u64,
    pub workplace_id: u64,
    pub date: NaiveDate,
    pub punched_in_at: DateTime<Utc>,
    pub punched_out_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub total_minutes: i64,
    pub break_minutes: i64,
    pub net_minutes: i64,
    pub overtime_minutes: i64,
    pub punch_in_compliant: bool,
    pub punch_out_compliant: Option<bool>,
    pub punch_in_method: PunchMethod,
    pub punch_out_method: Option<PunchMethod>,
    pub punch_in_accuracy_m: Option<f64>,
    pub verification_status: VerificationStatus,
    pub approved_by: Option<u64>,
    pub flagged_for_review: bool,
}

/// A break interval belonging to one session. `ended_at` is null while open.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Break {
    pub id: u64,
    pub session_id: u64,
    pub kind: BreakKind,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_minutes: i64,
}

/// Read-only projection served by `current-status`. When the session is
/// still open, durations are computed with "now" as a provisional
/// punch-out and never persisted (`provisional = true`).
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionSnapshot {
    #[schema(example = 42)]
    pub session_id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = 7)]
    pub workplace_id: u64,
    #[schema(example = "2026-08-06", value_type = String, format = "date")]
    pub date: NaiveDate,
    pub status: SessionStatus,
    #[schema(example = "2026-08-06T09:00:00Z", value_type = String, format = "date-time")]
    pub punched_in_at: DateTime<Utc>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub punched_out_at: Option<DateTime<Utc>>,
    pub total_minutes: i64,
    pub break_minutes: i64,
    pub net_minutes: i64,
    pub overtime_minutes: i64,
    pub punch_in_compliant: bool,
    pub punch_out_compliant: Option<bool>,
    pub flagged_for_review: bool,
    pub provisional: bool,
}
