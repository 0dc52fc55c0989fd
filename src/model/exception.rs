use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// The deviation kinds an employee can flag for review.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Display, EnumString,
    ToSchema,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExceptionKind {
    Late,
    EarlyLeave,
    Overtime,
    BreakExtension,
}

impl ExceptionKind {
    /// Approval of these kinds marks the session itself as verified.
    /// Break extensions only resolve the request; they never touch the
    /// session record.
    pub fn updates_session_verification(&self) -> bool {
        !matches!(self, ExceptionKind::BreakExtension)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Display, EnumString,
    ToSchema,
)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExceptionStatus {
    Pending,
    Approved,
    Rejected,
}

/// Approver's verdict on a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn into_status(self) -> ExceptionStatus {
        match self {
            Decision::Approve => ExceptionStatus::Approved,
            Decision::Reject => ExceptionStatus::Rejected,
        }
    }
}

/// A flagged deviation tied to one attendance session.
/// At most one pending request of a given kind per session.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ExceptionRequest {
    pub id: u64,
    pub session_id: u64,
    pub kind: ExceptionKind,
    pub reason: String,
    pub status: ExceptionStatus,
    pub requested_by: u64,
    pub resolved_by: Option<u64>,
    pub resolution_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}
