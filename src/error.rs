use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use derive_more::Display;

/// Failure taxonomy of the attendance and leave engine.
///
/// Validation errors reject before any state change; conflict errors are
/// safe to retry once the caller adjusts; invariant-protection errors
/// block the operation until the underlying condition is resolved;
/// infrastructure errors are retried by the caller with backoff, never by
/// the engine itself. Every variant carries a stable `kind()` identifier.
#[derive(Debug, Display)]
pub enum EngineError {
    #[display(fmt = "{}", _0)]
    Validation(String),

    #[display(fmt = "an attendance session already exists for this employee today")]
    DuplicateSession,
    #[display(fmt = "no open attendance session for this employee today")]
    NoActiveSession,
    #[display(fmt = "a break is already open on this session")]
    BreakAlreadyOpen,
    #[display(fmt = "no open break to close")]
    NoOpenBreak,
    #[display(fmt = "close the open break before punching out")]
    OpenBreakPending,
    #[display(fmt = "workplace does not exist")]
    UnknownWorkplace,
    #[display(fmt = "punch location is outside every active geofence zone")]
    OutOfGeofence,

    #[display(fmt = "a pending request of this kind already exists on this session")]
    DuplicatePendingRequest,
    #[display(fmt = "request has already been resolved")]
    AlreadyResolved,
    #[display(fmt = "approver lacks approval capability")]
    Unauthorized,

    #[display(
        fmt = "insufficient leave balance: requested {} days, {} available",
        requested,
        available
    )]
    InsufficientBalance { requested: f64, available: f64 },
    #[display(fmt = "a balance already exists for this employee, leave type and year")]
    AlreadyExists,

    #[display(fmt = "{} not found", _0)]
    NotFound(&'static str),

    #[display(fmt = "storage backend unavailable, retry later")]
    StoreUnavailable,
    #[display(fmt = "storage error")]
    Store(sqlx::Error),
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    /// Stable machine-readable identifier, independent of the message text.
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::DuplicateSession => "duplicate_session",
            EngineError::NoActiveSession => "no_active_session",
            EngineError::BreakAlreadyOpen => "break_already_open",
            EngineError::NoOpenBreak => "no_open_break",
            EngineError::OpenBreakPending => "open_break_pending",
            EngineError::UnknownWorkplace => "unknown_workplace",
            EngineError::OutOfGeofence => "out_of_geofence",
            EngineError::DuplicatePendingRequest => "duplicate_pending_request",
            EngineError::AlreadyResolved => "already_resolved",
            EngineError::Unauthorized => "unauthorized",
            EngineError::InsufficientBalance { .. } => "insufficient_balance",
            EngineError::AlreadyExists => "already_exists",
            EngineError::NotFound(_) => "not_found",
            EngineError::StoreUnavailable => "store_unavailable",
            EngineError::Store(_) => "store_error",
        }
    }
}

impl std::error::Error for EngineError {}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => EngineError::StoreUnavailable,
            other => EngineError::Store(other),
        }
    }
}

/// MySQL signals unique-key violations with SQLSTATE 23000.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23000");
    }
    false
}

impl ResponseError for EngineError {
    fn status_code(&self) -> StatusCode {
        match self {
            EngineError::Validation(_) => StatusCode::BAD_REQUEST,
            EngineError::UnknownWorkplace | EngineError::NotFound(_) => StatusCode::NOT_FOUND,
            EngineError::DuplicateSession
            | EngineError::NoActiveSession
            | EngineError::BreakAlreadyOpen
            | EngineError::NoOpenBreak
            | EngineError::DuplicatePendingRequest
            | EngineError::AlreadyResolved
            | EngineError::AlreadyExists => StatusCode::CONFLICT,
            EngineError::OpenBreakPending
            | EngineError::OutOfGeofence
            | EngineError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            EngineError::Unauthorized => StatusCode::FORBIDDEN,
            EngineError::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if let EngineError::Store(e) = self {
            tracing::error!(error = %e, "storage failure");
        }
        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.kind(),
            "message": self.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_errors_map_to_409() {
        assert_eq!(EngineError::DuplicateSession.status_code(), StatusCode::CONFLICT);
        assert_eq!(EngineError::AlreadyResolved.status_code(), StatusCode::CONFLICT);
        assert_eq!(EngineError::BreakAlreadyOpen.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn invariant_protection_maps_to_422() {
        let err = EngineError::InsufficientBalance { requested: 5.0, available: 3.0 };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(EngineError::OpenBreakPending.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn kinds_are_stable_identifiers() {
        assert_eq!(EngineError::DuplicateSession.kind(), "duplicate_session");
        assert_eq!(EngineError::StoreUnavailable.kind(), "store_unavailable");
        assert_eq!(EngineError::validation("x").kind(), "validation");
    }

    #[test]
    fn pool_timeout_surfaces_as_store_unavailable() {
        let err: EngineError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(err.kind(), "store_unavailable");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
