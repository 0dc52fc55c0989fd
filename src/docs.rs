use crate::api::attendance::{
    CurrentStatusResponse, EndBreakRequest, PunchInRequest, PunchInResponse, PunchOutRequest,
    PunchOutResponse, StartBreakRequest, StatusQuery,
};
use crate::api::exception::{CreateExceptionRequest, ExceptionResponse, ResolveExceptionRequest};
use crate::api::leave::{
    ApproveLeaveRequest, BalanceQuery, BalanceResponse, CancelLeaveRequest, CreateLeaveRequest,
    InitializeBalanceRequest, LeaveRequestResponse, RejectLeaveRequest,
};
use crate::model::exception::{Decision, ExceptionKind, ExceptionStatus};
use crate::model::geofence::GeoPoint;
use crate::model::leave::LeaveStatus;
use crate::model::session::{BreakKind, PunchMethod, SessionSnapshot, SessionStatus};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Timeclock Engine API",
        version = "1.0.0",
        description = r#"
## Attendance Tracking & Leave Accrual Engine

This API powers the attendance core of a workforce-management suite.

### Key Features
- **Attendance Sessions**
  - Punch-in / punch-out with geofence validation, break tracking,
    work/break/net/overtime derivation
- **Exception Workflow**
  - Late / early-leave / overtime / break-extension requests with an
    approval flow and optional auto-approval for privileged roles
- **Leave Ledger**
  - Periodic accrual with caps, request approval debiting balances
    exactly once, balances never going negative

### Response Format
- JSON-based RESTful responses
- Errors carry a stable `error` kind plus a human-readable `message`

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::api::attendance::punch_in,
        crate::api::attendance::punch_out,
        crate::api::attendance::start_break,
        crate::api::attendance::end_break,
        crate::api::attendance::current_status,

        crate::api::exception::request_exception,
        crate::api::exception::resolve_exception,

        crate::api::leave::create_leave,
        crate::api::leave::approve_leave,
        crate::api::leave::reject_leave,
        crate::api::leave::cancel_leave,
        crate::api::leave::initialize_balance,
        crate::api::leave::get_balance
    ),
    components(
        schemas(
            PunchInRequest,
            PunchInResponse,
            PunchOutRequest,
            PunchOutResponse,
            StartBreakRequest,
            EndBreakRequest,
            StatusQuery,
            CurrentStatusResponse,
            SessionSnapshot,
            SessionStatus,
            BreakKind,
            PunchMethod,
            GeoPoint,
            CreateExceptionRequest,
            ExceptionResponse,
            ResolveExceptionRequest,
            ExceptionKind,
            ExceptionStatus,
            Decision,
            CreateLeaveRequest,
            LeaveRequestResponse,
            ApproveLeaveRequest,
            RejectLeaveRequest,
            CancelLeaveRequest,
            InitializeBalanceRequest,
            BalanceQuery,
            BalanceResponse,
            LeaveStatus
        )
    ),
    tags(
        (name = "Attendance", description = "Punch lifecycle and status projection APIs"),
        (name = "Exception", description = "Exception approval workflow APIs"),
        (name = "Leave", description = "Leave request and balance ledger APIs"),
    )
)]
pub struct ApiDoc;
