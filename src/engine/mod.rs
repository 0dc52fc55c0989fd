pub mod exception;
pub mod geofence;
pub mod ledger;
pub mod session;
pub mod worktime;

use crate::error::EngineError;
use crate::model::employee::Employee;

/// Fetch an employee's directory role, if the employee exists.
pub(crate) async fn lookup_role<'e, E>(
    executor: E,
    employee_id: u64,
) -> Result<Option<String>, EngineError>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    let role: Option<String> = sqlx::query_scalar("SELECT role FROM employees WHERE id = ?")
        .bind(employee_id)
        .fetch_optional(executor)
        .await?;
    Ok(role)
}

/// Approval capability gate shared by the exception workflow and the
/// leave ledger. Unknown employees fail the same way as unprivileged ones.
pub(crate) async fn require_approver<'e, E>(
    executor: E,
    employee_id: u64,
) -> Result<(), EngineError>
where
    E: sqlx::Executor<'e, Database = sqlx::MySql>,
{
    let approver =
        sqlx::query_as::<_, Employee>("SELECT id, full_name, role FROM employees WHERE id = ?")
            .bind(employee_id)
            .fetch_optional(executor)
            .await?;
    match approver {
        Some(employee) if employee.is_privileged() => Ok(()),
        _ => Err(EngineError::Unauthorized),
    }
}
