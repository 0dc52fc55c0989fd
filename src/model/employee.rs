use serde::{Deserialize, Serialize};

/// Directory row consulted for approval capability. The engine never
/// writes employees; identity management lives outside this service.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Employee {
    pub id: u64,
    pub full_name: String,
    pub role: String,
}

impl Employee {
    pub fn is_privileged(&self) -> bool {
        is_privileged_role(&self.role)
    }
}

/// Roles allowed to resolve exception and leave requests.
pub fn is_privileged_role(role: &str) -> bool {
    matches!(
        role.trim().to_ascii_lowercase().as_str(),
        "manager" | "hr" | "admin"
    )
}

#[cfg(test)]
mod tests {
    use super::is_privileged_role;

    #[test]
    fn managers_hr_and_admins_are_privileged() {
        assert!(is_privileged_role("manager"));
        assert!(is_privileged_role("HR"));
        assert!(is_privileged_role(" Admin "));
    }

    #[test]
    fn regular_roles_are_not() {
        assert!(!is_privileged_role("employee"));
        assert!(!is_privileged_role("contractor"));
        assert!(!is_privileged_role(""));
    }
}
