use dotenvy::dotenv;
use std::env;

/// Feature toggles and constants the engine consults on every operation.
/// Passed by value into each call so behavior is deterministic per call,
/// never read from ambient global state.
#[derive(Debug, Clone, Copy)]
pub struct EnginePolicy {
    /// Standard working day used for overtime derivation.
    pub standard_day_minutes: i64,
    /// When set, punch-in outside every active zone is rejected instead of
    /// recorded for audit.
    pub strict_geofence: bool,
    /// When set, exception requests from privileged roles are created
    /// already approved, attributed to the requester.
    pub auto_approve_privileged: bool,
}

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub server_addr: String,
    pub api_prefix: String,

    pub policy: EnginePolicy,

    /// Bound on waiting for a pool connection before StoreUnavailable.
    pub store_timeout_secs: u64,
    /// How often the accrual loop wakes up to check for an unclaimed period.
    pub accrual_check_interval_secs: u64,
    pub event_bus_capacity: usize,

    // Rate limiting
    pub rate_punch_per_min: u32,
    pub rate_read_per_min: u32,
    pub rate_admin_per_min: u32,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        Self {
            server_addr: env::var("SERVER_ADDR").expect("SERVER_ADDR must be set"),
            database_url: env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            api_prefix: env::var("API_PREFIX").unwrap_or_else(|_| "/api/v1".to_string()),

            policy: EnginePolicy {
                standard_day_minutes: env::var("STANDARD_DAY_MINUTES")
                    .unwrap_or_else(|_| "480".to_string()) // 8h day
                    .parse()
                    .unwrap(),
                strict_geofence: env::var("GEOFENCE_STRICT")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(false),
                auto_approve_privileged: env::var("AUTO_APPROVE_PRIVILEGED")
                    .map(|v| v == "true" || v == "1")
                    .unwrap_or(false),
            },

            store_timeout_secs: env::var("STORE_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .unwrap(),
            accrual_check_interval_secs: env::var("ACCRUAL_CHECK_INTERVAL_SECS")
                .unwrap_or_else(|_| "3600".to_string()) // hourly check, accrues once per month
                .parse()
                .unwrap(),
            event_bus_capacity: env::var("EVENT_BUS_CAPACITY")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()
                .unwrap(),

            rate_punch_per_min: env::var("RATE_PUNCH_PER_MIN")
                .unwrap_or_else(|_| "120".to_string())
                .parse()
                .unwrap(),
            rate_read_per_min: env::var("RATE_READ_PER_MIN")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .unwrap(),
            rate_admin_per_min: env::var("RATE_ADMIN_PER_MIN")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .unwrap(),
        }
    }
}
