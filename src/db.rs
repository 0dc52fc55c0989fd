use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use std::time::Duration;

/// Pool acquisition is bounded so a saturated store surfaces as
/// StoreUnavailable instead of hanging callers.
pub async fn init_db(database_url: &str, acquire_timeout_secs: u64) -> MySqlPool {
    MySqlPoolOptions::new()
        .acquire_timeout(Duration::from_secs(acquire_timeout_secs))
        .connect(database_url)
        .await
        .expect("Failed to connect to database")
}
