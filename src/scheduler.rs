//! Periodic leave accrual. The engine's `accrue` adds a full increment on
//! every call, so this loop claims each `YYYY-MM` period through the
//! `accrual_runs` uniqueness key first; across every instance of the
//! service exactly one claim wins per period.

use anyhow::Result;
use chrono::Utc;
use sqlx::MySqlPool;
use std::time::Duration;

use crate::engine::ledger;
use crate::error::is_unique_violation;

pub async fn run_accrual_loop(pool: MySqlPool, check_interval_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(check_interval_secs));
    loop {
        ticker.tick().await;
        let period = Utc::now().format("%Y-%m").to_string();
        if let Err(e) = run_once(&pool, &period).await {
            tracing::warn!(error = %e, period, "accrual run failed, will retry next tick");
        }
    }
}

async fn run_once(pool: &MySqlPool, period: &str) -> Result<()> {
    if !claim_period(pool, period).await? {
        return Ok(());
    }
    let updated = ledger::accrue(pool, period).await?;
    log::info!("Accrual complete for {}: {} balances updated", period, updated);
    Ok(())
}

/// Returns false when another run already claimed this period.
async fn claim_period(pool: &MySqlPool, period: &str) -> Result<bool> {
    let result = sqlx::query("INSERT INTO accrual_runs (period, ran_at) VALUES (?, ?)")
        .bind(period)
        .bind(Utc::now())
        .execute(pool)
        .await;

    match result {
        Ok(_) => Ok(true),
        Err(e) if is_unique_violation(&e) => Ok(false),
        Err(e) => Err(e.into()),
    }
}
