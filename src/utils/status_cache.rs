use moka::future::Cache;
use once_cell::sync::Lazy;
use std::time::Duration;

use crate::model::session::SessionSnapshot;

/// Short-lived projection cache for `current-status`. Never consulted by
/// mutating operations; every committed transition invalidates the
/// employee's entry.
static STATUS_CACHE: Lazy<Cache<u64, SessionSnapshot>> = Lazy::new(|| {
    Cache::builder()
        .max_capacity(100_000) // one entry per employee with an open day
        .time_to_live(Duration::from_secs(15))
        .build()
});

pub async fn get(employee_id: u64) -> Option<SessionSnapshot> {
    STATUS_CACHE.get(&employee_id).await
}

pub async fn put(snapshot: SessionSnapshot) {
    STATUS_CACHE.insert(snapshot.employee_id, snapshot).await;
}

pub async fn invalidate(employee_id: u64) {
    STATUS_CACHE.invalidate(&employee_id).await;
}
