use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::broadcast;
use uuid::Uuid;

const EMIT_RETRIES: u32 = 3;
const EMIT_RETRY_DELAY: Duration = Duration::from_millis(200);

/// State transitions announced to real-time observers (dashboards).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    #[serde(rename = "session.punched-in")]
    SessionPunchedIn,
    #[serde(rename = "session.break-started")]
    BreakStarted,
    #[serde(rename = "session.break-ended")]
    BreakEnded,
    #[serde(rename = "session.punched-out")]
    SessionPunchedOut,
    #[serde(rename = "exception.resolved")]
    ExceptionResolved,
    #[serde(rename = "leave.debited")]
    LeaveDebited,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::SessionPunchedIn => "session.punched-in",
            EventKind::BreakStarted => "session.break-started",
            EventKind::BreakEnded => "session.break-ended",
            EventKind::SessionPunchedOut => "session.punched-out",
            EventKind::ExceptionResolved => "exception.resolved",
            EventKind::LeaveDebited => "leave.debited",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent {
    pub id: String,
    pub kind: EventKind,
    pub employee_id: u64,
    pub session_id: Option<u64>,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    pub fn new(kind: EventKind, employee_id: u64, session_id: Option<u64>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            employee_id,
            session_id,
            occurred_at: Utc::now(),
        }
    }
}

/// In-process broadcast bus decoupling observers from the transactions
/// that produce events. Emission is fire-and-forget: a failed send is
/// retried a bounded number of times out-of-band and then dropped with a
/// warning. It never rolls back the committed state change.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    /// Called after the owning transaction has committed.
    pub fn emit(&self, event: DomainEvent) {
        if self.tx.send(event.clone()).is_ok() {
            tracing::debug!(kind = event.kind.as_str(), employee_id = event.employee_id, "event emitted");
            return;
        }
        let tx = self.tx.clone();
        tokio::spawn(async move {
            for _ in 0..EMIT_RETRIES {
                tokio::time::sleep(EMIT_RETRY_DELAY).await;
                if tx.send(event.clone()).is_ok() {
                    return;
                }
            }
            tracing::warn!(
                kind = event.kind.as_str(),
                employee_id = event.employee_id,
                "dropping domain event, no observers reachable"
            );
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.emit(DomainEvent::new(EventKind::SessionPunchedIn, 1000, Some(42)));

        let event = rx.recv().await.expect("event delivered");
        assert_eq!(event.kind, EventKind::SessionPunchedIn);
        assert_eq!(event.employee_id, 1000);
        assert_eq!(event.session_id, Some(42));
    }

    #[actix_web::test]
    async fn emitting_without_observers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.emit(DomainEvent::new(EventKind::LeaveDebited, 7, None));
    }

    #[test]
    fn kind_labels_are_stable() {
        assert_eq!(EventKind::SessionPunchedOut.as_str(), "session.punched-out");
        assert_eq!(EventKind::BreakStarted.as_str(), "session.break-started");
    }
}
