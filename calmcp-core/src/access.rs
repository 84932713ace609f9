//! Per-kind consent memoization and the post-write staleness flag.

use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

use crate::calendar::EntityKind;

/// Remembers which kinds the user has granted for the life of the process.
/// Denials are not remembered, so the next call asks again.
///
/// Each kind has its own lock, so a request for one kind that is still
/// waiting on the user never holds up the other.
#[derive(Debug, Default)]
pub struct AccessGate {
    events: Mutex<bool>,
    reminders: Mutex<bool>,
    stale: AtomicBool,
}

impl AccessGate {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, kind: EntityKind) -> &Mutex<bool> {
        match kind {
            EntityKind::Event => &self.events,
            EntityKind::Reminder => &self.reminders,
        }
    }

    /// Whether `kind` has been granted, without asking.
    pub async fn is_granted(&self, kind: EntityKind) -> bool {
        *self.slot(kind).lock().await
    }

    /// Run `request` unless `kind` is already granted. Concurrent callers
    /// for the same kind wait on the same request instead of asking twice.
    pub async fn ensure_with<F, Fut, E>(&self, kind: EntityKind, request: F) -> Result<bool, E>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<bool, E>>,
    {
        let mut granted = self.slot(kind).lock().await;
        if *granted {
            return Ok(true);
        }

        let allowed = request().await?;
        if allowed {
            *granted = true;
            tracing::info!(kind = %kind, "Access granted");
        } else {
            tracing::warn!(kind = %kind, "Access denied");
        }
        Ok(allowed)
    }

    /// Record that the store was written to.
    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::SeqCst);
    }

    /// Clear the staleness flag, returning whether it was set.
    pub fn take_stale(&self) -> bool {
        self.stale.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn grant_is_remembered() {
        let gate = AccessGate::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let allowed = gate
                .ensure_with(EntityKind::Event, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(true)
                })
                .await
                .unwrap();
            assert!(allowed);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(gate.is_granted(EntityKind::Event).await);
        assert!(!gate.is_granted(EntityKind::Reminder).await);
    }

    #[tokio::test]
    async fn denial_is_asked_again() {
        let gate = AccessGate::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let allowed = gate
                .ensure_with(EntityKind::Reminder, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(false)
                })
                .await
                .unwrap();
            assert!(!allowed);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn pending_request_does_not_block_the_other_kind() {
        let gate = std::sync::Arc::new(AccessGate::new());

        let waiting = gate.clone();
        let pending = tokio::spawn(async move {
            waiting
                .ensure_with(EntityKind::Event, || std::future::pending::<Result<bool, ()>>())
                .await
        });
        tokio::task::yield_now().await;

        let allowed = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            gate.ensure_with(EntityKind::Reminder, || async { Ok::<_, ()>(true) }),
        )
        .await
        .expect("reminder access waited on the event request")
        .unwrap();
        assert!(allowed);
        assert!(!pending.is_finished());
        pending.abort();
    }

    #[test]
    fn staleness_is_consumed_once() {
        let gate = AccessGate::new();
        assert!(!gate.take_stale());
        gate.mark_stale();
        assert!(gate.take_stale());
        assert!(!gate.take_stale());
    }
}
