//! Log bus - live broadcast of appended log entries
//!
//! Observers (console followers, the JSONL sink) subscribe here. The bus is
//! read-only from their side: entries reach it only after the store has
//! committed them to the event log.

use tokio::sync::broadcast;
use tracing::debug;

use super::entry::LogEntry;

/// Default channel capacity (entries)
pub const DEFAULT_CHANNEL_CAPACITY: usize = 10_000;

pub struct LogBus {
    tx: broadcast::Sender<LogEntry>,
}

impl LogBus {
    pub fn new(capacity: usize) -> Self {
        debug!(capacity, "LogBus::new: called");
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish a committed entry
    ///
    /// Fire-and-forget: with no subscribers the entry is dropped, and a slow
    /// subscriber loses the oldest entries (it sees `Lagged`).
    pub fn publish(&self, entry: LogEntry) {
        debug!(log_type = entry.log_type(), "LogBus::publish");
        let _ = self.tx.send(entry);
    }

    /// Entries appended after this call
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        debug!("LogBus::subscribe: new subscriber");
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for LogBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WorkflowStatus;
    use crate::events::WorkflowLogMetadata;

    fn entry(ts: i64) -> LogEntry {
        LogEntry::workflow_update(ts, WorkflowStatus::Paused, WorkflowLogMetadata::StatusChanged, "paused")
    }

    #[tokio::test]
    async fn test_publish_subscribe() {
        let bus = LogBus::default();
        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish(entry(1));
        bus.publish(entry(2));
        assert_eq!(rx.recv().await.unwrap().timestamp, 1);
        assert_eq!(rx.recv().await.unwrap().timestamp, 2);
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = LogBus::new(4);
        bus.publish(entry(1));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = LogBus::new(2);
        let mut rx = bus.subscribe();
        for ts in 0..5 {
            bus.publish(entry(ts));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(_))
        ));
    }
}
