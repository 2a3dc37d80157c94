//! Lifecycle events and event handling.
//!
//! Events give observers (logging, tests, future metrics) a view into
//! batches, quota resets, and keep-alive pings without coupling them to
//! the scheduler loops.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::types::JobId;
use crate::scheduler::BatchReport;

/// Lifecycle events emitted by the scheduler and keep-alive loops.
#[derive(Debug, Clone)]
pub enum Event {
    /// One unit of work completed successfully.
    UnitCompleted { job_id: JobId, done_today: u32 },

    /// One unit of work failed; the batch continued.
    UnitFailed { job_id: JobId, error: String },

    /// A batch finished, successfully or not.
    BatchFinished { job_id: JobId, report: BatchReport },

    /// A tick found the job already running and did nothing.
    RunSkipped { job_id: JobId },

    /// The date changed and all daily counters were zeroed.
    CountersReset { date: NaiveDate },

    /// A keep-alive ping succeeded.
    PingSucceeded { url: String },

    /// A keep-alive ping failed; the loop continues.
    PingFailed { url: String, error: String },
}

/// Handler for receiving lifecycle events.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handle an event.
    async fn handle(&self, event: &Event);
}

/// Event bus for distributing events to registered handlers.
pub struct EventBus {
    handlers: RwLock<Vec<Arc<dyn EventHandler>>>,
}

impl EventBus {
    /// Create a new event bus with no handlers.
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register an event handler.
    pub async fn register(&self, handler: Arc<dyn EventHandler>) {
        let mut handlers = self.handlers.write().await;
        handlers.push(handler);
    }

    /// Emit an event to all registered handlers.
    pub async fn emit(&self, event: Event) {
        let handlers = self.handlers.read().await;
        for handler in handlers.iter() {
            handler.handle(&event).await;
        }
    }

    /// Get the number of registered handlers.
    pub async fn handler_count(&self) -> usize {
        self.handlers.read().await.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;

    /// Test handler that records received events.
    struct RecordingHandler {
        events: Mutex<Vec<Event>>,
    }

    impl RecordingHandler {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
            }
        }

        async fn events(&self) -> Vec<Event> {
            self.events.lock().await.clone()
        }
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(&self, event: &Event) {
            self.events.lock().await.push(event.clone());
        }
    }

    /// Test handler that counts events.
    struct CountingHandler {
        count: AtomicU32,
    }

    #[async_trait]
    impl EventHandler for CountingHandler {
        async fn handle(&self, _event: &Event) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_emit_unit_completed_event() {
        let handler = Arc::new(RecordingHandler::new());
        let bus = EventBus::new();
        bus.register(handler.clone()).await;

        bus.emit(Event::UnitCompleted {
            job_id: JobId::new("sync"),
            done_today: 3,
        })
        .await;

        let events = handler.events().await;
        assert_eq!(events.len(), 1);
        match &events[0] {
            Event::UnitCompleted { job_id, done_today } => {
                assert_eq!(job_id.as_str(), "sync");
                assert_eq!(*done_today, 3);
            }
            _ => panic!("Expected UnitCompleted event"),
        }
    }

    #[tokio::test]
    async fn test_emit_counters_reset_event() {
        let handler = Arc::new(RecordingHandler::new());
        let bus = EventBus::new();
        bus.register(handler.clone()).await;

        let date = NaiveDate::from_ymd_opt(2026, 8, 28).unwrap();
        bus.emit(Event::CountersReset { date }).await;

        let events = handler.events().await;
        assert!(matches!(events[0], Event::CountersReset { date: d } if d == date));
    }

    #[tokio::test]
    async fn test_multiple_handlers_receive_same_event() {
        let handler1 = Arc::new(CountingHandler {
            count: AtomicU32::new(0),
        });
        let handler2 = Arc::new(CountingHandler {
            count: AtomicU32::new(0),
        });

        let bus = EventBus::new();
        bus.register(handler1.clone()).await;
        bus.register(handler2.clone()).await;
        assert_eq!(bus.handler_count().await, 2);

        bus.emit(Event::RunSkipped {
            job_id: JobId::new("sync"),
        })
        .await;

        assert_eq!(handler1.count.load(Ordering::SeqCst), 1);
        assert_eq!(handler2.count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_handlers_does_not_panic() {
        let bus = EventBus::new();
        bus.emit(Event::PingFailed {
            url: "http://example.invalid".into(),
            error: "connect timeout".into(),
        })
        .await;
    }
}
