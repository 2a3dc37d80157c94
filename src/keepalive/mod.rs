//! Keep-alive pinger.
//!
//! Hosting platforms that idle out web services stay warm if the service
//! fetches its own public URL on a fixed interval. A failed ping is
//! logged and retried on the next tick, forever; the loop never gives up
//! and never crashes the process.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::events::{Event, EventBus};

/// Errors a ping can fail with.
#[derive(Debug, Error)]
pub enum PingError {
    /// The request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("unexpected status: {0}")]
    Status(reqwest::StatusCode),
}

/// Minimal contract for a keep-alive ping.
#[async_trait]
pub trait Pinger: Send + Sync {
    /// Fetch `url` once. Any error means the ping failed.
    async fn ping(&self, url: &str) -> Result<(), PingError>;
}

/// Pinger backed by an HTTP client.
pub struct HttpPinger {
    client: reqwest::Client,
}

impl HttpPinger {
    /// Create a pinger with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Pinger for HttpPinger {
    async fn ping(&self, url: &str) -> Result<(), PingError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PingError::Status(status));
        }
        Ok(())
    }
}

/// Ping `url` every `interval` until cancelled.
///
/// The first tick fires immediately. Outcomes are logged and emitted as
/// events; a failure never ends the loop.
pub(crate) async fn run_ping_loop(
    pinger: Arc<dyn Pinger>,
    url: String,
    interval: Duration,
    event_bus: Arc<EventBus>,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                match pinger.ping(&url).await {
                    Ok(()) => {
                        info!(url = %url, "Keep-alive ping sent");
                        event_bus.emit(Event::PingSucceeded { url: url.clone() }).await;
                    }
                    Err(err) => {
                        warn!(url = %url, error = %err, "Keep-alive ping failed");
                        event_bus
                            .emit(Event::PingFailed {
                                url: url.clone(),
                                error: err.to_string(),
                            })
                            .await;
                    }
                }
            }
        }
    }

    debug!("Keep-alive loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventHandler;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::Mutex;

    /// Pinger that always fails.
    struct FailingPinger {
        attempts: AtomicU32,
    }

    #[async_trait]
    impl Pinger for FailingPinger {
        async fn ping(&self, _url: &str) -> Result<(), PingError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(PingError::Status(reqwest::StatusCode::BAD_GATEWAY))
        }
    }

    struct RecordingHandler {
        events: Mutex<Vec<Event>>,
    }

    #[async_trait]
    impl EventHandler for RecordingHandler {
        async fn handle(&self, event: &Event) {
            self.events.lock().await.push(event.clone());
        }
    }

    #[tokio::test]
    async fn test_failing_ping_is_retried_on_next_tick() {
        let pinger = Arc::new(FailingPinger {
            attempts: AtomicU32::new(0),
        });
        let recorder = Arc::new(RecordingHandler {
            events: Mutex::new(Vec::new()),
        });
        let bus = Arc::new(EventBus::new());
        bus.register(recorder.clone()).await;

        let token = CancellationToken::new();
        let task = tokio::spawn(run_ping_loop(
            pinger.clone(),
            "http://example.invalid/".to_string(),
            Duration::from_millis(30),
            Arc::clone(&bus),
            token.child_token(),
        ));

        tokio::time::sleep(Duration::from_millis(130)).await;
        token.cancel();
        task.await.unwrap();

        // Immediate tick plus periodic retries, despite every attempt
        // failing.
        assert!(
            pinger.attempts.load(Ordering::SeqCst) >= 3,
            "got {} attempts",
            pinger.attempts.load(Ordering::SeqCst)
        );

        let events = recorder.events.lock().await;
        assert!(events
            .iter()
            .all(|e| matches!(e, Event::PingFailed { .. })));
        assert!(!events.is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_stops_loop() {
        let pinger = Arc::new(FailingPinger {
            attempts: AtomicU32::new(0),
        });
        let bus = Arc::new(EventBus::new());
        let token = CancellationToken::new();

        let task = tokio::spawn(run_ping_loop(
            pinger.clone(),
            "http://example.invalid/".to_string(),
            Duration::from_millis(10),
            bus,
            token.child_token(),
        ));

        tokio::time::sleep(Duration::from_millis(40)).await;
        token.cancel();
        task.await.unwrap();

        let after = pinger.attempts.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pinger.attempts.load(Ordering::SeqCst), after);
    }

    #[test]
    fn test_ping_error_display() {
        let err = PingError::Status(reqwest::StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "unexpected status: 404 Not Found");
    }
}
