//! Outbound chat seam.
//!
//! The flow never talks to a messaging platform directly; hosts hand it a
//! [`ChatTransport`] bound to the conversation being served.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::error::Result;

/// Shortest refresh period accepted for the typing indicator.
const MIN_TYPING_INTERVAL: Duration = Duration::from_millis(250);

/// Sends messages to the conversation currently being served.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a text message (Telegram-style HTML markup allowed).
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Show a typing indicator.
    async fn send_typing(&self) -> Result<()>;
}

/// Keeps a typing indicator alive until stopped or dropped.
///
/// The refresh task is aborted on [`TypingIndicator::stop`] and on drop, so
/// every exit path of the guarded work cleans it up.
pub struct TypingIndicator {
    handle: JoinHandle<()>,
}

impl TypingIndicator {
    /// Start refreshing the typing indicator every `every`.
    pub fn start(transport: Arc<dyn ChatTransport>, every: Duration) -> Self {
        let every = every.max(MIN_TYPING_INTERVAL);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                if let Err(e) = transport.send_typing().await {
                    debug!(error = %e, "Typing indicator refresh failed");
                }
            }
        });
        Self { handle }
    }

    /// Stop refreshing.
    pub fn stop(self) {
        // Drop aborts the task.
    }
}

impl Drop for TypingIndicator {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingTransport {
        typing: AtomicUsize,
    }

    #[async_trait]
    impl ChatTransport for CountingTransport {
        async fn send_text(&self, _text: &str) -> Result<()> {
            Ok(())
        }

        async fn send_typing(&self) -> Result<()> {
            self.typing.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_typing_stops_when_dropped() {
        let transport = Arc::new(CountingTransport {
            typing: AtomicUsize::new(0),
        });

        let indicator = TypingIndicator::start(transport.clone(), Duration::from_secs(1));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        indicator.stop();

        let sent = transport.typing.load(Ordering::SeqCst);
        assert!(sent >= 2, "expected refreshes, got {}", sent);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(transport.typing.load(Ordering::SeqCst), sent);
    }
}
