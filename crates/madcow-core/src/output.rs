//! Output side of the dispatcher.
//!
//! [`OutputSink`] is implemented by protocol adapters (IRC `PRIVMSG`, AIM IM,
//! terminal echo). [`OutputHandle`] pairs a sink with the process-wide output
//! lock; every producer (inline responses, worker tasks, anything else that
//! speaks for the bot) must go through a clone of the same handle so that
//! two complete messages are never interleaved on the transport.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::trace;

use crate::error::SinkResult;
use crate::request::Request;

/// Delivers bot output for a request.
///
/// `text` may contain newlines; each line is a separate logical message and
/// the sink is responsible for wrapping, length limits and escaping.
#[async_trait]
pub trait OutputSink: Send + Sync + 'static {
    /// Sends `text` in reply to `req`.
    async fn output(&self, text: &str, req: &Request) -> SinkResult<()>;
}

/// A shared, type-erased sink.
pub type BoxedSink = Arc<dyn OutputSink>;

/// A sink plus the lock serialising access to it.
#[derive(Clone)]
pub struct OutputHandle {
    sink: BoxedSink,
    lock: Arc<Mutex<()>>,
}

impl OutputHandle {
    /// Wraps `sink` with a fresh output lock.
    pub fn new(sink: BoxedSink) -> Self {
        Self {
            sink,
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// Sends one complete message while holding the output lock.
    ///
    /// The lock is held only for the duration of the sink call.
    pub async fn send(&self, text: &str, req: &Request) -> SinkResult<()> {
        let _guard = self.lock.lock().await;
        trace!(target_name = %req.reply_target(), bytes = text.len(), "Sending output");
        self.sink.output(text, req).await
    }
}

impl std::fmt::Debug for OutputHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    use parking_lot::Mutex as SyncMutex;

    use super::*;
    use crate::error::SinkError;

    /// Records every output call; optionally slow, to expose overlap.
    #[derive(Default)]
    pub struct RecordingSink {
        calls: SyncMutex<Vec<String>>,
        targets: SyncMutex<Vec<String>>,
        busy: AtomicBool,
        overlapped: AtomicBool,
        delay: Option<Duration>,
        fail: bool,
    }

    impl RecordingSink {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn slow(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                delay: Some(delay),
                ..Default::default()
            })
        }

        pub fn failing() -> Arc<Self> {
            Arc::new(Self {
                fail: true,
                ..Default::default()
            })
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }

        /// The reply target of each recorded call.
        pub fn targets(&self) -> Vec<String> {
            self.targets.lock().clone()
        }

        pub fn overlapped(&self) -> bool {
            self.overlapped.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OutputSink for RecordingSink {
        async fn output(&self, text: &str, req: &Request) -> SinkResult<()> {
            if self.fail {
                return Err(SinkError::Closed);
            }
            if self.busy.swap(true, Ordering::SeqCst) {
                self.overlapped.store(true, Ordering::SeqCst);
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.calls.lock().push(text.to_string());
            self.targets.lock().push(req.reply_target().to_string());
            self.busy.store(false, Ordering::SeqCst);
            Ok(())
        }
    }
}
