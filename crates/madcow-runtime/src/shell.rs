//! Interactive shell protocol.
//!
//! Reads one request per line from an async reader and writes replies to an
//! async writer. Every line is treated as a private message already addressed
//! to the bot, so `weather 94110` works without typing the bot's name.
//! Blank lines are skipped and `quit` ends the session.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::{debug, info};

use madcow_core::{Dispatcher, OutputSink, Request, SinkResult};

use crate::error::RuntimeResult;

/// Nick used for shell requests: `$USER`, or `shell` when unset.
pub fn default_nick() -> String {
    std::env::var("USER")
        .ok()
        .filter(|user| !user.trim().is_empty())
        .unwrap_or_else(|| "shell".to_string())
}

/// An [`OutputSink`] writing each message line to an async writer.
pub struct WriterSink<W> {
    writer: Mutex<W>,
}

impl<W> WriterSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }
}

#[async_trait]
impl<W> OutputSink for WriterSink<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn output(&self, text: &str, _req: &Request) -> SinkResult<()> {
        let mut buf = String::with_capacity(text.len() + 1);
        for line in text.lines() {
            buf.push_str(line);
            buf.push('\n');
        }

        let mut writer = self.writer.lock().await;
        writer.write_all(buf.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}

/// Feeds lines from `reader` to the dispatcher until EOF or `quit`.
///
/// Returns how many requests were dispatched. Worker tasks may still be
/// running when this returns; see [`Dispatcher::wait_idle`].
pub async fn run_session<R>(dispatcher: &Dispatcher, reader: R, nick: &str) -> RuntimeResult<usize>
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut handled = 0;

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") {
            info!("Shell session ended by user");
            break;
        }

        let req = Request::new(line, nick).private(true).addressed(true);
        let outcome = dispatcher.process(req).await?;
        debug!(?outcome, "Shell request handled");
        handled += 1;
    }

    Ok(handled)
}
