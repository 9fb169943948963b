//! Per-channel transcripts of public chatter.
//!
//! Each channel gets its own daily file under the log directory, named
//! `<channel>.<YYYY-MM-DD>.log`, holding one `HH:MM:SS <nick> message` line
//! per public request. Dates and times are UTC.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use tracing::warn;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use madcow_core::{ChatterLog, Request};

/// Channel name used for public lines that carry none.
const NO_CHANNEL: &str = "none";

/// A [`ChatterLog`] writing daily per-channel files.
pub struct PublicLog {
    dir: PathBuf,
    files: Mutex<HashMap<String, RollingFileAppender>>,
}

impl PublicLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            files: Mutex::new(HashMap::new()),
        }
    }

    /// Directory the transcripts are written to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn append(&self, channel: &str, line: &str) -> io::Result<()> {
        let mut files = self.files.lock();
        let file = match files.entry(channel.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                std::fs::create_dir_all(&self.dir)?;
                let appender = RollingFileAppender::builder()
                    .rotation(Rotation::DAILY)
                    .filename_prefix(file_prefix(channel))
                    .filename_suffix("log")
                    .build(&self.dir)
                    .map_err(io::Error::other)?;
                entry.insert(appender)
            }
        };
        file.write_all(line.as_bytes())?;
        file.flush()
    }
}

impl ChatterLog for PublicLog {
    fn record(&self, req: &Request) {
        let channel = req.channel_name().unwrap_or(NO_CHANNEL);
        let line = format!(
            "{} <{}> {}\n",
            Utc::now().format("%H:%M:%S"),
            req.nick(),
            req.message()
        );
        if let Err(e) = self.append(channel, &line) {
            warn!(channel, error = %e, "Failed to write public log");
        }
    }
}

impl std::fmt::Debug for PublicLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PublicLog")
            .field("dir", &self.dir)
            .finish_non_exhaustive()
    }
}

/// Channel names with path separators or control characters made file-safe.
fn file_prefix(channel: &str) -> String {
    channel
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect()
}
