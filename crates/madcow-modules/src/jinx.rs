//! Coke allocation.
//!
//! Watches every line in the channel. When someone repeats what a different
//! person said within the last few seconds (ignoring case and whitespace),
//! the repeater owes the original speaker a coke.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use madcow_core::{
    BoxedModule, MatchArgs, Module, ModuleDescriptor, ModuleError, ModuleOptions, ModuleResult,
    Pattern, Request,
};

/// Configuration for `[modules.config.jinx]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JinxConfig {
    /// How long a line stays jinxable, in seconds.
    pub timeout_secs: u64,
}

impl Default for JinxConfig {
    fn default() -> Self {
        Self { timeout_secs: 5 }
    }
}

struct ChatLine {
    nick: String,
    tokens: Vec<String>,
    seen: Instant,
}

/// Lines seen within the jinx window, oldest first.
struct ChatLog {
    window: Duration,
    lines: Vec<ChatLine>,
}

impl ChatLog {
    fn new(window: Duration) -> Self {
        Self {
            window,
            lines: Vec::new(),
        }
    }

    /// Records a line and returns the nick of the earliest matching line.
    fn record(&mut self, nick: &str, text: &str, now: Instant) -> Option<String> {
        let window = self.window;
        self.lines
            .retain(|line| now.saturating_duration_since(line.seen) < window);

        let tokens = normalize(text);
        let earlier = self
            .lines
            .iter()
            .find(|line| line.tokens == tokens)
            .map(|line| line.nick.clone());

        self.lines.push(ChatLine {
            nick: nick.to_string(),
            tokens,
            seen: now,
        });
        earlier
    }
}

fn normalize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

/// The jinx module.
pub struct Jinx {
    pattern: Pattern,
    log: Mutex<ChatLog>,
}

impl Jinx {
    pub fn new(config: JinxConfig) -> Self {
        Self {
            pattern: Pattern::Any,
            log: Mutex::new(ChatLog::new(Duration::from_secs(config.timeout_secs))),
        }
    }
}

impl Default for Jinx {
    fn default() -> Self {
        Self::new(JinxConfig::default())
    }
}

#[async_trait]
impl Module for Jinx {
    fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    fn options(&self) -> ModuleOptions {
        ModuleOptions::default()
            .priority(0)
            .terminate(false)
            .allow_threading(false)
            .require_addressing(false)
    }

    async fn response(&self, args: &MatchArgs, req: &Request) -> ModuleResult<Option<String>> {
        let Some(line) = args.get(0) else {
            return Ok(None);
        };

        let earlier = self.log.lock().record(req.nick(), line, Instant::now());
        Ok(earlier
            .filter(|other| other != req.nick())
            .map(|other| format!("Jinx! {} owes {} a coke!", req.nick(), other)))
    }
}

/// Static descriptor for the jinx module.
pub static JINX_MODULE: ModuleDescriptor = ModuleDescriptor {
    name: "jinx",
    desc: "calls jinx when two people say the same thing",
    create: |ctx| {
        Box::pin(async move {
            let config: JinxConfig = ctx.get_config()?;
            Ok::<BoxedModule, ModuleError>(Arc::new(Jinx::new(config)))
        })
    },
};
