//! Addressing resolution: is a line directed at the bot?
//!
//! Three forms are recognised, tested in this order (first match wins):
//!
//! | Form | Example | Effect |
//! |------|---------|--------|
//! | correction | `no, madcow, foo is bar` | message = `foo is bar`, `correction`, `addressed` |
//! | feedback | `madcow??` | `feedback`, message unchanged |
//! | direct | `madcow: hi there` | message = `hi there`, `addressed` |
//!
//! The rules are rebuilt from the *current* bot identity on every call, so a
//! nick change (for example after an IRC collision) is honoured immediately.

use std::sync::Arc;

use parking_lot::RwLock;
use regex::{Regex, RegexBuilder};
use tracing::trace;

use crate::error::{AddressingError, AddressingResult};
use crate::request::Request;

/// Separators accepted between the bot name and the rest of the line.
const SEPARATORS: &str = "[,:> -]+";

/// The names the bot answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BotIdentity {
    /// Primary display name.
    pub name: String,
    /// Extra names the bot also answers to.
    pub aliases: Vec<String>,
}

impl BotIdentity {
    /// Creates an identity with no aliases.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            aliases: Vec::new(),
        }
    }

    /// Adds aliases.
    pub fn with_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Escaped alternation of every name, longest first.
    fn alternation(&self) -> String {
        let mut names: Vec<&str> = std::iter::once(self.name.as_str())
            .chain(self.aliases.iter().map(String::as_str))
            .filter(|n| !n.is_empty())
            .collect();
        names.sort_by_key(|n| std::cmp::Reverse(n.len()));
        names
            .iter()
            .map(|n| regex::escape(n))
            .collect::<Vec<_>>()
            .join("|")
    }
}

/// Which addressing form a line matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Addressing {
    /// `no, <bot>, ...`
    Correction,
    /// `<bot>?`
    Feedback,
    /// `<bot>: ...`
    Direct,
    /// Not directed at the bot.
    None,
}

/// The three compiled rules for one identity.
struct AddressingRules {
    correction: Regex,
    feedback: Regex,
    direct: Regex,
}

impl AddressingRules {
    fn compile(identity: &BotIdentity) -> AddressingResult<Self> {
        if identity.name.trim().is_empty() {
            return Err(AddressingError::EmptyName);
        }

        let names = identity.alternation();
        let build = |expr: String| {
            RegexBuilder::new(&expr)
                .case_insensitive(true)
                .build()
                .map_err(|source| AddressingError::InvalidName {
                    name: identity.name.clone(),
                    source,
                })
        };

        Ok(Self {
            correction: build(format!(
                r"^\s*no[,:]?\s*(?:{names})\s*{SEPARATORS}\s*(\S.*)"
            ))?,
            feedback: build(format!(r"^\s*(?:{names})\s*\?+\s*$"))?,
            direct: build(format!(r"^\s*(?:{names})\s*{SEPARATORS}\s*(\S.*)"))?,
        })
    }
}

/// Classifies lines against the bot's current identity.
///
/// Cloning is cheap and clones share the identity, so a rename through any
/// clone is seen by all of them.
#[derive(Debug, Clone)]
pub struct AddressingResolver {
    identity: Arc<RwLock<BotIdentity>>,
}

impl AddressingResolver {
    /// Creates a resolver for `identity`.
    pub fn new(identity: BotIdentity) -> Self {
        Self {
            identity: Arc::new(RwLock::new(identity)),
        }
    }

    /// Returns the current display name.
    pub fn name(&self) -> String {
        self.identity.read().name.clone()
    }

    /// Returns a snapshot of the current identity.
    pub fn identity(&self) -> BotIdentity {
        self.identity.read().clone()
    }

    /// Changes the display name used for subsequent resolutions.
    pub fn set_name(&self, name: impl Into<String>) {
        self.identity.write().name = name.into();
    }

    /// Checks that rules can be built for the current identity.
    pub fn validate(&self) -> AddressingResult<()> {
        AddressingRules::compile(&self.identity.read()).map(|_| ())
    }

    /// Classifies `req`, setting its flags and stripping the addressing prefix.
    pub fn resolve(&self, req: &mut Request) -> AddressingResult<Addressing> {
        let rules = {
            let identity = self.identity.read();
            AddressingRules::compile(&identity)?
        };

        let found = if let Some(rest) = remainder(&rules.correction, req.message()) {
            req.rewrite(rest);
            req.mark_correction();
            Addressing::Correction
        } else if rules.feedback.is_match(req.message()) {
            req.mark_feedback();
            Addressing::Feedback
        } else if let Some(rest) = remainder(&rules.direct, req.message()) {
            req.rewrite(rest);
            req.mark_addressed();
            Addressing::Direct
        } else {
            Addressing::None
        };

        trace!(nick = %req.nick(), addressing = ?found, "Resolved addressing");
        Ok(found)
    }
}

/// Captured remainder with trailing whitespace removed.
fn remainder(rule: &Regex, message: &str) -> Option<String> {
    let caps = rule.captures(message)?;
    let rest = caps.get(1)?.as_str().trim_end();
    (!rest.is_empty()).then(|| rest.to_string())
}
