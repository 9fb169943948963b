//! Trigger patterns and captured arguments.

use std::ops::Deref;
use std::sync::LazyLock;

use regex::Regex;

/// The match-anything rule: one group holding the whole (single) line.
static ANY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.+)$").expect("valid regex"));

/// A module's trigger rule.
#[derive(Debug, Clone, Default)]
pub enum Pattern {
    /// Never matches; the module is never a candidate.
    #[default]
    Never,
    /// Matches any non-empty single line and captures it as the first argument.
    Any,
    /// Matches when the expression is found anywhere in the message.
    Regex(Regex),
}

impl Pattern {
    /// Compiles a case-sensitive pattern.
    pub fn new(expr: &str) -> Result<Self, regex::Error> {
        Ok(Self::Regex(Regex::new(expr)?))
    }

    /// Compiles a case-insensitive pattern.
    pub fn case_insensitive(expr: &str) -> Result<Self, regex::Error> {
        Ok(Self::Regex(Regex::new(&format!("(?i){expr}"))?))
    }

    /// Tests the pattern against `message`, returning the captured groups on a match.
    pub fn captures(&self, message: &str) -> Option<MatchArgs> {
        let regex = match self {
            Self::Never => return None,
            Self::Any => &*ANY,
            Self::Regex(regex) => regex,
        };

        let caps = regex.captures(message)?;
        Some(MatchArgs(
            caps.iter()
                .skip(1)
                .map(|group| group.map(|m| m.as_str().to_string()))
                .collect(),
        ))
    }

    /// Returns `true` if the pattern matches `message`.
    pub fn is_match(&self, message: &str) -> bool {
        match self {
            Self::Never => false,
            Self::Any => ANY.is_match(message),
            Self::Regex(regex) => regex.is_match(message),
        }
    }
}

impl From<Regex> for Pattern {
    fn from(regex: Regex) -> Self {
        Self::Regex(regex)
    }
}

/// The capture groups of a matched pattern, in order.
///
/// Optional groups that did not participate in the match are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchArgs(Vec<Option<String>>);

impl MatchArgs {
    /// Creates arguments from an explicit list of groups.
    pub fn new(groups: Vec<Option<String>>) -> Self {
        Self(groups)
    }

    /// Returns group `index` if it participated in the match.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.0.get(index).and_then(|g| g.as_deref())
    }

    /// Consumes the arguments, returning the raw groups.
    pub fn into_inner(self) -> Vec<Option<String>> {
        self.0
    }
}

impl Deref for MatchArgs {
    type Target = [Option<String>];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
