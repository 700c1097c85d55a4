use std::{fmt::Display, str::FromStr, sync::OnceLock};

use regex_lite::Regex;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ParseError {
    #[error("`{0}` is not a full commit hash")]
    NotACommitHash(String),
}

/// A fully qualified commit id, SHA-1 or SHA-256, in lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResolvedCommit(String);

impl ResolvedCommit {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form used in log lines.
    pub fn short(&self) -> &str {
        &self.0[..7]
    }
}

fn commit_hash_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:[0-9a-f]{40}|[0-9a-f]{64})$").expect("commit hash pattern is valid")
    })
}

impl FromStr for ResolvedCommit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hash = s.trim().to_ascii_lowercase();
        if commit_hash_pattern().is_match(&hash) {
            Ok(ResolvedCommit(hash))
        } else {
            Err(ParseError::NotACommitHash(s.to_owned()))
        }
    }
}

impl Display for ResolvedCommit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResolvedCommit {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
