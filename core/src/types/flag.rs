use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Persisted marker recording whether first-time initialization finished.
///
/// On disk it is a single line holding one of the literal variant names.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompletionFlag {
    NotInitialized,
    Initialized,
}

impl CompletionFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompletionFlag::NotInitialized => "NotInitialized",
            CompletionFlag::Initialized => "Initialized",
        }
    }

    pub fn is_initialized(&self) -> bool {
        matches!(self, CompletionFlag::Initialized)
    }
}

impl fmt::Display for CompletionFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompletionFlag {
    type Err = String;

    /// Surrounding whitespace (the trailing newline) is ignored; anything
    /// else must match a variant exactly.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "NotInitialized" => Ok(CompletionFlag::NotInitialized),
            "Initialized" => Ok(CompletionFlag::Initialized),
            other => Err(format!("unknown completion flag: {:?}", other)),
        }
    }
}
