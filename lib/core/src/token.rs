//! Bot credential wrapper.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A bot platform token.
///
/// The value never appears in `Debug` output so it can travel through
/// structured logs and error reports without leaking.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotToken(String);

impl BotToken {
    /// Wraps a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for use against the bot platform.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true if the token is blank.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for BotToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BotToken(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_is_redacted() {
        let token = BotToken::new("123456:ABC-secret");
        let debug = format!("{token:?}");
        assert!(!debug.contains("secret"));
        assert_eq!(token.expose(), "123456:ABC-secret");
    }

    #[test]
    fn blank_token_is_empty() {
        assert!(BotToken::new("   ").is_empty());
        assert!(!BotToken::new("1:a").is_empty());
    }
}
