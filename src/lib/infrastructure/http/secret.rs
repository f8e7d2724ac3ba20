use crate::constants::REDACTED;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Bearer credential for the LunaTask API.
///
/// `Debug` and `Display` never print the raw value; the only accessor that
/// does is crate-private and used when the `Authorization` header is built.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct BearerToken(String);

impl BearerToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    pub(crate) fn authorization_value(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Header value to log in place of the real one
    pub fn redacted_authorization() -> String {
        format!("Bearer {REDACTED}")
    }
}

impl FromStr for BearerToken {
    type Err = std::convert::Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(value))
    }
}

impl fmt::Debug for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl fmt::Display for BearerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formatting_never_exposes_the_token() {
        let token = BearerToken::new("live-secret-123");
        assert_eq!(format!("{token}"), REDACTED);
        assert_eq!(format!("{token:?}"), REDACTED);
        assert!(!format!("{:?}", Some(token.clone())).contains("live-secret-123"));
        assert_eq!(token.authorization_value(), "Bearer live-secret-123");
    }

    #[test]
    fn blank_tokens_are_detected() {
        assert!(BearerToken::new("   ").is_blank());
        assert!(!BearerToken::new("abc").is_blank());
    }
}
