//! Staging token derivation and parsing.

use super::StagingError;
use crate::models::UserId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Prefix of every staging token minted by the importer
pub const DEFAULT_TOKEN_PREFIX: &str = "bji_";

/// Length of the hex digest part of a token
const DIGEST_HEX_LENGTH: usize = 40;

/// Longest accepted token, prefix included
const MAX_TOKEN_LENGTH: usize = 128;

/// Opaque handle to a staged upload.
///
/// Only lowercase letters, digits and underscores, so a token is always safe
/// to use as a file name or cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StagingToken(String);

impl StagingToken {
    /// Mint a fresh token for `owner`.
    ///
    /// The token is a SHA-256 digest over a random v4 UUID nonce and the
    /// owner's identity.
    pub fn mint(prefix: &str, owner: UserId) -> Self {
        let nonce = Uuid::new_v4();
        let mut hasher = Sha256::new();
        hasher.update(nonce.as_bytes());
        hasher.update(owner.0.to_be_bytes());
        let digest = hex::encode(hasher.finalize());
        Self(format!("{}{}", prefix, &digest[..DIGEST_HEX_LENGTH]))
    }

    /// Parse an untrusted token string.
    pub fn parse(token: &str) -> Result<Self, StagingError> {
        let token = token.trim();
        if token.is_empty() || token.len() > MAX_TOKEN_LENGTH {
            return Err(StagingError::InvalidToken(
                "token must be 1 to 128 characters".to_string(),
            ));
        }
        if !token
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err(StagingError::InvalidToken(
                "token contains invalid characters".to_string(),
            ));
        }
        Ok(Self(token.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl FromStr for StagingToken {
    type Err = StagingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for StagingToken {
    type Error = StagingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<StagingToken> for String {
    fn from(token: StagingToken) -> Self {
        token.0
    }
}

impl fmt::Display for StagingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minted_tokens_are_unique_and_parseable() {
        let a = StagingToken::mint(DEFAULT_TOKEN_PREFIX, UserId(1));
        let b = StagingToken::mint(DEFAULT_TOKEN_PREFIX, UserId(1));
        assert_ne!(a, b);
        assert!(a.has_prefix(DEFAULT_TOKEN_PREFIX));
        assert_eq!(a.as_str().len(), DEFAULT_TOKEN_PREFIX.len() + DIGEST_HEX_LENGTH);
        assert_eq!(StagingToken::parse(a.as_str()), Ok(a));
    }

    #[test]
    fn test_parse_rejects_path_like_tokens() {
        assert!(StagingToken::parse("../etc/passwd").is_err());
        assert!(StagingToken::parse("BJI_ABC").is_err());
        assert!(StagingToken::parse("").is_err());
        assert!(StagingToken::parse(&"a".repeat(200)).is_err());
    }
}
