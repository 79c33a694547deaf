use crate::core::domain::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A SHA-256 digest in lowercase hex, as published next to cloud images.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Sha256Checksum(String);

impl Sha256Checksum {
    /// Returns the digest as lowercase hex.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Compares against raw digest bytes.
    #[must_use]
    pub fn matches(&self, digest: &[u8]) -> bool {
        hex::encode(digest) == self.0
    }
}

impl fmt::Display for Sha256Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Sha256Checksum {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        validate_checksum(s)?;
        Ok(Self(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for Sha256Checksum {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Sha256Checksum> for String {
    fn from(checksum: Sha256Checksum) -> Self {
        checksum.0
    }
}

/// Validates a hex-encoded SHA-256 digest.
pub(crate) fn validate_checksum(checksum: &str) -> Result<(), ValidationError> {
    if checksum.len() != 64 {
        return Err(ValidationError::Field {
            field: "checksum".to_string(),
            message: format!(
                "SHA-256 checksum must be 64 hex characters (got {})",
                checksum.len()
            ),
        });
    }
    if !checksum.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(ValidationError::Format(
            "Checksum contains non-hex characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::{Digest, Sha256};

    const HELLO: &str = "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824";

    #[test]
    fn test_matches_digest() {
        let checksum: Sha256Checksum = HELLO.to_uppercase().parse().unwrap();
        assert_eq!(checksum.as_str(), HELLO);
        assert!(checksum.matches(&Sha256::digest(b"hello")));
        assert!(!checksum.matches(&Sha256::digest(b"world")));
    }

    #[test]
    fn test_validate_checksum_invalid() {
        assert!(validate_checksum("").is_err());
        assert!(validate_checksum("abc123").is_err());
        assert!(validate_checksum(&"z".repeat(64)).is_err());
    }
}
