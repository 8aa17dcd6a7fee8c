use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MediaError;

/// Length of a hex-encoded SHA-256 digest
pub const CONTENT_HASH_LEN: usize = 64;

/// Content-addressed identity of a stored file (lowercase hex SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

impl ContentHash {
    /// Build a hash from raw digest bytes.
    pub fn from_digest(digest: &[u8]) -> Self {
        ContentHash(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ContentHash {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != CONTENT_HASH_LEN || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(MediaError::InvalidInput(format!(
                "Invalid content hash: {:?}",
                s
            )));
        }
        Ok(ContentHash(s.to_ascii_lowercase()))
    }
}

impl TryFrom<String> for ContentHash {
    type Error = MediaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for ContentHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_digest_is_lowercase_hex() {
        let hash = ContentHash::from_digest(&[0xAB; 32]);
        assert_eq!(hash.as_str().len(), CONTENT_HASH_LEN);
        assert!(hash.as_str().starts_with("abab"));
    }

    #[test]
    fn test_parse_rejects_wrong_length_and_non_hex() {
        assert!("abc".parse::<ContentHash>().is_err());
        assert!("z".repeat(64).parse::<ContentHash>().is_err());
        let upper = "A".repeat(64);
        assert_eq!(upper.parse::<ContentHash>().unwrap().as_str(), "a".repeat(64));
    }

    #[test]
    fn test_serde_roundtrip_validates() {
        let json = format!("\"{}\"", "0".repeat(64));
        let hash: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(serde_json::to_string(&hash).unwrap(), json);
        assert!(serde_json::from_str::<ContentHash>("\"nope\"").is_err());
    }
}
