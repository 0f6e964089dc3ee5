use crate::base62;
use smol_str::SmolStr;
use std::fmt::Display;

/// A short key: a monotonic identifier together with its base62 encoding.
///
/// The encoded form is the public path segment of a short URL. It is derived
/// from the identifier and is at least [`base62::MIN_LENGTH`] characters long.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShortKey {
    id: u64,
    encoded: SmolStr,
}

impl ShortKey {
    /// Creates a key by encoding the given identifier.
    pub fn from_id(id: u64) -> Self {
        Self {
            id,
            encoded: base62::encode(id),
        }
    }

    /// Rebuilds a key from previously persisted parts.
    ///
    /// The encoded form is taken as-is; it is not re-derived from `id`.
    pub fn from_parts(id: u64, encoded: impl Into<SmolStr>) -> Self {
        Self {
            id,
            encoded: encoded.into(),
        }
    }

    /// Returns the numeric identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the encoded key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Generates the full short URL based on the provided base URL.
    pub fn to_url(&self, base_url: &str) -> String {
        format!("{}/{}", base_url.trim_end_matches('/'), self.encoded)
    }
}

impl From<u64> for ShortKey {
    fn from(id: u64) -> Self {
        Self::from_id(id)
    }
}

impl Display for ShortKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_key_is_six_chars() {
        let key = ShortKey::from_id(1);
        assert_eq!(key.id(), 1);
        assert_eq!(key.as_str(), "aaaaab");
        assert_eq!(key.as_str().len(), 6);
    }

    #[test]
    fn from_parts_keeps_encoded_form() {
        let key = ShortKey::from_parts(7, "legacy");
        assert_eq!(key.id(), 7);
        assert_eq!(key.as_str(), "legacy");
    }

    #[test]
    fn display() {
        assert_eq!(ShortKey::from_id(62).to_string(), "aaaaba");
    }

    #[test]
    fn to_url() {
        let key = ShortKey::from_id(1);
        assert_eq!(key.to_url("http://localhost:8080"), "http://localhost:8080/aaaaab");
        assert_eq!(key.to_url("http://localhost:8080/"), "http://localhost:8080/aaaaab");
    }
}
