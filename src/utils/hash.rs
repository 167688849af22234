//! Content hashing using blake3.
//!
//! Cache acknowledgments carry a [`ContentHash`] of the persisted stylesheet so
//! listeners can tell a fresh file from a stale one.
//!
//! ```ignore
//! let hash = ContentHash::of(css);
//! assert_eq!(ContentHash::from_hex(&hash.to_hex()), Some(hash));
//! ```

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash arbitrary content.
    #[inline]
    pub fn of<T: AsRef<[u8]> + ?Sized>(data: &T) -> Self {
        Self(*blake3::hash(data.as_ref()).as_bytes())
    }

    /// Convert to hex string.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Create from hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Check `content` against a hex-encoded hash.
    pub fn matches_hex(content: &str, hex: &str) -> bool {
        Self::from_hex(hex).is_some_and(|expected| Self::of(content) == expected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let hash = ContentHash::of(".x{color:red}");
        assert_eq!(hash.to_hex().len(), 64);
        assert_eq!(ContentHash::from_hex(&hash.to_hex()), Some(hash));
        assert_eq!(ContentHash::from_hex("abc"), None);
    }

    #[test]
    fn test_matches_hex() {
        let hex = ContentHash::of("a").to_hex();
        assert!(ContentHash::matches_hex("a", &hex));
        assert!(!ContentHash::matches_hex("b", &hex));
        assert!(!ContentHash::matches_hex("a", "not-hex"));
    }
}
