use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Cheap content identity for a file on disk: size + mtime + a digest of the
/// first/last kilobyte. Shared by the scanner and the store layer so "same
/// content, different path" and "same path, same content" comparisons always
/// use one definition.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ContentHash(String);

impl ContentHash {
    pub fn compute(size_bytes: u64, modified_unix_secs: i64, head: &[u8], tail: &[u8]) -> Self {
        let mut hasher = DefaultHasher::new();
        size_bytes.hash(&mut hasher);
        modified_unix_secs.hash(&mut hasher);
        head.hash(&mut hasher);
        tail.hash(&mut hasher);
        Self(format!("{size_bytes:x}-{:016x}", hasher.finish()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_hash_identically() {
        let a = ContentHash::compute(1024, 1_700_000_000, b"head", b"tail");
        let b = ContentHash::compute(1024, 1_700_000_000, b"head", b"tail");
        assert_eq!(a, b);
    }

    #[test]
    fn differing_size_changes_the_hash() {
        let a = ContentHash::compute(1024, 1_700_000_000, b"head", b"tail");
        let b = ContentHash::compute(2048, 1_700_000_000, b"head", b"tail");
        assert_ne!(a, b);
    }
}
