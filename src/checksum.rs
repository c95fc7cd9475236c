//! Cache keys for byte buffers
//!
//! Buffers are identified by a 32-bit Adler-32 checksum of their bytes. The
//! checksum is streaming and order-sensitive, so the key of a concatenation
//! `a ++ b` is computed without allocating the joined buffer.
//!
//! Adler-32 is not collision resistant. To narrow the hazard the key also
//! carries the total byte length; two distinct buffers of equal length that
//! collide on the checksum still share a key.

use adler2::Adler32;
use serde::{Deserialize, Serialize};

/// Identity of a buffer (or of a concatenation of buffers) for caching.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    /// Adler-32 of the bytes
    pub checksum: u32,
    /// Total number of bytes hashed
    pub len: u64,
}

impl CacheKey {
    /// Key of a single buffer.
    ///
    /// # Examples
    ///
    /// ```
    /// use compsim::checksum::CacheKey;
    ///
    /// let key = CacheKey::of(b"Wikipedia");
    /// assert_eq!(key.checksum, 0x11E6_0398);
    /// assert_eq!(key.len, 9);
    /// ```
    pub fn of(data: &[u8]) -> Self {
        Self::of_parts(&[data])
    }

    /// Key of `a ++ b`.
    ///
    /// `CacheKey::of_pair(a, b)` equals `CacheKey::of(&[a, b].concat())`.
    pub fn of_pair(a: &[u8], b: &[u8]) -> Self {
        Self::of_parts(&[a, b])
    }

    fn of_parts(parts: &[&[u8]]) -> Self {
        let mut hasher = Adler32::new();
        let mut len = 0u64;
        for part in parts {
            hasher.write_slice(part);
            len += part.len() as u64;
        }
        CacheKey {
            checksum: hasher.checksum(),
            len,
        }
    }
}
