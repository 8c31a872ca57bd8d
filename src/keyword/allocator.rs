//! Keyword allocation
//!
//! Auto-generated keywords come from the durable sequence counter encoded in
//! base-62. The availability check here is advisory; the UNIQUE constraint on
//! `links.keyword` is what actually closes the race against concurrent
//! creations, so callers treat a create-time conflict as "allocate again".

use std::sync::Arc;
use thiserror::Error;

use crate::keyword::codec;
use crate::storage::Storage;

/// Upper bound on sequence draws per allocation. Each draw consumes a fresh
/// counter value, so hitting this means the keyword space around the counter
/// is saturated with explicit keywords.
const MAX_ALLOCATION_ATTEMPTS: usize = 64;

#[derive(Debug, Error)]
pub enum KeywordError {
    #[error("keyword is empty after removing invalid characters")]
    Empty,
    #[error("keyword already taken")]
    Taken,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Remove every character outside the keyword alphabet.
///
/// Allowed: ASCII alphanumerics, `_`, and `$ - . ! * ( ) ,`, which is the
/// RFC 1738 unreserved set without apostrophe and plus, 71 symbols total.
pub fn sanitize(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '-' | '.' | '!' | '*' | '(' | ')' | ','))
        .collect()
}

pub struct KeywordAllocator {
    storage: Arc<dyn Storage>,
}

impl KeywordAllocator {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Hand out a keyword that is not present in the store at the instant of
    /// the check, advancing the durable sequence counter once per attempt.
    pub async fn allocate_random(&self) -> Result<String, KeywordError> {
        for _ in 0..MAX_ALLOCATION_ATTEMPTS {
            let id = self.storage.next_keyword_id().await?;
            let keyword = codec::encode(id as u64);
            if !self.storage.keyword_exists(&keyword).await? {
                return Ok(keyword);
            }
        }
        Err(KeywordError::Other(anyhow::anyhow!(
            "no free keyword after {} sequence draws",
            MAX_ALLOCATION_ATTEMPTS
        )))
    }

    /// Validate a caller-chosen keyword: sanitize, reject empty, reject taken.
    pub async fn validate_explicit(&self, raw: &str) -> Result<String, KeywordError> {
        let keyword = sanitize(raw);
        if keyword.is_empty() {
            return Err(KeywordError::Empty);
        }
        if self.storage.keyword_exists(&keyword).await? {
            return Err(KeywordError::Taken);
        }
        Ok(keyword)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_disallowed_characters() {
        assert_eq!(sanitize("ab cd!"), "abcd!");
        assert_eq!(sanitize("  hello  "), "hello");
        assert_eq!(sanitize("a/b\\c"), "abc");
        assert_eq!(sanitize("café"), "caf");
        assert_eq!(sanitize("a+b'c"), "abc");
    }

    #[test]
    fn sanitize_keeps_full_alphabet() {
        let kw = "AZaz09_$-.!*(),";
        assert_eq!(sanitize(kw), kw);
    }

    #[test]
    fn sanitize_can_produce_empty() {
        assert_eq!(sanitize("   "), "");
        assert_eq!(sanitize("/+#?&"), "");
    }
}
