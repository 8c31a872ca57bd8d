//! Shortlink creation
//!
//! Both creation flows: explicit keyword (validated) and random keyword
//! (allocated from the sequence). The database UNIQUE constraint is the
//! final word on keyword uniqueness; the random flow reacts to a create-time
//! conflict by allocating again, so callers never observe one.

pub mod probe;

use std::sync::Arc;
use thiserror::Error;

use crate::keyword::{KeywordAllocator, KeywordError};
use crate::models::Shortlink;
use crate::storage::{Storage, StorageError};

pub use probe::{extract_title, HttpProbe, ProbeOutcome, TargetProbe};

/// Random-flow create retries after losing a keyword race. Each retry draws
/// a fresh sequence value, so two losses in a row already mean something is
/// systematically wrong.
const MAX_CREATE_ATTEMPTS: usize = 8;

#[derive(Debug, Error)]
pub enum ShortenError {
    #[error("keyword is empty after removing invalid characters")]
    EmptyKeyword,
    #[error("keyword already taken")]
    KeywordTaken,
    #[error("target is already a shortened link")]
    AlreadyShortlink,
    #[error("target URL is unreachable")]
    UnreachableTarget,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<KeywordError> for ShortenError {
    fn from(err: KeywordError) -> Self {
        match err {
            KeywordError::Empty => ShortenError::EmptyKeyword,
            KeywordError::Taken => ShortenError::KeywordTaken,
            KeywordError::Other(e) => ShortenError::Other(e),
        }
    }
}

pub struct ShortenerService {
    storage: Arc<dyn Storage>,
    allocator: KeywordAllocator,
    probe: Arc<dyn TargetProbe>,
}

impl ShortenerService {
    pub fn new(storage: Arc<dyn Storage>, probe: Arc<dyn TargetProbe>) -> Self {
        let allocator = KeywordAllocator::new(Arc::clone(&storage));
        Self {
            storage,
            allocator,
            probe,
        }
    }

    /// Create a shortlink with a caller-chosen keyword.
    pub async fn create_explicit(
        &self,
        raw_keyword: &str,
        target: &str,
        title: Option<&str>,
        owner: Option<&str>,
        host: &str,
    ) -> Result<Shortlink, ShortenError> {
        let keyword = self.allocator.validate_explicit(raw_keyword).await?;
        let probed_title = self.check_target(target, host).await?;
        let title = resolve_title(title, probed_title);

        match self.storage.create_link(&keyword, target, &title, owner).await {
            Ok(link) => Ok(link),
            // Someone claimed the keyword between validation and create
            Err(StorageError::Conflict) => Err(ShortenError::KeywordTaken),
            Err(StorageError::Other(e)) => Err(ShortenError::Other(e)),
        }
    }

    /// Create a shortlink with an auto-allocated keyword.
    pub async fn create_random(
        &self,
        target: &str,
        title: Option<&str>,
        owner: Option<&str>,
        host: &str,
    ) -> Result<Shortlink, ShortenError> {
        let probed_title = self.check_target(target, host).await?;
        let title = resolve_title(title, probed_title);

        for _ in 0..MAX_CREATE_ATTEMPTS {
            let keyword = self.allocator.allocate_random().await?;

            match self.storage.create_link(&keyword, target, &title, owner).await {
                Ok(link) => return Ok(link),
                // Lost the race for this keyword; draw the next one
                Err(StorageError::Conflict) => continue,
                Err(StorageError::Other(e)) => return Err(ShortenError::Other(e)),
            }
        }

        Err(ShortenError::Other(anyhow::anyhow!(
            "keyword allocation kept losing creation races"
        )))
    }

    /// True when the candidate target, with scheme and this service's host
    /// stripped, is an existing keyword, i.e. the caller is trying to
    /// shorten an already-shortened link.
    pub async fn is_target_already_shortlink(
        &self,
        candidate_url: &str,
        host: &str,
    ) -> Result<bool, ShortenError> {
        let mut remainder = candidate_url
            .trim()
            .trim_start_matches("http://")
            .trim_start_matches("https://")
            .to_string();

        if !host.is_empty() {
            remainder = remainder.replace(host, "");
        }
        remainder = remainder.replace(['/', '+'], "");

        if remainder.is_empty() {
            return Ok(false);
        }

        Ok(self
            .storage
            .keyword_exists(&remainder)
            .await
            .map_err(ShortenError::Other)?)
    }

    /// Probe the target and run the recursion guard; returns the probed
    /// page title on success.
    async fn check_target(
        &self,
        target: &str,
        host: &str,
    ) -> Result<Option<String>, ShortenError> {
        let outcome = match self.probe.probe(target).await {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::debug!(target = %target, error = %err, "target probe failed");
                return Err(ShortenError::UnreachableTarget);
            }
        };

        if !outcome.reachable {
            return Err(ShortenError::UnreachableTarget);
        }

        if self.is_target_already_shortlink(target, host).await? {
            return Err(ShortenError::AlreadyShortlink);
        }

        Ok(outcome.title)
    }
}

/// An explicit, non-empty caller title wins over the probed page title.
fn resolve_title(explicit: Option<&str>, probed: Option<String>) -> String {
    explicit
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or(probed)
        .unwrap_or_default()
}
