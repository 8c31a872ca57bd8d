//! Integration tests for the shortlink creation flows
//!
//! The target probe is stubbed so the flows can be exercised without a
//! network: explicit and random keyword creation, the error taxonomy, and
//! the guard against shortening an already-shortened link.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tempfile::TempDir;

use tautan::shortener::{ProbeOutcome, ShortenError, ShortenerService, TargetProbe};
use tautan::storage::{SqliteStorage, Storage};

struct StubProbe {
    reachable: bool,
    title: Option<String>,
    fail: bool,
}

impl StubProbe {
    fn reachable() -> Self {
        Self {
            reachable: true,
            title: Some("Example Domain".to_string()),
            fail: false,
        }
    }

    fn unreachable() -> Self {
        Self {
            reachable: false,
            title: None,
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            reachable: false,
            title: None,
            fail: true,
        }
    }
}

#[async_trait]
impl TargetProbe for StubProbe {
    async fn probe(&self, _url: &str) -> Result<ProbeOutcome> {
        if self.fail {
            anyhow::bail!("connection refused");
        }
        Ok(ProbeOutcome {
            reachable: self.reachable,
            title: self.title.clone(),
        })
    }
}

async fn create_storage(dir: &TempDir) -> Arc<dyn Storage> {
    let url = format!("sqlite://{}", dir.path().join("test.db").display());
    let storage = SqliteStorage::new(&url, 5).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn service(storage: &Arc<dyn Storage>, probe: StubProbe) -> ShortenerService {
    ShortenerService::new(Arc::clone(storage), Arc::new(probe))
}

#[tokio::test]
async fn create_explicit_keyword() {
    let dir = TempDir::new().unwrap();
    let storage = create_storage(&dir).await;
    let shortener = service(&storage, StubProbe::reachable());

    let link = shortener
        .create_explicit("my link!", "https://example.com", None, Some("alice"), "short.test")
        .await
        .unwrap();

    // Sanitized keyword, probed title
    assert_eq!(link.keyword, "mylink!");
    assert_eq!(link.title, "Example Domain");
    assert_eq!(link.owner.as_deref(), Some("alice"));

    assert!(storage.keyword_exists("mylink!").await.unwrap());
}

#[tokio::test]
async fn explicit_title_overrides_probed_title() {
    let dir = TempDir::new().unwrap();
    let storage = create_storage(&dir).await;
    let shortener = service(&storage, StubProbe::reachable());

    let link = shortener
        .create_explicit("docs", "https://example.com", Some("My Docs"), None, "short.test")
        .await
        .unwrap();

    assert_eq!(link.title, "My Docs");
}

#[tokio::test]
async fn empty_keyword_is_rejected() {
    let dir = TempDir::new().unwrap();
    let storage = create_storage(&dir).await;
    let shortener = service(&storage, StubProbe::reachable());

    let result = shortener
        .create_explicit(" /+ ", "https://example.com", None, None, "short.test")
        .await;

    assert!(matches!(result, Err(ShortenError::EmptyKeyword)));
}

#[tokio::test]
async fn taken_keyword_is_rejected() {
    let dir = TempDir::new().unwrap();
    let storage = create_storage(&dir).await;
    let shortener = service(&storage, StubProbe::reachable());

    shortener
        .create_explicit("docs", "https://example.com", None, None, "short.test")
        .await
        .unwrap();

    let result = shortener
        .create_explicit("docs", "https://other.example.com", None, None, "short.test")
        .await;

    assert!(matches!(result, Err(ShortenError::KeywordTaken)));
}

#[tokio::test]
async fn unreachable_target_is_rejected() {
    let dir = TempDir::new().unwrap();
    let storage = create_storage(&dir).await;

    let shortener = service(&storage, StubProbe::unreachable());
    let result = shortener
        .create_explicit("docs", "https://example.com/404", None, None, "short.test")
        .await;
    assert!(matches!(result, Err(ShortenError::UnreachableTarget)));

    // A failed fetch counts the same as a non-2xx answer
    let shortener = service(&storage, StubProbe::failing());
    let result = shortener
        .create_random("https://down.example.com", None, None, "short.test")
        .await;
    assert!(matches!(result, Err(ShortenError::UnreachableTarget)));
}

#[tokio::test]
async fn shortening_a_shortlink_is_rejected() {
    let dir = TempDir::new().unwrap();
    let storage = create_storage(&dir).await;
    let shortener = service(&storage, StubProbe::reachable());

    storage
        .create_link("abc", "https://example.com", "", None)
        .await
        .unwrap();

    let result = shortener
        .create_explicit("again", "http://short.test/abc", None, None, "short.test")
        .await;
    assert!(matches!(result, Err(ShortenError::AlreadyShortlink)));

    let result = shortener
        .create_random("https://short.test/abc", None, None, "short.test")
        .await;
    assert!(matches!(result, Err(ShortenError::AlreadyShortlink)));
}

#[tokio::test]
async fn already_shortlink_check_matches_existing_keywords_only() {
    let dir = TempDir::new().unwrap();
    let storage = create_storage(&dir).await;
    let shortener = service(&storage, StubProbe::reachable());

    storage
        .create_link("abc", "https://example.com", "", None)
        .await
        .unwrap();

    assert!(shortener
        .is_target_already_shortlink("http://host/abc", "host")
        .await
        .unwrap());
    assert!(!shortener
        .is_target_already_shortlink("http://host/xyz", "host")
        .await
        .unwrap());
    // A foreign host's path is not our keyword space
    assert!(!shortener
        .is_target_already_shortlink("http://elsewhere.example/no-such-keyword", "host")
        .await
        .unwrap());
}

#[tokio::test]
async fn create_random_draws_from_the_sequence() {
    let dir = TempDir::new().unwrap();
    let storage = create_storage(&dir).await;
    let shortener = service(&storage, StubProbe::reachable());

    let first = shortener
        .create_random("https://example.com", None, None, "short.test")
        .await
        .unwrap();
    let second = shortener
        .create_random("https://example.com", None, None, "short.test")
        .await
        .unwrap();

    // The sequence starts at 1 and encodes in base-62
    assert_eq!(first.keyword, "1");
    assert_eq!(second.keyword, "2");
}

#[tokio::test]
async fn create_random_skips_explicitly_taken_keywords() {
    let dir = TempDir::new().unwrap();
    let storage = create_storage(&dir).await;
    let shortener = service(&storage, StubProbe::reachable());

    // Squat on the keywords the first two sequence values encode to
    storage
        .create_link("1", "https://example.com", "", None)
        .await
        .unwrap();
    storage
        .create_link("2", "https://example.com", "", None)
        .await
        .unwrap();

    let link = shortener
        .create_random("https://example.com/page", None, None, "short.test")
        .await
        .unwrap();

    assert_eq!(link.keyword, "3");
    assert_eq!(link.target, "https://example.com/page");
}
