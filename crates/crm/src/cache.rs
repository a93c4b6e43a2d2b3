//! Process-wide CRM caches: the auth token and the custom-field lookup.

use std::future::Future;

use {
    secrecy::{ExposeSecret, Secret},
    tokio::sync::{Mutex, OnceCell},
};

use crate::Result;

/// Caches shared by every CRM component of the process.
#[derive(Default)]
pub struct CrmCache {
    pub token: TokenCache,
    pub username_field: FieldIdCache,
}

impl CrmCache {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Bearer token, kept until the CRM signals expiry.
#[derive(Default)]
pub struct TokenCache {
    token: Mutex<Option<Secret<String>>>,
}

impl TokenCache {
    /// Start with a token obtained elsewhere.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Mutex::new(Some(Secret::new(token.into()))),
        }
    }

    /// Return the cached token, running `login` if there is none.
    ///
    /// The lock is held across `login`, so concurrent callers share one login.
    pub async fn get_or_login<F, Fut>(&self, login: F) -> Result<Secret<String>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Secret<String>>>,
    {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            return Ok(token.clone());
        }
        let fresh = login().await?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }

    /// Forget `stale` if it is still the cached token.
    ///
    /// Returns `false` when another caller already replaced it, in which case
    /// the next `get_or_login` reuses the replacement instead of logging in
    /// again.
    pub async fn invalidate(&self, stale: &Secret<String>) -> bool {
        let mut cached = self.token.lock().await;
        let matches = cached
            .as_ref()
            .is_some_and(|t| t.expose_secret() == stale.expose_secret());
        if matches {
            *cached = None;
        }
        matches
    }

    pub async fn is_cached(&self) -> bool {
        self.token.lock().await.is_some()
    }
}

/// Id of a named custom field, looked up at most once per process.
///
/// "Not found" is memoized like a hit. A failed lookup is not, so the next
/// caller retries it.
#[derive(Default)]
pub struct FieldIdCache {
    id: OnceCell<Option<i64>>,
}

impl FieldIdCache {
    pub async fn get_or_lookup<F, Fut>(&self, lookup: F) -> Result<Option<i64>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<i64>>>,
    {
        self.id.get_or_try_init(lookup).await.copied()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::Error,
        std::sync::atomic::{AtomicUsize, Ordering},
    };

    #[tokio::test]
    async fn token_login_runs_once_until_invalidated() {
        let cache = TokenCache::default();
        let logins = AtomicUsize::new(0);
        let login = || async {
            let n = logins.fetch_add(1, Ordering::SeqCst);
            Ok(Secret::new(format!("t{n}")))
        };

        let first = cache.get_or_login(login).await.unwrap();
        let again = cache.get_or_login(login).await.unwrap();
        assert_eq!(first.expose_secret(), "t0");
        assert_eq!(again.expose_secret(), "t0");
        assert_eq!(logins.load(Ordering::SeqCst), 1);

        assert!(cache.invalidate(&first).await);
        let fresh = cache.get_or_login(login).await.unwrap();
        assert_eq!(fresh.expose_secret(), "t1");
    }

    #[tokio::test]
    async fn stale_invalidation_keeps_newer_token() {
        let cache = TokenCache::with_token("new");
        assert!(!cache.invalidate(&Secret::new("old".into())).await);
        assert!(cache.is_cached().await);
    }

    #[tokio::test]
    async fn failed_login_is_not_cached() {
        let cache = TokenCache::default();
        let err = cache
            .get_or_login(|| async { Err(Error::unauthorized("login")) })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unauthorized { .. }));
        assert!(!cache.is_cached().await);
    }

    #[tokio::test]
    async fn field_lookup_memoizes_not_found() {
        let cache = FieldIdCache::default();
        let lookups = AtomicUsize::new(0);
        for _ in 0..3 {
            let id = cache
                .get_or_lookup(|| async {
                    lookups.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                })
                .await
                .unwrap();
            assert_eq!(id, None);
        }
        assert_eq!(lookups.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn field_lookup_retries_after_error() {
        let cache = FieldIdCache::default();
        let first = cache
            .get_or_lookup(|| async { Err(Error::status(503, "list lead fields", "down")) })
            .await;
        assert!(first.is_err());
        let second = cache.get_or_lookup(|| async { Ok(Some(12)) }).await.unwrap();
        assert_eq!(second, Some(12));
    }
}
