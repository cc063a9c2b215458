//! Login session persistence and caching.
//!
//! Sessions live in the `user_sessions` table so logins survive restarts;
//! a dashmap cache in front keeps the per-request lookup off the database
//! for a short TTL.

use anyhow::Result;
use chrono::{Duration as ChronoDuration, Utc};
use dashmap::DashMap;
use rand::distr::Alphanumeric;
use rand::Rng;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::data::models::User;

const SESSION_TOKEN_LEN: usize = 48;
const SESSION_LIFETIME_DAYS: i64 = 14;
const CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct CachedSession {
    user: User,
    cached_at: Instant,
}

#[derive(Clone)]
pub struct SessionCache {
    pool: PgPool,
    cache: Arc<DashMap<String, CachedSession>>,
}

impl SessionCache {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Resolve a session token to its user, consulting the cache first.
    /// Expired or unknown tokens resolve to `None`.
    pub async fn resolve(&self, token: &str) -> Result<Option<User>> {
        if let Some(entry) = self.cache.get(token) {
            if entry.cached_at.elapsed() < CACHE_TTL {
                return Ok(Some(entry.user.clone()));
            }
        }

        let user = sqlx::query_as::<_, User>(
            "SELECT u.id, u.realname, u.email, u.is_admin, u.has_phi, u.is_active, \
                    u.github_name, u.gitlab_name, u.created_at \
             FROM user_sessions s \
             JOIN users u ON u.id = s.user_id \
             WHERE s.token = $1 AND s.expires_at > now()",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        match user {
            Some(user) => {
                self.cache.insert(
                    token.to_string(),
                    CachedSession {
                        user: user.clone(),
                        cached_at: Instant::now(),
                    },
                );
                Ok(Some(user))
            }
            None => {
                self.cache.remove(token);
                Ok(None)
            }
        }
    }

    /// Create a new login session for the user and return its token.
    pub async fn create(&self, user_id: i32) -> Result<String> {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_TOKEN_LEN)
            .map(char::from)
            .collect();

        sqlx::query("INSERT INTO user_sessions (token, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&token)
            .bind(user_id)
            .bind(Utc::now() + ChronoDuration::days(SESSION_LIFETIME_DAYS))
            .execute(&self.pool)
            .await?;

        Ok(token)
    }

    /// Destroy a session (logout).
    pub async fn destroy(&self, token: &str) -> Result<()> {
        sqlx::query("DELETE FROM user_sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        self.cache.remove(token);
        Ok(())
    }

    /// Drop cached entries for a user whose record changed (admin flag,
    /// deactivation) so the next request re-reads the database.
    pub fn evict_user(&self, user_id: i32) {
        self.cache.retain(|_, entry| entry.user.id != user_id);
    }
}

/// Pending OAuth authorization state tokens, held between the redirect to
/// the provider and its callback.
#[derive(Clone, Default)]
pub struct OAuthStateStore {
    inner: Arc<DashMap<String, PendingAuth>>,
}

#[derive(Clone)]
pub struct PendingAuth {
    pub provider: String,
    pub next: Option<String>,
    created_at: Instant,
}

const STATE_TOKEN_LEN: usize = 32;
const STATE_TTL: Duration = Duration::from_secs(600);

impl OAuthStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a state token for a new authorization round trip.
    pub fn issue(&self, provider: &str, next: Option<String>) -> String {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(STATE_TOKEN_LEN)
            .map(char::from)
            .collect();
        self.inner.insert(
            token.clone(),
            PendingAuth {
                provider: provider.to_string(),
                next,
                created_at: Instant::now(),
            },
        );
        token
    }

    /// Consume a state token. Unknown or stale tokens return `None`.
    pub fn take(&self, token: &str) -> Option<PendingAuth> {
        let (_, pending) = self.inner.remove(token)?;
        if pending.created_at.elapsed() > STATE_TTL {
            return None;
        }
        Some(pending)
    }
}
