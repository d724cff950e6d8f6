use crate::domain::session::Session;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use time::OffsetDateTime;

#[derive(Clone, Debug)]
struct CachedSession {
    session: Session,
    confirmed_at: OffsetDateTime,
}

/// Process-local cache of sessions the identity provider has confirmed.
///
/// Entries are keyed by a SHA-256 digest of the access token so raw tokens
/// never sit in memory longer than the request that carried them. Each entry
/// remembers when the provider last vouched for it.
#[derive(Clone, Debug, Default)]
pub struct SessionStore {
    entries: Arc<DashMap<String, CachedSession>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn key(access_token: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(access_token.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn insert(&self, session: &Session) {
        self.insert_at(session, OffsetDateTime::now_utc());
    }

    /// Caches `session` as confirmed by the provider at `confirmed_at`.
    pub fn insert_at(&self, session: &Session, confirmed_at: OffsetDateTime) {
        self.entries
            .insert(Self::key(&session.access_token), CachedSession { session: session.clone(), confirmed_at });
    }

    #[must_use]
    pub fn get(&self, access_token: &str) -> Option<Session> {
        self.get_at(access_token, OffsetDateTime::now_utc())
    }

    /// Returns the cached session unless it has expired at `now`; expired
    /// entries are evicted on the way out.
    #[must_use]
    pub fn get_at(&self, access_token: &str, now: OffsetDateTime) -> Option<Session> {
        self.live_entry(access_token, now).map(|entry| entry.session)
    }

    /// Returns the cached session when it is still live at `now` and the
    /// provider confirmed it less than `max_age` ago.
    #[must_use]
    pub fn get_confirmed_within(
        &self,
        access_token: &str,
        max_age: time::Duration,
        now: OffsetDateTime,
    ) -> Option<Session> {
        self.live_entry(access_token, now).filter(|entry| now - entry.confirmed_at < max_age).map(|entry| entry.session)
    }

    fn live_entry(&self, access_token: &str, now: OffsetDateTime) -> Option<CachedSession> {
        let key = Self::key(access_token);
        let expired = match self.entries.get(&key) {
            Some(entry) if !entry.session.is_expired_at(now) => return Some(entry.clone()),
            Some(_) => true,
            None => false,
        };

        if expired && self.entries.remove_if(&key, |_, e| e.session.is_expired_at(now)).is_some() {
            tracing::debug!("Evicted expired cached session");
        }
        None
    }

    pub fn remove(&self, access_token: &str) -> Option<Session> {
        self.entries.remove(&Self::key(access_token)).map(|(_, entry)| entry.session)
    }

    /// Drops every entry that has expired at `now` and returns how many went.
    pub fn purge_expired_at(&self, now: OffsetDateTime) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.session.is_expired_at(now));
        before.saturating_sub(self.entries.len())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
