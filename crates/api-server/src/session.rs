//! Server-side session store.
//!
//! A session is minted after a successful OAuth callback and keyed by a
//! bearer token. Besides the constituent's identity it caches the CRM
//! user session id (which the CRM expires after ten minutes) and the
//! most recent reconciliation, so the points view can render without a
//! round trip.

use checkin_core::config::SessionConfig;
use checkin_core::points::ReconciliationResult;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct Session {
    pub account_id: String,
    pub constituent_name: String,
    pub user_session_id: String,
    pub usid_obtained_at: DateTime<Utc>,
    pub last_summary: ReconciliationResult,
    pub last_seen: DateTime<Utc>,
}

pub struct SessionStore {
    sessions: DashMap<Uuid, Session>,
    ttl: Duration,
    usid_ttl: Duration,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            ttl: Duration::seconds(config.ttl_secs as i64),
            usid_ttl: Duration::seconds(config.usid_ttl_secs as i64),
        }
    }

    pub fn create(&self, session: Session) -> Uuid {
        let token = Uuid::new_v4();
        self.sessions.insert(token, session);
        metrics::counter!("sessions.created").increment(1);
        token
    }

    /// Clone the session for a token, refreshing its idle timer. Returns
    /// None for unknown or idle-expired tokens.
    pub fn snapshot(&self, token: &Uuid) -> Option<Session> {
        let now = Utc::now();
        let mut entry = self.sessions.get_mut(token)?;
        if now - entry.last_seen > self.ttl {
            drop(entry);
            self.sessions.remove(token);
            metrics::counter!("sessions.expired").increment(1);
            return None;
        }
        entry.last_seen = now;
        Some(entry.clone())
    }

    /// Whether the cached CRM user session id is due for renewal.
    pub fn usid_expired(&self, session: &Session) -> bool {
        Utc::now() - session.usid_obtained_at > self.usid_ttl
    }

    pub fn set_usid(&self, token: &Uuid, user_session_id: String) {
        if let Some(mut entry) = self.sessions.get_mut(token) {
            entry.user_session_id = user_session_id;
            entry.usid_obtained_at = Utc::now();
        }
    }

    pub fn set_summary(&self, token: &Uuid, summary: ReconciliationResult) {
        if let Some(mut entry) = self.sessions.get_mut(token) {
            entry.last_summary = summary;
        }
    }

    pub fn remove(&self, token: &Uuid) -> bool {
        self.sessions.remove(token).is_some()
    }

    /// Drop idle-expired sessions. Called from a periodic maintenance task.
    pub fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, s| now - s.last_seen <= self.ttl);
        let purged = before - self.sessions.len();
        if purged > 0 {
            debug!(purged, "Expired sessions purged");
            metrics::counter!("sessions.expired").increment(purged as u64);
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_summary() -> ReconciliationResult {
        ReconciliationResult {
            total_points: 0,
            events: Vec::new(),
            earned_rewards: Vec::new(),
            next_reward: None,
            points_to_next_reward: None,
            next_reward_threshold: None,
            eligible_for_checkin: true,
            eligible_for_data_update: true,
            next_data_update_kind: Some("linkedin".to_string()),
            next_data_update_value: Some(10),
        }
    }

    fn sample_session() -> Session {
        Session {
            account_id: "acct-1".to_string(),
            constituent_name: "Sam".to_string(),
            user_session_id: "T1356492402097".to_string(),
            usid_obtained_at: Utc::now(),
            last_summary: empty_summary(),
            last_seen: Utc::now(),
        }
    }

    #[test]
    fn test_create_and_snapshot() {
        let store = SessionStore::new(&SessionConfig::default());
        let token = store.create(sample_session());

        let snapshot = store.snapshot(&token).unwrap();
        assert_eq!(snapshot.account_id, "acct-1");
        assert!(store.snapshot(&Uuid::new_v4()).is_none());
    }

    #[test]
    fn test_idle_expiry() {
        let config = SessionConfig {
            ttl_secs: 0,
            ..SessionConfig::default()
        };
        let store = SessionStore::new(&config);
        let mut session = sample_session();
        session.last_seen = Utc::now() - Duration::seconds(5);
        let token = store.create(session);

        assert!(store.snapshot(&token).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_usid_expiry_and_renewal() {
        let store = SessionStore::new(&SessionConfig::default());
        let mut session = sample_session();
        session.usid_obtained_at = Utc::now() - Duration::seconds(600);
        let token = store.create(session);

        let snapshot = store.snapshot(&token).unwrap();
        assert!(store.usid_expired(&snapshot));

        store.set_usid(&token, "T9999".to_string());
        let renewed = store.snapshot(&token).unwrap();
        assert_eq!(renewed.user_session_id, "T9999");
        assert!(!store.usid_expired(&renewed));
    }

    #[test]
    fn test_purge_expired() {
        let config = SessionConfig {
            ttl_secs: 60,
            ..SessionConfig::default()
        };
        let store = SessionStore::new(&config);
        let mut stale = sample_session();
        stale.last_seen = Utc::now() - Duration::seconds(120);
        store.create(stale);
        store.create(sample_session());

        assert_eq!(store.purge_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_remove() {
        let store = SessionStore::new(&SessionConfig::default());
        let token = store.create(sample_session());
        assert!(store.remove(&token));
        assert!(!store.remove(&token));
    }
}
