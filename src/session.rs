//! Cookie based server-side sessions.
//!
//! Sessions live in a process-wide table keyed by an opaque ID that the
//! client carries in a cookie. The table is never swept: expiry is only
//! communicated to the client through the cookie's `Max-Age`/`expires`
//! attributes, so an ID past its nominal expiry stays valid until the
//! process restarts. Known limitation, kept on purpose.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{Duration, Utc};
use log::debug;
use uuid::Uuid;

use crate::request::Request;
use crate::response::Response;

const DEFAULT_DURATION_SECS: u64 = 2_592_000; // 30 days
const DEFAULT_COOKIE_NAME: &str = "sessionId";

/// One client's session: an opaque ID plus a string key-value store.
/// Cloning is cheap and all clones share state.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    id: String,
    attributes: Mutex<HashMap<String, String>>,
}

impl Session {
    fn new(id: String) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id,
                attributes: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// Read a session attribute.
    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.attributes.lock().unwrap().get(key).cloned()
    }

    /// Store a session attribute.
    pub fn set(&self, key: &str, value: &str) {
        self.inner
            .attributes
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
    }
}

/// Issues session identities and owns the in-memory session table. Shared
/// across worker threads; lookups take a read lock, creation a write lock.
pub struct SessionManager {
    duration_secs: u64,
    cookie_name: String,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionManager {
    /// Manager with a 30 day duration and the `sessionId` cookie.
    pub fn new() -> Self {
        Self::with_config(DEFAULT_DURATION_SECS, DEFAULT_COOKIE_NAME)
    }

    pub fn with_config(duration_secs: u64, cookie_name: &str) -> Self {
        Self {
            duration_secs,
            cookie_name: cookie_name.to_string(),
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Look up a session by ID. Never creates.
    pub fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.read().unwrap().get(session_id).cloned()
    }

    /// The session the request's cookie points at, if any.
    pub fn session(&self, request: &Request) -> Option<Session> {
        request
            .cookie(&self.cookie_name)
            .and_then(|id| self.get(&id))
    }

    /// Return the request's session, or mint a new one: a fresh ID goes
    /// into the table and a session cookie onto the response. An existing
    /// session is returned as-is, neither mutated nor refreshed.
    pub fn start(&self, request: &Request, response: &mut Response) -> Session {
        if let Some(session) = self.session(request) {
            return session;
        }

        // Session IDs are a UUID with a four digit random suffix.
        let id = format!("{}-{}", Uuid::new_v4(), fastrand::u32(1000..=9999));
        debug!("starting new session {}", &id);
        let session = {
            let mut sessions = self.sessions.write().unwrap();
            // Re-check under the write lock; a concurrent start for the
            // same ID must not lose either insert.
            sessions
                .entry(id)
                .or_insert_with_key(|id| Session::new(id.clone()))
                .clone()
        };

        let expires = (Utc::now() + Duration::seconds(self.duration_secs as i64))
            .format("%a, %d %b %Y %H:%M:%S GMT");
        response.cookie(
            &self.cookie_name,
            session.id(),
            &format!("Path=/;Max-Age={};expires={}", self.duration_secs, expires),
        );
        session
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_start_mints_session_and_cookie() {
        let manager = SessionManager::with_config(60, "sessionId");
        let request = Request::default();
        let mut response = Response::new();

        let session = manager.start(&request, &mut response);
        assert!(!session.id().is_empty());

        let cookie = response.header("Set-Cookie").unwrap();
        assert!(cookie.starts_with("sessionId="));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=60"));
        assert!(cookie.contains("expires="));
    }

    #[test]
    fn test_cookie_resumes_existing_session() {
        let manager = SessionManager::new();
        let mut response = Response::new();
        let session = manager.start(&Request::default(), &mut response);
        session.set("user", "bob");

        let request =
            Request::default().with_header("Cookie", &format!("sessionId={}", session.id()));
        let mut response = Response::new();
        let resumed = manager.start(&request, &mut response);

        assert_eq!(resumed.id(), session.id());
        assert_eq!(resumed.get("user"), Some("bob".to_string()));
        // No new cookie on resume.
        assert_eq!(response.header("Set-Cookie"), None);
    }

    #[test]
    fn test_unknown_cookie_mints_fresh_session() {
        let manager = SessionManager::new();
        let request = Request::default().with_header("Cookie", "sessionId=stale-id");
        let mut response = Response::new();
        let session = manager.start(&request, &mut response);
        assert_ne!(session.id(), "stale-id");
        assert!(response.header("Set-Cookie").is_some());
    }

    #[test]
    fn test_get_never_creates() {
        let manager = SessionManager::new();
        assert!(manager.get("nope").is_none());
    }

    #[test]
    fn test_attributes() {
        let session = Session::new("s1".to_string());
        assert_eq!(session.get("color"), None);
        session.set("color", "teal");
        assert_eq!(session.get("color"), Some("teal".to_string()));
        let clone = session.clone();
        clone.set("color", "mauve");
        assert_eq!(session.get("color"), Some("mauve".to_string()));
    }

    #[test]
    fn test_concurrent_first_visits() {
        let manager = Arc::new(SessionManager::new());
        let mut threads = vec![];
        for _ in 0..32 {
            let manager = manager.clone();
            threads.push(thread::spawn(move || {
                let mut response = Response::new();
                let session = manager.start(&Request::default(), &mut response);
                session.id().to_string()
            }));
        }
        let ids: Vec<String> = threads.into_iter().map(|t| t.join().unwrap()).collect();

        // Every visit got a distinct session and none were lost.
        let unique: std::collections::HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), 32);
        for id in &ids {
            assert!(manager.get(id).is_some());
        }
    }
}
