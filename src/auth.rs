//! Admin Authentication
//!
//! Username/password login issuing opaque in-process session tokens for the
//! admin surface. Credentials are compared as SHA-256 digests; tokens live
//! only as long as the process.

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use uuid::Uuid;

use crate::config::AdminConfig;

pub struct AdminAuth {
    username_digest: [u8; 32],
    password_digest: [u8; 32],
    sessions: Mutex<HashSet<String>>,
}

impl AdminAuth {
    pub fn new(config: &AdminConfig) -> Self {
        Self {
            username_digest: digest(&config.username),
            password_digest: digest(&config.password),
            sessions: Mutex::new(HashSet::new()),
        }
    }

    /// Validate credentials and issue a session token.
    pub fn login(&self, username: &str, password: &str) -> Option<String> {
        if digest(username) != self.username_digest || digest(password) != self.password_digest {
            return None;
        }
        let token = Uuid::new_v4().to_string();
        self.sessions.lock().insert(token.clone());
        Some(token)
    }

    pub fn is_authorized(&self, token: &str) -> bool {
        self.sessions.lock().contains(token)
    }

    /// Invalidate a session token. Returns whether it existed.
    pub fn logout(&self, token: &str) -> bool {
        self.sessions.lock().remove(token)
    }
}

fn digest(s: &str) -> [u8; 32] {
    Sha256::digest(s.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> AdminAuth {
        AdminAuth::new(&AdminConfig {
            username: "admin".to_string(),
            password: "hunter2".to_string(),
        })
    }

    #[test]
    fn test_login_issues_distinct_tokens() {
        let auth = auth();
        let a = auth.login("admin", "hunter2").unwrap();
        let b = auth.login("admin", "hunter2").unwrap();
        assert_ne!(a, b);
        assert!(auth.is_authorized(&a));
        assert!(auth.is_authorized(&b));
    }

    #[test]
    fn test_bad_credentials_rejected() {
        let auth = auth();
        assert!(auth.login("admin", "wrong").is_none());
        assert!(auth.login("root", "hunter2").is_none());
        assert!(!auth.is_authorized("made-up-token"));
    }

    #[test]
    fn test_logout_invalidates() {
        let auth = auth();
        let token = auth.login("admin", "hunter2").unwrap();
        assert!(auth.logout(&token));
        assert!(!auth.is_authorized(&token));
        assert!(!auth.logout(&token));
    }
}
