//! Pending-Registration Store
//!
//! Registrations are staged here between order creation and the gateway's
//! payment confirmation. Nothing is durable yet: a staged entry either gets
//! consumed by the completion handler or ages out. The token handed back to
//! the client is the only key.

use dashmap::DashMap;
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Registration payload staged while payment is in flight.
#[derive(Debug, Clone)]
pub struct StagedRegistration {
    pub uid: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub semester: u8,
    pub party_size: u8,
    pub amount_minor: u64,
    pub order_id: String,
}

struct PendingEntry {
    staged: StagedRegistration,
    staged_at: Instant,
}

pub struct PendingStore {
    entries: DashMap<String, PendingEntry>,
    ttl: Duration,
}

impl PendingStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Stage a registration, returning the opaque session token.
    pub fn stage(&self, staged: StagedRegistration) -> String {
        self.purge_expired();
        let token = Uuid::new_v4().to_string();
        self.entries.insert(
            token.clone(),
            PendingEntry {
                staged,
                staged_at: Instant::now(),
            },
        );
        token
    }

    /// Remove and return the staged payload. None once consumed or expired,
    /// which the completion handler treats as session expiry.
    pub fn take(&self, token: &str) -> Option<StagedRegistration> {
        let (_, entry) = self.entries.remove(token)?;
        if entry.staged_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.staged)
    }

    /// Put a taken payload back under its original token, restarting the
    /// TTL. Used when finalization fails after the take so the client can
    /// retry with the same token.
    pub fn restore(&self, token: &str, staged: StagedRegistration) {
        self.entries.insert(
            token.to_string(),
            PendingEntry {
                staged,
                staged_at: Instant::now(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn purge_expired(&self) {
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.staged_at.elapsed() <= ttl);
    }
}
