//! Invite token generation.

use chrono::Utc;
use huddle_core::{Interface, UserId};
use sha2::{Digest, Sha256};
use shaku::Component;
use uuid::Uuid;

/// Mints opaque invite tokens at group creation.
#[cfg_attr(test, mockall::automock)]
pub trait TokenGenerator: Interface + Send + Sync {
    /// Returns a fresh token for a group led by `leader_id`.
    fn generate(&self, leader_id: UserId) -> String;
}

/// SHA-256 over a random UUID, the leader id and the current time, hex encoded.
#[derive(Component, Debug, Default)]
#[shaku(interface = TokenGenerator)]
pub struct Sha256TokenGenerator;

impl TokenGenerator for Sha256TokenGenerator {
    fn generate(&self, leader_id: UserId) -> String {
        let mut hasher = Sha256::new();
        hasher.update(Uuid::new_v4().as_bytes());
        hasher.update(leader_id.into_inner().as_bytes());
        hasher.update(Utc::now().to_rfc3339().as_bytes());
        hex::encode(hasher.finalize())
    }
}
