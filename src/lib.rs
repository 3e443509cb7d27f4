//! connection-manager - credentials for a site's link to a remote service
//!
//! This crate decides which credential authenticates a request and whether a
//! site may connect at all:
//! - Token resolution across stored and externally defined site tokens,
//!   with special tokens taking precedence and constant-time key matching
//! - Per-user tokens bound to their owner's id
//! - One-time handshake secret pairs with expiry-on-read
//! - Domain eligibility checks run before a handshake
//! - Pluggable storage: redb on disk, in memory, or behind a read cache
//!
//! Negative outcomes (no token, expired secret, rejected domain) are plain
//! values. Only storage and random-source failures are errors.

pub mod clock;
pub mod config;
pub mod connection;
pub mod domain;
pub mod storage;
#[cfg(test)]
pub mod testutil;
pub mod tokens;

pub use config::Config;
pub use connection::{ConnectionError, ConnectionManager, IdentityProvider, NoIdentity};
pub use domain::{DomainGate, DomainPolicy, Eligibility, Rejection, RejectionReason};
pub use storage::{CachedStore, CredentialStore, Database, MemoryStore};
pub use tokens::{AccessToken, Principal, SecretLookup, TokenKeyHint};
