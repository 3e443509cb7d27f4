//! Shared test helpers, available to all `#[cfg(test)]` modules in the crate.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use crate::clock::Clock;
use crate::config::Config;
use crate::connection::{ConnectionManager, IdentityProvider, NoIdentity};
use crate::storage::{CredentialStore, Database, SecretPair};
use crate::tokens::{GeneratorError, SecretGenerator};

/// Open a fresh database in a temporary directory.
///
/// Returns both the `Database` and the `TempDir` guard; the caller must
/// keep the `TempDir` alive for the duration of the test.
pub fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::open(temp_dir.path()).unwrap();
    (db, temp_dir)
}

/// A clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()),
        }
    }

    pub fn advance(&self, seconds: i64) {
        *self.now.lock().unwrap() += Duration::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Deterministic secrets: `secret-1`, `secret-2`, ...
pub struct SequenceGenerator {
    next: AtomicU64,
}

impl SequenceGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }
}

impl SecretGenerator for SequenceGenerator {
    fn generate(&self) -> Result<String, GeneratorError> {
        Ok(format!("secret-{}", self.next.fetch_add(1, Ordering::SeqCst)))
    }
}

pub struct FixedIdentity(pub Option<u64>);

impl IdentityProvider for FixedIdentity {
    fn current_user_id(&self) -> Option<u64> {
        self.0
    }
}

/// A manager with deterministic secrets and a frozen clock
pub fn test_manager<S: CredentialStore>(
    store: Arc<S>,
    config: &Config,
    identity: Option<Arc<dyn IdentityProvider>>,
) -> ConnectionManager<S> {
    ConnectionManager::with_strategies(
        store,
        config,
        Arc::new(SequenceGenerator::new()),
        Arc::new(ManualClock::new()),
        identity.unwrap_or_else(|| Arc::new(NoIdentity)),
    )
}

/// A secret pair expiring `ttl_seconds` from now
pub fn make_secret_pair(secret_1: &str, secret_2: &str, ttl_seconds: i64) -> SecretPair {
    SecretPair {
        secret_1: secret_1.to_string(),
        secret_2: secret_2.to_string(),
        expires_at: Utc::now() + Duration::seconds(ttl_seconds),
    }
}
