use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::clock::Clock;
use crate::config::{GeneratorKind, SecretConfig};
use crate::storage::{CredentialStore, SecretPair, StoreError};

use super::generator::{GeneratorError, HexGenerator, PasswordGenerator, SecretGenerator};

#[derive(Debug, Error)]
pub enum SecretsError {
    #[error("Secret generator error: {0}")]
    Generator(#[from] GeneratorError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Outcome of looking up a secret pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretLookup {
    Found(SecretPair),
    Missing,
    /// The pair had expired and has been deleted
    Expired,
}

/// Name a secret pair is filed under
pub fn secret_name(action: &str, principal_id: u64) -> String {
    format!("{action}_{principal_id}")
}

/// `now + ttl_seconds`, saturating at the latest representable instant
fn expiry(now: DateTime<Utc>, ttl_seconds: u64) -> DateTime<Utc> {
    i64::try_from(ttl_seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

/// Build the generator selected in configuration
pub fn generator_from_config(config: &SecretConfig) -> Arc<dyn SecretGenerator> {
    match config.generator {
        GeneratorKind::Hex => Arc::new(HexGenerator { length: config.length }),
        GeneratorKind::Password => Arc::new(PasswordGenerator {
            length: config.length,
            special_chars: true,
        }),
    }
}

/// Issues, looks up and destroys the one-time secret pairs used during the
/// registration and authorization handshakes.
pub struct SecretExchange<S> {
    clock: Arc<dyn Clock>,
    generator: Arc<dyn SecretGenerator>,
    store: Arc<S>,
}

impl<S: CredentialStore> SecretExchange<S> {
    pub fn new(store: Arc<S>, generator: Arc<dyn SecretGenerator>, clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            generator,
            store,
        }
    }

    /// Return the live pair for `action`/`principal_id`, creating one that
    /// expires `ttl_seconds` from now if there is none.
    pub fn generate(
        &self,
        action: &str,
        principal_id: u64,
        ttl_seconds: u64,
    ) -> Result<SecretPair, SecretsError> {
        let name = secret_name(action, principal_id);
        let now = self.clock.now();

        if let Some(existing) = self.store.get_secrets_table_raw()?.remove(&name) {
            if !existing.is_expired_at(now) {
                return Ok(existing);
            }
        }

        let candidate = SecretPair {
            secret_1: self.generator.generate()?,
            secret_2: self.generator.generate()?,
            expires_at: expiry(now, ttl_seconds),
        };

        // Another caller may have stored a live pair since the read above.
        let mut issued = None;
        self.store.update_secrets_table(&mut |table| {
            if let Some(existing) = table.get(&name).filter(|p| !p.is_expired_at(now)) {
                issued = Some(existing.clone());
                return false;
            }
            table.insert(name.clone(), candidate.clone());
            issued = Some(candidate.clone());
            true
        })?;

        let pair = issued.unwrap_or(candidate);
        tracing::debug!(secret = %name, expires_at = %pair.expires_at, "Issued secret pair");
        Ok(pair)
    }

    /// Look up a pair, deleting it if it has expired
    pub fn get(&self, action: &str, principal_id: u64) -> Result<SecretLookup, SecretsError> {
        let name = secret_name(action, principal_id);
        let Some(pair) = self.store.get_secrets_table()?.remove(&name) else {
            return Ok(SecretLookup::Missing);
        };

        if pair.is_expired_at(self.clock.now()) {
            self.delete(action, principal_id)?;
            tracing::debug!(secret = %name, "Secret pair expired");
            return Ok(SecretLookup::Expired);
        }

        Ok(SecretLookup::Found(pair))
    }

    /// Destroy a pair. Returns whether one existed.
    pub fn delete(&self, action: &str, principal_id: u64) -> Result<bool, SecretsError> {
        let name = secret_name(action, principal_id);
        let mut removed = false;
        self.store.update_secrets_table(&mut |table| {
            removed = table.remove(&name).is_some();
            removed
        })?;

        if removed {
            tracing::debug!(secret = %name, "Deleted secret pair");
        }
        Ok(removed)
    }

    /// Remove every expired pair
    pub fn cleanup_expired(&self) -> Result<usize, SecretsError> {
        let now = self.clock.now();
        let mut cleaned = 0;
        self.store.update_secrets_table(&mut |table| {
            let before = table.len();
            table.retain(|_, pair| !pair.is_expired_at(now));
            cleaned = before - table.len();
            cleaned > 0
        })?;

        if cleaned > 0 {
            tracing::info!(count = cleaned, "Cleaned up expired secret pairs");
        }
        Ok(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::testutil::{ManualClock, SequenceGenerator};

    fn setup() -> (SecretExchange<MemoryStore>, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::new());
        let exchange = SecretExchange::new(
            Arc::clone(&store),
            Arc::new(SequenceGenerator::new()),
            clock.clone(),
        );
        (exchange, store, clock)
    }

    #[test]
    fn test_generate_is_idempotent_within_ttl() {
        let (exchange, _store, clock) = setup();

        let first = exchange.generate("register", 1, 600).unwrap();
        assert_ne!(first.secret_1, first.secret_2);
        assert_eq!(first.expires_at, clock.now() + Duration::seconds(600));

        clock.advance(599);
        let second = exchange.generate("register", 1, 600).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_generate_after_ttl_produces_new_pair() {
        let (exchange, _store, clock) = setup();

        let first = exchange.generate("register", 1, 600).unwrap();
        clock.advance(600);
        let second = exchange.generate("register", 1, 600).unwrap();
        assert_ne!(first, second);
        assert_eq!(second.expires_at, clock.now() + Duration::seconds(600));
    }

    #[test]
    fn test_keys_are_independent() {
        let (exchange, store, _clock) = setup();

        let a = exchange.generate("register", 1, 600).unwrap();
        let b = exchange.generate("register", 2, 600).unwrap();
        let c = exchange.generate("authorize", 1, 600).unwrap();
        assert_ne!(a, b);
        assert_ne!(a, c);

        let table = store.get_secrets_table().unwrap();
        assert_eq!(table.len(), 3);
        assert!(table.contains_key("register_1"));
        assert!(table.contains_key("authorize_1"));
    }

    #[test]
    fn test_get_missing() {
        let (exchange, _store, _clock) = setup();
        assert_eq!(exchange.get("register", 1).unwrap(), SecretLookup::Missing);
    }

    #[test]
    fn test_get_found() {
        let (exchange, _store, _clock) = setup();

        let pair = exchange.generate("register", 1, 600).unwrap();
        assert_eq!(
            exchange.get("register", 1).unwrap(),
            SecretLookup::Found(pair)
        );
    }

    #[test]
    fn test_get_expired_deletes_then_missing() {
        let (exchange, store, clock) = setup();

        exchange.generate("register", 1, 60).unwrap();
        exchange.generate("register", 2, 600).unwrap();
        clock.advance(60);

        assert_eq!(exchange.get("register", 1).unwrap(), SecretLookup::Expired);
        assert_eq!(exchange.get("register", 1).unwrap(), SecretLookup::Missing);

        // Other pairs are untouched
        assert_eq!(store.get_secrets_table().unwrap().len(), 1);
        assert!(matches!(
            exchange.get("register", 2).unwrap(),
            SecretLookup::Found(_)
        ));
    }

    #[test]
    fn test_delete() {
        let (exchange, _store, _clock) = setup();

        assert!(!exchange.delete("register", 1).unwrap());
        exchange.generate("register", 1, 600).unwrap();
        assert!(exchange.delete("register", 1).unwrap());
        assert_eq!(exchange.get("register", 1).unwrap(), SecretLookup::Missing);
    }

    #[test]
    fn test_cleanup_expired() {
        let (exchange, store, clock) = setup();

        exchange.generate("register", 1, 60).unwrap();
        exchange.generate("register", 2, 60).unwrap();
        exchange.generate("authorize", 1, 600).unwrap();
        clock.advance(120);

        assert_eq!(exchange.cleanup_expired().unwrap(), 2);
        assert_eq!(exchange.cleanup_expired().unwrap(), 0);
        assert_eq!(store.get_secrets_table().unwrap().len(), 1);
    }

    #[test]
    fn test_huge_ttl_saturates() {
        let (exchange, _store, _clock) = setup();

        let pair = exchange.generate("register", 1, u64::MAX).unwrap();
        assert_eq!(pair.expires_at, DateTime::<Utc>::MAX_UTC);
    }

    #[test]
    fn test_generator_from_config() {
        let hex = generator_from_config(&SecretConfig {
            generator: GeneratorKind::Hex,
            length: 32,
            ttl_seconds: 600,
        });
        assert_eq!(hex.generate().unwrap().len(), 32);

        let odd = generator_from_config(&SecretConfig {
            generator: GeneratorKind::Hex,
            length: 13,
            ttl_seconds: 600,
        });
        assert_eq!(odd.generate().unwrap().len(), 13);

        let password = generator_from_config(&SecretConfig::default());
        assert_eq!(password.generate().unwrap().len(), 12);
    }
}
