use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::domain::{DomainGate, DomainPolicy, Eligibility};
use crate::storage::{CredentialStore, Database, OptionKey, SecretPair, StoreError};
use crate::tokens::secrets::generator_from_config;
use crate::tokens::{
    AccessToken, Principal, ResolveError, SecretExchange, SecretGenerator, SecretLookup,
    SecretsError, TokenKeyHint, TokenResolver,
};

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Token lookup failed: {0}")]
    Resolve(#[from] ResolveError),
    #[error("Secret exchange failed: {0}")]
    Secrets(#[from] SecretsError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Who is making the current request
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<u64>;
}

/// No request context: there is never a current user
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIdentity;

impl IdentityProvider for NoIdentity {
    fn current_user_id(&self) -> Option<u64> {
        None
    }
}

/// Entry point for connection state queries.
///
/// Composes the token resolver, the secret exchange and the domain gate over
/// one store. Strategies (secret generator, clock, identity) are fixed at
/// construction.
pub struct ConnectionManager<S> {
    default_ttl_seconds: u64,
    domain_gate: DomainGate,
    identity: Arc<dyn IdentityProvider>,
    resolver: TokenResolver<S>,
    secrets: SecretExchange<S>,
    skip_domain_check: bool,
    store: Arc<S>,
}

impl ConnectionManager<Database> {
    /// Open (or create) the database under `config.data_dir` and build a
    /// manager over it with the default strategies.
    pub fn open(config: &Config) -> Result<Self, ConnectionError> {
        let db = Database::open(&config.data_dir).map_err(StoreError::from)?;
        info!(data_dir = %config.data_dir, "Opened connection store");
        Ok(Self::new(Arc::new(db), config))
    }
}

impl<S: CredentialStore> ConnectionManager<S> {
    /// Build a manager with the generator named in `config`, the system
    /// clock and no identity provider.
    pub fn new(store: Arc<S>, config: &Config) -> Self {
        Self::with_strategies(
            store,
            config,
            generator_from_config(&config.secrets),
            Arc::new(SystemClock),
            Arc::new(NoIdentity),
        )
    }

    pub fn with_strategies(
        store: Arc<S>,
        config: &Config,
        generator: Arc<dyn SecretGenerator>,
        clock: Arc<dyn Clock>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            default_ttl_seconds: config.secrets.ttl_seconds,
            domain_gate: DomainGate::new(&config.domain.platform_domain),
            identity,
            resolver: TokenResolver::new(
                Arc::clone(&store),
                config.tokens.defined_blog_tokens.clone(),
            ),
            secrets: SecretExchange::new(Arc::clone(&store), generator, clock),
            skip_domain_check: config.domain.skip_check,
            store,
        }
    }

    pub fn resolver(&self) -> &TokenResolver<S> {
        &self.resolver
    }

    pub fn secrets(&self) -> &SecretExchange<S> {
        &self.secrets
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ========================================================================
    // Connection state
    // ========================================================================

    /// Whether the site holds a usable token
    pub fn is_active(&self) -> Result<bool, ConnectionError> {
        Ok(self
            .resolver
            .get_access_token(Principal::Site, &TokenKeyHint::NoHint)?
            .is_some())
    }

    /// Whether a user (the current user when `None`) holds a usable token
    pub fn is_user_connected(&self, user_id: Option<u64>) -> Result<bool, ConnectionError> {
        let Some(user_id) = self.effective_user(user_id) else {
            return Ok(false);
        };

        Ok(self
            .resolver
            .get_access_token(Principal::User(user_id), &TokenKeyHint::NoHint)?
            .is_some())
    }

    /// Whether a user (the current user when `None`) owns the connection
    pub fn is_connection_owner(&self, user_id: Option<u64>) -> Result<bool, ConnectionError> {
        let Some(user_id) = self.effective_user(user_id) else {
            return Ok(false);
        };

        Ok(self.resolver.resolve_master_user()? == Some(user_id))
    }

    pub fn get_access_token(
        &self,
        principal: Principal,
        hint: &TokenKeyHint,
    ) -> Result<Option<AccessToken>, ConnectionError> {
        Ok(self.resolver.get_access_token(principal, hint)?)
    }

    fn effective_user(&self, user_id: Option<u64>) -> Option<u64> {
        user_id
            .or_else(|| self.identity.current_user_id())
            .filter(|&id| id != 0)
    }

    // ========================================================================
    // Disconnection
    // ========================================================================

    /// Forget one user's token.
    ///
    /// The connection owner cannot be disconnected this way; returns false
    /// for them and for users without a token.
    pub fn disconnect_user(&self, user_id: u64) -> Result<bool, ConnectionError> {
        if self.resolver.resolve_master_user()? == Some(user_id) {
            warn!(user_id, "Refusing to disconnect the connection owner");
            return Ok(false);
        }

        let mut removed = false;
        self.store.update_user_tokens(&mut |tokens| {
            removed = tokens.remove(&user_id).is_some();
            removed
        })?;

        if removed {
            info!(user_id, "Disconnected user");
        }
        Ok(removed)
    }

    /// Forget every credential the site holds
    pub fn disconnect_site(&self) -> Result<(), ConnectionError> {
        for key in OptionKey::ALL {
            if self.store.delete(key)? {
                debug!(option = key.as_str(), "Deleted connection option");
            }
        }
        info!("Disconnected site");
        Ok(())
    }

    // ========================================================================
    // Handshake secrets
    // ========================================================================

    pub fn generate_secrets(
        &self,
        action: &str,
        principal_id: u64,
        ttl_seconds: Option<u64>,
    ) -> Result<SecretPair, ConnectionError> {
        let ttl = ttl_seconds.unwrap_or(self.default_ttl_seconds);
        Ok(self.secrets.generate(action, principal_id, ttl)?)
    }

    pub fn get_secrets(
        &self,
        action: &str,
        principal_id: u64,
    ) -> Result<SecretLookup, ConnectionError> {
        Ok(self.secrets.get(action, principal_id)?)
    }

    pub fn delete_secrets(&self, action: &str, principal_id: u64) -> Result<bool, ConnectionError> {
        Ok(self.secrets.delete(action, principal_id)?)
    }

    // ========================================================================
    // Domain eligibility
    // ========================================================================

    /// Check a domain. The configured skip flag overrides `policy`.
    pub fn is_usable_domain(&self, domain: &str, policy: DomainPolicy) -> Eligibility {
        let policy = if self.skip_domain_check {
            DomainPolicy::Skip
        } else {
            policy
        };

        let eligibility = self.domain_gate.check(domain, policy);
        if let Some(rejection) = eligibility.rejection() {
            debug!(domain, reason = rejection.code(), "Domain is not usable");
        }
        eligibility
    }
}
