use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::storage::{CredentialStore, StoreError};

use super::token::{
    is_special, key_check, key_matches, AccessToken, Principal, TokenKeyHint, UserTokenRecord,
};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Site tokens, split by kind, in lookup order
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Candidates {
    pub special: Vec<String>,
    pub normal: Vec<String>,
}

impl Candidates {
    /// Tokens eligible under `hint`, highest precedence first
    pub fn for_hint(self, hint: &TokenKeyHint) -> Vec<String> {
        match hint {
            TokenKeyHint::FirstNormal => self.normal,
            _ => {
                let mut tokens = self.special;
                tokens.extend(self.normal);
                tokens
            }
        }
    }
}

/// Picks the credential to use for a principal.
///
/// Site lookups consider, in order: defined special tokens, the stored
/// normal token, then defined normal tokens. User lookups consider the one
/// stored token filed under that user.
///
/// Every way of not finding a usable token yields `Ok(None)`; only store
/// failures are errors.
pub struct TokenResolver<S> {
    defined_tokens: Vec<String>,
    store: Arc<S>,
}

impl<S: CredentialStore> TokenResolver<S> {
    /// `defined_tokens` are the externally configured site tokens, in
    /// configuration order.
    pub fn new(store: Arc<S>, defined_tokens: Vec<String>) -> Self {
        Self {
            defined_tokens,
            store,
        }
    }

    /// Turn the master-user sentinel into the stored owner id
    pub fn resolve_master_user(&self) -> Result<Option<u64>, ResolveError> {
        Ok(self.store.get_master_user_id()?.filter(|&id| id != 0))
    }

    /// Pick the token for `principal`, narrowed by `hint`.
    ///
    /// `Principal::User(0)` is a lookup for user id 0, not for the site.
    pub fn get_access_token(
        &self,
        principal: Principal,
        hint: &TokenKeyHint,
    ) -> Result<Option<AccessToken>, ResolveError> {
        let (candidates, external_user_id) = match principal {
            Principal::Site => (self.site_candidates()?, 0),
            Principal::User(user_id) => (self.user_candidates(user_id)?, user_id),
            Principal::MasterUser => match self.resolve_master_user()? {
                Some(user_id) => (self.user_candidates(user_id)?, user_id),
                None => {
                    debug!("No master user stored");
                    return Ok(None);
                }
            },
        };

        let possible = candidates.for_hint(hint);
        let Some(secret) = select(possible, hint) else {
            return Ok(None);
        };

        Ok(Some(AccessToken {
            secret,
            external_user_id,
        }))
    }

    /// Candidate tokens for a site lookup
    pub fn site_candidates(&self) -> Result<Candidates, ResolveError> {
        let mut candidates = Candidates::default();

        if let Some(stored) = self.store.get_blog_token()?.filter(|t| !t.is_empty()) {
            candidates.normal.push(stored);
        }

        for defined in &self.defined_tokens {
            if is_special(defined) {
                candidates.special.push(defined.clone());
            } else {
                candidates.normal.push(defined.clone());
            }
        }

        Ok(candidates)
    }

    /// Candidate tokens for a user lookup: at most one normal token
    pub fn user_candidates(&self, user_id: u64) -> Result<Candidates, ResolveError> {
        let mut candidates = Candidates::default();

        let Some(user_tokens) = self.store.get_user_tokens()? else {
            debug!(user_id, "No user tokens stored");
            return Ok(candidates);
        };
        let Some(stored) = user_tokens.get(&user_id).filter(|t| !t.is_empty()) else {
            return Ok(candidates);
        };

        match UserTokenRecord::parse(stored, user_id) {
            UserTokenRecord::Valid(token) => candidates.normal.push(token),
            UserTokenRecord::Malformed(reason) => {
                debug!(user_id, reason, "Stored user token rejected");
            }
        }

        Ok(candidates)
    }
}

/// Choose among `possible` (already filtered for `hint`)
fn select(possible: Vec<String>, hint: &TokenKeyHint) -> Option<String> {
    match hint {
        TokenKeyHint::NoHint | TokenKeyHint::FirstNormal => possible.into_iter().next(),
        TokenKeyHint::ExactKey(token_key) => {
            let check = key_check(token_key);
            possible
                .into_iter()
                .find(|candidate| key_matches(candidate, &check))
        }
    }
}
