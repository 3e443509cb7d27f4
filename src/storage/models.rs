use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Names of the values the connection core persists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OptionKey {
    /// The site's stored normal token
    BlogToken,
    /// Mapping of user id to stored user token
    UserTokens,
    /// Id of the user who owns the connection
    MasterUser,
    /// Mapping of secret name to handshake secret pair
    Secrets,
}

impl OptionKey {
    pub const ALL: [OptionKey; 4] = [
        OptionKey::BlogToken,
        OptionKey::UserTokens,
        OptionKey::MasterUser,
        OptionKey::Secrets,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OptionKey::BlogToken => "blog_token",
            OptionKey::UserTokens => "user_tokens",
            OptionKey::MasterUser => "master_user",
            OptionKey::Secrets => "jetpack_secrets",
        }
    }
}

/// Stored user tokens, keyed by user id.
///
/// Each value has the form `"{token_key}.{token_secret}.{user_id}"`.
pub type UserTokens = BTreeMap<u64, String>;

/// Live handshake secrets, keyed by `"{action}_{principal_id}"`
pub type SecretsTable = BTreeMap<String, SecretPair>;

/// A short-lived pair of secrets exchanged during a handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPair {
    pub secret_1: String,
    pub secret_2: String,
    /// The pair is unusable from this instant on
    pub expires_at: DateTime<Utc>,
}

impl SecretPair {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
