mod cache;
pub mod db;
mod memory;
pub mod models;
mod tables;

pub use cache::CachedStore;
pub use db::{Database, DatabaseError};
pub use memory::MemoryStore;
pub use models::{OptionKey, SecretPair, SecretsTable, UserTokens};
pub use tables::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Typed persistence for connection credentials.
///
/// Implementations must make each `update_*` call atomic with respect to
/// other writers of the same key. The closure returns `true` when it changed
/// the value and it should be written back.
pub trait CredentialStore: Send + Sync {
    fn get_blog_token(&self) -> StoreResult<Option<String>>;

    fn set_blog_token(&self, token: &str) -> StoreResult<()>;

    fn get_user_tokens(&self) -> StoreResult<Option<UserTokens>>;

    fn update_user_tokens(
        &self,
        update: &mut dyn FnMut(&mut UserTokens) -> bool,
    ) -> StoreResult<()>;

    fn get_master_user_id(&self) -> StoreResult<Option<u64>>;

    fn set_master_user_id(&self, user_id: u64) -> StoreResult<()>;

    fn get_secrets_table(&self) -> StoreResult<SecretsTable>;

    /// Read the secrets table from the backing store, skipping any cache.
    fn get_secrets_table_raw(&self) -> StoreResult<SecretsTable> {
        self.get_secrets_table()
    }

    fn update_secrets_table(
        &self,
        update: &mut dyn FnMut(&mut SecretsTable) -> bool,
    ) -> StoreResult<()>;

    /// Remove a stored value. Returns whether anything was removed.
    fn delete(&self, key: OptionKey) -> StoreResult<bool>;

    /// Store (or replace) a single user's token
    fn set_user_token(&self, user_id: u64, token: &str) -> StoreResult<()> {
        self.update_user_tokens(&mut |tokens| {
            tokens.insert(user_id, token.to_string());
            true
        })
    }
}

impl<T: CredentialStore + ?Sized> CredentialStore for std::sync::Arc<T> {
    fn get_blog_token(&self) -> StoreResult<Option<String>> {
        (**self).get_blog_token()
    }

    fn set_blog_token(&self, token: &str) -> StoreResult<()> {
        (**self).set_blog_token(token)
    }

    fn get_user_tokens(&self) -> StoreResult<Option<UserTokens>> {
        (**self).get_user_tokens()
    }

    fn update_user_tokens(
        &self,
        update: &mut dyn FnMut(&mut UserTokens) -> bool,
    ) -> StoreResult<()> {
        (**self).update_user_tokens(update)
    }

    fn get_master_user_id(&self) -> StoreResult<Option<u64>> {
        (**self).get_master_user_id()
    }

    fn set_master_user_id(&self, user_id: u64) -> StoreResult<()> {
        (**self).set_master_user_id(user_id)
    }

    fn get_secrets_table(&self) -> StoreResult<SecretsTable> {
        (**self).get_secrets_table()
    }

    fn get_secrets_table_raw(&self) -> StoreResult<SecretsTable> {
        (**self).get_secrets_table_raw()
    }

    fn update_secrets_table(
        &self,
        update: &mut dyn FnMut(&mut SecretsTable) -> bool,
    ) -> StoreResult<()> {
        (**self).update_secrets_table(update)
    }

    fn delete(&self, key: OptionKey) -> StoreResult<bool> {
        (**self).delete(key)
    }
}
