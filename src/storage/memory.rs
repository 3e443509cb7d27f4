use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::models::{OptionKey, SecretsTable, UserTokens};
use super::{CredentialStore, StoreError, StoreResult};

#[derive(Debug, Default)]
struct Options {
    blog_token: Option<String>,
    master_user: Option<u64>,
    secrets: Option<SecretsTable>,
    user_tokens: Option<UserTokens>,
}

/// In-process credential store. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    options: RwLock<Options>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Options>> {
        self.options.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Options>> {
        self.options.write().map_err(|_| StoreError::Poisoned)
    }
}

impl CredentialStore for MemoryStore {
    fn get_blog_token(&self) -> StoreResult<Option<String>> {
        Ok(self.read()?.blog_token.clone())
    }

    fn set_blog_token(&self, token: &str) -> StoreResult<()> {
        self.write()?.blog_token = Some(token.to_string());
        Ok(())
    }

    fn get_user_tokens(&self) -> StoreResult<Option<UserTokens>> {
        Ok(self.read()?.user_tokens.clone())
    }

    fn update_user_tokens(
        &self,
        update: &mut dyn FnMut(&mut UserTokens) -> bool,
    ) -> StoreResult<()> {
        let mut options = self.write()?;
        let mut tokens = options.user_tokens.clone().unwrap_or_default();
        if update(&mut tokens) {
            options.user_tokens = Some(tokens);
        }
        Ok(())
    }

    fn get_master_user_id(&self) -> StoreResult<Option<u64>> {
        Ok(self.read()?.master_user)
    }

    fn set_master_user_id(&self, user_id: u64) -> StoreResult<()> {
        self.write()?.master_user = Some(user_id);
        Ok(())
    }

    fn get_secrets_table(&self) -> StoreResult<SecretsTable> {
        Ok(self.read()?.secrets.clone().unwrap_or_default())
    }

    fn update_secrets_table(
        &self,
        update: &mut dyn FnMut(&mut SecretsTable) -> bool,
    ) -> StoreResult<()> {
        let mut options = self.write()?;
        let mut secrets = options.secrets.clone().unwrap_or_default();
        if update(&mut secrets) {
            options.secrets = Some(secrets);
        }
        Ok(())
    }

    fn delete(&self, key: OptionKey) -> StoreResult<bool> {
        let mut options = self.write()?;
        let removed = match key {
            OptionKey::BlogToken => options.blog_token.take().is_some(),
            OptionKey::MasterUser => options.master_user.take().is_some(),
            OptionKey::Secrets => options.secrets.take().is_some(),
            OptionKey::UserTokens => options.user_tokens.take().is_some(),
        };
        Ok(removed)
    }
}
