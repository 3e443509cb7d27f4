use std::sync::{RwLock, RwLockWriteGuard};

use super::models::{OptionKey, SecretsTable, UserTokens};
use super::{CredentialStore, StoreResult};

/// One cached value and the number of times it has been invalidated.
///
/// A fill only lands if the generation is unchanged since the caller read
/// the inner store, so a value read before a write can never outlive it.
#[derive(Debug)]
struct Slot<T> {
    generation: u64,
    value: Option<T>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self {
            generation: 0,
            value: None,
        }
    }
}

impl<T: Clone> Slot<T> {
    /// The cached value, or the generation to fill against on a miss
    fn lookup(&self) -> Result<T, u64> {
        self.value.clone().ok_or(self.generation)
    }

    fn fill(&mut self, generation: u64, value: T) {
        if self.generation == generation {
            self.value = Some(value);
        }
    }

    fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        self.value = None;
    }
}

#[derive(Debug, Default)]
struct Cached {
    blog_token: Slot<Option<String>>,
    master_user: Slot<Option<u64>>,
    secrets: Slot<SecretsTable>,
    user_tokens: Slot<Option<UserTokens>>,
}

impl Cached {
    fn invalidate(&mut self, key: OptionKey) {
        match key {
            OptionKey::BlogToken => self.blog_token.invalidate(),
            OptionKey::MasterUser => self.master_user.invalidate(),
            OptionKey::Secrets => self.secrets.invalidate(),
            OptionKey::UserTokens => self.user_tokens.invalidate(),
        }
    }
}

/// Read-through cache in front of another store.
///
/// Reads are served from memory after the first hit. Writes go straight to
/// the inner store and drop the cached entry. `get_secrets_table_raw`
/// always reads the inner store.
pub struct CachedStore<S> {
    cache: RwLock<Cached>,
    inner: S,
}

impl<S: CredentialStore> CachedStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            cache: RwLock::new(Cached::default()),
            inner,
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Forget everything cached so far
    pub fn clear(&self) {
        let mut cache = self.cache_mut();
        for key in OptionKey::ALL {
            cache.invalidate(key);
        }
    }

    fn cache_mut(&self) -> RwLockWriteGuard<'_, Cached> {
        // Slots are replaced whole, so a poisoned lock still holds consistent data.
        self.cache.write().unwrap_or_else(|e| e.into_inner())
    }

    fn generation<T>(&self, slot: impl Fn(&Cached) -> &Slot<T>) -> u64 {
        let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
        slot(&*cache).generation
    }

    fn read_through<T: Clone>(
        &self,
        slot: impl Fn(&Cached) -> &Slot<T>,
        slot_mut: impl Fn(&mut Cached) -> &mut Slot<T>,
        load: impl FnOnce() -> StoreResult<T>,
    ) -> StoreResult<T> {
        let generation = {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            match slot(&*cache).lookup() {
                Ok(hit) => return Ok(hit),
                Err(generation) => generation,
            }
        };

        let value = load()?;
        slot_mut(&mut *self.cache_mut()).fill(generation, value.clone());
        Ok(value)
    }
}

impl<S: CredentialStore> CredentialStore for CachedStore<S> {
    fn get_blog_token(&self) -> StoreResult<Option<String>> {
        self.read_through(
            |c| &c.blog_token,
            |c| &mut c.blog_token,
            || self.inner.get_blog_token(),
        )
    }

    fn set_blog_token(&self, token: &str) -> StoreResult<()> {
        self.inner.set_blog_token(token)?;
        self.cache_mut().invalidate(OptionKey::BlogToken);
        Ok(())
    }

    fn get_user_tokens(&self) -> StoreResult<Option<UserTokens>> {
        self.read_through(
            |c| &c.user_tokens,
            |c| &mut c.user_tokens,
            || self.inner.get_user_tokens(),
        )
    }

    fn update_user_tokens(
        &self,
        update: &mut dyn FnMut(&mut UserTokens) -> bool,
    ) -> StoreResult<()> {
        self.inner.update_user_tokens(update)?;
        self.cache_mut().invalidate(OptionKey::UserTokens);
        Ok(())
    }

    fn get_master_user_id(&self) -> StoreResult<Option<u64>> {
        self.read_through(
            |c| &c.master_user,
            |c| &mut c.master_user,
            || self.inner.get_master_user_id(),
        )
    }

    fn set_master_user_id(&self, user_id: u64) -> StoreResult<()> {
        self.inner.set_master_user_id(user_id)?;
        self.cache_mut().invalidate(OptionKey::MasterUser);
        Ok(())
    }

    fn get_secrets_table(&self) -> StoreResult<SecretsTable> {
        self.read_through(
            |c| &c.secrets,
            |c| &mut c.secrets,
            || self.inner.get_secrets_table(),
        )
    }

    fn get_secrets_table_raw(&self) -> StoreResult<SecretsTable> {
        let generation = self.generation(|c| &c.secrets);
        let value = self.inner.get_secrets_table_raw()?;
        self.cache_mut().secrets.fill(generation, value.clone());
        Ok(value)
    }

    fn update_secrets_table(
        &self,
        update: &mut dyn FnMut(&mut SecretsTable) -> bool,
    ) -> StoreResult<()> {
        self.inner.update_secrets_table(update)?;
        self.cache_mut().invalidate(OptionKey::Secrets);
        Ok(())
    }

    fn delete(&self, key: OptionKey) -> StoreResult<bool> {
        let removed = self.inner.delete(key)?;
        self.cache_mut().invalidate(key);
        Ok(removed)
    }
}
