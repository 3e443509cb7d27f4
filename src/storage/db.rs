use redb::{Database as RedbDatabase, ReadTransaction, ReadableTable, WriteTransaction};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

use super::models::{OptionKey, SecretsTable, UserTokens};
use super::tables::*;
use super::{CredentialStore, StoreResult};

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),
    #[error("Deserialization error: {0}")]
    Deserialization(#[from] rmp_serde::decode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Database error: {0}")]
    Redb(#[from] redb::Error),
    #[error("Database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] rmp_serde::encode::Error),
    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),
    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),
    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),
}

pub struct Database {
    db: RedbDatabase,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open<P: AsRef<Path>>(data_dir: P) -> Result<Self, DatabaseError> {
        std::fs::create_dir_all(data_dir.as_ref())?;
        let db_path = data_dir.as_ref().join("connection.redb");
        let db = RedbDatabase::create(db_path)?;

        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(OPTIONS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    /// Begin a read transaction
    pub fn begin_read(&self) -> Result<ReadTransaction, DatabaseError> {
        Ok(self.db.begin_read()?)
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> Result<WriteTransaction, DatabaseError> {
        Ok(self.db.begin_write()?)
    }

    // ========================================================================
    // Option operations
    // ========================================================================

    /// Read and decode a stored option
    pub fn get_option<T: DeserializeOwned>(
        &self,
        key: OptionKey,
    ) -> Result<Option<T>, DatabaseError> {
        let read_txn = self.begin_read()?;
        let table = read_txn.open_table(OPTIONS)?;

        match table.get(key.as_str())? {
            Some(data) => Ok(Some(rmp_serde::from_slice(data.value())?)),
            None => Ok(None),
        }
    }

    /// Encode and store an option, replacing any previous value
    pub fn put_option<T: Serialize>(&self, key: OptionKey, value: &T) -> Result<(), DatabaseError> {
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(OPTIONS)?;
            let data = rmp_serde::to_vec_named(value)?;
            table.insert(key.as_str(), data.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Read-modify-write an option inside a single write transaction.
    ///
    /// A missing option starts from `T::default()`. Nothing is written when
    /// `update` returns false.
    pub fn update_option<T, F>(&self, key: OptionKey, update: F) -> Result<(), DatabaseError>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> bool,
    {
        let write_txn = self.begin_write()?;
        {
            let mut table = write_txn.open_table(OPTIONS)?;
            let mut value: T = match table.get(key.as_str())? {
                Some(data) => rmp_serde::from_slice(data.value())?,
                None => T::default(),
            };

            if update(&mut value) {
                let data = rmp_serde::to_vec_named(&value)?;
                table.insert(key.as_str(), data.as_slice())?;
            }
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Delete an option
    pub fn delete_option(&self, key: OptionKey) -> Result<bool, DatabaseError> {
        let write_txn = self.begin_write()?;
        let deleted = {
            let mut table = write_txn.open_table(OPTIONS)?;
            let removed = table.remove(key.as_str())?;
            removed.is_some()
        };
        write_txn.commit()?;
        Ok(deleted)
    }
}

impl CredentialStore for Database {
    fn get_blog_token(&self) -> StoreResult<Option<String>> {
        Ok(self.get_option(OptionKey::BlogToken)?)
    }

    fn set_blog_token(&self, token: &str) -> StoreResult<()> {
        Ok(self.put_option(OptionKey::BlogToken, &token)?)
    }

    fn get_user_tokens(&self) -> StoreResult<Option<UserTokens>> {
        Ok(self.get_option(OptionKey::UserTokens)?)
    }

    fn update_user_tokens(
        &self,
        update: &mut dyn FnMut(&mut UserTokens) -> bool,
    ) -> StoreResult<()> {
        Ok(self.update_option(OptionKey::UserTokens, |tokens: &mut UserTokens| update(tokens))?)
    }

    fn get_master_user_id(&self) -> StoreResult<Option<u64>> {
        Ok(self.get_option(OptionKey::MasterUser)?)
    }

    fn set_master_user_id(&self, user_id: u64) -> StoreResult<()> {
        Ok(self.put_option(OptionKey::MasterUser, &user_id)?)
    }

    fn get_secrets_table(&self) -> StoreResult<SecretsTable> {
        Ok(self.get_option(OptionKey::Secrets)?.unwrap_or_default())
    }

    fn update_secrets_table(
        &self,
        update: &mut dyn FnMut(&mut SecretsTable) -> bool,
    ) -> StoreResult<()> {
        Ok(self.update_option(OptionKey::Secrets, |secrets: &mut SecretsTable| update(secrets))?)
    }

    fn delete(&self, key: OptionKey) -> StoreResult<bool> {
        Ok(self.delete_option(key)?)
    }
}
