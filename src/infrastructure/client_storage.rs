use crate::infrastructure::error::InfraError;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");
const KEYRING_SERVICE: &str = "linediary.client";

/// Flat string key/value storage that survives between runs.
pub trait ClientStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>, InfraError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), InfraError>;
    fn remove_item(&self, key: &str) -> Result<(), InfraError>;
}

#[derive(Debug, Clone)]
pub struct SqliteClientStorage {
    db_path: PathBuf,
}

impl SqliteClientStorage {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    /// Creates the database file and table if missing.
    pub fn initialize(&self) -> Result<(), InfraError> {
        self.connect()?.execute_batch(SCHEMA_SQL)?;
        Ok(())
    }

    fn connect(&self) -> Result<Connection, InfraError> {
        Connection::open(&self.db_path).map_err(InfraError::from)
    }
}

impl ClientStorage for SqliteClientStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, InfraError> {
        let connection = self.connect()?;
        let value = connection
            .query_row(
                "SELECT value FROM client_storage WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute(
            "INSERT INTO client_storage (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
               value = excluded.value,
               updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), InfraError> {
        let connection = self.connect()?;
        connection.execute("DELETE FROM client_storage WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// One OS credential entry per key.
#[derive(Debug, Clone)]
pub struct KeyringClientStorage {
    service_name: String,
}

impl KeyringClientStorage {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, InfraError> {
        keyring::Entry::new(&self.service_name, key)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }
}

impl Default for KeyringClientStorage {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

impl ClientStorage for KeyringClientStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, InfraError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), InfraError> {
        self.entry(key)?
            .set_password(value)
            .map_err(|error| InfraError::Credential(error.to_string()))
    }

    fn remove_item(&self, key: &str) -> Result<(), InfraError> {
        match self.entry(key)?.delete_credential() {
            Ok(_) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(InfraError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryClientStorage {
    items: Mutex<HashMap<String, String>>,
}

impl InMemoryClientStorage {
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, InfraError> {
        self.items
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))
    }
}

impl ClientStorage for InMemoryClientStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, InfraError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), InfraError> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), InfraError> {
        self.lock()?.remove(key);
        Ok(())
    }
}
