//! API key storage for the text generator.
//!
//! The key lives either in the key-value store (partition
//! `generation_config`) or in the OS keyring, selected by
//! `generation.credential_backend`. A blank key counts as absent.

use std::sync::Arc;

use super::config::CredentialBackend;
use super::kv::KvStore;
use crate::error::CoreError;

pub const CREDENTIAL_PARTITION: &str = "generation_config";
pub const API_KEY: &str = "api_key";

/// Thin wrapper around the OS keyring for credential storage.
pub mod keyring_store {
    use crate::error::CoreError;

    const SERVICE: &str = "panictutor";

    fn credential_err(e: keyring::Error) -> CoreError {
        CoreError::Credential(e.to_string())
    }

    pub fn get(key: &str) -> Result<Option<String>, CoreError> {
        let entry = keyring::Entry::new(SERVICE, key).map_err(credential_err)?;
        match entry.get_password() {
            Ok(pw) => Ok(Some(pw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(credential_err(e)),
        }
    }

    pub fn set(key: &str, value: &str) -> Result<(), CoreError> {
        let entry = keyring::Entry::new(SERVICE, key).map_err(credential_err)?;
        entry.set_password(value).map_err(credential_err)?;
        Ok(())
    }

    pub fn delete(key: &str) -> Result<(), CoreError> {
        let entry = keyring::Entry::new(SERVICE, key).map_err(credential_err)?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(credential_err(e)),
        }
    }
}

/// Reads and writes the generator API key.
#[derive(Clone)]
pub struct ApiKeyStore {
    kv: Arc<dyn KvStore>,
    backend: CredentialBackend,
}

impl ApiKeyStore {
    pub fn new(kv: Arc<dyn KvStore>, backend: CredentialBackend) -> Self {
        Self { kv, backend }
    }

    pub fn backend(&self) -> CredentialBackend {
        self.backend
    }

    /// The configured key, trimmed. `None` when missing or blank.
    pub fn get(&self) -> Result<Option<String>, CoreError> {
        let raw = match self.backend {
            CredentialBackend::Kv => self.kv.get_string(CREDENTIAL_PARTITION, API_KEY)?,
            CredentialBackend::Keyring => keyring_store::get(API_KEY)?,
        };
        Ok(raw
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty()))
    }

    pub fn set(&self, key: &str) -> Result<(), CoreError> {
        let key = key.trim();
        match self.backend {
            CredentialBackend::Kv => self.kv.set_string(CREDENTIAL_PARTITION, API_KEY, key)?,
            CredentialBackend::Keyring => keyring_store::set(API_KEY, key)?,
        }
        tracing::info!(backend = ?self.backend, "generator API key updated");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), CoreError> {
        match self.backend {
            CredentialBackend::Kv => self.kv.remove(CREDENTIAL_PARTITION, API_KEY)?,
            CredentialBackend::Keyring => keyring_store::delete(API_KEY)?,
        }
        Ok(())
    }

    /// Whether a usable key is present. Backend errors read as "not configured".
    pub fn is_configured(&self) -> bool {
        match self.get() {
            Ok(key) => key.is_some(),
            Err(e) => {
                tracing::warn!(error = %e, "could not read generator API key");
                false
            }
        }
    }
}

impl std::fmt::Debug for ApiKeyStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyStore")
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}
