//! Platform credentials
//!
//! Credentials live in the `config` blob of the key-value store, one object per
//! platform. They are never logged: every credential type has a `Debug` impl
//! that redacts secrets.
//!
//! Export writes the blob verbatim to a file the user owns. Import accepts a
//! file only if it has an entry for every platform; anything else is rejected
//! without touching the current credentials.

use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::error::{CrosscastError, Result, StorageError};
use crate::storage::{load_json, save_json, KvStore, CONFIG_KEY};
use crate::types::PlatformId;

const REDACTED: &str = "<redacted>";

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        REDACTED
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BlueskyCredentials {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub app_password: String,
}

impl fmt::Debug for BlueskyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlueskyCredentials")
            .field("username", &self.username)
            .field("app_password", &redact(&self.app_password))
            .finish()
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TumblrCredentials {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub blog_identifier: String,
}

impl fmt::Debug for TumblrCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TumblrCredentials")
            .field("api_key", &redact(&self.api_key))
            .field("blog_identifier", &self.blog_identifier)
            .finish()
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MastodonCredentials {
    #[serde(default)]
    pub instance_url: String,
    #[serde(default)]
    pub access_token: String,
}

impl MastodonCredentials {
    /// Instance URL with a scheme and without a trailing slash
    pub fn normalized_instance_url(&self) -> String {
        normalize_instance_url(&self.instance_url)
    }
}

impl fmt::Debug for MastodonCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MastodonCredentials")
            .field("instance_url", &self.instance_url)
            .field("access_token", &redact(&self.access_token))
            .finish()
    }
}

#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstagramCredentials {
    #[serde(default)]
    pub access_token: String,
    #[serde(default)]
    pub business_account_id: String,
    #[serde(default)]
    pub app_id: String,
    #[serde(default)]
    pub app_secret: String,
    #[serde(default)]
    pub facebook_page_id: String,
}

impl fmt::Debug for InstagramCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstagramCredentials")
            .field("access_token", &redact(&self.access_token))
            .field("business_account_id", &self.business_account_id)
            .field("app_id", &self.app_id)
            .field("app_secret", &redact(&self.app_secret))
            .field("facebook_page_id", &self.facebook_page_id)
            .finish()
    }
}

/// The full credentials blob
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub bluesky: BlueskyCredentials,
    #[serde(default)]
    pub tumblr: TumblrCredentials,
    #[serde(default)]
    pub mastodon: MastodonCredentials,
    #[serde(default)]
    pub instagram: InstagramCredentials,
}

impl Credentials {
    /// Whether the fields needed to publish directly to `platform` are present
    pub fn is_configured(&self, platform: PlatformId) -> bool {
        fn set(value: &str) -> bool {
            !value.trim().is_empty()
        }

        match platform {
            PlatformId::Bluesky => set(&self.bluesky.username) && set(&self.bluesky.app_password),
            PlatformId::Tumblr => set(&self.tumblr.api_key) && set(&self.tumblr.blog_identifier),
            PlatformId::Mastodon => {
                set(&self.mastodon.instance_url) && set(&self.mastodon.access_token)
            }
            PlatformId::Instagram => {
                set(&self.instagram.access_token) && set(&self.instagram.business_account_id)
            }
        }
    }

    /// Parse an import payload
    ///
    /// Every platform key must be present at the top level.
    pub fn from_import_json(raw: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(raw)
            .map_err(|e| CrosscastError::Import(format!("not valid JSON: {}", e)))?;

        let object = value
            .as_object()
            .ok_or_else(|| CrosscastError::Import("expected a JSON object".to_string()))?;

        let missing: Vec<&str> = PlatformId::ALL
            .iter()
            .map(|p| p.as_str())
            .filter(|key| !object.contains_key(*key))
            .collect();
        if !missing.is_empty() {
            return Err(CrosscastError::Import(format!(
                "invalid configuration file, missing: {}",
                missing.join(", ")
            )));
        }

        serde_json::from_value(value)
            .map_err(|e| CrosscastError::Import(format!("invalid configuration file: {}", e)))
    }
}

/// Prefix `https://` when no scheme is given and drop trailing slashes
pub fn normalize_instance_url(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.starts_with("https://") || trimmed.starts_with("http://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    }
}

/// Read the durable credentials, empty if nothing has been saved yet
pub async fn load_stored(store: &dyn KvStore) -> Result<Credentials> {
    Ok(load_json::<Credentials>(store, CONFIG_KEY)
        .await?
        .unwrap_or_default())
}

/// Owner of the in-memory credentials and their durable copy
///
/// Writes go to the store first; memory is only updated once the write has
/// succeeded.
pub struct CredentialStore {
    store: Arc<dyn KvStore>,
    current: RwLock<Credentials>,
    /// Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl CredentialStore {
    pub async fn load(store: Arc<dyn KvStore>) -> Result<Self> {
        let current = load_stored(store.as_ref()).await?;

        Ok(Self {
            store,
            current: RwLock::new(current),
            write_lock: Mutex::new(()),
        })
    }

    /// Refresh the in-memory copy from the store
    ///
    /// Picks up changes written by another process.
    pub async fn reload(&self) -> Result<Credentials> {
        let latest = load_stored(self.store.as_ref()).await?;
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = latest.clone();
        Ok(latest)
    }

    pub fn get(&self) -> Credentials {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Replace the credentials
    pub async fn save(&self, credentials: Credentials) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.persist(credentials).await
    }

    /// Apply an edit to the durable snapshot and persist it
    pub async fn update<F>(&self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut Credentials),
    {
        let _guard = self.write_lock.lock().await;
        let mut next = load_stored(self.store.as_ref()).await?;
        edit(&mut next);
        self.persist(next).await
    }

    async fn persist(&self, credentials: Credentials) -> Result<()> {
        save_json(self.store.as_ref(), CONFIG_KEY, &credentials).await?;
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = credentials;
        tracing::debug!("Saved platform credentials");
        Ok(())
    }

    /// Pretty JSON of the full blob, secrets included
    pub fn export_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.get()).map_err(|source| {
            StorageError::Serialization {
                key: CONFIG_KEY.to_string(),
                source,
            }
            .into()
        })
    }

    pub fn export_to_file(&self, path: &Path) -> Result<()> {
        let json = self.export_json()?;
        std::fs::write(path, json).map_err(StorageError::Io)?;
        tracing::info!("Exported credentials to {}", path.display());
        Ok(())
    }

    /// Replace the credentials with an imported blob
    ///
    /// On any failure the current credentials are left unchanged.
    pub async fn import_json(&self, raw: &str) -> Result<()> {
        let imported = Credentials::from_import_json(raw)?;
        self.save(imported).await
    }

    pub async fn import_from_file(&self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CrosscastError::Import(format!("{}: {}", path.display(), e)))?;
        self.import_json(&raw).await?;
        tracing::info!("Imported credentials from {}", path.display());
        Ok(())
    }
}

/// Default file name offered for credential export
pub const EXPORT_FILE_NAME: &str = "crosscast-config.json";
