//! Connection parameters and the flat key-value store they live in.

use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::ResultEngine;

pub const KEY_HOST: &str = "host";
pub const KEY_DB_PORT: &str = "db_port";
pub const KEY_DB_NAME: &str = "db_name";
pub const KEY_DB_USER: &str = "db_user";
pub const KEY_DB_PASS: &str = "db_pass";
pub const KEY_SMB_SHARE: &str = "smb_share";
pub const KEY_SMB_USER: &str = "smb_user";
pub const KEY_SMB_PASS: &str = "smb_pass";

const DEFAULT_PORT: u16 = 3306;
const DEFAULT_DATABASE: &str = "taxreport";
const DEFAULT_USER: &str = "root";
const DEFAULT_SHARE: &str = "TaxData";
const DEFAULT_SHARE_USER: &str = "pi";

/// Everything needed to reach the remote service.
///
/// The document share is assumed to live on the same host as the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: String,
    pub password: String,
    pub share: String,
    pub share_username: String,
    pub share_password: String,
}

impl ConnectionConfig {
    /// Config for `host` with every other field at its default.
    pub fn with_host(host: &str) -> Self {
        Self {
            host: host.trim().to_string(),
            port: DEFAULT_PORT,
            database: DEFAULT_DATABASE.to_string(),
            username: DEFAULT_USER.to_string(),
            password: String::new(),
            share: DEFAULT_SHARE.to_string(),
            share_username: DEFAULT_SHARE_USER.to_string(),
            share_password: String::new(),
        }
    }

    /// Reads a config out of stored entries.
    ///
    /// Returns `None` when no host has been stored yet. Missing keys take
    /// their defaults, an unparsable port falls back to the default port.
    pub fn from_entries(entries: &BTreeMap<String, String>) -> Option<Self> {
        let host = entries.get(KEY_HOST).map(|h| h.trim()).unwrap_or("");
        if host.is_empty() {
            return None;
        }

        let mut config = Self::with_host(host);
        let get = |key: &str| entries.get(key).cloned();

        if let Some(port) = get(KEY_DB_PORT) {
            config.port = port.trim().parse().unwrap_or(DEFAULT_PORT);
        }
        if let Some(database) = get(KEY_DB_NAME) {
            config.database = database;
        }
        if let Some(username) = get(KEY_DB_USER) {
            config.username = username;
        }
        if let Some(password) = get(KEY_DB_PASS) {
            config.password = password;
        }
        if let Some(share) = get(KEY_SMB_SHARE) {
            config.share = share;
        }
        if let Some(share_username) = get(KEY_SMB_USER) {
            config.share_username = share_username;
        }
        if let Some(share_password) = get(KEY_SMB_PASS) {
            config.share_password = share_password;
        }

        Some(config)
    }

    pub fn to_entries(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            (KEY_HOST.to_string(), self.host.clone()),
            (KEY_DB_PORT.to_string(), self.port.to_string()),
            (KEY_DB_NAME.to_string(), self.database.clone()),
            (KEY_DB_USER.to_string(), self.username.clone()),
            (KEY_DB_PASS.to_string(), self.password.clone()),
            (KEY_SMB_SHARE.to_string(), self.share.clone()),
            (KEY_SMB_USER.to_string(), self.share_username.clone()),
            (KEY_SMB_PASS.to_string(), self.share_password.clone()),
        ])
    }
}

/// JSON file holding flat string keys.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn load(&self) -> ResultEngine<BTreeMap<String, String>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_str(&content)?)
    }

    /// Merges `entries` into the stored ones and writes the file back.
    pub async fn save(&self, entries: &BTreeMap<String, String>) -> ResultEngine<()> {
        let mut stored = self.load().await?;
        stored.extend(entries.iter().map(|(k, v)| (k.clone(), v.clone())));

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let payload = serde_json::to_string_pretty(&stored)?;
        tokio::fs::write(&self.path, payload).await?;
        Ok(())
    }

    pub async fn connection(&self) -> ResultEngine<Option<ConnectionConfig>> {
        Ok(ConnectionConfig::from_entries(&self.load().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_host_means_not_configured() {
        let mut entries = BTreeMap::new();
        assert!(ConnectionConfig::from_entries(&entries).is_none());

        entries.insert(KEY_HOST.to_string(), "   ".to_string());
        assert!(ConnectionConfig::from_entries(&entries).is_none());
    }

    #[test]
    fn missing_keys_take_defaults() {
        let entries = BTreeMap::from([
            (KEY_HOST.to_string(), "192.168.1.10".to_string()),
            (KEY_DB_PORT.to_string(), "not-a-port".to_string()),
            (KEY_DB_PASS.to_string(), "secret".to_string()),
        ]);
        let config = ConnectionConfig::from_entries(&entries).unwrap();

        assert_eq!(config.host, "192.168.1.10");
        assert_eq!(config.port, 3306);
        assert_eq!(config.database, "taxreport");
        assert_eq!(config.username, "root");
        assert_eq!(config.password, "secret");
        assert_eq!(config.share, "TaxData");
        assert_eq!(config.share_username, "pi");
    }

    #[tokio::test]
    async fn store_merges_and_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("nested/connection.json"));
        assert!(store.load().await.unwrap().is_empty());

        let mut config = ConnectionConfig::with_host("nas.local");
        config.port = 8080;
        store.save(&config.to_entries()).await.unwrap();
        store
            .save(&BTreeMap::from([(KEY_DB_USER.to_string(), "anna".to_string())]))
            .await
            .unwrap();

        let loaded = store.connection().await.unwrap().unwrap();
        assert_eq!(loaded.port, 8080);
        assert_eq!(loaded.username, "anna");
        assert_eq!(loaded.host, "nas.local");
    }
}
