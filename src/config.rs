use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{
    APP_DESCRIPTION, APP_ICON, APP_NAME, APP_REDIRECT, APP_URL, DEFAULT_PROJECT_ID,
    DEFAULT_RELAY_HOST,
};
use crate::error::{Error, Result};
use crate::types::{Chain, ConnectionType, Metadata, SdkConfig};

pub const ENV_PROJECT_ID: &str = "WC_PROJECT_ID";
pub const ENV_RELAY_URL: &str = "WC_RELAY_URL";
pub const ENV_PREFERENCES_DIR: &str = "WC_PREFERENCES_DIR";
pub const ENV_CONNECTION_TYPE: &str = "WC_CONNECTION_TYPE";

/// Static application configuration.
///
/// Defaults are the demo dApp metadata; a JSON file may override any field and
/// `WC_*` environment variables override the file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    /// Get one from https://cloud.reown.com
    pub project_id: String,
    /// Relay host, or a full `wss://` url
    pub relay_url: String,
    pub connection_type: ConnectionType,
    pub metadata: Metadata,
    pub chain: Chain,
    pub preferences_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            project_id: DEFAULT_PROJECT_ID.to_string(),
            relay_url: DEFAULT_RELAY_HOST.to_string(),
            connection_type: ConnectionType::Automatic,
            metadata: Metadata {
                name: APP_NAME.to_string(),
                description: APP_DESCRIPTION.to_string(),
                url: APP_URL.to_string(),
                icons: vec![APP_ICON.to_string()],
                redirect: Some(APP_REDIRECT.to_string()),
            },
            chain: Chain::eth_mainnet(),
            preferences_dir: PathBuf::from("."),
        }
    }
}

impl AppConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Defaults, then `path` if given, then the environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(project_id) = var(ENV_PROJECT_ID) {
            self.project_id = project_id;
        }
        if let Some(relay_url) = var(ENV_RELAY_URL) {
            self.relay_url = relay_url;
        }
        if let Some(dir) = var(ENV_PREFERENCES_DIR) {
            self.preferences_dir = PathBuf::from(dir);
        }
        if let Some(connection_type) = var(ENV_CONNECTION_TYPE) {
            self.connection_type = connection_type.parse()?;
        }
        Ok(self)
    }

    /// `wss://<relay>?projectId=<id>`
    pub fn relay_server_url(&self) -> Result<Url> {
        let raw = if self.relay_url.contains("://") {
            self.relay_url.clone()
        } else {
            format!("wss://{}", self.relay_url)
        };
        let mut url = Url::parse(&raw)?;
        if !matches!(url.scheme(), "wss" | "ws") || url.host_str().is_none() {
            return Err(Error::InvalidRelayUrl(self.relay_url.clone()));
        }
        url.query_pairs_mut()
            .append_pair("projectId", &self.project_id);
        Ok(url)
    }

    pub fn sdk_config(&self) -> Result<SdkConfig> {
        Ok(SdkConfig {
            relay_server_url: self.relay_server_url()?,
            connection_type: self.connection_type,
            metadata: self.metadata.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_relay_url() {
        let config = AppConfig::default();
        assert_eq!(
            config.relay_server_url().unwrap().as_str(),
            "wss://relay.walletconnect.com/?projectId=fd2458a46d601ccf26ff85ba70eebd40"
        );
        let sdk = config.sdk_config().unwrap();
        assert_eq!(sdk.connection_type, ConnectionType::Automatic);
        assert_eq!(sdk.metadata.redirect.as_deref(), Some("kotlin-dapp-wc://request"));
    }

    #[test]
    fn rejects_non_websocket_relay() {
        let config = AppConfig {
            relay_url: "https://relay.walletconnect.com".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            config.relay_server_url(),
            Err(Error::InvalidRelayUrl(_))
        ));
    }

    #[test]
    fn environment_overrides() {
        let env = HashMap::from([
            (ENV_PROJECT_ID, "abc"),
            (ENV_RELAY_URL, "ws://localhost:8080"),
            (ENV_CONNECTION_TYPE, "manual"),
        ]);
        let config = AppConfig::default()
            .with_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.project_id, "abc");
        assert_eq!(
            config.relay_server_url().unwrap().as_str(),
            "ws://localhost:8080/?projectId=abc"
        );
        assert_eq!(config.connection_type, ConnectionType::Manual);
        assert_eq!(config.preferences_dir, PathBuf::from("."));
    }

    #[test]
    fn bad_connection_type_override() {
        let result = AppConfig::default().with_overrides(|key| {
            (key == ENV_CONNECTION_TYPE).then(|| "sometimes".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"projectId":"from-file","connectionType":"manual","chain":"eip155:137"}"#,
        )
        .unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.project_id, "from-file");
        assert_eq!(config.connection_type, ConnectionType::Manual);
        assert_eq!(config.chain.to_string(), "eip155:137");
        assert_eq!(config.metadata.name, "Wallet Connect");
    }
}
