//! Configuration file handling for chat-ledger.
//!
//! The configuration file is stored at `$LEDGER_HOME/config.json` and contains settings for the
//! app such as the timezone used for dates, the document ids of the ledger and its backup, and the
//! classifier to use. Secrets are never stored here; they come from the environment.

use crate::api::{Provider, LINE_REPLY_ENDPOINT};
use crate::{utils, Result};
use anyhow::{bail, Context};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use url::Url;

const APP_NAME: &str = "chat-ledger";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const STORE: &str = "store";
const DEFAULT_TIMEZONE: &str = "Asia/Taipei";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_COLLECTION: &str = "expenses";
const DEFAULT_LEDGER_DOC: &str = "aggregated";
const DEFAULT_BACKUP_DOC: &str = "backup";
const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$LEDGER_HOME` and from there it loads `$LEDGER_HOME/config.json`. It provides
/// paths to other items that are expected in a certain location within the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    store_dir: PathBuf,
    config_file: ConfigFile,
    timezone: Tz,
    listen_addr: SocketAddr,
    reply_endpoint: Url,
}

impl Config {
    /// Creates the home directory and its `store` subdirectory and writes an initial
    /// `config.json` with default settings.
    ///
    /// # Errors
    /// - Returns an error if a `config.json` already exists in `dir`.
    /// - Returns an error if any file operations fail.
    pub async fn create(dir: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the ledger home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!(
                "A config file already exists at '{}'",
                config_path.display()
            );
        }

        let store_dir = root.join(STORE);
        utils::make_dir(&store_dir).await?;

        let config_file = ConfigFile::default();
        config_file.save(&config_path).await?;

        Self::from_parts(root, config_path, config_file)
    }

    /// This will
    /// - validate that `ledger_home` exists and that the config file exists
    /// - load and validate the config file
    /// - validate that the store directory exists
    /// - return the loaded configuration object
    pub async fn load(ledger_home: impl Into<PathBuf>) -> Result<Self> {
        let maybe_relative = ledger_home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The ledger home is missing, run 'chat-ledger init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;

        let config = Self::from_parts(root, config_path, config_file)?;
        if !config.store_dir.is_dir() {
            bail!(
                "The store directory is missing '{}'",
                config.store_dir.display()
            )
        }
        Ok(config)
    }

    fn from_parts(root: PathBuf, config_path: PathBuf, config_file: ConfigFile) -> Result<Self> {
        let timezone: Tz = config_file
            .timezone
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid timezone: {}", config_file.timezone))?;
        let listen_addr: SocketAddr = config_file
            .listen_addr
            .parse()
            .with_context(|| format!("Invalid listen_addr '{}'", config_file.listen_addr))?;
        let reply_endpoint = Url::parse(&config_file.reply_endpoint)
            .with_context(|| format!("Invalid reply_endpoint '{}'", config_file.reply_endpoint))?;
        Ok(Self {
            store_dir: root.join(STORE),
            root,
            config_path,
            config_file,
            timezone,
            listen_addr,
            reply_endpoint,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// The timezone in which "today" and "this month" are computed.
    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn collection(&self) -> &str {
        &self.config_file.collection
    }

    pub fn ledger_doc(&self) -> &str {
        &self.config_file.ledger_doc
    }

    pub fn backup_doc(&self) -> &str {
        &self.config_file.backup_doc
    }

    pub fn classifier(&self) -> &ClassifierSettings {
        &self.config_file.classifier
    }

    pub fn reply_endpoint(&self) -> &Url {
        &self.reply_endpoint
    }
}

/// Which classifier to call and how.
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct ClassifierSettings {
    /// The API flavor, `openai` or `anthropic`.
    #[serde(default)]
    provider: Provider,

    /// The model name passed to the API.
    #[serde(default = "default_model")]
    model: String,

    /// Overrides the provider's default endpoint, e.g. for an OpenAI-compatible gateway.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    endpoint: Option<Url>,
}

impl ClassifierSettings {
    pub fn new(provider: Provider, model: impl Into<String>, endpoint: Option<Url>) -> Self {
        Self {
            provider,
            model: model.into(),
            endpoint,
        }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> Option<&Url> {
        self.endpoint.as_ref()
    }
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            model: default_model(),
            endpoint: None,
        }
    }
}

/// Represents the serialization and deserialization format of the configuration file. Every
/// field except `app_name` and `config_version` may be left out to take its default.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "chat-ledger",
///   "config_version": 1,
///   "timezone": "Asia/Taipei",
///   "listen_addr": "0.0.0.0:8080",
///   "collection": "expenses",
///   "ledger_doc": "aggregated",
///   "backup_doc": "backup",
///   "classifier": { "provider": "openai", "model": "gpt-4o-mini" },
///   "reply_endpoint": "https://api.line.me/v2/bot/message/reply"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "chat-ledger"
    app_name: String,

    /// Configuration file version
    config_version: u8,

    /// IANA timezone name
    #[serde(default = "default_timezone")]
    timezone: String,

    /// Address the webhook server binds to
    #[serde(default = "default_listen_addr")]
    listen_addr: String,

    /// Collection holding the ledger and backup documents
    #[serde(default = "default_collection")]
    collection: String,

    /// Document id of the aggregated ledger
    #[serde(default = "default_ledger_doc")]
    ledger_doc: String,

    /// Document id of the backup slot
    #[serde(default = "default_backup_doc")]
    backup_doc: String,

    #[serde(default)]
    classifier: ClassifierSettings,

    /// Chat platform reply endpoint
    #[serde(default = "default_reply_endpoint")]
    reply_endpoint: String,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            timezone: default_timezone(),
            listen_addr: default_listen_addr(),
            collection: default_collection(),
            ledger_doc: default_ledger_doc(),
            backup_doc: default_backup_doc(),
            classifier: ClassifierSettings::default(),
            reply_endpoint: default_reply_endpoint(),
        }
    }
}

impl ConfigFile {
    /// Loads a ConfigFile asynchronously from the specified path.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed, or if it belongs to another app
    async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: ConfigFile = utils::deserialize(path).await?;

        anyhow::ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        anyhow::ensure!(
            config.config_version <= CONFIG_VERSION,
            "Config version {} is newer than this program supports ({})",
            config.config_version,
            CONFIG_VERSION
        );

        Ok(config)
    }

    /// Saves the ConfigFile to the specified path.
    async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let p = path.as_ref();
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(p, data)
            .await
            .context("Unable to write config file")
    }
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_listen_addr() -> String {
    DEFAULT_LISTEN_ADDR.to_string()
}

fn default_collection() -> String {
    DEFAULT_COLLECTION.to_string()
}

fn default_ledger_doc() -> String {
    DEFAULT_LEDGER_DOC.to_string()
}

fn default_backup_doc() -> String {
    DEFAULT_BACKUP_DOC.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_reply_endpoint() -> String {
    LINE_REPLY_ENDPOINT.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_create_then_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("ledger");
        let created = Config::create(&home).await.unwrap();
        assert!(created.store_dir().is_dir());
        assert!(created.config_path().is_file());

        let loaded = Config::load(&home).await.unwrap();
        assert_eq!(loaded.root(), created.root());
        assert_eq!(loaded.timezone(), chrono_tz::Asia::Taipei);
        assert_eq!(loaded.listen_addr().port(), 8080);
        assert_eq!(loaded.collection(), "expenses");
        assert_eq!(loaded.ledger_doc(), "aggregated");
        assert_eq!(loaded.backup_doc(), "backup");
        assert_eq!(loaded.classifier().provider(), Provider::Openai);
        assert_eq!(loaded.reply_endpoint().as_str(), LINE_REPLY_ENDPOINT);
    }

    #[tokio::test]
    async fn test_create_refuses_to_overwrite() {
        let dir = TempDir::new().unwrap();
        Config::create(dir.path()).await.unwrap();
        assert!(Config::create(dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_load_missing_home() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(dir.path().join("nope")).await.is_err());
        assert!(Config::load(dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_load_partial_config_uses_defaults() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(STORE)).unwrap();
        std::fs::write(
            dir.path().join(CONFIG_JSON),
            r#"{
                "app_name": "chat-ledger",
                "config_version": 1,
                "timezone": "America/Chicago",
                "classifier": { "provider": "anthropic", "model": "claude-3-5-haiku-latest" }
            }"#,
        )
        .unwrap();
        let config = Config::load(dir.path()).await.unwrap();
        assert_eq!(config.timezone(), chrono_tz::America::Chicago);
        assert_eq!(config.classifier().provider(), Provider::Anthropic);
        assert_eq!(config.classifier().model(), "claude-3-5-haiku-latest");
        assert!(config.classifier().endpoint().is_none());
        assert_eq!(config.collection(), DEFAULT_COLLECTION);
    }

    #[tokio::test]
    async fn test_load_rejects_bad_values() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join(STORE)).unwrap();
        let path = dir.path().join(CONFIG_JSON);

        std::fs::write(&path, r#"{"app_name": "other-app", "config_version": 1}"#).unwrap();
        assert!(Config::load(dir.path()).await.is_err());

        std::fs::write(
            &path,
            r#"{"app_name": "chat-ledger", "config_version": 1, "timezone": "Mars/Olympus"}"#,
        )
        .unwrap();
        assert!(Config::load(dir.path()).await.is_err());

        std::fs::write(
            &path,
            r#"{"app_name": "chat-ledger", "config_version": 1, "listen_addr": "nowhere"}"#,
        )
        .unwrap();
        assert!(Config::load(dir.path()).await.is_err());

        std::fs::write(
            &path,
            r#"{"app_name": "chat-ledger", "config_version": 1, "reply_endpoint": "not a url"}"#,
        )
        .unwrap();
        assert!(Config::load(dir.path()).await.is_err());

        std::fs::write(&path, r#"{"app_name": "chat-ledger", "config_version": 99}"#).unwrap();
        assert!(Config::load(dir.path()).await.is_err());
    }
}
