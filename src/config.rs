//! TOML configuration for the store and the mail sender.
//!
//! The `[database]` section is required; `[mail]` is optional and only the
//! notification sender reads it. Credentials never come from the
//! environment: both sections carry their own.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub mail: Option<MailConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Base URL of the document service.
    #[serde(default = "default_url")]
    pub url: String,
    /// Name of the database to bootstrap and use.
    pub name: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Per-network-call timeout.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_url() -> String {
    "http://127.0.0.1:5984".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct MailConfig {
    /// SMTP relay host.
    pub host: String,
    #[serde(default = "default_mail_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    /// Sender mailbox, e.g. `"Chat Bot <bot@example.com>"`.
    pub from: String,
}

fn default_mail_port() -> u16 {
    587
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if config.database.name.is_empty() {
        bail!("database.name must not be empty");
    }
    if config.database.timeout_secs == 0 {
        bail!("database.timeout_secs must be > 0");
    }

    if let Some(mail) = &config.mail {
        if mail.host.is_empty() {
            bail!("mail.host must not be empty");
        }
        if mail.from.parse::<lettre::message::Mailbox>().is_err() {
            bail!("mail.from is not a valid mailbox: '{}'", mail.from);
        }
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("store.toml");
        fs::write(&path, content).unwrap();
        (tmp, path)
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let (_tmp, path) = write_config(
            r#"[database]
name = "conversation"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.database.name, "conversation");
        assert_eq!(config.database.url, "http://127.0.0.1:5984");
        assert_eq!(config.database.timeout_secs, 30);
        assert!(config.database.username.is_none());
        assert!(config.mail.is_none());
    }

    #[test]
    fn test_full_config_parses() {
        let (_tmp, path) = write_config(
            r#"[database]
url = "https://couch.internal:6984/"
name = "conversation"
username = "svc"
password = "secret"
timeout_secs = 5

[mail]
host = "smtp.example.com"
port = 2525
username = "bot"
password = "hunter2"
from = "Chat Bot <bot@example.com>"
"#,
        );
        let config = load_config(&path).unwrap();
        assert_eq!(config.database.username.as_deref(), Some("svc"));
        assert_eq!(config.database.timeout_secs, 5);
        let mail = config.mail.unwrap();
        assert_eq!(mail.port, 2525);
        assert_eq!(mail.from, "Chat Bot <bot@example.com>");
    }

    #[test]
    fn test_empty_database_name_rejected() {
        let (_tmp, path) = write_config(
            r#"[database]
name = ""
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let (_tmp, path) = write_config(
            r#"[database]
name = "conversation"
timeout_secs = 0
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_invalid_from_mailbox_rejected() {
        let (_tmp, path) = write_config(
            r#"[database]
name = "conversation"

[mail]
host = "smtp.example.com"
from = "not a mailbox"
"#,
        );
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(load_config(Path::new("/nonexistent/store.toml")).is_err());
    }
}
