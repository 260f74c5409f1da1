use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::{fs, path::{Path, PathBuf}};

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct Config {
    pub imap: MailConfig,
    pub smtp: MailConfig,
    pub user: UserConfig,
    #[serde(default)]
    pub responder: ResponderConfig,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct MailConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub starttls: bool,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct UserConfig {
    pub name: String,
    pub email: String,
}

#[derive(Deserialize, Serialize, Clone, Debug)]
#[serde(default)]
pub struct ResponderConfig {
    /// Seconds to sleep between two inbox checks.
    pub interval_secs: u64,
    /// Unread mail older than this is ignored. Defaults to the day we start.
    pub start_date: Option<NaiveDate>,
    pub rules_file: Option<PathBuf>,
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            start_date: None,
            rules_file: None,
        }
    }
}

impl Config {
    /// `$ZENREPLY_CONFIG`, else `<config dir>/zenreply/config.toml`.
    pub fn path() -> Result<PathBuf> {
        if let Ok(p) = std::env::var("ZENREPLY_CONFIG") {
            return Ok(PathBuf::from(p));
        }
        Ok(app_dir()?.join("config.toml"))
    }

    /// Returns the config and whether a fresh template had to be written.
    pub fn load_or_create(path: &Path) -> Result<(Self, bool)> {
        if !path.exists() {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, DEFAULT_CONFIG)?;
            let cfg: Self = toml::from_str(DEFAULT_CONFIG)?;
            return Ok((cfg, true));
        }

        let data = fs::read_to_string(path)?;
        let cfg = toml::from_str(&data)?;
        Ok((cfg, false))
    }

    pub fn rules_path(&self) -> Result<PathBuf> {
        match &self.responder.rules_file {
            Some(p) => Ok(p.clone()),
            None => Ok(app_dir()?.join("reply_rules.json")),
        }
    }
}

fn app_dir() -> Result<PathBuf> {
    let dir = dirs::config_dir().ok_or_else(|| anyhow::anyhow!("no config dir"))?;
    Ok(dir.join("zenreply"))
}

const DEFAULT_CONFIG: &str = r#"
[imap]
host = "imap.gmail.com"
port = 993
username = "you@gmail.com"
password = "APP_PASSWORD"
starttls = false

[smtp]
host = "smtp.gmail.com"
port = 587
username = "you@gmail.com"
password = "APP_PASSWORD"
starttls = true

[user]
name = "Your Name"
email = "you@gmail.com"

[responder]
interval_secs = 60
# start_date = "2025-01-01"
# rules_file = "/path/to/reply_rules.json"
"#;
