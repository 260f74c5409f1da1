//! Error types for the responder.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IMAP error: {0}")]
    Imap(#[from] imap::error::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    #[error("SMTP error: {0}")]
    Smtp(#[from] lettre::transport::smtp::Error),

    #[error("invalid address: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("could not build reply: {0}")]
    Compose(#[from] lettre::error::Error),

    #[error("malformed message: {0}")]
    Parse(#[from] mailparse::MailParseError),

    /// The server answered a fetch without a message body.
    #[error("no body returned for uid {0}")]
    MissingBody(u32),

    /// The message has no usable `From` address.
    #[error("no sender address in uid {0}")]
    NoSender(u32),

    /// The rule file does not exist. Existing rules are kept.
    #[error("rule file not found: {}", .0.display())]
    RulesNotFound(PathBuf),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The blocking task running a cycle was cancelled by runtime shutdown.
    #[error("poll cycle task failed: {0}")]
    Cycle(#[from] tokio::task::JoinError),

    #[error("rule file JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
