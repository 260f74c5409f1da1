use chrono::NaiveDate;
use native_tls::{TlsConnector, TlsStream};
use std::net::TcpStream;

use crate::config::MailConfig;
use crate::error::{Error, Result};
use crate::mail::{MailSession, Mailbox};

type ImapSession = imap::Session<TlsStream<TcpStream>>;

fn is_localhost(host: &str) -> bool {
    host == "127.0.0.1" || host == "localhost"
}

fn tls_connector_for(cfg: &MailConfig) -> Result<TlsConnector> {
    let mut b = TlsConnector::builder();

    if is_localhost(&cfg.host) {
        b.danger_accept_invalid_certs(true);
        b.danger_accept_invalid_hostnames(true);
    }

    Ok(b.build()?)
}

fn connect(cfg: &MailConfig) -> Result<ImapSession> {
    let tls = tls_connector_for(cfg)?;

    let client = if cfg.starttls {
        imap::connect_starttls((cfg.host.as_str(), cfg.port), &cfg.host, &tls)?
    } else {
        imap::connect((cfg.host.as_str(), cfg.port), &cfg.host, &tls)?
    };

    let session = client
        .login(&cfg.username, &cfg.password)
        .map_err(|e| e.0)?;

    Ok(session)
}

/// IMAP `SINCE` wants `01-Jan-2025`.
pub fn since_criteria(since: NaiveDate) -> String {
    format!("UNSEEN SINCE {}", since.format("%d-%b-%Y"))
}

pub struct ImapMailbox {
    cfg: MailConfig,
}

impl ImapMailbox {
    pub fn new(cfg: MailConfig) -> Self {
        Self { cfg }
    }
}

impl Mailbox for ImapMailbox {
    type Session = InboxSession;

    fn open(&self) -> Result<InboxSession> {
        let mut sess = connect(&self.cfg)?;
        if let Err(e) = sess.select("INBOX") {
            let _ = sess.logout();
            return Err(e.into());
        }
        tracing::debug!(host = %self.cfg.host, "inbox selected");
        Ok(InboxSession { sess })
    }
}

pub struct InboxSession {
    sess: ImapSession,
}

impl MailSession for InboxSession {
    fn search_unseen_since(&mut self, since: NaiveDate) -> Result<Vec<u32>> {
        let mut uids: Vec<u32> = self
            .sess
            .uid_search(since_criteria(since))?
            .into_iter()
            .collect();
        uids.sort_unstable();
        Ok(uids)
    }

    fn fetch(&mut self, uid: u32) -> Result<Vec<u8>> {
        let fetches = self.sess.uid_fetch(uid.to_string(), "BODY.PEEK[]")?;
        let raw = fetches
            .iter()
            .find_map(|f| f.body())
            .ok_or(Error::MissingBody(uid))?;
        Ok(raw.to_vec())
    }

    fn mark_seen(&mut self, uid: u32) -> Result<()> {
        self.sess.uid_store(uid.to_string(), "+FLAGS (\\Seen)")?;
        Ok(())
    }

    fn close(mut self) -> Result<()> {
        if let Err(e) = self.sess.close() {
            tracing::debug!(error = %e, "CLOSE failed");
        }
        self.sess.logout()?;
        Ok(())
    }
}
