pub mod imap;
pub mod parse;
pub mod smtp;

use chrono::NaiveDate;

use crate::error::Result;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundMessage {
    pub uid: u32,
    pub sender: String,
    pub subject: String,
    pub body: String,
    pub message_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub in_reply_to: Option<String>,
}

/// Something we can open an inbox session on.
pub trait Mailbox {
    type Session: MailSession;

    /// Connects, authenticates and selects the inbox.
    fn open(&self) -> Result<Self::Session>;
}

pub trait MailSession {
    /// UIDs of unread messages received on or after `since`, ascending.
    fn search_unseen_since(&mut self, since: NaiveDate) -> Result<Vec<u32>>;

    /// Raw RFC 5322 bytes. Must not set `\Seen`.
    fn fetch(&mut self, uid: u32) -> Result<Vec<u8>>;

    fn mark_seen(&mut self, uid: u32) -> Result<()>;

    fn close(self) -> Result<()>;
}

/// Outbound side.
pub trait Relay {
    fn send(&self, reply: &Reply) -> Result<()>;
}
