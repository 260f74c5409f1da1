use mailparse::{MailAddr, MailHeaderMap, ParsedMail};

use crate::error::{Error, Result};
use crate::mail::{InboundMessage, Reply};

pub fn parse_message(uid: u32, raw: &[u8]) -> Result<InboundMessage> {
    let parsed = mailparse::parse_mail(raw)?;
    let headers = parsed.headers.as_slice();

    let sender = headers
        .get_first_value("From")
        .and_then(|v| primary_address(&v))
        .ok_or(Error::NoSender(uid))?;

    // get_first_value already decodes RFC 2047 encoded words.
    let subject = headers.get_first_value("Subject").unwrap_or_default();

    let message_id = headers
        .get_first_value("Message-ID")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    Ok(InboundMessage {
        uid,
        sender,
        subject,
        body: extract_body(&parsed),
        message_id,
    })
}

fn primary_address(value: &str) -> Option<String> {
    let list = mailparse::addrparse(value).ok()?.into_inner();
    list.into_iter().find_map(|a| match a {
        MailAddr::Single(s) => Some(s.addr),
        MailAddr::Group(g) => g.addrs.into_iter().next().map(|s| s.addr),
    })
}

/// First `text/plain` part of a multipart message, or the whole payload of a
/// single-part one. Anything that fails to decode counts as empty.
pub fn extract_body(m: &ParsedMail) -> String {
    if m.subparts.is_empty() {
        return m.get_body().unwrap_or_default();
    }
    first_text_plain(m).unwrap_or_default()
}

fn first_text_plain(m: &ParsedMail) -> Option<String> {
    if m.subparts.is_empty() {
        if m.ctype.mimetype.eq_ignore_ascii_case("text/plain") {
            return m.get_body().ok();
        }
        return None;
    }
    m.subparts.iter().find_map(first_text_plain)
}

pub fn make_reply_subject(subject: &str) -> String {
    format!("Re: {subject}")
}

/// Message-ID in angle brackets, the way threading headers carry it.
fn format_message_id(id: &str) -> Option<String> {
    let id = id.trim().trim_start_matches('<').trim_end_matches('>').trim();
    if id.is_empty() {
        None
    } else {
        Some(format!("<{id}>"))
    }
}

pub fn compose_reply(msg: &InboundMessage, template: &str, signature: &str) -> Reply {
    Reply {
        to: msg.sender.clone(),
        subject: make_reply_subject(&msg.subject),
        body: format!("{template}\n\n{signature}"),
        in_reply_to: msg.message_id.as_deref().and_then(format_message_id),
    }
}
