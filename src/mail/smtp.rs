use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::client::{Tls, TlsParameters};
use lettre::{Message, SmtpTransport, Transport};

use crate::config::{MailConfig, UserConfig};
use crate::error::Result;
use crate::mail::{Relay, Reply};

fn is_localhost(host: &str) -> bool {
    host == "127.0.0.1" || host == "localhost"
}

pub fn build_message(user: &UserConfig, reply: &Reply) -> Result<Message> {
    let from = Mailbox::new(Some(user.name.clone()), user.email.parse()?);

    let mut builder = Message::builder()
        .from(from)
        .to(reply.to.parse()?)
        .subject(reply.subject.as_str())
        .header(ContentType::TEXT_PLAIN);

    if let Some(id) = &reply.in_reply_to {
        builder = builder.in_reply_to(id.clone()).references(id.clone());
    }

    Ok(builder.body(reply.body.clone())?)
}

pub struct SmtpRelay {
    cfg: MailConfig,
    user: UserConfig,
}

impl SmtpRelay {
    pub fn new(cfg: MailConfig, user: UserConfig) -> Self {
        Self { cfg, user }
    }

    fn transport(&self) -> Result<SmtpTransport> {
        let creds = Credentials::new(self.cfg.username.clone(), self.cfg.password.clone());

        let mut tlsb = TlsParameters::builder(self.cfg.host.clone());
        if is_localhost(&self.cfg.host) {
            tlsb = tlsb
                .dangerous_accept_invalid_certs(true)
                .dangerous_accept_invalid_hostnames(true);
        }
        let tls = tlsb.build()?;
        let tls = if self.cfg.starttls {
            Tls::Required(tls)
        } else {
            Tls::Wrapper(tls)
        };

        Ok(SmtpTransport::builder_dangerous(&self.cfg.host)
            .port(self.cfg.port)
            .credentials(creds)
            .tls(tls)
            .build())
    }
}

impl Relay for SmtpRelay {
    fn send(&self, reply: &Reply) -> Result<()> {
        let email = build_message(&self.user, reply)?;
        // One connection per reply; dropped once the message is out.
        let mailer = self.transport()?;
        mailer.send(&email)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserConfig {
        UserConfig {
            name: "Me".into(),
            email: "me@example.com".into(),
        }
    }

    #[test]
    fn threaded_reply_carries_headers() {
        let reply = Reply {
            to: "alice@example.com".into(),
            subject: "Re: Meeting".into(),
            body: "Thanks\n\nme@example.com".into(),
            in_reply_to: Some("<abc@example.com>".into()),
        };
        let text = String::from_utf8(build_message(&user(), &reply).unwrap().formatted()).unwrap();

        assert!(text.contains("To: alice@example.com"));
        assert!(text.contains("Subject: Re: Meeting"));
        assert!(text.contains("In-Reply-To: <abc@example.com>"));
        assert!(text.contains("References: <abc@example.com>"));
    }

    #[test]
    fn reply_without_id_has_no_threading_headers() {
        let reply = Reply {
            to: "alice@example.com".into(),
            subject: "Re: hi".into(),
            body: "b".into(),
            in_reply_to: None,
        };
        let text = String::from_utf8(build_message(&user(), &reply).unwrap().formatted()).unwrap();
        assert!(!text.contains("In-Reply-To"));
    }

    #[test]
    fn bad_recipient_is_rejected() {
        let reply = Reply {
            to: "not an address".into(),
            subject: "Re: x".into(),
            body: "b".into(),
            in_reply_to: None,
        };
        assert!(build_message(&user(), &reply).is_err());
    }
}
