//! The polling loop.
//!
//! A [`Responder`] owns the rule engine and the set of UIDs already answered in
//! this process. Each cycle opens one inbox session, answers every unread
//! message since the start date, and closes the session again.

use chrono::{Local, NaiveDate};
use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::mail::parse::{compose_reply, parse_message};
use crate::mail::{MailSession, Mailbox, Relay};
use crate::rules::RuleEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Replied,
    AlreadySeen,
    SelfSent,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub found: usize,
    pub replied: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Responder<M, R> {
    mailbox: M,
    relay: R,
    rules: RuleEngine,
    own_address: String,
    start_date: NaiveDate,
    seen: HashSet<u32>,
}

impl<M: Mailbox, R: Relay> Responder<M, R> {
    pub fn new(mailbox: M, relay: R, rules: RuleEngine, own_address: impl Into<String>) -> Self {
        Self {
            mailbox,
            relay,
            rules,
            own_address: own_address.into(),
            start_date: Local::now().date_naive(),
            seen: HashSet::new(),
        }
    }

    pub fn with_start_date(mut self, date: NaiveDate) -> Self {
        self.start_date = date;
        self
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start_date
    }

    pub fn has_seen(&self, uid: u32) -> bool {
        self.seen.contains(&uid)
    }

    /// One pass over the inbox. An `Err` means the cycle was cut short
    /// (connect or search failed); per-message failures only count in the
    /// report. The session is closed either way.
    pub fn run_cycle(&mut self) -> Result<CycleReport> {
        let mut session = self.mailbox.open()?;
        let result = self.process_inbox(&mut session);
        if let Err(e) = session.close() {
            warn!(error = %e, "failed to close mailbox session");
        }
        result
    }

    fn process_inbox(&mut self, session: &mut M::Session) -> Result<CycleReport> {
        let uids = session.search_unseen_since(self.start_date)?;
        let mut report = CycleReport {
            found: uids.len(),
            ..Default::default()
        };

        if uids.is_empty() {
            debug!(since = %self.start_date, "no unread mail");
            return Ok(report);
        }
        info!(count = uids.len(), since = %self.start_date, "found unread mail");

        for uid in uids {
            match self.process_one(session, uid) {
                Ok(MessageOutcome::Replied) => report.replied += 1,
                Ok(MessageOutcome::AlreadySeen | MessageOutcome::SelfSent) => report.skipped += 1,
                Err(e) => {
                    warn!(uid, error = %e, "skipping message");
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }

    fn process_one(&mut self, session: &mut M::Session, uid: u32) -> Result<MessageOutcome> {
        if self.has_seen(uid) {
            return Ok(MessageOutcome::AlreadySeen);
        }

        let raw = session.fetch(uid)?;
        let msg = parse_message(uid, &raw)?;

        if msg.sender.eq_ignore_ascii_case(&self.own_address) {
            debug!(uid, "skipping self-sent message");
            self.seen.insert(uid);
            return Ok(MessageOutcome::SelfSent);
        }

        info!(uid = msg.uid, from = %msg.sender, subject = %msg.subject, "answering");
        let template = self.rules.match_reply(&msg.subject, &msg.body);
        let reply = compose_reply(&msg, template, &self.own_address);

        self.relay.send(&reply)?;
        self.seen.insert(uid);
        info!(uid, to = %reply.to, "reply sent");

        if let Err(e) = session.mark_seen(uid) {
            warn!(uid, error = %e, "reply sent but could not flag message as read");
        }
        Ok(MessageOutcome::Replied)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Runs cycles forever, `interval` apart. Blocking mail I/O happens on the
/// blocking pool; a cycle that has started always runs to its end.
///
/// Failed and panicking cycles are logged and the loop carries on with the
/// same responder. It only returns if the blocking task is cancelled, which
/// happens when the runtime shuts down.
pub async fn run<M, R>(mut responder: Responder<M, R>, interval: Duration) -> Result<()>
where
    M: Mailbox + Send + 'static,
    R: Relay + Send + 'static,
{
    loop {
        info!("checking for new mail");
        let (back, result) = tokio::task::spawn_blocking(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(|| responder.run_cycle()));
            (responder, result)
        })
        .await?;
        responder = back;

        match result {
            Ok(Ok(report)) if report.found > 0 => info!(
                replied = report.replied,
                skipped = report.skipped,
                failed = report.failed,
                "cycle finished"
            ),
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!(error = %e, "cycle aborted"),
            Err(payload) => error!(panic = panic_message(payload.as_ref()), "cycle panicked"),
        }

        debug!(secs = interval.as_secs(), "waiting until next check");
        tokio::time::sleep(interval).await;
    }
}
