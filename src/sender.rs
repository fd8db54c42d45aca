//! The mail pool and its dispatch loop
//!
//! A [`Sender`] owns the relay address and an ordered queue of [`Mail`]s.
//! [`Sender::new_mail`] validates a [`MailDraft`] and enqueues the resulting
//! mail, [`Sender::send`] transmits the whole queue over one connection and
//! reports what happened as a [`SendOutcome`].

use std::fmt::{self, Display, Formatter};

use crate::{
    error::Field,
    mail::{Attachments, Mail, Recipients},
    transport::{smtp::SmtpTransport, Connection, Transport},
    Error,
};

/// The fields of a mail to enqueue with [`Sender::new_mail`]
///
/// `sender`, `to`, `subject` and `message` are required, the others may be
/// left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailDraft {
    sender: Option<String>,
    to: Option<Recipients>,
    cc: Option<Recipients>,
    bcc: Option<Recipients>,
    subject: Option<String>,
    message: Option<String>,
    attachments: Option<Attachments>,
}

impl MailDraft {
    /// Creates an empty draft
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sender address
    pub fn sender<S: Into<String>>(mut self, sender: S) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Set the `to` recipients
    pub fn to<R: Into<Recipients>>(mut self, to: R) -> Self {
        self.to = Some(to.into());
        self
    }

    /// Set the `cc` recipients
    pub fn cc<R: Into<Recipients>>(mut self, cc: R) -> Self {
        self.cc = Some(cc.into());
        self
    }

    /// Set the `bcc` recipients
    pub fn bcc<R: Into<Recipients>>(mut self, bcc: R) -> Self {
        self.bcc = Some(bcc.into());
        self
    }

    /// Set the subject line
    pub fn subject<S: Into<String>>(mut self, subject: S) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the message body, HTML when it starts with an `<html>` tag
    pub fn message<S: Into<String>>(mut self, message: S) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the files to attach
    pub fn attachments<A: Into<Attachments>>(mut self, attachments: A) -> Self {
        self.attachments = Some(attachments.into());
        self
    }
}

fn required(value: Option<String>, field: Field) -> Result<String, Error> {
    value
        .filter(|value| !value.is_empty())
        .ok_or(Error::MissingField(field))
}

/// The result of [`Sender::send`]
#[must_use]
#[derive(Debug)]
pub enum SendOutcome {
    /// The relay could not be reached, the pool is untouched
    NotConnected(Error),
    /// A mail failed, the loop stopped there
    ///
    /// The `sent` first mails were transmitted and removed from the pool, the
    /// failing mail and the ones after it are still queued.
    Aborted {
        /// Mails transmitted before the failure
        sent: usize,
        /// Mails in the pool when `send` was called
        total: usize,
        /// Why the mail at index `sent` could not be transmitted
        error: Error,
    },
    /// Every queued mail was transmitted, possibly none
    Completed {
        /// Mails transmitted
        sent: usize,
    },
}

impl SendOutcome {
    /// Whether nothing went wrong
    pub fn is_success(&self) -> bool {
        matches!(self, SendOutcome::Completed { .. })
    }

    /// How many mails were transmitted
    pub fn sent(&self) -> usize {
        match self {
            SendOutcome::NotConnected(_) => 0,
            SendOutcome::Aborted { sent, .. } | SendOutcome::Completed { sent } => *sent,
        }
    }

    /// The error that stopped the dispatch, if any
    pub fn error(&self) -> Option<&Error> {
        match self {
            SendOutcome::NotConnected(error) | SendOutcome::Aborted { error, .. } => Some(error),
            SendOutcome::Completed { .. } => None,
        }
    }

    /// Converts into the number of transmitted mails, or the error
    pub fn into_result(self) -> Result<usize, Error> {
        match self {
            SendOutcome::Completed { sent } => Ok(sent),
            SendOutcome::NotConnected(error) | SendOutcome::Aborted { error, .. } => Err(error),
        }
    }
}

impl Display for SendOutcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            SendOutcome::NotConnected(error) => Display::fmt(error, f),
            SendOutcome::Aborted { sent, total, error } => {
                write!(f, "sent {sent} of {total} mails: {error}")
            }
            SendOutcome::Completed { sent } => write!(f, "sent {sent} mails"),
        }
    }
}

/// Queues mails and dispatches them through a relay
#[derive(Debug)]
pub struct Sender<T: Transport = SmtpTransport> {
    server: String,
    transport: T,
    pool: Vec<Mail>,
}

impl Default for Sender {
    /// A sender with no relay address, to be set with [`Sender::set_server`]
    fn default() -> Self {
        Sender::new("")
    }
}

impl Sender {
    /// Creates a sender dispatching through `server` with the SMTP transport
    ///
    /// `server` is `host`, `host:port`, `[ipv6]:port` or `smtp://host:port`.
    /// It is only parsed when [`send`](Sender::send) connects.
    pub fn new<S: Into<String>>(server: S) -> Self {
        Self::with_transport(server, SmtpTransport::default())
    }
}

impl<T: Transport> Sender<T> {
    /// Creates a sender dispatching through `server` with any transport
    pub fn with_transport<S: Into<String>>(server: S, transport: T) -> Self {
        Sender {
            server: server.into(),
            transport,
            pool: Vec::new(),
        }
    }

    /// Replaces the relay address
    pub fn set_server<S: Into<String>>(&mut self, server: S) {
        self.server = server.into();
    }

    /// The relay address
    pub fn server(&self) -> &str {
        &self.server
    }

    /// The transport used to reach the relay
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Builds a mail from `draft` and appends it to the pool
    ///
    /// The required fields are checked in the order sender, to, subject,
    /// message. The mail must then pass [`Mail::check_headers`], so a subject
    /// with a line break is refused here rather than at dispatch time.
    /// Nothing is enqueued when an error is returned.
    pub fn new_mail(&mut self, draft: MailDraft) -> Result<&Mail, Error> {
        let sender = required(draft.sender, Field::Sender)?;
        let to = draft
            .to
            .filter(|to| !to.is_empty())
            .ok_or(Error::MissingField(Field::To))?;
        let subject = required(draft.subject, Field::Subject)?;
        let message = required(draft.message, Field::Message)?;

        let mut mail = Mail::new();
        mail.set_sender(sender)?;
        mail.set_recipients(Some(to), draft.cc, draft.bcc);
        if mail.to().is_empty() {
            return Err(Error::NoValidRecipient);
        }
        mail.set_subject(subject);
        mail.set_message(message);
        if let Some(attachments) = draft.attachments {
            for path in attachments.into_vec() {
                mail.add_attachment(path)?;
            }
        }
        mail.check_headers()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            sender = mail.sender(),
            recipients = mail.all_recipients().len(),
            attachments = mail.attachments().len(),
            "mail queued"
        );

        self.pool.push(mail);
        Ok(&self.pool[self.pool.len() - 1])
    }

    /// The queued mails, in dispatch order
    pub fn pool(&self) -> &[Mail] {
        &self.pool
    }

    /// How many mails are queued
    pub fn pending(&self) -> usize {
        self.pool.len()
    }

    /// Empties the pool without sending anything
    pub fn clear(&mut self) {
        self.pool.clear();
    }

    /// Transmits the pool over a single connection to the relay
    ///
    /// The relay is always contacted, even with an empty pool, so an
    /// unreachable relay is reported as [`SendOutcome::NotConnected`].
    /// Mails are sent in the order they were queued. The first failure,
    /// be it an attachment that cannot be read or a refusal from the relay,
    /// stops the loop. Transmitted mails leave the pool, the others stay.
    pub fn send(&mut self) -> SendOutcome {
        let mut conn = match self.transport.connect(&self.server) {
            Ok(conn) => conn,
            Err(err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(server = self.server.as_str(), "cannot connect to relay: {}", err);
                return SendOutcome::NotConnected(Error::Connection(Box::new(err)));
            }
        };

        let total = self.pool.len();
        let mut sent = 0;
        let mut failure = None;
        for mail in &self.pool {
            match transmit::<T>(&mut conn, mail) {
                Ok(()) => {
                    sent += 1;
                    #[cfg(feature = "tracing")]
                    tracing::info!(
                        subject = mail.subject(),
                        "mail {} of {} sent to {}",
                        sent,
                        total,
                        self.server
                    );
                }
                Err(err) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(
                        subject = mail.subject(),
                        "mail {} of {} not sent: {}",
                        sent + 1,
                        total,
                        err
                    );
                    failure = Some(err);
                    break;
                }
            }
        }
        conn.close();

        self.pool.drain(..sent);
        match failure {
            Some(error) => SendOutcome::Aborted { sent, total, error },
            None => SendOutcome::Completed { sent },
        }
    }
}

fn transmit<T: Transport>(conn: &mut T::Connection, mail: &Mail) -> Result<(), Error> {
    let message = mail.to_message()?;
    conn.send(&message)
        .map_err(|err| Error::Transport(Box::new(err)))?;
    Ok(())
}
