//! smartrelay composes email messages and dispatches them through an SMTP relay host
//! that does not require client authentication.
//!
//! The crate is organised around two types:
//!
//! * [`Mail`] holds one outgoing message: the sender, three recipient groups
//!   (`to`, `cc`, `bcc`), a subject, a body and a list of attachment paths.
//!   Every address written to it goes through a loose format check.
//! * [`Sender`] owns the relay address and an ordered queue of [`Mail`]s (the
//!   *mail pool*). [`Sender::new_mail`] validates and enqueues a mail,
//!   [`Sender::send`] opens a single connection to the relay and transmits the
//!   whole pool in order.
//!
//! MIME composition and the SMTP client come from [lettre](https://lettre.rs):
//! [`Mail::to_message`] builds a lettre [`Message`], and transmission is
//! delegated to a [`Transport`]. [`SmtpTransport`] speaks plain SMTP to the
//! relay, [`transport::stub::StubTransport`] only records what would have been
//! sent.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use smartrelay::{MailDraft, Sender};
//!
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! let mut sender = Sender::new("relay.example.com:25");
//!
//! sender.new_mail(
//!     MailDraft::new()
//!         .sender("reports@example.com")
//!         .to(["alice@example.org", "bob@example.org"])
//!         .cc("audit@example.com")
//!         .subject("Nightly report")
//!         .message("<html><body><p>All green.</p></body></html>")
//!         .attachments("/var/reports/nightly.csv"),
//! )?;
//!
//! let outcome = sender.send();
//! assert!(outcome.is_success());
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! * **tracing** (default): log protocol traffic and dispatch progress through `tracing`
//! * **serde**: `Serialize`/`Deserialize` for [`Mail`] and the recipient types

#![doc(html_root_url = "https://docs.rs/crate/smartrelay/0.1.0")]
#![forbid(unsafe_code)]
#![warn(
    missing_copy_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces,
    rust_2018_idioms
)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod address;
pub mod error;
pub mod mail;
pub mod sender;
pub mod transport;

pub use crate::{
    address::Envelope,
    error::Error,
    mail::{Attachments, Mail, RecipientGroup, Recipients},
    sender::{MailDraft, SendOutcome, Sender},
    transport::{smtp::SmtpTransport, Connection, Transport},
};

pub use lettre::Message;

pub(crate) type BoxError = Box<dyn std::error::Error + Send + Sync>;
