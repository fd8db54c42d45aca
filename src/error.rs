//! Error type for mail construction and dispatch

use std::{
    error::Error as StdError,
    fmt::{self, Display, Formatter},
    io,
    path::PathBuf,
};

use crate::BoxError;

/// A required field of [`MailDraft`](crate::MailDraft)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// The sender address
    Sender,
    /// The `to` recipient group
    To,
    /// The subject line
    Subject,
    /// The message body
    Message,
}

impl Display for Field {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Sender => "sender",
            Field::To => "to",
            Field::Subject => "subject",
            Field::Message => "message",
        })
    }
}

/// Errors raised while building mails or dispatching the mail pool
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// A required field was not supplied, or was empty
    MissingField(Field),
    /// The address does not look like an email address
    InvalidAddress(String),
    /// Every address given for the `to` group was rejected
    NoValidRecipient,
    /// A field that ends up in a header line contains a line break
    LineBreak(Field),
    /// The attachment does not reference an accessible regular file
    Attachment {
        /// Path of the offending attachment
        path: PathBuf,
        /// Underlying I/O error, if the file could not be read
        source: Option<io::Error>,
    },
    /// The message could not be assembled
    Message(lettre::error::Error),
    /// The connection to the relay could not be established
    Connection(BoxError),
    /// The relay refused the message, or the connection broke while sending it
    Transport(BoxError),
}

impl Error {
    pub(crate) fn attachment<P: Into<PathBuf>>(path: P, source: Option<io::Error>) -> Error {
        Error::Attachment {
            path: path.into(),
            source,
        }
    }

    /// Returns true for malformed or missing input to a construction call
    pub fn is_argument(&self) -> bool {
        matches!(
            self,
            Error::MissingField(_)
                | Error::InvalidAddress(_)
                | Error::NoValidRecipient
                | Error::LineBreak(_)
        )
    }

    /// Returns true if an attachment was missing or unreadable
    pub fn is_attachment(&self) -> bool {
        matches!(self, Error::Attachment { .. })
    }

    /// Returns true if the relay could not be reached
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }

    /// Returns true if a message failed after the connection was established
    pub fn is_transport(&self) -> bool {
        matches!(self, Error::Transport(_))
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::MissingField(Field::Sender) => f.write_str("no sender address indicated"),
            Error::MissingField(Field::To) => {
                f.write_str("cannot send email to an empty recipient list")
            }
            Error::MissingField(field) => write!(f, "cannot send email with empty {field} field"),
            Error::InvalidAddress(address) => write!(f, "invalid email address \"{address}\""),
            Error::NoValidRecipient => f.write_str("no valid address in the to recipient list"),
            Error::LineBreak(field) => write!(f, "line break in {field} field"),
            Error::Attachment { path, source: None } => {
                write!(f, "attachment \"{}\" not accessible", path.display())
            }
            Error::Attachment {
                path,
                source: Some(e),
            } => write!(f, "cannot add attachment \"{}\": {e}", path.display()),
            Error::Message(e) => write!(f, "cannot build message: {e}"),
            Error::Connection(e) => write!(f, "cannot connect to relay: {e}"),
            Error::Transport(e) => write!(f, "cannot transmit message: {e}"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Attachment {
                source: Some(e), ..
            } => Some(e),
            Error::Message(e) => Some(e),
            Error::Connection(e) | Error::Transport(e) => {
                let r: &(dyn StdError + 'static) = &**e;
                Some(r)
            }
            _ => None,
        }
    }
}

impl From<lettre::error::Error> for Error {
    fn from(err: lettre::error::Error) -> Error {
        Error::Message(err)
    }
}
