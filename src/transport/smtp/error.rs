//! Error type of the SMTP transport

use std::{error::Error as StdError, fmt};

use lettre::{address::AddressError, transport::smtp};

pub use lettre::transport::smtp::response::Code;

/// The errors that may occur while talking to the relay
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The relay address could not be understood
    Relay(String),
    /// An envelope address is refused by the SMTP client before anything is sent
    Address {
        /// The offending address
        address: String,
        /// Why the SMTP client refused it
        source: AddressError,
    },
    /// The envelope was refused by the SMTP client
    Envelope(lettre::error::Error),
    /// The relay could not be reached, refused a command, or broke the session
    Smtp(smtp::Error),
}

impl Error {
    /// Returns true if the relay address itself is malformed
    pub fn is_relay(&self) -> bool {
        matches!(self, Error::Relay(_))
    }

    /// Returns true if an envelope address could not be used
    pub fn is_address(&self) -> bool {
        matches!(self, Error::Address { .. } | Error::Envelope(_))
    }

    /// Returns true if the relay answered with a permanent error code
    pub fn is_permanent(&self) -> bool {
        matches!(self, Error::Smtp(e) if e.is_permanent())
    }

    /// Returns true if the relay answered with a transient error code
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Smtp(e) if e.is_transient())
    }

    /// Returns true if the relay did not answer in time
    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Smtp(e) if e.is_timeout())
    }

    /// The reply code, when the error comes from a relay reply
    pub fn status(&self) -> Option<Code> {
        match self {
            Error::Smtp(e) => e.status(),
            _ => None,
        }
    }
}

pub(crate) fn relay<M: Into<String>>(message: M) -> Error {
    Error::Relay(message.into())
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Relay(message) => f.write_str(message),
            Error::Address { address, source } => {
                write!(f, "address \"{address}\" refused by the smtp client: {source}")
            }
            Error::Envelope(e) => write!(f, "invalid envelope: {e}"),
            Error::Smtp(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Relay(_) => None,
            Error::Address { source, .. } => Some(source),
            Error::Envelope(e) => Some(e),
            Error::Smtp(e) => Some(e),
        }
    }
}

impl From<smtp::Error> for Error {
    fn from(err: smtp::Error) -> Error {
        Error::Smtp(err)
    }
}
