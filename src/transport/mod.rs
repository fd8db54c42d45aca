//! ### Sending Messages
//!
//! A [`Transport`] knows how to reach a relay, and hands out a [`Connection`]
//! that carries any number of messages until it is closed.
//!
//! The following transports are available:
//!
//! * The [`SmtpTransport`](smtp::SmtpTransport) uses the SMTP protocol to send the
//!   messages over the network to an unauthenticated relay.
//! * The [`StubTransport`](stub::StubTransport) only records the messages it is given,
//!   and can be told to fail. It is useful for testing code that sends mail.

use std::error::Error as StdError;

use lettre::Message;

use crate::address::Envelope;

pub mod smtp;
pub mod stub;

/// Opens connections to a relay
pub trait Transport {
    /// The connection handed out by [`Transport::connect`]
    type Connection: Connection<Error = Self::Error>;
    /// The error type returned by the transport
    type Error: StdError + Send + Sync + 'static;

    /// Connects to the relay named by `server`
    fn connect(&self, server: &str) -> Result<Self::Connection, Self::Error>;
}

/// An open session with a relay
pub trait Connection {
    /// Response produced by the relay for each accepted message
    type Ok;
    /// The error type returned by the connection
    type Error;

    /// Sends the email to the recipients of its own envelope
    fn send(&mut self, message: &Message) -> Result<Self::Ok, Self::Error> {
        let raw = message.formatted();
        self.send_raw(&<Envelope as From<_>>::from(message.envelope()), &raw)
    }

    /// Sends already serialized bytes to the recipients of `envelope`
    fn send_raw(&mut self, envelope: &Envelope, email: &[u8]) -> Result<Self::Ok, Self::Error>;

    /// Ends the session
    fn close(&mut self) {}
}
