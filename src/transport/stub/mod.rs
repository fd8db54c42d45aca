//! The stub transport only records the messages it is given. It can be
//! used for testing purposes.
//!
//! #### Stub Transport
//!
//! Every clone of a [`StubTransport`] shares the same log, so a copy kept by
//! the test sees what the code under test transmitted.
//!
//! ```rust
//! use smartrelay::{transport::stub::StubTransport, MailDraft, Sender};
//!
//! # use std::error::Error;
//! # fn main() -> Result<(), Box<dyn Error>> {
//! let stub = StubTransport::new_ok();
//! let mut sender = Sender::with_transport("relay.example.com", stub.clone());
//!
//! sender.new_mail(
//!     MailDraft::new()
//!         .sender("a@x.com")
//!         .to("b@y.com")
//!         .subject("hi")
//!         .message("hello"),
//! )?;
//! assert!(sender.send().is_success());
//!
//! let messages = stub.messages();
//! assert_eq!(messages.len(), 1);
//! assert_eq!(messages[0].0.to(), ["b@y.com"]);
//! # Ok(())
//! # }
//! ```

use std::{
    error::Error as StdError,
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{address::Envelope, transport::Connection, Transport};

/// An error returned by the stub transport
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// The transport was built with [`StubTransport::new_unreachable`]
    ConnectionRefused,
    /// The transport was built with [`StubTransport::new_failing_at`]
    MessageRejected,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Error::ConnectionRefused => "stub connection refused",
            Error::MessageRejected => "stub message rejected",
        })
    }
}

impl StdError for Error {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behaviour {
    Accept,
    Unreachable,
    // 1-based index of the transmission that fails
    FailAt(usize),
}

#[derive(Debug, Default)]
struct Log {
    messages: Vec<(Envelope, String)>,
    servers: Vec<String>,
    attempts: usize,
    closed: usize,
}

/// This transport records the emails it receives and never sends them
#[derive(Debug, Clone)]
pub struct StubTransport {
    behaviour: Behaviour,
    log: Arc<Mutex<Log>>,
}

impl StubTransport {
    fn new(behaviour: Behaviour) -> StubTransport {
        StubTransport {
            behaviour,
            log: Arc::default(),
        }
    }

    /// Creates a new transport that accepts every connection and message
    pub fn new_ok() -> StubTransport {
        Self::new(Behaviour::Accept)
    }

    /// Creates a new transport that refuses every connection
    pub fn new_unreachable() -> StubTransport {
        Self::new(Behaviour::Unreachable)
    }

    /// Creates a new transport that rejects the `n`-th message it is given,
    /// counting from 1 over its whole lifetime, and accepts all others
    pub fn new_failing_at(n: usize) -> StubTransport {
        Self::new(Behaviour::FailAt(n))
    }

    /// The accepted envelopes and messages, in transmission order
    pub fn messages(&self) -> Vec<(Envelope, String)> {
        self.log().messages.clone()
    }

    /// The server names passed to every successful `connect`
    pub fn connections(&self) -> Vec<String> {
        self.log().servers.clone()
    }

    /// How many connections were closed
    pub fn closed(&self) -> usize {
        self.log().closed
    }

    fn log(&self) -> MutexGuard<'_, Log> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for StubTransport {
    type Connection = StubConnection;
    type Error = Error;

    fn connect(&self, server: &str) -> Result<StubConnection, Error> {
        if self.behaviour == Behaviour::Unreachable {
            return Err(Error::ConnectionRefused);
        }

        self.log().servers.push(server.to_owned());
        Ok(StubConnection {
            transport: self.clone(),
        })
    }
}

/// A session opened by [`StubTransport`]
#[derive(Debug)]
pub struct StubConnection {
    transport: StubTransport,
}

impl Connection for StubConnection {
    type Ok = ();
    type Error = Error;

    fn send_raw(&mut self, envelope: &Envelope, email: &[u8]) -> Result<(), Error> {
        let mut log = self.transport.log();
        log.attempts += 1;
        if self.transport.behaviour == Behaviour::FailAt(log.attempts) {
            return Err(Error::MessageRejected);
        }

        #[cfg(feature = "tracing")]
        tracing::info!(
            "{} -> {:?}: {} bytes",
            envelope.from(),
            envelope.to(),
            email.len()
        );

        log.messages
            .push((envelope.clone(), String::from_utf8_lossy(email).into_owned()));
        Ok(())
    }

    fn close(&mut self) {
        self.transport.log().closed += 1;
    }
}
