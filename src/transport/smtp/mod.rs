//! The SMTP transport sends emails to an unauthenticated relay.
//!
//! The protocol itself is spoken by lettre's SMTP client, over plain TCP.
//! This module resolves the relay address, opens one client session per
//! [`Transport::connect`] and feeds it [`Envelope`]s from this crate.
//!
//! Relying on lettre means the session handles 8BITMIME and SMTPUTF8 when the
//! relay announces them, and refuses to send non-ASCII content otherwise.
//!
//! #### Example
//!
//! ```rust,no_run
//! use smartrelay::{transport::smtp::SmtpTransport, Connection, Envelope, Transport};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let envelope = Envelope::new("nobody@domain.tld", vec!["hei@domain.tld".to_owned()])?;
//!
//! let transport = SmtpTransport::builder().port(2525).build();
//! let mut conn = transport.connect("localhost")?;
//! conn.send_raw(&envelope, b"Subject: Happy new year\r\n\r\nBe happy!\r\n")?;
//! conn.close();
//! # Ok(())
//! # }
//! ```

use std::{fmt, time::Duration};

use lettre::{address::Address, transport::smtp::client};

use self::connection_url::parse_server;
pub use self::error::{Code, Error};
pub use lettre::transport::smtp::{extension::ClientId, response::Response};
use crate::{address::Envelope, transport::Connection, Transport};

mod connection_url;
mod error;

/// Default smtp port
pub const SMTP_PORT: u16 = 25;

/// Default timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Sends emails to an unauthenticated relay using the SMTP protocol
///
/// The relay itself is named at [`Transport::connect`] time, the transport
/// only holds the connection settings.
#[derive(Debug, Clone)]
pub struct SmtpTransport {
    port: u16,
    hello_name: ClientId,
    timeout: Option<Duration>,
}

impl Default for SmtpTransport {
    fn default() -> Self {
        SmtpTransport::builder().build()
    }
}

impl SmtpTransport {
    /// Creates a new transport builder with the default settings
    pub fn builder() -> SmtpTransportBuilder {
        SmtpTransportBuilder::new()
    }

    /// Port used when the relay address does not name one
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Name sent with `EHLO`
    pub fn hello_name(&self) -> &ClientId {
        &self.hello_name
    }

    /// Read, write and connect timeout
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Transport for SmtpTransport {
    type Connection = SmtpConnection;
    type Error = Error;

    fn connect(&self, server: &str) -> Result<SmtpConnection, Error> {
        let (host, port) = parse_server(server, self.port)?;

        #[cfg(feature = "tracing")]
        tracing::debug!("connecting to {}:{}", host, port);

        let inner = client::SmtpConnection::connect(
            (host.as_str(), port),
            self.timeout,
            &self.hello_name,
            None,
            None,
        )?;
        Ok(SmtpConnection {
            inner,
            relay: format!("{host}:{port}"),
        })
    }
}

/// A session with the relay, opened by [`SmtpTransport`]
pub struct SmtpConnection {
    inner: client::SmtpConnection,
    relay: String,
}

impl SmtpConnection {
    /// The relay this session talks to, as `host:port`
    pub fn relay(&self) -> &str {
        &self.relay
    }

    /// Whether the session can no longer be used
    pub fn has_broken(&self) -> bool {
        self.inner.has_broken()
    }
}

impl fmt::Debug for SmtpConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConnection")
            .field("relay", &self.relay)
            .field("broken", &self.inner.has_broken())
            .finish()
    }
}

impl Connection for SmtpConnection {
    type Ok = Response;
    type Error = Error;

    fn send_raw(&mut self, envelope: &Envelope, email: &[u8]) -> Result<Response, Error> {
        let envelope = smtp_envelope(envelope)?;
        Ok(self.inner.send(&envelope, email)?)
    }

    fn close(&mut self) {
        if self.inner.has_broken() {
            return;
        }
        if let Err(_err) = self.inner.quit() {
            #[cfg(feature = "tracing")]
            tracing::debug!(relay = self.relay.as_str(), "QUIT failed: {}", _err);
        }
    }
}

fn smtp_address(address: &str) -> Result<Address, Error> {
    address.parse().map_err(|source| Error::Address {
        address: address.to_owned(),
        source,
    })
}

// An empty reverse path becomes the null sender `<>`.
fn smtp_envelope(envelope: &Envelope) -> Result<lettre::address::Envelope, Error> {
    let from = match envelope.from() {
        "" => None,
        from => Some(smtp_address(from)?),
    };
    let to = envelope
        .to()
        .iter()
        .map(|address| smtp_address(address))
        .collect::<Result<Vec<_>, _>>()?;

    lettre::address::Envelope::new(from, to).map_err(Error::Envelope)
}

/// Contains client configuration.
/// Instances of this struct can be created using functions of [`SmtpTransport`].
#[derive(Debug, Clone)]
pub struct SmtpTransportBuilder {
    port: u16,
    hello_name: ClientId,
    timeout: Option<Duration>,
}

impl Default for SmtpTransportBuilder {
    fn default() -> Self {
        SmtpTransportBuilder::new()
    }
}

/// Builder for the SMTP `SmtpTransport`
impl SmtpTransportBuilder {
    fn new() -> Self {
        Self {
            port: SMTP_PORT,
            hello_name: ClientId::default(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }

    /// Set the name used during EHLO
    pub fn hello_name(mut self, name: ClientId) -> Self {
        self.hello_name = name;
        self
    }

    /// Set the timeout duration, `None` blocks forever
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the port used when the relay address has none
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Build the transport
    pub fn build(self) -> SmtpTransport {
        SmtpTransport {
            port: self.port,
            hello_name: self.hello_name,
            timeout: self.timeout,
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::{smtp_envelope, ClientId, SmtpTransport, DEFAULT_TIMEOUT, SMTP_PORT};
    use crate::{Envelope, Transport};

    #[test]
    fn builder_defaults() {
        let transport = SmtpTransport::default();
        assert_eq!(transport.port(), SMTP_PORT);
        assert_eq!(transport.timeout(), Some(DEFAULT_TIMEOUT));
    }

    #[test]
    fn builder_settings() {
        let transport = SmtpTransport::builder()
            .port(2525)
            .hello_name(ClientId::Domain("client.example.com".into()))
            .timeout(Some(Duration::from_secs(5)))
            .build();
        assert_eq!(transport.port(), 2525);
        assert_eq!(
            transport.hello_name(),
            &ClientId::Domain("client.example.com".into())
        );
        assert_eq!(transport.timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn empty_server_is_a_relay_error() {
        let err = SmtpTransport::default().connect("").unwrap_err();
        assert!(err.is_relay());
    }

    #[test]
    fn envelope_conversion() {
        let envelope =
            Envelope::new("a@x.com", vec!["b@y.com".to_owned(), "c@z.com".to_owned()]).unwrap();
        let converted = smtp_envelope(&envelope).unwrap();

        assert_eq!(
            converted.from().map(ToString::to_string),
            Some("a@x.com".to_owned())
        );
        let to: Vec<String> = converted.to().iter().map(ToString::to_string).collect();
        assert_eq!(to, ["b@y.com", "c@z.com"]);
    }

    #[test]
    fn empty_sender_is_the_null_path() {
        let envelope = Envelope::new("", vec!["b@y.com".to_owned()]).unwrap();
        assert_eq!(smtp_envelope(&envelope).unwrap().from(), None);
    }

    #[test]
    fn loose_address_is_refused_before_sending() {
        let envelope = Envelope::new("a@x.com", vec!["with space@example.com".to_owned()]).unwrap();
        let err = smtp_envelope(&envelope).unwrap_err();

        assert!(err.is_address());
        assert!(err.to_string().contains("with space@example.com"));
    }
}
