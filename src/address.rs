//! Loose email address check and the SMTP envelope

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{error::Field, Error};

// one or more non-`@`, `@`, one or more non-`@`, `.`, one or more non-`@`
static ADDRESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@]+@[^@]+\.[^@]+$").expect("the address pattern is a valid regex")
});

/// Checks whether `address` looks like an email address.
///
/// This is a pattern check, not an RFC 5322 parser: the whole string must be
/// made of a local part, `@`, a domain, `.` and a top level label, none of
/// which contain another `@`.
///
/// ```
/// use smartrelay::address::is_valid_address;
///
/// assert!(is_valid_address("user@example.com"));
/// assert!(!is_valid_address("not-an-address"));
/// assert!(!is_valid_address("user@localhost"));
/// ```
pub fn is_valid_address(address: &str) -> bool {
    ADDRESS_RE.is_match(address)
}

/// Simple email envelope representation
///
/// The envelope is what the relay sees during the SMTP transaction, as opposed
/// to the `From`/`To` headers inside the message.
#[derive(PartialEq, Eq, Clone, Debug)]
pub struct Envelope {
    /// The envelope recipients' addresses
    ///
    /// This can not be empty.
    forward_path: Vec<String>,
    /// The envelope sender address
    reverse_path: String,
}

impl Envelope {
    /// Creates a new envelope, which may fail if `to` is empty.
    ///
    /// Recipients are kept in the given order and are not deduplicated.
    pub fn new<S: Into<String>>(from: S, to: Vec<String>) -> Result<Envelope, Error> {
        if to.is_empty() {
            return Err(Error::MissingField(Field::To));
        }
        Ok(Envelope {
            forward_path: to,
            reverse_path: from.into(),
        })
    }

    /// Gets the destination addresses of the envelope.
    pub fn to(&self) -> &[String] {
        self.forward_path.as_slice()
    }

    /// Gets the sender of the envelope.
    ///
    /// May be empty, which is sent as the null reverse path `<>`.
    pub fn from(&self) -> &str {
        &self.reverse_path
    }
}

impl From<&lettre::address::Envelope> for Envelope {
    fn from(envelope: &lettre::address::Envelope) -> Self {
        Envelope {
            forward_path: envelope.to().iter().map(ToString::to_string).collect(),
            reverse_path: envelope
                .from()
                .map(ToString::to_string)
                .unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::{is_valid_address, Envelope};

    #[test]
    fn accepts_loose_addresses() {
        for address in [
            "a@b.com",
            "first.last@sub.example.org",
            "x@y.z",
            "with space@example.com",
            "ünïcode@exämple.de",
        ] {
            assert!(is_valid_address(address), "{address} should be accepted");
        }
    }

    #[test]
    fn rejects_malformed_addresses() {
        for address in [
            "",
            "not-an-address",
            "@example.com",
            "user@",
            "user@localhost",
            "user@.com",
            "user@example.",
            "a@b@c.com",
            "a@b.c@d",
        ] {
            assert!(!is_valid_address(address), "{address} should be rejected");
        }
    }

    #[test]
    fn envelope_requires_recipients() {
        assert!(Envelope::new("a@x.com", vec![]).unwrap_err().is_argument());

        let envelope = Envelope::new(
            "a@x.com",
            vec!["b@y.com".to_owned(), "b@y.com".to_owned()],
        )
        .unwrap();
        assert_eq!(envelope.from(), "a@x.com");
        assert_eq!(envelope.to(), ["b@y.com", "b@y.com"]);
    }

    #[test]
    fn envelope_from_smtp_envelope() {
        let smtp = lettre::address::Envelope::new(
            Some("a@x.com".parse().unwrap()),
            vec!["b@y.com".parse().unwrap()],
        )
        .unwrap();
        let envelope = <Envelope as From<_>>::from(&smtp);
        assert_eq!(envelope.from(), "a@x.com");
        assert_eq!(envelope.to(), ["b@y.com"]);

        let smtp = lettre::address::Envelope::new(None, vec!["b@y.com".parse().unwrap()]).unwrap();
        assert_eq!(<Envelope as From<_>>::from(&smtp).from(), "");
    }
}
