//! The mail record
//!
//! A [`Mail`] holds the addressing and content of one outgoing message. Every
//! address written to it goes through [`is_valid_address`]: a bad sender is
//! refused, bad recipients are dropped from their group.
//!
//! [`Mail::to_message`] turns the record into a lettre [`Message`].

use std::{
    fs,
    path::{Path, PathBuf},
};

use lettre::{
    message::{
        header::{self, ContentTransferEncoding, ContentType},
        Attachment, Body, Mailbox, Mailboxes, MultiPart, SinglePart,
    },
    Address, Message,
};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    address::{is_valid_address, Envelope},
    error::Field,
    Error,
};

static HTML_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<html[^>]*>").expect("the html pattern is a valid regex"));

static OCTET_STREAM: Lazy<ContentType> = Lazy::new(|| {
    ContentType::parse("application/octet-stream").expect("octet-stream is a valid content type")
});

/// One of the three recipient groups of a mail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum RecipientGroup {
    To,
    Cc,
    Bcc,
}

impl RecipientGroup {
    /// All groups, in header and envelope order
    pub const ALL: [RecipientGroup; 3] = [
        RecipientGroup::To,
        RecipientGroup::Cc,
        RecipientGroup::Bcc,
    ];
}

/// Recipients given for a group: a lone address or an ordered list
///
/// Built from `&str`, `String`, slices, arrays and vectors of either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    One(String),
    Many(Vec<String>),
}

impl Recipients {
    /// An empty string or an empty list, which counts as not supplied
    pub fn is_empty(&self) -> bool {
        match self {
            Recipients::One(address) => address.is_empty(),
            Recipients::Many(addresses) => addresses.is_empty(),
        }
    }
}

impl From<&str> for Recipients {
    fn from(address: &str) -> Self {
        Recipients::One(address.to_owned())
    }
}

impl From<String> for Recipients {
    fn from(address: String) -> Self {
        Recipients::One(address)
    }
}

impl From<&[&str]> for Recipients {
    fn from(addresses: &[&str]) -> Self {
        Recipients::Many(addresses.iter().map(|&a| a.to_owned()).collect())
    }
}

impl<S: Into<String>> From<Vec<S>> for Recipients {
    fn from(addresses: Vec<S>) -> Self {
        Recipients::Many(addresses.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>, const N: usize> From<[S; N]> for Recipients {
    fn from(addresses: [S; N]) -> Self {
        Recipients::Many(addresses.into_iter().map(Into::into).collect())
    }
}

/// Attachments given to a mail: a lone path or an ordered list of paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachments {
    One(PathBuf),
    Many(Vec<PathBuf>),
}

impl Attachments {
    pub fn is_empty(&self) -> bool {
        match self {
            Attachments::One(path) => path.as_os_str().is_empty(),
            Attachments::Many(paths) => paths.is_empty(),
        }
    }

    pub(crate) fn into_vec(self) -> Vec<PathBuf> {
        match self {
            Attachments::One(path) => vec![path],
            Attachments::Many(paths) => paths,
        }
    }
}

impl From<&str> for Attachments {
    fn from(path: &str) -> Self {
        Attachments::One(path.into())
    }
}

impl From<String> for Attachments {
    fn from(path: String) -> Self {
        Attachments::One(path.into())
    }
}

impl From<&Path> for Attachments {
    fn from(path: &Path) -> Self {
        Attachments::One(path.to_owned())
    }
}

impl From<PathBuf> for Attachments {
    fn from(path: PathBuf) -> Self {
        Attachments::One(path)
    }
}

impl<P: Into<PathBuf>> From<Vec<P>> for Attachments {
    fn from(paths: Vec<P>) -> Self {
        Attachments::Many(paths.into_iter().map(Into::into).collect())
    }
}

impl<P: Into<PathBuf>, const N: usize> From<[P; N]> for Attachments {
    fn from(paths: [P; N]) -> Self {
        Attachments::Many(paths.into_iter().map(Into::into).collect())
    }
}

/// One outgoing message
///
/// ```
/// use smartrelay::{Mail, RecipientGroup};
///
/// let mut mail = Mail::new();
/// mail.set_sender("reports@example.com").unwrap();
///
/// let dropped = mail.set_group(RecipientGroup::To, ["alice@example.org", "bogus"]);
/// assert_eq!(dropped, ["bogus"]);
/// assert_eq!(mail.to(), ["alice@example.org"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Mail {
    sender: String,
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    subject: String,
    body: String,
    attachments: Vec<PathBuf>,
}

impl Mail {
    /// An empty mail: no sender, no recipients, empty subject and body
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sender, if it looks like an email address
    ///
    /// An invalid address leaves the previous sender in place.
    pub fn set_sender<S: Into<String>>(&mut self, address: S) -> Result<(), Error> {
        let address = address.into();
        if !is_valid_address(&address) {
            return Err(Error::InvalidAddress(address));
        }
        self.sender = address;
        Ok(())
    }

    /// Replaces one recipient group, returning the addresses that were dropped
    ///
    /// Invalid addresses are left out of the group. Empty input is ignored
    /// and leaves the group untouched; any other input discards the previous
    /// content of the group, even when nothing in it is valid.
    pub fn set_group<R: Into<Recipients>>(
        &mut self,
        group: RecipientGroup,
        recipients: R,
    ) -> Vec<String> {
        let recipients = recipients.into();
        if recipients.is_empty() {
            return Vec::new();
        }

        let addresses = match recipients {
            Recipients::One(address) => vec![address],
            Recipients::Many(addresses) => addresses,
        };
        let (valid, dropped): (Vec<String>, Vec<String>) = addresses
            .into_iter()
            .partition(|address| is_valid_address(address));

        #[cfg(feature = "tracing")]
        for address in &dropped {
            tracing::warn!(?group, address = address.as_str(), "dropping invalid recipient");
        }

        *self.group_mut(group) = valid;
        dropped
    }

    /// Replaces each supplied recipient group, returning every dropped address
    pub fn set_recipients(
        &mut self,
        to: Option<Recipients>,
        cc: Option<Recipients>,
        bcc: Option<Recipients>,
    ) -> Vec<String> {
        let mut dropped = Vec::new();
        for (group, recipients) in RecipientGroup::ALL.into_iter().zip([to, cc, bcc]) {
            if let Some(recipients) = recipients {
                dropped.extend(self.set_group(group, recipients));
            }
        }
        dropped
    }

    pub fn set_subject<S: Into<String>>(&mut self, subject: S) {
        self.subject = subject.into();
    }

    pub fn set_message<S: Into<String>>(&mut self, body: S) {
        self.body = body.into();
    }

    /// Appends an attachment, if `path` is an existing regular file
    ///
    /// The file is only read when the message is built.
    pub fn add_attachment<P: Into<PathBuf>>(&mut self, path: P) -> Result<(), Error> {
        let path = path.into();
        if !path.is_file() {
            return Err(Error::attachment(path, None));
        }
        self.attachments.push(path);
        Ok(())
    }

    /// The sender, empty until set
    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn recipients(&self, group: RecipientGroup) -> &[String] {
        match group {
            RecipientGroup::To => &self.to,
            RecipientGroup::Cc => &self.cc,
            RecipientGroup::Bcc => &self.bcc,
        }
    }

    pub fn to(&self) -> &[String] {
        &self.to
    }

    pub fn cc(&self) -> &[String] {
        &self.cc
    }

    pub fn bcc(&self) -> &[String] {
        &self.bcc
    }

    /// `to`, then `cc`, then `bcc`, without deduplication
    pub fn all_recipients(&self) -> Vec<String> {
        RecipientGroup::ALL
            .into_iter()
            .flat_map(|group| self.recipients(group).iter().cloned())
            .collect()
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn attachments(&self) -> &[PathBuf] {
        &self.attachments
    }

    /// Whether the body starts with an `<html ...>` tag
    pub fn is_html(&self) -> bool {
        HTML_RE.is_match(&self.body)
    }

    /// The SMTP envelope: the sender and every recipient of every group
    pub fn envelope(&self) -> Result<Envelope, Error> {
        Envelope::new(self.sender.clone(), self.all_recipients())
    }

    /// Checks that the headers of this mail can be written
    ///
    /// The subject and the sender must be single lines, and every address
    /// must also be accepted by lettre's stricter parser, which the loose
    /// check lets through things like `with space@example.com`.
    pub fn check_headers(&self) -> Result<(), Error> {
        for (field, value) in [(Field::Sender, &self.sender), (Field::Subject, &self.subject)] {
            if value.contains(['\r', '\n']) {
                return Err(Error::LineBreak(field));
            }
        }

        address(&self.sender)?;
        for recipient in self.all_recipients() {
            address(&recipient)?;
        }
        Ok(())
    }

    /// Builds the `multipart/mixed` message sent to the relay
    ///
    /// The headers come in the order `Subject`, `To`, `Cc`, `Bcc`, `From`.
    /// Unlike lettre's default, `Bcc` is kept in the message.
    ///
    /// Attachments are checked and read again at this point, so a file
    /// removed since [`add_attachment`](Mail::add_attachment) fails here.
    pub fn to_message(&self) -> Result<Message, Error> {
        self.check_headers()?;

        let text = if self.is_html() {
            SinglePart::html(self.body.clone())
        } else {
            SinglePart::plain(self.body.clone())
        };

        let mut body = MultiPart::mixed().singlepart(text);
        for path in &self.attachments {
            body = body.singlepart(attachment_part(path)?);
        }

        let recipients = self
            .all_recipients()
            .iter()
            .map(|recipient| address(recipient))
            .collect::<Result<Vec<_>, _>>()?;
        let envelope = lettre::address::Envelope::new(Some(address(&self.sender)?), recipients)?;

        let message = Message::builder()
            .subject(self.subject.clone())
            .header(header::To::from(mailboxes(&self.to)?))
            .header(header::Cc::from(mailboxes(&self.cc)?))
            .header(header::Bcc::from(mailboxes(&self.bcc)?))
            .from(Mailbox::new(None, address(&self.sender)?))
            .envelope(envelope)
            .keep_bcc()
            .multipart(body)?;
        Ok(message)
    }

    fn group_mut(&mut self, group: RecipientGroup) -> &mut Vec<String> {
        match group {
            RecipientGroup::To => &mut self.to,
            RecipientGroup::Cc => &mut self.cc,
            RecipientGroup::Bcc => &mut self.bcc,
        }
    }
}

fn address(address: &str) -> Result<Address, Error> {
    address
        .parse()
        .map_err(|_| Error::InvalidAddress(address.to_owned()))
}

fn mailboxes(addresses: &[String]) -> Result<Mailboxes, Error> {
    let mailboxes = addresses
        .iter()
        .map(|a| address(a).map(|a| Mailbox::new(None, a)))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Mailboxes::from(mailboxes))
}

fn attachment_part(path: &Path) -> Result<SinglePart, Error> {
    if !path.is_file() {
        return Err(Error::attachment(path, None));
    }
    let content = fs::read(path).map_err(|e| Error::attachment(path, Some(e)))?;
    let filename = path
        .file_name()
        .unwrap_or(path.as_os_str())
        .to_string_lossy()
        .into_owned();

    let body = Body::new_with_encoding(content, ContentTransferEncoding::Base64)
        .unwrap_or_else(Body::new);
    Ok(Attachment::new(filename).body(body, OCTET_STREAM.clone()))
}

#[cfg(test)]
mod test {
    use std::{fs, io::Write};

    use pretty_assertions::assert_eq;

    use super::{Attachments, Mail, RecipientGroup, Recipients};
    use crate::{error::Field, Error};

    fn mail() -> Mail {
        let mut mail = Mail::new();
        mail.set_sender("a@x.com").unwrap();
        mail.set_group(RecipientGroup::To, "b@y.com");
        mail.set_subject("s");
        mail.set_message("hello");
        mail
    }

    #[test]
    fn invalid_sender_keeps_previous() {
        let mut mail = Mail::new();
        mail.set_sender("a@x.com").unwrap();

        let err = mail.set_sender("not-an-address").unwrap_err();
        assert!(err.is_argument());
        assert_eq!(mail.sender(), "a@x.com");
    }

    #[test]
    fn invalid_addresses_are_dropped() {
        let mut mail = Mail::new();
        let dropped = mail.set_group(RecipientGroup::To, ["good@x.com", "bad"]);

        assert_eq!(mail.to(), ["good@x.com"]);
        assert_eq!(dropped, ["bad"]);
    }

    #[test]
    fn lone_invalid_string_empties_group() {
        let mut mail = Mail::new();
        mail.set_group(RecipientGroup::Cc, vec!["c@x.com", "d@x.com"]);
        mail.set_group(RecipientGroup::Cc, "bad");

        assert!(mail.cc().is_empty());
    }

    #[test]
    fn empty_input_is_ignored() {
        let mut mail = Mail::new();
        mail.set_group(RecipientGroup::Bcc, "c@x.com");

        assert!(mail.set_group(RecipientGroup::Bcc, "").is_empty());
        assert!(mail
            .set_group(RecipientGroup::Bcc, Vec::<String>::new())
            .is_empty());
        assert_eq!(mail.bcc(), ["c@x.com"]);
    }

    #[test]
    fn set_recipients_touches_supplied_groups_only() {
        let mut mail = Mail::new();
        mail.set_recipients(
            Some(Recipients::from(["t1@x.com", "t2@x.com"])),
            Some(Recipients::from("c@x.com")),
            None,
        );
        let dropped = mail.set_recipients(None, Some(Recipients::from("nope")), None);

        assert_eq!(dropped, ["nope"]);
        assert_eq!(mail.to(), ["t1@x.com", "t2@x.com"]);
        assert!(mail.cc().is_empty());
        assert!(mail.bcc().is_empty());
    }

    #[test]
    fn recipients_conversions() {
        let slice: &[&str] = &["a@x.com", "b@x.com"];
        assert_eq!(
            Recipients::from(slice),
            Recipients::Many(vec!["a@x.com".to_owned(), "b@x.com".to_owned()])
        );
        assert_eq!(
            Recipients::from(String::from("a@x.com")),
            Recipients::One("a@x.com".to_owned())
        );
        assert!(Recipients::from(Vec::<&str>::new()).is_empty());
        assert!(Attachments::from("").is_empty());
        assert_eq!(
            Attachments::from(["a.txt", "b.txt"]).into_vec().len(),
            2
        );
    }

    #[test]
    fn envelope_concatenates_groups() {
        let mut mail = mail();
        mail.set_group(RecipientGroup::Cc, "b@y.com");
        mail.set_group(RecipientGroup::Bcc, "z@y.com");

        let envelope = mail.envelope().unwrap();
        assert_eq!(envelope.from(), "a@x.com");
        assert_eq!(envelope.to(), ["b@y.com", "b@y.com", "z@y.com"]);
    }

    #[test]
    fn html_detection() {
        let mut mail = mail();
        assert!(!mail.is_html());

        mail.set_message("<html lang=\"en\"><body>hi</body></html>");
        assert!(mail.is_html());

        mail.set_message(" <html>indented</html>");
        assert!(!mail.is_html());
    }

    #[test]
    fn text_part_subtype_follows_body() {
        let mut mail = mail();
        mail.set_message("<html><p>hello</p></html>");

        let formatted = String::from_utf8(mail.to_message().unwrap().formatted()).unwrap();
        assert!(formatted.contains("Content-Type: text/html; charset=utf-8\r\n"));
        assert!(!formatted.contains("text/plain"));

        mail.set_message("plain <html> later");
        let formatted = String::from_utf8(mail.to_message().unwrap().formatted()).unwrap();
        assert!(formatted.contains("Content-Type: text/plain; charset=utf-8\r\n"));
    }

    #[test]
    fn headers_and_envelope() {
        let mut mail = mail();
        mail.set_group(RecipientGroup::Bcc, "hidden@z.com");

        let message = mail.to_message().unwrap();
        let formatted = String::from_utf8(message.formatted()).unwrap();
        assert!(formatted.starts_with("Subject: s\r\n"));
        assert!(formatted.contains("To: b@y.com\r\n"));
        assert!(formatted.contains("Bcc: hidden@z.com\r\n"));
        assert!(formatted.contains("From: a@x.com\r\n"));

        let to: Vec<String> = message.envelope().to().iter().map(ToString::to_string).collect();
        assert_eq!(to, ["b@y.com", "hidden@z.com"]);
    }

    #[test]
    fn line_break_in_subject() {
        let mut mail = mail();
        mail.set_subject("hi\r\nBcc: victim@evil.com");

        assert!(matches!(
            mail.check_headers(),
            Err(Error::LineBreak(Field::Subject))
        ));
        assert!(mail.to_message().is_err());
    }

    #[test]
    fn loose_address_fails_the_header_check() {
        let mut mail = mail();
        mail.set_group(RecipientGroup::Cc, "with space@example.com");
        assert_eq!(mail.cc(), ["with space@example.com"]);

        match mail.check_headers() {
            Err(Error::InvalidAddress(address)) => assert_eq!(address, "with space@example.com"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn attachment_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        let mut mail = mail();

        let err = mail
            .add_attachment(dir.path().join("missing.pdf"))
            .unwrap_err();
        assert!(err.is_attachment());

        let err = mail.add_attachment(dir.path()).unwrap_err();
        assert!(err.is_attachment());
        assert!(mail.attachments().is_empty());
    }

    #[test]
    fn attachment_is_encoded_with_basename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        fs::File::create(&path)
            .unwrap()
            .write_all(b"a,b\n1,2\n")
            .unwrap();

        let mut mail = mail();
        mail.add_attachment(&path).unwrap();

        let formatted = String::from_utf8(mail.to_message().unwrap().formatted()).unwrap();
        assert!(formatted.contains("Content-Disposition: attachment; filename=\"report.csv\"\r\n"));
        assert!(formatted.contains("Content-Type: application/octet-stream\r\n"));
        assert!(formatted.contains("\r\n\r\nYSxiCjEsMgo=\r\n"));
    }

    #[test]
    fn attachment_removed_before_build() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let mut mail = mail();
        mail.add_attachment(file.path()).unwrap();

        let path = file.path().to_owned();
        drop(file);

        let err = mail.to_message().unwrap_err();
        assert!(err.is_attachment());
        assert!(err.to_string().contains(&*path.to_string_lossy()));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_round_trip() {
        let mail = mail();
        let json = serde_json::to_string(&mail).unwrap();

        assert_eq!(serde_json::from_str::<Mail>(&json).unwrap(), mail);
    }
}
