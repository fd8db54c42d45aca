//! Relay address parsing
//!
//! A relay can be named as `host`, `host:port`, `[ipv6]`, `[ipv6]:port`,
//! a bare IPv6 address, or a connection URL `smtp://host[:port]`.

use url::{Host, Url};

use super::{error, Error};

/// Splits a relay address into a host and a port
pub(crate) fn parse_server(server: &str, default_port: u16) -> Result<(String, u16), Error> {
    let server = server.trim();
    if server.is_empty() {
        return Err(error::relay("no relay server configured"));
    }

    if server.contains("://") {
        return from_connection_url(server, default_port);
    }

    if let Some(rest) = server.strip_prefix('[') {
        let (host, rest) = rest
            .split_once(']')
            .ok_or_else(|| error::relay(format!("unterminated IPv6 address in {server:?}")))?;
        let port = match rest {
            "" => default_port,
            _ => match rest.strip_prefix(':') {
                Some(port) => parse_port(server, port)?,
                None => return Err(error::relay(format!("invalid relay address {server:?}"))),
            },
        };
        return Ok((host.to_owned(), port));
    }

    match server.split_once(':') {
        // more than one colon: a bare IPv6 address
        Some((_, rest)) if rest.contains(':') => Ok((server.to_owned(), default_port)),
        Some((host, port)) if !host.is_empty() => Ok((host.to_owned(), parse_port(server, port)?)),
        Some(_) => Err(error::relay(format!("missing host in {server:?}"))),
        None => Ok((server.to_owned(), default_port)),
    }
}

fn parse_port(server: &str, port: &str) -> Result<u16, Error> {
    port.parse()
        .map_err(|_| error::relay(format!("invalid port in relay address {server:?}")))
}

fn from_connection_url(connection_url: &str, default_port: u16) -> Result<(String, u16), Error> {
    let connection_url = Url::parse(connection_url)
        .map_err(|e| error::relay(format!("invalid relay url {connection_url:?}: {e}")))?;

    if connection_url.scheme() != "smtp" {
        return Err(error::relay(format!(
            "unknown scheme '{}', only plain 'smtp' relays are supported",
            connection_url.scheme()
        )));
    }

    let host = match connection_url.host() {
        Some(Host::Domain(domain)) => domain.to_owned(),
        Some(Host::Ipv4(ip)) => ip.to_string(),
        Some(Host::Ipv6(ip)) => ip.to_string(),
        None => return Err(error::relay("smtp host undefined")),
    };

    Ok((host, connection_url.port().unwrap_or(default_port)))
}
