//! The HTTP/1.x upgrade handshake (RFC 6455 §4).

use std::{
    fmt::{self, Display, Formatter},
    io,
};

use base64::{engine::general_purpose, Engine as _};
use rand::{rngs::StdRng, RngCore, SeedableRng};
use sha1::{Digest, Sha1};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::{http, net::buf::ConnBuf};

/// The GUID every accept key is derived from (RFC 6455 §1.3).
pub const PROTOCOL_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only WebSocket protocol version spoken here.
pub const VERSION: &str = "13";

/// Errors during the upgrade handshake.
#[derive(Debug)]
pub enum Error {
    /// The client's upgrade request failed validation.
    BadHandshake,

    /// The server answered with something other than 101.
    Rejected,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadHandshake => write!(f, "bad handshake"),
            Error::Rejected => write!(f, "server rejected handshake"),
        }
    }
}

impl std::error::Error for Error {}

fn bad_handshake() -> io::Error {
    io::Error::new(io::ErrorKind::Other, Error::BadHandshake)
}

/// Derives the `Sec-WebSocket-Accept` value for a client key: the
/// base64 form of the SHA-1 of the key as it appeared on the wire,
/// concatenated with the protocol GUID.
pub fn accept_key(key: &str) -> String {
    let mut sha = Sha1::new();
    sha.update(key.as_bytes());
    sha.update(PROTOCOL_GUID.as_bytes());

    general_purpose::STANDARD.encode(sha.finalize())
}

/// Generates a fresh 16-octet client nonce in its base64 form.
pub fn new_client_key() -> String {
    let mut nonce = [0u8; 16];
    let mut rng = StdRng::from_entropy();
    rng.fill_bytes(&mut nonce);

    general_purpose::STANDARD.encode(nonce)
}

fn valid_protocol(protocol: &str) -> bool {
    protocol.len() == 8
        && protocol.starts_with("HTTP/1.")
        && matches!(protocol.as_bytes()[7], b'1'..=b'3')
}

/// A client key must be 24 base64 characters decoding to 16 octets.
fn valid_key(key: &str) -> bool {
    key.len() == 24
        && general_purpose::STANDARD
            .decode(key)
            .map(|k| k.len() == 16)
            .unwrap_or(false)
}

/// Validates a client upgrade request read from `buf` and, on success,
/// writes the 101 response to `w`.
///
/// When `path` is set the request target must equal it. Nothing is
/// written on a failed validation; the caller closes the socket.
pub async fn server_handshake<R, W>(
    buf: &mut ConnBuf<R>,
    w: &mut W,
    path: Option<&str>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut req = http::Message::new();
    req.decode(buf).await?;

    if req.method != "GET" {
        return Err(bad_handshake());
    }

    if !valid_protocol(&req.protocol) {
        return Err(bad_handshake());
    }

    if let Some(path) = path {
        if req.uri != path {
            return Err(bad_handshake());
        }
    }

    if !req
        .header("Upgrade")
        .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
    {
        return Err(bad_handshake());
    }

    if !req
        .header("Connection")
        .is_some_and(|v| v.eq_ignore_ascii_case("Upgrade"))
    {
        return Err(bad_handshake());
    }

    if req.header("Sec-WebSocket-Version") != Some(VERSION) {
        return Err(bad_handshake());
    }

    let key = match req.header("Sec-WebSocket-Key") {
        Some(key) if valid_key(key) => key.to_owned(),
        _ => return Err(bad_handshake()),
    };

    let mut rsp = http::Message::new();
    rsp.parse_status_line("HTTP/1.1 101 Switching Protocols");
    rsp.set_header("Upgrade", "websocket");
    rsp.set_header("Connection", "Upgrade");
    rsp.set_header("Sec-WebSocket-Accept", &accept_key(&key));

    rsp.encode(w).await
}

/// Sends the client upgrade request over `w` and validates the response
/// read back through `buf`.
///
/// Anything other than a 101 status is a rejection.
pub async fn client_handshake<R, W>(
    buf: &mut ConnBuf<R>,
    w: &mut W,
    host: &str,
    path: &str,
    protocols: Option<&str>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut req = http::Message::new();
    req.parse_request_line(&format!("GET {} HTTP/1.1", path));
    req.set_header("Host", host);
    req.set_header("Upgrade", "websocket");
    req.set_header("Connection", "Upgrade");
    req.set_header("Sec-WebSocket-Key", &new_client_key());
    req.set_header("Sec-WebSocket-Version", VERSION);
    if let Some(protocols) = protocols {
        req.set_header("Sec-WebSocket-Protocol", protocols);
    }

    req.encode(w).await?;

    let mut rsp = http::Message::new();
    rsp.decode(buf).await?;

    if rsp.status_code != "101" {
        return Err(io::Error::new(io::ErrorKind::Other, Error::Rejected));
    }

    Ok(())
}
