//! Just enough HTTP/1.x to carry the WebSocket upgrade.

use std::{
    collections::HashMap,
    fmt::{self, Display, Formatter},
    io, str,
};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::net::buf::ConnBuf;

pub const CRLF: &str = "\r\n";

/// The blank line terminating a message head.
pub const HEAD_DELIM: &[u8] = b"\r\n\r\n";

/// Errors when parsing an HTTP/1.x message head.
#[derive(Debug)]
pub enum Error {
    /// The head was malformed, or did not fit the buffer.
    BadHeader,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::BadHeader => write!(f, "bad header"),
        }
    }
}

impl std::error::Error for Error {}

fn bad_header() -> io::Error {
    io::Error::new(io::ErrorKind::Other, Error::BadHeader)
}

/// A single HTTP/1.x message head: one start line plus headers.
///
/// Either the request triple or the status triple is populated,
/// never both.
#[derive(Debug, Default)]
pub struct Message {
    pub method: String,
    pub uri: String,
    pub protocol: String,

    pub status_code: String,
    pub status_text: String,

    pub headers: HashMap<String, String>,
    pub header_parsed: bool,
}

impl Message {
    pub fn new() -> Self {
        Message::default()
    }

    /// Looks up a header value by name, ignoring ASCII case.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Sets a header to `value`.
    pub fn set_header(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_owned(), value.to_owned());
    }

    /// Parses a `method target protocol` request line.
    ///
    /// On success the status triple is cleared.
    pub fn parse_request_line(&mut self, line: &str) -> bool {
        let mut parts = line.split(' ');

        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(method), Some(uri), Some(protocol), None) if !method.is_empty() => {
                self.method = method.to_owned();
                self.uri = uri.to_owned();
                self.protocol = protocol.to_owned();
                self.status_code.clear();
                self.status_text.clear();
                true
            }
            _ => false,
        }
    }

    /// Parses a `protocol code reason` status line.
    ///
    /// On success the request triple is cleared.
    pub fn parse_status_line(&mut self, line: &str) -> bool {
        let mut parts = line.splitn(3, ' ');

        match (parts.next(), parts.next()) {
            (Some(protocol), Some(code)) if !protocol.is_empty() && !code.is_empty() => {
                self.protocol = protocol.to_owned();
                self.status_code = code.to_owned();
                self.status_text = parts.next().unwrap_or("").to_owned();
                self.method.clear();
                self.uri.clear();
                true
            }
            _ => false,
        }
    }

    /// Reads one message head from `buf`.
    ///
    /// The buffer is filled until the blank-line terminator shows up;
    /// a ring that fills first, a source that ends first, or any
    /// malformed line fails with a bad-header error.
    pub async fn decode<R>(&mut self, buf: &mut ConnBuf<R>) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
    {
        self.method.clear();
        self.uri.clear();
        self.protocol.clear();
        self.status_code.clear();
        self.status_text.clear();
        self.headers.clear();
        self.header_parsed = false;

        let head_len = loop {
            if let Some(i) = buf.index_of(HEAD_DELIM) {
                break i;
            }
            if buf.is_full() || buf.fill().await? == 0 {
                return Err(bad_header());
            }
        };

        // Consume the head and discard the terminator.
        let mut head = vec![0u8; head_len + HEAD_DELIM.len()];
        buf.read(&mut head)?;
        head.truncate(head_len);

        let head = str::from_utf8(&head).map_err(|_| bad_header())?;

        let mut lines = head.split(CRLF);

        let start = lines.next().unwrap_or("");
        let ok = if start.starts_with("HTTP") {
            self.parse_status_line(start)
        } else {
            self.parse_request_line(start)
        };
        if !ok {
            return Err(bad_header());
        }

        for line in lines {
            if line.is_empty() {
                continue;
            }

            let i = match line.find(':') {
                Some(i) if i >= 1 => i,
                _ => return Err(bad_header()),
            };

            // Values sit two bytes past the colon (": " convention);
            // a later duplicate name wins.
            let value = line.get(i + 2..).unwrap_or("");
            self.headers.insert(line[..i].to_owned(), value.to_owned());
        }

        self.header_parsed = true;
        Ok(())
    }

    /// Writes the message head: the start line (request when a method
    /// is set, status otherwise), each header, then a blank line.
    ///
    /// Header emission order is unspecified.
    pub async fn encode<W>(&self, w: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut out = String::new();

        if !self.method.is_empty() {
            out.push_str(&self.method);
            out.push(' ');
            out.push_str(&self.uri);
            out.push(' ');
            out.push_str(&self.protocol);
        } else {
            out.push_str(&self.protocol);
            out.push(' ');
            out.push_str(&self.status_code);
            out.push(' ');
            out.push_str(&self.status_text);
        }
        out.push_str(CRLF);

        for (name, value) in &self.headers {
            out.push_str(name);
            out.push_str(": ");
            out.push_str(value);
            out.push_str(CRLF);
        }

        out.push_str(CRLF);

        w.write_all(out.as_bytes()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPGRADE_REQ: &[u8] = b"GET /chat HTTP/1.1\r\n\
        Host: server.example.com\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\
        \r\n";

    #[tokio::test]
    async fn test_decode_request() {
        let mut buf = ConnBuf::new(0x1000, UPGRADE_REQ);
        let mut m = Message::new();

        m.decode(&mut buf).await.unwrap();

        assert!(m.header_parsed);
        assert_eq!(m.method, "GET");
        assert_eq!(m.uri, "/chat");
        assert_eq!(m.protocol, "HTTP/1.1");
        assert!(m.status_code.is_empty());
        assert_eq!(m.header("Host"), Some("server.example.com"));
        assert_eq!(m.header("Upgrade"), Some("websocket"));
        assert_eq!(
            m.header("Sec-WebSocket-Key"),
            Some("dGhlIHNhbXBsZSBub25jZQ==")
        );

        // Only the head is consumed.
        assert_eq!(buf.available(), 0);
    }

    #[tokio::test]
    async fn test_decode_status() {
        let rsp = b"HTTP/1.1 101 Switching Protocols\r\n\
            Upgrade: websocket\r\n\
            \r\n";

        let mut buf = ConnBuf::new(0x1000, &rsp[..]);
        let mut m = Message::new();

        m.decode(&mut buf).await.unwrap();

        assert_eq!(m.protocol, "HTTP/1.1");
        assert_eq!(m.status_code, "101");
        assert_eq!(m.status_text, "Switching Protocols");
        assert!(m.method.is_empty());
        assert!(m.uri.is_empty());
    }

    #[tokio::test]
    async fn test_decode_case_insensitive_header_lookup() {
        let req = b"GET / HTTP/1.1\r\n\
            Sec-Websocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
            \r\n";

        let mut buf = ConnBuf::new(0x1000, &req[..]);
        let mut m = Message::new();

        m.decode(&mut buf).await.unwrap();

        assert_eq!(
            m.header("Sec-WebSocket-Key"),
            Some("dGhlIHNhbXBsZSBub25jZQ==")
        );
    }

    #[tokio::test]
    async fn test_decode_duplicate_keeps_last() {
        let req = b"GET / HTTP/1.1\r\n\
            X-Test: one\r\n\
            X-Test: two\r\n\
            \r\n";

        let mut buf = ConnBuf::new(0x1000, &req[..]);
        let mut m = Message::new();

        m.decode(&mut buf).await.unwrap();

        assert_eq!(m.header("X-Test"), Some("two"));
    }

    #[tokio::test]
    async fn test_decode_bad_start_line() {
        let mut buf = ConnBuf::new(0x1000, &b"GET /chat\r\n\r\n"[..]);
        let mut m = Message::new();

        assert!(m.decode(&mut buf).await.is_err());
        assert!(!m.header_parsed);
    }

    #[tokio::test]
    async fn test_decode_header_missing_colon() {
        let req = b"GET / HTTP/1.1\r\n\
            NoColonHere\r\n\
            \r\n";

        let mut buf = ConnBuf::new(0x1000, &req[..]);
        let mut m = Message::new();

        assert!(m.decode(&mut buf).await.is_err());
    }

    #[tokio::test]
    async fn test_decode_head_does_not_fit() {
        // A 16-byte ring fills before the terminator arrives.
        let mut buf = ConnBuf::new(16, UPGRADE_REQ);
        let mut m = Message::new();

        assert!(m.decode(&mut buf).await.is_err());
    }

    #[tokio::test]
    async fn test_decode_source_ends_early() {
        let mut buf = ConnBuf::new(0x1000, &b"GET / HTTP/1.1\r\n"[..]);
        let mut m = Message::new();

        assert!(m.decode(&mut buf).await.is_err());
    }

    #[tokio::test]
    async fn test_encode_request() {
        let mut m = Message::new();
        assert!(m.parse_request_line("GET /chat HTTP/1.1"));
        m.set_header("Host", "example.com");

        let mut out = Vec::new();
        m.encode(&mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("GET /chat HTTP/1.1\r\n"));
        assert!(text.contains("Host: example.com\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_encode_status() {
        let mut m = Message::new();
        assert!(m.parse_status_line("HTTP/1.1 101 Switching Protocols"));
        m.set_header("Upgrade", "websocket");

        let mut out = Vec::new();
        m.encode(&mut out).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(text.contains("Upgrade: websocket\r\n"));
        assert!(text.ends_with("\r\n\r\n"));
    }

    #[tokio::test]
    async fn test_round_trip() {
        let mut m = Message::new();
        assert!(m.parse_request_line("GET / HTTP/1.1"));
        m.set_header("Upgrade", "websocket");
        m.set_header("Connection", "Upgrade");

        let mut wire = Vec::new();
        m.encode(&mut wire).await.unwrap();

        let mut buf = ConnBuf::new(0x1000, &wire[..]);
        let mut got = Message::new();
        got.decode(&mut buf).await.unwrap();

        assert_eq!(got.method, m.method);
        assert_eq!(got.uri, m.uri);
        assert_eq!(got.protocol, m.protocol);
        assert_eq!(got.headers, m.headers);
    }
}
