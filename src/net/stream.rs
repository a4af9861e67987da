//! WebSocket streams.

use std::io;

use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf},
    net::TcpStream,
};

use crate::{
    net::buf::ConnBuf,
    ws::{
        frame::{self, Frame},
        handshake,
    },
};

/// A WebSocket connection over any duplex byte stream.
///
/// The read half feeds the connection buffer every codec parses from;
/// serialized heads and frames go straight out the write half. One
/// frame finishes encoding to the sink before the next begins.
pub struct WsStream<T> {
    buf: ConnBuf<ReadHalf<T>>,
    writer: WriteHalf<T>,
    open: bool,
}

impl<T> WsStream<T>
where
    T: AsyncRead + AsyncWrite,
{
    /// Adopts a stream whose upgrade already happened elsewhere,
    /// marking it open as-is.
    pub fn new(stream: T, capacity: usize) -> Self {
        let (r, w) = tokio::io::split(stream);

        WsStream {
            buf: ConnBuf::new(capacity, r),
            writer: w,
            open: true,
        }
    }

    /// Accepts a server-side connection: runs the upgrade handshake
    /// over `stream` and marks the connection open once the 101
    /// response is on the wire.
    pub async fn accept(stream: T, capacity: usize, path: Option<&str>) -> io::Result<Self> {
        let (r, w) = tokio::io::split(stream);

        let mut conn = WsStream {
            buf: ConnBuf::new(capacity, r),
            writer: w,
            open: false,
        };

        handshake::server_handshake(&mut conn.buf, &mut conn.writer, path).await?;
        conn.open = true;

        Ok(conn)
    }

    /// Opens a client-side connection over `stream`.
    pub async fn start(stream: T, capacity: usize, host: &str, path: &str) -> io::Result<Self> {
        let (r, w) = tokio::io::split(stream);

        let mut conn = WsStream {
            buf: ConnBuf::new(capacity, r),
            writer: w,
            open: false,
        };

        handshake::client_handshake(&mut conn.buf, &mut conn.writer, host, path, None).await?;
        conn.open = true;

        Ok(conn)
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Reads the next frame off the wire.
    pub async fn read_frame(&mut self) -> io::Result<Frame> {
        let mut f = Frame::default();
        f.decode(&mut self.buf).await?;

        Ok(f)
    }

    /// Writes one frame to the wire.
    pub async fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        frame.encode(&mut self.writer).await
    }

    /// Sends an empty ping frame.
    pub async fn send_ping(&mut self) -> io::Result<()> {
        self.writer.write_all(&frame::ping_frame()).await
    }

    /// Sends an empty pong frame.
    pub async fn send_pong(&mut self) -> io::Result<()> {
        self.writer.write_all(&frame::pong_frame()).await
    }

    /// Sends a close frame (best effort) and shuts the stream down.
    ///
    /// A zero status sends an empty close payload.
    pub async fn close(&mut self, status: u16, reason: &str) -> io::Result<()> {
        if self.open {
            self.open = false;

            let data = frame::close_frame(status, reason);
            if !data.is_empty() {
                self.writer.write_all(&data).await.unwrap_or_default();
            }
        }

        self.writer.shutdown().await
    }
}

impl WsStream<TcpStream> {
    /// Dials `addr` and performs the client side of the upgrade.
    ///
    /// An empty path is sent as `/`.
    pub async fn connect(addr: &str, path: &str, capacity: usize) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;

        let host = addr.rsplit_once(':').map_or(addr, |(host, _)| host);
        let path = if path.is_empty() { "/" } else { path };

        WsStream::start(stream, capacity, host, path).await
    }
}
