use std::{io, net::SocketAddr, sync::Arc, time::Duration};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::{
    container::ring::DEFAULT_CAPACITY,
    context::Ctx,
    net::{listener::WsTcpListener, stream::WsStream},
    ws::{frame::Frame, opcode, status},
};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(15);

/// Server-side knobs for accepted connections.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Required handshake path; any target is accepted when unset.
    pub path: Option<String>,

    /// Per-connection ring capacity.
    pub buf_capacity: usize,

    /// How long a connection may sit idle between frames.
    pub timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            path: None,
            buf_capacity: DEFAULT_CAPACITY,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Starts a WebSocket endpoint on `addr`.
///
/// Every accepted connection runs in its own task; accept errors are
/// logged and the loop keeps going.
pub async fn ws_serve(addr: SocketAddr, config: ServerConfig, ctx: Arc<Ctx>) -> io::Result<()> {
    let listener = WsTcpListener::bind(addr).await?;

    log::info!("ws-rs listening on {}", addr);

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                log::debug!("Accept {}", peer);
                tokio::spawn(handle_conn(stream, peer, config.clone(), ctx.clone()));
            }
            Err(e) => log::warn!("Accept error: {}", e),
        }
    }
}

/// Drives one accepted connection: the upgrade handshake under a
/// timeout, then the frame loop until close or error.
pub async fn handle_conn(stream: TcpStream, peer: SocketAddr, config: ServerConfig, ctx: Arc<Ctx>) {
    let id = ctx.register(peer);

    let result = tokio::time::timeout(
        HANDSHAKE_TIMEOUT,
        WsStream::accept(stream, config.buf_capacity, config.path.as_deref()),
    )
    .await;

    let mut conn = match result {
        Ok(Ok(conn)) => conn,
        Ok(Err(e)) => {
            log::debug!("Handshake failed: {}, peer {}", e, peer);
            ctx.deregister(id);
            return;
        }
        Err(e) => {
            log::debug!("Handshake timed out: {}, peer {}", e, peer);
            ctx.deregister(id);
            return;
        }
    };

    log::debug!("Connection {} open, peer {}", id, peer);

    match serve_frames(&mut conn, config.timeout).await {
        Ok(_) => log::debug!("Connection {} closed, peer {}", id, peer),
        Err(e) => {
            log::debug!("Connection {} error: {}, peer {}", id, e, peer);

            // Protocol violations get a 1002 on the way out.
            conn.close(status::PROTOCOL_ERROR, "")
                .await
                .unwrap_or_default();
        }
    }

    ctx.deregister(id);
}

/// The per-connection frame loop: echoes data frames, answers pings,
/// and bounces the peer's close frame back before shutting down.
async fn serve_frames<T>(conn: &mut WsStream<T>, timeout: Duration) -> io::Result<()>
where
    T: AsyncRead + AsyncWrite,
{
    loop {
        let mut frame = tokio::time::timeout(timeout, conn.read_frame()).await??;

        // Inbound client frames arrive masked; everything sent back
        // out must not be.
        if frame.masked {
            frame.apply_mask_words();
        }
        frame.masking_key = [0; 4];

        match frame.opcode {
            opcode::CONTINUATION | opcode::TEXT | opcode::BINARY => {
                conn.write_frame(&frame).await?;
            }
            opcode::PING => {
                let pong = Frame {
                    payload: frame.payload,
                    fin: true,
                    opcode: opcode::PONG,
                    ..Frame::default()
                };
                conn.write_frame(&pong).await?;
            }
            opcode::PONG => {}
            opcode::CLOSE => {
                let peer_status = match frame.payload.get(..2) {
                    Some(bytes) => u16::from_be_bytes([bytes[0], bytes[1]]),
                    None => 0,
                };

                conn.close(peer_status, "").await?;
                return Ok(());
            }
            _ => {
                conn.close(status::PROTOCOL_ERROR, "").await?;
                return Ok(());
            }
        }
    }
}
