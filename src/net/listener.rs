use std::{io, net::SocketAddr};

use socket2::SockRef;
use tokio::net::{TcpListener as TokioTcpListener, TcpStream, ToSocketAddrs};

/// A TCP listener whose accepted sockets come up with keepalive
/// enabled, which is the default for WebSocket endpoints here.
pub struct WsTcpListener {
    inner_listener: TokioTcpListener,
    keepalive: bool,
}

impl WsTcpListener {
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> io::Result<Self> {
        let inner_listener = TokioTcpListener::bind(addr).await?;

        Ok(WsTcpListener {
            inner_listener,
            keepalive: true,
        })
    }

    /// Controls keepalive on subsequently accepted sockets.
    pub fn set_keepalive(&mut self, keepalive: bool) {
        self.keepalive = keepalive;
    }

    pub async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = self.inner_listener.accept().await?;

        if self.keepalive {
            SockRef::from(&stream).set_keepalive(true)?;
        }

        Ok((stream, addr))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner_listener.local_addr()
    }
}
