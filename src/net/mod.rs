//! Networking facilities for WebSocket communication.

pub mod buf;
pub mod listener;
pub mod stream;

use std::{io, net::SocketAddr};

/// Resolves a target socket address.
///
/// Returns the first resolved socket address.
pub async fn lookup_host(host: &str) -> io::Result<SocketAddr> {
    let mut iter = tokio::net::lookup_host(host).await?;

    iter.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("{} resolved to no addresses", host),
        )
    })
}
