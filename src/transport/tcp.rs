//! TCP binding for [`Channel`].
//!
//! # Example
//!
//! ```ignore
//! use beatwire::transport::{Channel, Listener};
//!
//! let listener = Listener::bind("127.0.0.1:3000").await?;
//! let client = Channel::connect("127.0.0.1:3000").await?;
//! let (peer, _addr) = listener.accept().await?;
//! ```

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};

use super::Channel;
use crate::error::Result;

impl Channel {
    /// Connect to a TCP peer.
    pub async fn connect<A: ToSocketAddrs>(addr: A) -> Result<Channel> {
        let stream = TcpStream::connect(addr).await?;
        Self::from_tcp(stream)
    }

    /// Wrap an already connected TCP stream.
    pub fn from_tcp(stream: TcpStream) -> Result<Channel> {
        // Beats are tiny; don't let Nagle hold them back.
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok(Self::from_split(reader, writer))
    }
}

/// TCP listener producing one [`Channel`] per accepted peer.
pub struct Listener {
    listener: TcpListener,
}

impl Listener {
    /// Bind to an address.
    pub async fn bind<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener })
    }

    /// The bound address (useful after binding port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept a single connection.
    pub async fn accept(&self) -> Result<(Channel, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await?;
        tracing::debug!("Accepted connection from {}", addr);
        Ok((Channel::from_tcp(stream)?, addr))
    }
}
