//! TCP transport adapter.
//!
//! Implements [`StreamListener`] / [`ByteStream`] over `std::net`, which
//! maps onto lwIP sockets on ESP-IDF and onto the host stack everywhere
//! else, so there is no cfg split here.
//!
//! ## Connection model
//!
//! 1. `bind()` opens a blocking listener on `0.0.0.0:<port>`.
//! 2. `accept()` blocks until a client connects.
//! 3. `read()` blocks until data arrives or the peer half-closes.
//! 4. `close()` flushes and shuts the socket down in both directions.

use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};

use log::{debug, info};

use crate::rpc::transport::{ByteStream, StreamListener};

#[derive(Default)]
pub struct TcpTransport {
    listener: Option<TcpListener>,
}

impl TcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Address actually bound; useful when binding port 0 in tests.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref()?.local_addr().ok()
    }
}

impl StreamListener for TcpTransport {
    type Stream = TcpClient;
    type Error = std::io::Error;

    fn bind(&mut self, port: u16) -> std::io::Result<()> {
        self.listener = None;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));
        let listener = TcpListener::bind(addr)?;
        info!("NET: listening on {}", listener.local_addr()?);
        self.listener = Some(listener);
        Ok(())
    }

    fn accept(&mut self) -> std::io::Result<TcpClient> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotConnected, "not bound"))?;
        let (stream, peer) = listener.accept()?;
        debug!("NET: accepted {}", peer);
        Ok(TcpClient { stream })
    }

    fn unbind(&mut self) {
        if self.listener.take().is_some() {
            info!("NET: listener closed");
        }
    }
}

pub struct TcpClient {
    stream: TcpStream,
}

impl ByteStream for TcpClient {
    type Error = std::io::Error;

    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        loop {
            match self.stream.read(buf) {
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                other => return other,
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        Write::write_all(&mut self.stream, data)
    }

    fn close(mut self) {
        let _ = self.stream.flush();
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
