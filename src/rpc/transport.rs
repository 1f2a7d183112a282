//! Transport abstraction: a listening socket handing out byte streams.
//!
//! Concrete implementations:
//! - TCP over WiFi ([`crate::adapters::tcp_transport`])
//! - scripted in-memory streams (integration tests)
//!
//! The control loop is generic over `StreamListener`, so swapping the
//! transport requires zero changes to the protocol logic.

use core::fmt;

/// One accepted client connection.
pub trait ByteStream {
    type Error: fmt::Display;

    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns 0 once the peer has finished sending.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Write all of `data`, blocking until it is handed to the stack.
    fn write_all(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Flush and close the connection.
    fn close(self);
}

/// Listening endpoint of the command channel.
pub trait StreamListener {
    type Stream: ByteStream;
    type Error: fmt::Display;

    /// Bind and listen on `port`. Replaces any previous binding.
    fn bind(&mut self, port: u16) -> Result<(), Self::Error>;

    /// Block until one client connects.
    fn accept(&mut self) -> Result<Self::Stream, Self::Error>;

    /// Release the listening socket.
    fn unbind(&mut self);
}
