//! One command-channel connection, start to finish.
//!
//! Drain the request (until the peer half-closes or the buffer is full),
//! dispatch it, write exactly one reply, close. A chunk cut off by a full
//! buffer is refused rather than written short. Whether the device must
//! restart afterwards is reported to the caller, which owns the loop.

use log::{debug, info, warn};

use super::engine::CommandEngine;
use super::transport::ByteStream;
use crate::app::ports::{EventSink, SlotStore};
use crate::error::LinkError;

/// What the control loop does after a connection is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Served {
    /// Accept the next client.
    Continue,
    /// The reply is out; restart the device.
    Reboot,
}

/// Read until EOF or until `buf` is full. Returns the byte count.
fn read_request<C: ByteStream>(conn: &mut C, buf: &mut [u8]) -> Result<usize, C::Error> {
    let mut total = 0;
    while total < buf.len() {
        let n = conn.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

/// A full buffer with no line break in it may have lost part of the
/// first line, the only one that is interpreted.
fn first_line_cut(request: &[u8], limit: usize) -> bool {
    request.len() == limit && !request.contains(&b'\n')
}

/// Printable preview of a request for the log.
fn preview(request: &[u8]) -> heapless::String<8> {
    request
        .iter()
        .take(8)
        .map(|&b| if (0x20..0x7F).contains(&b) { b as char } else { '.' })
        .collect()
}

/// Serve one accepted connection and close it.
///
/// `buf` is the request buffer; its length is the request size limit.
pub fn serve_connection<C, S>(
    mut conn: C,
    buf: &mut [u8],
    engine: &mut CommandEngine<S>,
    sink: &mut impl EventSink,
) -> Result<Served, LinkError>
where
    C: ByteStream,
    S: SlotStore,
{
    let len = match read_request(&mut conn, buf) {
        Ok(len) => len,
        Err(e) => {
            warn!("NET: read failed: {}", e);
            conn.close();
            return Err(LinkError::Read);
        }
    };
    let request = &buf[..len];
    debug!("NET: received {} bytes | {}", len, preview(request));

    let reply = if first_line_cut(request, buf.len()) {
        warn!("NET: request filled the {}-byte buffer before its first line ended", len);
        engine.handle_truncated(request, sink)
    } else {
        engine.handle(request, sink)
    }
    .render();

    let written = conn.write_all(reply.as_bytes());
    conn.close();
    match written {
        Ok(()) => debug!("NET: replied {:?}", reply.as_str()),
        Err(e) => {
            warn!("NET: write failed: {}", e);
            // The command ran; a lost reply does not cancel a requested reboot.
            if engine.reboot_pending() {
                return Ok(Served::Reboot);
            }
            return Err(LinkError::Write);
        }
    }

    if engine.reboot_pending() {
        info!("NET: reply sent, reboot pending");
        return Ok(Served::Reboot);
    }
    Ok(Served::Continue)
}
