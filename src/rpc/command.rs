//! Command-channel grammar.
//!
//! One request per connection, one line per request:
//!
//! | Line          | Command          |
//! |---------------|------------------|
//! | `![`          | begin update     |
//! | `!]`          | end update       |
//! | `!*`          | reboot after reply |
//! | `!<hex>`      | write hex chunk  |
//! | `?`           | status dump      |
//! | anything else | ignored          |
//!
//! Replies are `OK\r\n` or `OTA_ERROR <code>\r\n`.

use core::fmt::{self, Write as _};

use crate::config::REPLY_BUF_LEN;

/// One parsed request. Borrows the hex payload from the request buffer.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    BeginUpdate,
    WriteChunk(&'a [u8]),
    EndUpdate,
    RequestReboot,
    QueryStatus,
    Unrecognized,
}

impl<'a> Command<'a> {
    /// Classify the first line of `request`.
    ///
    /// Trailing CR/LF and whitespace are not part of the command.
    pub fn parse(request: &'a [u8]) -> Self {
        let line = request
            .split(|&b| b == b'\n')
            .next()
            .unwrap_or_default()
            .trim_ascii_end();

        match line {
            [b'!', b'[', ..] => Self::BeginUpdate,
            [b'!', b']', ..] => Self::EndUpdate,
            [b'!', b'*', ..] => Self::RequestReboot,
            [b'!', rest @ ..] => Self::WriteChunk(rest),
            [b'?', ..] => Self::QueryStatus,
            _ => Self::Unrecognized,
        }
    }
}

impl fmt::Debug for Command<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BeginUpdate => write!(f, "BeginUpdate"),
            Self::WriteChunk(hex) => write!(f, "WriteChunk({} hex digits)", hex.len()),
            Self::EndUpdate => write!(f, "EndUpdate"),
            Self::RequestReboot => write!(f, "RequestReboot"),
            Self::QueryStatus => write!(f, "QueryStatus"),
            Self::Unrecognized => write!(f, "Unrecognized"),
        }
    }
}

/// Reply text buffer; bounded by the channel's fixed reply size.
pub type ReplyBuf = heapless::String<REPLY_BUF_LEN>;

/// Outcome of one command as sent to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Ok,
    OtaError(u8),
}

impl Reply {
    pub fn render(self) -> ReplyBuf {
        let mut buf = ReplyBuf::new();
        // The longest reply, "OTA_ERROR 255\r\n", is far below the capacity.
        let written = match self {
            Self::Ok => buf.write_str("OK\r\n"),
            Self::OtaError(code) => write!(buf, "OTA_ERROR {}\r\n", code),
        };
        debug_assert!(written.is_ok(), "reply overflowed its buffer");
        buf
    }
}
