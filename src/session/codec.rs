//! Wire encoding for relay frames.
//!
//! Frames are bare JSON objects written back-to-back with no length prefix
//! or delimiter. The decoder finds frame boundaries by parsing, so it does
//! not care how the bytes were split across socket reads.

use serde_json::Value;

use super::events::OutboundFrame;
use crate::error::{CodecError, SessionError};

pub fn encode(frame: &OutboundFrame) -> Result<Vec<u8>, SessionError> {
    serde_json::to_vec(frame).map_err(SessionError::Encode)
}

/// Incremental decoder over a growable buffer.
///
/// Feed it whatever the socket returns with [`FrameDecoder::extend`] and
/// drain complete frames with [`FrameDecoder::next_frame`] until it yields
/// `None`. A trailing partial frame stays buffered for the next read.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    max_frame_bytes: usize,
    /// Prefix of `buf` already parsed without finding a complete frame.
    scanned: usize,
}

impl FrameDecoder {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame_bytes,
            scanned: 0,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes held for a frame that is not complete yet.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    pub fn next_frame(&mut self) -> Result<Option<Value>, CodecError> {
        if !self.may_hold_frame() {
            self.check_size()?;
            return Ok(None);
        }

        let (next, consumed) = {
            let mut stream = serde_json::Deserializer::from_slice(&self.buf).into_iter::<Value>();
            let next = stream.next();
            (next, stream.byte_offset())
        };

        match next {
            Some(Ok(value)) => {
                self.buf.drain(..consumed);
                self.scanned = 0;
                Ok(Some(value))
            }
            Some(Err(e)) if e.is_eof() => {
                self.scanned = self.buf.len();
                self.check_size()?;
                Ok(None)
            }
            Some(Err(e)) => Err(CodecError::Malformed(e)),
            // only whitespace left
            None => {
                self.buf.clear();
                self.scanned = 0;
                Ok(None)
            }
        }
    }

    /// An object or array can only complete on a closing bracket, so a
    /// partial one is re-parsed only once new bytes bring one in.
    fn may_hold_frame(&self) -> bool {
        if self.scanned == 0 {
            return true;
        }
        let opens_container = self
            .buf
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| matches!(b, b'{' | b'['));
        !opens_container
            || self.buf[self.scanned..]
                .iter()
                .any(|b| matches!(b, b'}' | b']'))
    }

    fn check_size(&self) -> Result<(), CodecError> {
        if self.buf.len() > self.max_frame_bytes {
            return Err(CodecError::FrameTooLarge {
                limit: self.max_frame_bytes,
                buffered: self.buf.len(),
            });
        }
        Ok(())
    }
}
