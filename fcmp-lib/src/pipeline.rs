//! Receive side of the link.
//!
//! Transport bytes are staged, fed to the COBS decoder, and complete frames
//! are checksum-verified. The session survives arbitrary fragmentation: a
//! frame split over any number of arrivals decodes the same as one delivered
//! in a single chunk. After a decode error it discards input through the next
//! delimiter and starts over.

use crate::cobs::CobsBuffer;
use crate::constants::{DELIMITER, MAX_ENCODED};
use crate::error::{CobsError, FcmpError};
use crate::frame::Frame;
use bytes::{Buf, BytesMut};
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Normal,
    /// Dropping input until the next delimiter
    Resync,
}

/// Outcome of one [`ReceiveSession::poll`].
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    Frame(Frame),
    /// Frame dropped, the XOR residue was not zero
    ChecksumError(u8),
    /// Frame dropped, too short to hold checksum and header
    Runt(usize),
    /// Malformed stuffing; the session is now resynchronizing
    CodecError(CobsError),
}

#[derive(Debug)]
pub struct ReceiveSession {
    staging: BytesMut,
    state: SyncState,
    decoder: CobsBuffer,
    dropped: usize,
}

impl ReceiveSession {
    pub fn new() -> Self {
        Self {
            staging: BytesMut::with_capacity(MAX_ENCODED),
            state: SyncState::Normal,
            decoder: CobsBuffer::new(),
            dropped: 0,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Bytes waiting in the staging buffer.
    pub fn staged(&self) -> usize {
        self.staging.len()
    }

    /// Free room in the staging buffer.
    pub fn space(&self) -> usize {
        MAX_ENCODED - self.staging.len()
    }

    /// Total bytes lost to staging overflow since creation.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Stage newly arrived bytes. Anything beyond the free room is dropped;
    /// returns how many were kept.
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        let kept = bytes.len().min(self.space());
        if kept < bytes.len() {
            self.dropped += bytes.len() - kept;
            warn!(dropped = bytes.len() - kept, "receive buffer overflow");
        }
        self.staging.extend_from_slice(&bytes[..kept]);
        kept
    }

    /// Drop the first `n` staged bytes, keeping the rest in order.
    fn consume(&mut self, n: usize) {
        let n = n.min(self.staging.len());
        self.staging.advance(n);
    }

    /// Process the staged bytes until one event is produced or the input is
    /// exhausted.
    pub fn poll(&mut self) -> Option<Received> {
        if self.state == SyncState::Resync {
            self.resync();
        }
        if self.state == SyncState::Resync || self.staging.is_empty() {
            return None;
        }

        match self.decoder.decode(&self.staging) {
            Ok(None) => {
                // The decoder absorbed everything staged
                trace!(bytes = self.staging.len(), "partial frame");
                self.staging.clear();
                None
            }
            Ok(Some(consumed)) => {
                self.consume(consumed);
                let event = match Frame::parse(self.decoder.content()) {
                    Ok(frame) => {
                        debug!(%frame, "rx");
                        Received::Frame(frame)
                    }
                    Err(FcmpError::Checksum(residue)) => {
                        warn!(residue = format_args!("0x{residue:02X}"), "checksum error, frame dropped");
                        Received::ChecksumError(residue)
                    }
                    Err(err) => {
                        warn!(%err, "frame dropped");
                        Received::Runt(self.decoder.len())
                    }
                };
                self.decoder.reset();
                Some(event)
            }
            Err(err) => {
                warn!(code = err.code(), %err, "COBS decode error, resynchronizing");
                self.decoder.reset();
                self.state = SyncState::Resync;
                Some(Received::CodecError(err))
            }
        }
    }

    /// Discard through the next delimiter, or everything if there is none.
    fn resync(&mut self) {
        match self.staging.iter().position(|&b| b == DELIMITER) {
            Some(pos) => {
                trace!(discarded = pos + 1, "resynchronized");
                self.consume(pos + 1);
                self.state = SyncState::Normal;
            }
            None => {
                trace!(discarded = self.staging.len(), "no delimiter yet");
                self.staging.clear();
            }
        }
    }
}

impl Default for ReceiveSession {
    fn default() -> Self {
        Self::new()
    }
}
