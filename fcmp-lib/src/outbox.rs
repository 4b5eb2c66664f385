use crate::cobs::CobsBuffer;
use crate::error::FcmpError;
use crate::frame::{Config, Field, Header, Method, compose};
use crate::message::Message;
use bytes::Bytes;
use std::collections::VecDeque;
use tracing::{debug, trace};

/// Outgoing side of the link: composes frames, byte-stuffs them with its own
/// codec buffer and queues the wire bytes until the control loop flushes them.
#[derive(Debug, Default)]
pub struct Outbox {
    cobs: CobsBuffer,
    queue: VecDeque<Bytes>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one frame; the queued bytes include the trailing delimiter.
    pub fn send(&mut self, header: Header, field: &[u8]) -> Result<(), FcmpError> {
        let frame = compose(header, field)?;
        self.cobs.encode(&frame)?;
        trace!(frame = %hex::encode(&frame), "tx {}", header);
        self.queue.push_back(Bytes::copy_from_slice(self.cobs.encoded()));
        Ok(())
    }

    pub fn send_message(&mut self, message: &Message) -> Result<(), FcmpError> {
        let frame = message.to_frame();
        self.send(frame.header, &frame.field)
    }

    pub fn reject(&mut self, field: Field, reason: &str) -> Result<(), FcmpError> {
        debug!(%field, reason, "rejecting frame");
        self.send(Header::compose(Method::Rej, field), reason.as_bytes())
    }

    /// LOG frame for diagnostics, sent only while the LOG bit is set.
    pub fn log(&mut self, config: Config, text: &str) -> Result<(), FcmpError> {
        if !config.log() {
            return Ok(());
        }
        self.send_message(&Message::log(text))
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Take every queued frame in send order.
    pub fn drain(&mut self) -> impl Iterator<Item = Bytes> + '_ {
        self.queue.drain(..)
    }
}
