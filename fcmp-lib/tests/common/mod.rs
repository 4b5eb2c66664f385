//! Common test utilities: recording peripherals and a scripted byte transport

// Shared across several test files, not every item is used in each one
#[allow(unused_imports)]
pub use fcmp_lib::constants::*;
#[allow(unused_imports)]
pub use fcmp_lib::{Config, Controller, FcmpError, Field, Frame, Message, Method, Position};

use fcmp_lib::cobs::{CobsBuffer, encode_to_vec};
use fcmp_lib::{Actuator, ByteTransport, FilterClock};
use std::collections::VecDeque;

#[allow(dead_code)]
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Enable,
    Disable,
    SetPosition(Position),
    SetFrequency(u16),
    Stop,
}

#[derive(Debug, Default)]
pub struct RecordingActuator {
    pub calls: Vec<Call>,
}

impl Actuator for RecordingActuator {
    fn enable(&mut self) -> Result<(), FcmpError> {
        self.calls.push(Call::Enable);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), FcmpError> {
        self.calls.push(Call::Disable);
        Ok(())
    }

    fn set_position(&mut self, position: &Position) -> Result<(), FcmpError> {
        self.calls.push(Call::SetPosition(*position));
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingClock {
    pub calls: Vec<Call>,
}

impl FilterClock for RecordingClock {
    fn set_frequency(&mut self, hz: u16) -> Result<(), FcmpError> {
        self.calls.push(Call::SetFrequency(hz));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), FcmpError> {
        self.calls.push(Call::Stop);
        Ok(())
    }
}

/// Hands out one scripted chunk per read and records everything written.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    chunks: VecDeque<Vec<u8>>,
    pub written: Vec<u8>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue(&mut self, bytes: impl Into<Vec<u8>>) {
        self.chunks.push_back(bytes.into());
    }

    pub fn pending_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Decode and clear every reply written so far.
    pub fn take_replies(&mut self) -> Vec<Message> {
        let replies = decode_stream(&self.written);
        self.written.clear();
        replies
    }
}

impl ByteTransport for ScriptedTransport {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, FcmpError> {
        let Some(mut chunk) = self.chunks.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.chunks.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), FcmpError> {
        self.written.extend_from_slice(bytes);
        Ok(())
    }
}

pub type TestController = Controller<RecordingActuator, RecordingClock>;

/// Controller after boot reconciliation, with the boot calls cleared.
#[allow(dead_code)]
pub fn booted_controller() -> TestController {
    let mut controller = Controller::new(RecordingActuator::default(), RecordingClock::default());
    controller.startup().expect("startup");
    controller.peripherals_mut().actuator.calls.clear();
    controller.peripherals_mut().clock.calls.clear();
    controller
}

/// Wire bytes for a message, delimiter included.
#[allow(dead_code)]
pub fn encode(message: &Message) -> Vec<u8> {
    let frame = message.to_frame().to_bytes().expect("compose");
    encode_to_vec(&frame).expect("stuff")
}

/// Decode a byte stream of delimited frames into messages.
#[allow(dead_code)]
pub fn decode_stream(bytes: &[u8]) -> Vec<Message> {
    bytes
        .split_inclusive(|&b| b == DELIMITER)
        .map(|wire| {
            let mut cobs = CobsBuffer::new();
            assert_eq!(cobs.decode(wire).expect("cobs"), Some(wire.len()));
            Message::try_from(Frame::parse(cobs.content()).expect("frame")).expect("message")
        })
        .collect()
}

/// Run cycles until every scripted byte has been read and handled, plus one
/// for the reconciler.
#[allow(dead_code)]
pub fn run_until_idle(controller: &mut TestController, transport: &mut ScriptedTransport) {
    for _ in 0..64 {
        controller.cycle(transport).expect("cycle");
        if transport.pending_chunks() == 0 && controller.session().staged() == 0 {
            controller.cycle(transport).expect("cycle");
            return;
        }
    }
    panic!("controller did not go idle");
}

/// Decode hex string to bytes for testing
#[allow(dead_code)]
pub fn hex_to_bytes(hex_data: &str) -> Vec<u8> {
    hex::decode(hex_data).expect("Failed to decode hex")
}
