//! Driver for the quad DAC on the MEMS driver board.
//!
//! The DAC takes 3-byte SPI words: a header `command << 3 | channel` followed
//! by a 16-bit big endian value.

use crate::constants::DAC_NEUTRAL_BIAS;
use crate::error::FcmpError;
use crate::frame::Position;
use crate::hardware::Actuator;
use byteorder::{BigEndian, ByteOrder};
use num_enum::IntoPrimitive;
use std::fmt;
use std::thread;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[repr(u8)]
pub enum DacCommand {
    /// Write to input register N
    WriteInput = 0b000,
    /// Update DAC register N
    UpdateDac = 0b001,
    /// Write to input register N, update all (software LDAC)
    WriteInputLoadAll = 0b010,
    /// Write and update DAC register N
    WriteUpdate = 0b011,
    /// Power control, channels in bits 0..4 of the value
    Power = 0b100,
    Reset = 0b101,
    LdacSetup = 0b110,
    /// Internal reference on/off
    InternalRef = 0b111,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive)]
#[repr(u8)]
pub enum DacChannel {
    A = 0b000,
    B = 0b001,
    C = 0b010,
    D = 0b011,
    All = 0b111,
}

impl DacChannel {
    /// Used when the command ignores the channel field
    pub const NONE: DacChannel = DacChannel::A;
    pub const POSITION: [DacChannel; 4] = [DacChannel::A, DacChannel::B, DacChannel::C, DacChannel::D];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiWord([u8; 3]);

impl SpiWord {
    pub fn new(command: DacCommand, channel: DacChannel, value: u16) -> Self {
        let mut bytes = [0u8; 3];
        bytes[0] = (u8::from(command) << 3) | u8::from(channel);
        BigEndian::write_u16(&mut bytes[1..], value);
        SpiWord(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }

    pub fn value(&self) -> u16 {
        BigEndian::read_u16(&self.0[1..])
    }
}

impl fmt::Display for SpiWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:02X} {:02X}", self.0[0], self.0[1], self.0[2])
    }
}

/// SPI link to the DAC; one call per chip-select cycle.
pub trait SpiBus {
    fn write(&mut self, word: &SpiWord) -> Result<(), FcmpError>;
}

/// Power enable line of the driver board.
pub trait EnablePin {
    fn set(&mut self, high: bool) -> Result<(), FcmpError>;

    fn is_high(&self) -> bool;
}

pub fn start_sequence() -> [SpiWord; 5] {
    [
        SpiWord::new(DacCommand::Reset, DacChannel::NONE, 1),
        SpiWord::new(DacCommand::InternalRef, DacChannel::NONE, 1),
        // Power up all four channels
        SpiWord::new(DacCommand::Power, DacChannel::NONE, 0b1111),
        SpiWord::new(DacCommand::LdacSetup, DacChannel::NONE, 0),
        SpiWord::new(DacCommand::WriteUpdate, DacChannel::All, DAC_NEUTRAL_BIAS),
    ]
}

pub fn end_sequence() -> [SpiWord; 1] {
    [SpiWord::new(DacCommand::WriteUpdate, DacChannel::All, DAC_NEUTRAL_BIAS)]
}

/// Channels A..C go to input registers, D loads all four at once.
pub fn position_sequence(position: &Position) -> [SpiWord; 4] {
    let mut words = [SpiWord([0; 3]); 4];
    for (i, (&channel, &value)) in DacChannel::POSITION.iter().zip(&position.channels).enumerate() {
        let command = if channel == DacChannel::D {
            DacCommand::WriteInputLoadAll
        } else {
            DacCommand::WriteInput
        };
        words[i] = SpiWord::new(command, channel, value);
    }
    words
}

pub struct MemsDriver<S, P> {
    spi: S,
    pin: P,
    settle: Duration,
}

impl<S: SpiBus, P: EnablePin> MemsDriver<S, P> {
    pub fn new(spi: S, pin: P) -> Self {
        Self {
            spi,
            pin,
            settle: Duration::from_millis(1),
        }
    }

    /// Wait after power transitions; the board needs about a millisecond.
    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }

    pub fn spi(&self) -> &S {
        &self.spi
    }

    pub fn pin(&self) -> &P {
        &self.pin
    }

    fn send(&mut self, words: &[SpiWord]) -> Result<(), FcmpError> {
        for word in words {
            trace!(%word, "SPI ->");
            self.spi.write(word)?;
        }
        Ok(())
    }

    fn settle(&self) {
        if !self.settle.is_zero() {
            thread::sleep(self.settle);
        }
    }
}

impl<S: SpiBus, P: EnablePin> Actuator for MemsDriver<S, P> {
    fn enable(&mut self) -> Result<(), FcmpError> {
        self.pin.set(true)?;
        self.settle();
        self.send(&start_sequence())
    }

    fn disable(&mut self) -> Result<(), FcmpError> {
        if !self.pin.is_high() {
            debug!("driver board already off");
            return Ok(());
        }
        self.send(&end_sequence())?;
        // Let the bias settle before cutting power
        self.settle();
        self.pin.set(false)
    }

    fn set_position(&mut self, position: &Position) -> Result<(), FcmpError> {
        debug!(%position, "mems set");
        self.send(&position_sequence(position))
    }
}
