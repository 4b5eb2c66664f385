use crate::constants::{FRAME_HEADER_SIZE, MAX_FIELD};
use crate::error::FcmpError;
use bytes::{BufMut, Bytes, BytesMut};
use modular_bitfield::prelude::*;
use num_enum::{FromPrimitive, IntoPrimitive};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::Display;
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// High nibble of the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum Method {
    /// Meaningless frame, discarded
    #[strum(to_string = "NOP")]
    Nop = 0x0,
    // Host side commands
    #[strum(to_string = "SET")]
    Set = 0x1,
    /// Anticipates an ACK carrying the requested field
    #[strum(to_string = "GET")]
    Get = 0x2,
    // Device side responses
    #[strum(to_string = "ACK")]
    Ack = 0x3,
    #[strum(to_string = "REJ")]
    Rej = 0x4,
    /// Variable length diagnostic string
    #[strum(to_string = "LOG")]
    Log = 0xF,

    #[num_enum(catch_all)]
    Unknown(u8),
}

/// Low nibble of the frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive, Serialize, Deserialize)]
#[repr(u8)]
pub enum Field {
    /// Variable length payload, or empty
    #[strum(to_string = "ANY")]
    Any = 0x0,
    /// Configuration bits
    #[strum(to_string = "CFG")]
    Cfg = 0x1,
    /// Mirror position
    #[strum(to_string = "POS")]
    Pos = 0x2,
    /// Low pass filter clock frequency
    #[strum(to_string = "LPF")]
    Lpf = 0x3,
    /// Reserved, not implemented
    #[strum(to_string = "SYSTEM_RESET")]
    SystemReset = 0xF,

    #[num_enum(catch_all)]
    Unknown(u8),
}

#[bitfield(bytes = 1)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub field_id: B4,
    pub method_id: B4,
}

impl Header {
    pub fn compose(method: Method, field: Field) -> Self {
        Header::new()
            .with_method_id(u8::from(method) & 0x0F)
            .with_field_id(u8::from(field) & 0x0F)
    }

    pub fn from_byte(byte: u8) -> Self {
        Header::from_bytes([byte])
    }

    pub fn byte(&self) -> u8 {
        self.into_bytes()[0]
    }

    pub fn method(&self) -> Method {
        Method::from_primitive(self.method_id())
    }

    pub fn field(&self) -> Field {
        Field::from_primitive(self.field_id())
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}|{}", self.method(), self.field())
    }
}

/// CFG field: 16-bit little endian bitmask.
///
/// Bit 0 enables the MEMS DAC, bit 1 hands position updates to the strobe
/// trigger path, bit 2 runs the filter clock, bit 15 turns on LOG frames.
#[bitfield(bytes = 2)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub mems_en: bool,
    pub strobe_sync: bool,
    pub lpf: bool,
    #[skip]
    reserved: B12,
    pub log: bool,
}

impl Config {
    /// Every bit with a peripheral action behind it
    pub const ALL: u16 = 0b1000_0000_0000_0111;

    pub fn from_bits(bits: u16) -> Self {
        Config::from_bytes(bits.to_le_bytes())
    }

    pub fn bits(&self) -> u16 {
        u16::from_le_bytes(self.into_bytes())
    }

    /// Bits that differ between `self` and `other`.
    pub fn diff(&self, other: &Config) -> Config {
        Config::from_bits(self.bits() ^ other.bits())
    }

    pub fn is_clear(&self) -> bool {
        self.bits() == 0
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:04X} (mems_en={} strobe_sync={} lpf={} log={})",
            self.bits(),
            self.mems_en(),
            self.strobe_sync(),
            self.lpf(),
            self.log()
        )
    }
}

impl Serialize for Config {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u16(self.bits())
    }
}

impl<'de> Deserialize<'de> for Config {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        u16::deserialize(deserializer).map(Config::from_bits)
    }
}

/// POS field as it appears on the wire (8 bytes)
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct PositionRaw {
    pub channels: [U16; 4], // A, B, C, D
}

/// Four DAC channel values, in order A, B, C, D
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Position {
    pub channels: [u16; 4],
}

impl Position {
    pub fn new(a: u16, b: u16, c: u16, d: u16) -> Self {
        Self { channels: [a, b, c, d] }
    }

    pub fn from_field(field: &[u8]) -> Result<Self, FcmpError> {
        let raw = PositionRaw::ref_from_bytes(field).map_err(|_| FcmpError::FieldSize {
            field: "POS",
            expected: size_of::<PositionRaw>(),
            actual: field.len(),
        })?;
        Ok(Position::from(*raw))
    }

    pub fn to_field(&self) -> [u8; 8] {
        let mut out = [0u8; 8];
        out.copy_from_slice(PositionRaw::from(*self).as_bytes());
        out
    }
}

impl From<PositionRaw> for Position {
    fn from(raw: PositionRaw) -> Self {
        Self {
            channels: raw.channels.map(|ch| ch.get()),
        }
    }
}

impl From<Position> for PositionRaw {
    fn from(pos: Position) -> Self {
        Self {
            channels: pos.channels.map(U16::new),
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.channels;
        write!(f, "A={a:5} B={b:5} C={c:5} D={d:5}")
    }
}

/// Parse a 16-bit little endian field (CFG, LPF).
pub fn u16_field(name: &'static str, field: &[u8]) -> Result<u16, FcmpError> {
    let bytes: [u8; 2] = field.try_into().map_err(|_| FcmpError::FieldSize {
        field: name,
        expected: 2,
        actual: field.len(),
    })?;
    Ok(u16::from_le_bytes(bytes))
}

/// XOR of every byte. Zero for a well-formed frame, checksum included.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

pub fn verify(frame: &[u8]) -> bool {
    checksum(frame) == 0
}

/// Build `checksum | header | field` with the checksum seeded by the header.
pub fn compose(header: Header, field: &[u8]) -> Result<Bytes, FcmpError> {
    if field.len() > MAX_FIELD {
        return Err(FcmpError::FieldTooLarge {
            size: field.len(),
            max: MAX_FIELD,
        });
    }
    let header = header.byte();
    let mut frame = BytesMut::with_capacity(FRAME_HEADER_SIZE + field.len());
    frame.put_u8(header ^ checksum(field));
    frame.put_u8(header);
    frame.put_slice(field);
    Ok(frame.freeze())
}

/// A checksum-verified FCMP frame.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub header: Header,
    pub field: Bytes,
}

impl Frame {
    pub fn new(method: Method, field_id: Field, field: impl Into<Bytes>) -> Self {
        Self {
            header: Header::compose(method, field_id),
            field: field.into(),
        }
    }

    /// Split decoded content into header and field, verifying the checksum.
    pub fn parse(content: &[u8]) -> Result<Self, FcmpError> {
        if content.len() < FRAME_HEADER_SIZE {
            return Err(FcmpError::Runt(content.len()));
        }
        let residue = checksum(content);
        if residue != 0 {
            return Err(FcmpError::Checksum(residue));
        }
        Ok(Self {
            header: Header::from_byte(content[1]),
            field: Bytes::copy_from_slice(&content[FRAME_HEADER_SIZE..]),
        })
    }

    pub fn method(&self) -> Method {
        self.header.method()
    }

    pub fn field_id(&self) -> Field {
        self.header.field()
    }

    /// Wire representation before byte stuffing.
    pub fn to_bytes(&self) -> Result<Bytes, FcmpError> {
        compose(self.header, &self.field)
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.header, hex::encode(&self.field))
    }
}
