//! Boundaries to the board peripherals.
//!
//! The protocol core never touches pins, SPI or the serial port directly; it
//! calls these traits. Each call is synchronous and must finish before the
//! control cycle moves on.

use crate::error::FcmpError;
use crate::frame::Position;

/// The MEMS DAC driver.
pub trait Actuator {
    fn enable(&mut self) -> Result<(), FcmpError>;

    /// Must be harmless when the driver is already disabled.
    fn disable(&mut self) -> Result<(), FcmpError>;

    fn set_position(&mut self, position: &Position) -> Result<(), FcmpError>;
}

/// Clock generator feeding the MEMS low pass filter.
pub trait FilterClock {
    /// Run the clock for a cutoff of `hz`.
    fn set_frequency(&mut self, hz: u16) -> Result<(), FcmpError>;

    fn stop(&mut self) -> Result<(), FcmpError>;
}

/// Best-effort byte link to the host.
pub trait ByteTransport {
    /// Copy whatever has already arrived into `buf` without waiting.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, FcmpError>;

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), FcmpError>;
}

/// Peripherals driven by the dispatcher and reconciler.
#[derive(Debug)]
pub struct Peripherals<A, C> {
    pub actuator: A,
    pub clock: C,
}

impl<A, C> Peripherals<A, C> {
    pub fn new(actuator: A, clock: C) -> Self {
        Self { actuator, clock }
    }
}
