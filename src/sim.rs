//! Host stand-ins for the board peripherals.
//!
//! The control loop runs unchanged; DAC words and clock changes go to the
//! log instead of the SPI bus and the timer.

use fcmp_lib::FcmpError;
use fcmp_lib::FilterClock;
use fcmp_lib::constants::LPF_CLOCK_RATIO;
use fcmp_lib::mems::{EnablePin, SpiBus, SpiWord};
use tracing::{debug, info};

/// SPI bus that traces every DAC word.
#[derive(Debug, Default)]
pub struct TracingSpi {
    words: u64,
}

impl SpiBus for TracingSpi {
    fn write(&mut self, word: &SpiWord) -> Result<(), FcmpError> {
        self.words += 1;
        debug!(%word, n = self.words, "DAC word");
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SimPin {
    high: bool,
}

impl EnablePin for SimPin {
    fn set(&mut self, high: bool) -> Result<(), FcmpError> {
        if high != self.high {
            info!(high, "driver board power");
        }
        self.high = high;
        Ok(())
    }

    fn is_high(&self) -> bool {
        self.high
    }
}

/// Filter clock output; the switched-capacitor filter needs
/// `LPF_CLOCK_RATIO` clock periods per cutoff period.
#[derive(Debug, Default)]
pub struct ToneGenerator {
    output_hz: Option<u32>,
}

impl ToneGenerator {
    pub fn output_hz(&self) -> Option<u32> {
        self.output_hz
    }
}

impl FilterClock for ToneGenerator {
    fn set_frequency(&mut self, hz: u16) -> Result<(), FcmpError> {
        if hz == 0 {
            return Err(FcmpError::hardware("filter cutoff of 0 Hz"));
        }
        let output = u32::from(hz) * LPF_CLOCK_RATIO;
        info!(cutoff_hz = hz, clock_hz = output, "filter clock");
        self.output_hz = Some(output);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), FcmpError> {
        if self.output_hz.take().is_some() {
            info!("filter clock stopped");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_runs_at_ratio() {
        let mut clock = ToneGenerator::default();
        clock.set_frequency(200).unwrap();
        assert_eq!(clock.output_hz(), Some(12_000));
        clock.stop().unwrap();
        assert_eq!(clock.output_hz(), None);
        assert!(clock.set_frequency(0).is_err());
    }
}
