use crate::constants::DEFAULT_LPF_HZ;
use crate::frame::{Config, Position};
use serde::Serialize;

/// Everything the protocol remembers between frames.
///
/// Mutated by the dispatcher (staging changes, raising pending flags) and by
/// the reconciler (applying them and clearing the flags). Both run on the
/// control loop and receive it by `&mut`; nothing else holds a reference.
#[derive(Debug, Clone, PartialEq)]
pub struct ProtocolState {
    /// Live configuration bits
    pub config_list: Config,
    /// Bits changed since the last configuration reconciliation
    pub config_mask: Config,
    pub position_pending: bool,
    /// Staged position, or the last one applied once `position_pending` clears
    pub position: Position,
    pub lpf_pending: bool,
    /// Latest accepted filter cutoff in Hz, applied or not
    pub lpf: u16,
}

impl ProtocolState {
    pub fn new() -> Self {
        Self {
            config_list: Config::new(),
            // Every peripheral bit starts dirty so the boot reconciliation
            // drives the hardware into the "off" state
            config_mask: Config::from_bits(Config::ALL),
            position_pending: false,
            position: Position::default(),
            lpf_pending: false,
            lpf: DEFAULT_LPF_HZ,
        }
    }

    /// Store a new configuration and mark the changed bits dirty.
    pub fn update_config(&mut self, config: Config) {
        let changed = self.config_list.diff(&config);
        self.config_mask = Config::from_bits(self.config_mask.bits() | changed.bits());
        self.config_list = config;
    }

    /// True when the DAC takes position writes from the control loop.
    pub fn position_gate_open(&self) -> bool {
        self.config_list.mems_en() && !self.config_list.strobe_sync()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            config: self.config_list.bits(),
            dirty: self.config_mask.bits(),
            position: self.position,
            position_pending: self.position_pending,
            lpf_hz: self.lpf,
            lpf_pending: self.lpf_pending,
        }
    }
}

impl Default for ProtocolState {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable summary of [`ProtocolState`] for status reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSnapshot {
    pub config: u16,
    pub dirty: u16,
    pub position: Position,
    pub position_pending: bool,
    pub lpf_hz: u16,
    pub lpf_pending: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let state = ProtocolState::new();
        assert_eq!(state.config_list.bits(), 0);
        assert_eq!(state.config_mask.bits(), Config::ALL);
        assert_eq!(state.lpf, 100);
        assert!(!state.position_pending);
        assert!(!state.lpf_pending);
    }

    #[test]
    fn test_update_config_marks_changed_bits() {
        let mut state = ProtocolState::new();
        state.config_mask = Config::new();

        state.update_config(Config::new().with_mems_en(true).with_lpf(true));
        assert_eq!(state.config_mask.bits(), 0b101);

        state.config_mask = Config::new();
        state.update_config(Config::new().with_lpf(true));
        assert_eq!(state.config_mask.bits(), 0b001);
        assert_eq!(state.config_list.bits(), 0b100);
    }

    #[test]
    fn test_position_gate() {
        let mut state = ProtocolState::new();
        assert!(!state.position_gate_open());
        state.config_list = Config::new().with_mems_en(true);
        assert!(state.position_gate_open());
        state.config_list = Config::new().with_mems_en(true).with_strobe_sync(true);
        assert!(!state.position_gate_open());
    }
}
