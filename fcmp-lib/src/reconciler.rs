//! Applies staged protocol state to the peripherals.

use crate::constants::LOG_ENABLED_NOTICE;
use crate::error::FcmpError;
use crate::frame::Config;
use crate::hardware::{Actuator, FilterClock, Peripherals};
use crate::message::Message;
use crate::outbox::Outbox;
use crate::state::ProtocolState;
use tracing::info;

/// Apply every dirty configuration bit, then clear the dirty mask.
///
/// A bit is cleared as soon as its action succeeded, so a failing peripheral
/// leaves only its own bit dirty for the next attempt. With a clear mask this
/// is a no-op.
pub fn apply_config<A: Actuator, C: FilterClock>(
    state: &mut ProtocolState,
    peripherals: &mut Peripherals<A, C>,
    outbox: &mut Outbox,
) -> Result<(), FcmpError> {
    if state.config_mask.is_clear() {
        return Ok(());
    }
    let config = state.config_list;

    if state.config_mask.mems_en() {
        if config.mems_en() {
            info!("MEMS enable");
            peripherals.actuator.enable()?;
        } else {
            info!("MEMS disable");
            peripherals.actuator.disable()?;
        }
        state.config_mask.set_mems_en(false);
    }

    if state.config_mask.lpf() {
        if config.lpf() {
            info!(hz = state.lpf, "filter clock on");
            peripherals.clock.set_frequency(state.lpf)?;
        } else {
            info!("filter clock off");
            peripherals.clock.stop()?;
        }
        state.config_mask.set_lpf(false);
    }

    if state.config_mask.log() {
        if config.log() {
            outbox.send_message(&Message::log(LOG_ENABLED_NOTICE))?;
        }
        state.config_mask.set_log(false);
    }

    // Strobe sync and reserved bits have no action of their own
    state.config_mask = Config::new();
    Ok(())
}

/// Apply staged position and filter changes whose gate is open.
///
/// Runs once per control cycle. A staged position reaches the DAC only with
/// MEMS enabled and strobe sync off; the strobe trigger path owns it
/// otherwise. Each applied change is acknowledged with the value written.
pub fn apply_pending<A: Actuator, C: FilterClock>(
    state: &mut ProtocolState,
    peripherals: &mut Peripherals<A, C>,
    outbox: &mut Outbox,
) -> Result<(), FcmpError> {
    if state.position_pending && state.position_gate_open() {
        peripherals.actuator.set_position(&state.position)?;
        state.position_pending = false;
        info!(position = %state.position, "position applied");
        outbox.send_message(&Message::PositionApplied(state.position))?;
    }

    if state.lpf_pending && state.config_list.lpf() {
        peripherals.clock.set_frequency(state.lpf)?;
        state.lpf_pending = false;
        info!(hz = state.lpf, "filter frequency applied");
        outbox.send_message(&Message::Filter(state.lpf))?;
    }
    Ok(())
}
