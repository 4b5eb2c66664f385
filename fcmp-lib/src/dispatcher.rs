//! Method × field dispatch of verified frames.
//!
//! Replies (ACK, REJ, gated LOG echo) are queued in the [`Outbox`] immediately.
//! Changes that touch the hardware outside of configuration are only staged
//! here and raised as pending flags for the reconciler.

use crate::constants::{
    CFG_FIELD_SIZE, LPF_FIELD_SIZE, POS_FIELD_SIZE, REJ_INVALID_FIELD_SIZE, REJ_INVALID_METHOD,
    REJ_POSITION_PENDING, REJ_UNKNOWN_FIELD,
};
use crate::error::FcmpError;
use crate::frame::{Config, Field, Frame, Header, Method, Position, u16_field};
use crate::hardware::{Actuator, FilterClock, Peripherals};
use crate::message::Message;
use crate::outbox::Outbox;
use crate::reconciler;
use crate::state::ProtocolState;
use tracing::{debug, trace};

/// Handle one checksum-verified frame.
pub fn dispatch<A: Actuator, C: FilterClock>(
    frame: &Frame,
    state: &mut ProtocolState,
    peripherals: &mut Peripherals<A, C>,
    outbox: &mut Outbox,
) -> Result<(), FcmpError> {
    let method = frame.method();
    let field = frame.field_id();
    let payload = frame.field.as_ref();
    debug!(header = %frame.header, size = payload.len(), "dispatch");

    match method {
        Method::Nop => return outbox.log(state.config_list, "NOP"),
        // Responses are never re-dispatched
        Method::Ack | Method::Rej => {
            trace!(%method, "discarding response frame");
            return Ok(());
        }
        // LOG frames of either direction only flow with the LOG bit set
        Method::Log => {
            if !state.config_list.log() {
                trace!("LOG disabled, not echoing");
                return Ok(());
            }
            outbox.log(state.config_list, "LOG (echo back)")?;
            return outbox.send(Header::compose(Method::Log, Field::Any), payload);
        }
        _ => {}
    }

    match field {
        Field::Cfg => match method {
            Method::Set => set_config(payload, state, peripherals, outbox),
            Method::Get => get_config(state, outbox),
            _ => outbox.reject(field, REJ_INVALID_METHOD),
        },
        Field::Pos => match method {
            Method::Set => set_position(payload, state, outbox),
            Method::Get => get_position(state, outbox),
            _ => outbox.reject(field, REJ_INVALID_METHOD),
        },
        Field::Lpf => match method {
            Method::Set => set_filter(payload, state, outbox),
            Method::Get => get_filter(state, outbox),
            _ => outbox.reject(field, REJ_INVALID_METHOD),
        },
        // ANY carries no resource and SYSTEM_RESET is not implemented
        _ => outbox.reject(field, REJ_UNKNOWN_FIELD),
    }
}

fn set_config<A: Actuator, C: FilterClock>(
    payload: &[u8],
    state: &mut ProtocolState,
    peripherals: &mut Peripherals<A, C>,
    outbox: &mut Outbox,
) -> Result<(), FcmpError> {
    outbox.log(state.config_list, "SET CFG")?;
    if payload.len() != CFG_FIELD_SIZE {
        return outbox.reject(Field::Cfg, REJ_INVALID_FIELD_SIZE);
    }
    let config = Config::from_bits(u16_field("CFG", payload)?);
    debug!(%config, "configuration update");
    state.update_config(config);
    // Configuration is applied synchronously, so the ACK carries the post-state
    reconciler::apply_config(state, peripherals, outbox)?;
    get_config(state, outbox)
}

fn get_config(state: &ProtocolState, outbox: &mut Outbox) -> Result<(), FcmpError> {
    outbox.log(state.config_list, "GET CFG")?;
    outbox.send_message(&Message::Config(state.config_list))
}

fn set_position(payload: &[u8], state: &mut ProtocolState, outbox: &mut Outbox) -> Result<(), FcmpError> {
    outbox.log(state.config_list, "SET POSITION")?;
    if payload.len() != POS_FIELD_SIZE {
        return outbox.reject(Field::Pos, REJ_INVALID_FIELD_SIZE);
    }
    if state.position_pending {
        return outbox.reject(Field::Pos, REJ_POSITION_PENDING);
    }
    state.position = Position::from_field(payload)?;
    state.position_pending = true;
    debug!(position = %state.position, "position staged");
    // ACK follows once the reconciler has written the DAC
    Ok(())
}

fn get_position(state: &ProtocolState, outbox: &mut Outbox) -> Result<(), FcmpError> {
    outbox.log(state.config_list, "GET POSITION")?;
    outbox.send_message(&Message::Position(state.position))
}

fn set_filter(payload: &[u8], state: &mut ProtocolState, outbox: &mut Outbox) -> Result<(), FcmpError> {
    outbox.log(state.config_list, "SET LP FILTER")?;
    if payload.len() != LPF_FIELD_SIZE {
        return outbox.reject(Field::Lpf, REJ_INVALID_FIELD_SIZE);
    }
    let hz = u16_field("LPF", payload)?;
    if hz == 0 {
        // "Unchanged": nothing to defer, acknowledge the current value now
        return get_filter(state, outbox);
    }
    state.lpf = hz;
    state.lpf_pending = true;
    debug!(hz, "filter frequency staged");
    // ACK follows once the reconciler has retuned the clock
    Ok(())
}

fn get_filter(state: &ProtocolState, outbox: &mut Outbox) -> Result<(), FcmpError> {
    outbox.log(state.config_list, "GET LP FILTER")?;
    outbox.send_message(&Message::Filter(state.lpf))
}
