use crate::constants::{CFG_FIELD_SIZE, LPF_FIELD_SIZE, MAX_FIELD, POS_FIELD_SIZE};
use crate::error::FcmpError;
use crate::frame::{Config, Field, Frame, Method, Position, u16_field};
use bytes::Bytes;
use serde::Serialize;
use std::fmt;

/// Typed view of an FCMP frame.
///
/// The board dispatches raw [`Frame`]s so it can answer malformed fields with
/// a REJ; hosts build and read frames through this enum instead.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Message {
    Nop,
    SetConfig(Config),
    GetConfig,
    SetPosition(Position),
    GetPosition,
    /// Cutoff in Hz, 0 leaves the filter unchanged
    SetFilter(u16),
    GetFilter,
    /// ACK|CFG
    Config(Config),
    /// ACK|POS
    Position(Position),
    /// ACK|LPF
    Filter(u16),
    /// ACK|ANY sent once a staged position reached the DAC
    PositionApplied(Position),
    Rejected { field: Field, reason: String },
    Log(String),
    /// Anything without a typed representation
    Generic { method: Method, field: Field, payload: Vec<u8> },
}

impl Message {
    /// Build a LOG message, truncating text that does not fit in one frame.
    pub fn log(text: &str) -> Self {
        let mut end = text.len().min(MAX_FIELD);
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        Message::Log(text[..end].to_string())
    }

    pub fn to_frame(&self) -> Frame {
        match self {
            Message::Nop => Frame::new(Method::Nop, Field::Any, Bytes::new()),
            Message::SetConfig(cfg) => Frame::new(Method::Set, Field::Cfg, cfg.into_bytes().to_vec()),
            Message::GetConfig => Frame::new(Method::Get, Field::Cfg, Bytes::new()),
            Message::SetPosition(pos) => Frame::new(Method::Set, Field::Pos, pos.to_field().to_vec()),
            Message::GetPosition => Frame::new(Method::Get, Field::Pos, Bytes::new()),
            Message::SetFilter(hz) => Frame::new(Method::Set, Field::Lpf, hz.to_le_bytes().to_vec()),
            Message::GetFilter => Frame::new(Method::Get, Field::Lpf, Bytes::new()),
            Message::Config(cfg) => Frame::new(Method::Ack, Field::Cfg, cfg.into_bytes().to_vec()),
            Message::Position(pos) => Frame::new(Method::Ack, Field::Pos, pos.to_field().to_vec()),
            Message::Filter(hz) => Frame::new(Method::Ack, Field::Lpf, hz.to_le_bytes().to_vec()),
            Message::PositionApplied(pos) => Frame::new(Method::Ack, Field::Any, pos.to_field().to_vec()),
            Message::Rejected { field, reason } => Frame::new(Method::Rej, *field, reason.clone().into_bytes()),
            Message::Log(text) => Frame::new(Method::Log, Field::Any, text.clone().into_bytes()),
            Message::Generic { method, field, payload } => Frame::new(*method, *field, payload.clone()),
        }
    }
}

impl TryFrom<Frame> for Message {
    type Error = FcmpError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        let field = frame.field.as_ref();
        let message = match (frame.method(), frame.field_id(), field.len()) {
            (Method::Nop, _, _) => Message::Nop,
            (Method::Log, _, _) => Message::Log(String::from_utf8_lossy(field).into_owned()),
            (Method::Rej, field_id, _) => Message::Rejected {
                field: field_id,
                reason: String::from_utf8_lossy(field).into_owned(),
            },
            (Method::Set, Field::Cfg, CFG_FIELD_SIZE) => Message::SetConfig(Config::from_bits(u16_field("CFG", field)?)),
            (Method::Set, Field::Pos, POS_FIELD_SIZE) => Message::SetPosition(Position::from_field(field)?),
            (Method::Set, Field::Lpf, LPF_FIELD_SIZE) => Message::SetFilter(u16_field("LPF", field)?),
            (Method::Get, Field::Cfg, 0) => Message::GetConfig,
            (Method::Get, Field::Pos, 0) => Message::GetPosition,
            (Method::Get, Field::Lpf, 0) => Message::GetFilter,
            (Method::Ack, Field::Cfg, CFG_FIELD_SIZE) => Message::Config(Config::from_bits(u16_field("CFG", field)?)),
            (Method::Ack, Field::Pos, POS_FIELD_SIZE) => Message::Position(Position::from_field(field)?),
            (Method::Ack, Field::Lpf, LPF_FIELD_SIZE) => Message::Filter(u16_field("LPF", field)?),
            (Method::Ack, Field::Any, POS_FIELD_SIZE) => Message::PositionApplied(Position::from_field(field)?),
            (method, field_id, _) => Message::Generic {
                method,
                field: field_id,
                payload: field.to_vec(),
            },
        };
        Ok(message)
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Nop => write!(f, "NOP"),
            Message::SetConfig(cfg) => write!(f, "SET CFG {cfg}"),
            Message::GetConfig => write!(f, "GET CFG"),
            Message::SetPosition(pos) => write!(f, "SET POS {pos}"),
            Message::GetPosition => write!(f, "GET POS"),
            Message::SetFilter(hz) => write!(f, "SET LPF {hz} Hz"),
            Message::GetFilter => write!(f, "GET LPF"),
            Message::Config(cfg) => write!(f, "ACK CFG {cfg}"),
            Message::Position(pos) => write!(f, "ACK POS {pos}"),
            Message::Filter(hz) => write!(f, "ACK LPF {hz} Hz"),
            Message::PositionApplied(pos) => write!(f, "ACK position applied {pos}"),
            Message::Rejected { field, reason } => write!(f, "REJ {field}: {reason}"),
            Message::Log(text) => write!(f, "LOG {text}"),
            Message::Generic { method, field, payload } => {
                write!(f, "{method}|{field} [{}]", hex::encode(payload))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_frame_conversion() {
        let messages = [
            Message::SetConfig(Config::new().with_mems_en(true)),
            Message::GetPosition,
            Message::Filter(200),
            Message::PositionApplied(Position::new(1, 2, 3, 4)),
            Message::Rejected {
                field: Field::Pos,
                reason: "Position change already pending".to_string(),
            },
        ];
        for message in messages {
            let frame = message.to_frame();
            assert_eq!(Message::try_from(frame).unwrap(), message);
        }
    }

    #[test]
    fn test_wrong_size_falls_back_to_generic() {
        let frame = Frame::new(Method::Set, Field::Cfg, vec![0x01]);
        assert_eq!(
            Message::try_from(frame).unwrap(),
            Message::Generic {
                method: Method::Set,
                field: Field::Cfg,
                payload: vec![0x01],
            }
        );
    }

    #[test]
    fn test_log_truncates_on_char_boundary() {
        let text = "é".repeat(200);
        let Message::Log(truncated) = Message::log(&text) else {
            panic!("expected LOG");
        };
        assert!(truncated.len() <= MAX_FIELD);
        assert_eq!(truncated.len() % 2, 0);
    }

    #[test]
    fn test_message_json() {
        let json = serde_json::to_string(&Message::Filter(200)).unwrap();
        assert_eq!(json, r#"{"kind":"filter","value":200}"#);
    }
}
