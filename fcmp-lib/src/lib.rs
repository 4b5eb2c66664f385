pub mod cobs;
pub mod constants;
pub mod controller;
pub mod dispatcher;
pub mod error;
pub mod frame;
pub mod hardware;
pub mod message;
pub mod mems;
pub mod outbox;
pub mod pipeline;
pub mod port;
pub mod reconciler;
pub mod state;


// Re-export the types most callers need
pub use controller::Controller;
pub use error::{CobsError, FcmpError};
pub use frame::{Config, Field, Frame, Header, Method, Position};
pub use hardware::{Actuator, ByteTransport, FilterClock};
pub use message::Message;
