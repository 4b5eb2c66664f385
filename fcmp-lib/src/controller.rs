use crate::constants::MAX_ENCODED;
use crate::dispatcher;
use crate::error::FcmpError;
use crate::hardware::{Actuator, ByteTransport, FilterClock, Peripherals};
use crate::outbox::Outbox;
use crate::pipeline::{ReceiveSession, Received};
use crate::reconciler;
use crate::state::ProtocolState;
use tracing::{debug, error};

/// The board's control loop: one instance owns the protocol state, both
/// codec buffers and the peripherals, and runs one cycle at a time.
pub struct Controller<A, C> {
    state: ProtocolState,
    session: ReceiveSession,
    outbox: Outbox,
    peripherals: Peripherals<A, C>,
    rx_buf: [u8; MAX_ENCODED],
}

impl<A: Actuator, C: FilterClock> Controller<A, C> {
    pub fn new(actuator: A, clock: C) -> Self {
        Self {
            state: ProtocolState::new(),
            session: ReceiveSession::new(),
            outbox: Outbox::new(),
            peripherals: Peripherals::new(actuator, clock),
            rx_buf: [0; MAX_ENCODED],
        }
    }

    pub fn state(&self) -> &ProtocolState {
        &self.state
    }

    pub fn session(&self) -> &ReceiveSession {
        &self.session
    }

    pub fn peripherals(&self) -> &Peripherals<A, C> {
        &self.peripherals
    }

    pub fn peripherals_mut(&mut self) -> &mut Peripherals<A, C> {
        &mut self.peripherals
    }

    /// Drive every peripheral to the boot configuration.
    pub fn startup(&mut self) -> Result<(), FcmpError> {
        debug!("applying boot configuration");
        reconciler::apply_config(&mut self.state, &mut self.peripherals, &mut self.outbox)
    }

    /// One control cycle: read, handle at most one frame, reconcile, flush
    /// replies.
    ///
    /// Replies queued before an error are still flushed; the first error is
    /// returned after that.
    pub fn cycle<T: ByteTransport>(&mut self, transport: &mut T) -> Result<(), FcmpError> {
        let result = self.run_cycle(transport);
        if let Err(err) = &result {
            error!(%err, "control cycle failed");
        }
        let flushed = self.flush(transport);
        result.and(flushed)
    }

    fn run_cycle<T: ByteTransport>(&mut self, transport: &mut T) -> Result<(), FcmpError> {
        self.receive(transport)?;
        self.process()?;
        self.reconcile()
    }

    fn receive<T: ByteTransport>(&mut self, transport: &mut T) -> Result<(), FcmpError> {
        // Whatever does not fit stays in the transport for a later cycle
        let room = self.session.space();
        let n = transport.read_available(&mut self.rx_buf[..room])?;
        if n > 0 {
            self.session.push(&self.rx_buf[..n]);
        }
        Ok(())
    }

    /// Handle the next event from the receive session, if any.
    pub fn process(&mut self) -> Result<(), FcmpError> {
        let Some(event) = self.session.poll() else {
            return Ok(());
        };
        let config = self.state.config_list;
        match event {
            Received::Frame(frame) => {
                dispatcher::dispatch(&frame, &mut self.state, &mut self.peripherals, &mut self.outbox)
            }
            Received::ChecksumError(residue) => {
                // No REJ: a corrupted header cannot be trusted to address one
                self.outbox.log(config, &format!("FCMP Checksum Error <0x{residue:02X}>"))
            }
            Received::Runt(len) => self.outbox.log(config, &format!("FCMP Runt Frame ({len} bytes)")),
            Received::CodecError(err) => self.outbox.log(config, &format!("COBS Decode Error {}", err.code())),
        }
    }

    /// Configuration retries (no-op when clean), then the gated pending changes.
    pub fn reconcile(&mut self) -> Result<(), FcmpError> {
        reconciler::apply_config(&mut self.state, &mut self.peripherals, &mut self.outbox)?;
        reconciler::apply_pending(&mut self.state, &mut self.peripherals, &mut self.outbox)
    }

    fn flush<T: ByteTransport>(&mut self, transport: &mut T) -> Result<(), FcmpError> {
        for frame in self.outbox.drain() {
            transport.write_all(&frame)?;
        }
        Ok(())
    }
}
