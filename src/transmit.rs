//! The transmit path: a resumable, byte-paced emitter with backpressure.
//!
//! Grounded on the reference implementation's `mctp_send_frame`: never spins
//! waiting for the link, never emits more than one byte per poll, and
//! preserves exact resume state (including a pending stuffed byte) across
//! calls where the platform reports it cannot accept a write.

use crate::{ActiveSlot, Endpoint, Platform, RxState, ESCAPE_CHAR, FRAME_CHAR};
use log::{debug, trace};

#[cfg(feature = "event-tx")]
use crate::Error;

impl<'a, P: Platform> Endpoint<'a, P> {
    /// Emit at most one byte of whichever slot currently owns the link.
    /// Called from [`Self::update`] while `Sending` or while an event frame
    /// is pending.
    pub(crate) fn drive_tx(&mut self) {
        if self.active_slot == ActiveSlot::None {
            self.select_slot();
        }
        match self.active_slot {
            ActiveSlot::Primary => self.drive_primary(),
            #[cfg(feature = "event-tx")]
            ActiveSlot::Event => self.drive_event(),
            ActiveSlot::None => {}
        }
    }

    fn select_slot(&mut self) {
        if self.rx_state == RxState::Sending {
            self.active_slot = ActiveSlot::Primary;
            return;
        }
        #[cfg(feature = "event-tx")]
        if self.event_pending {
            self.active_slot = ActiveSlot::Event;
        }
    }

    /// Hand the shared frame buffer to the transmitter and suspend
    /// reception until the response has fully drained.
    pub(crate) fn begin_primary_send(&mut self, total_len: usize) {
        debug!("transmit: sending {total_len}-byte response");
        self.send_idx = 0;
        self.send_total_len = total_len;
        self.send_escape_pending = false;
        self.rx_state = RxState::Sending;
        self.active_slot = ActiveSlot::Primary;
    }

    fn drive_primary(&mut self) {
        if !self.hw_if.can_write() {
            return;
        }
        if self.send_escape_pending {
            self.hw_if.write_byte(self.send_pending_byte);
            self.send_escape_pending = false;
            self.send_idx += 1;
            self.maybe_finish_primary();
            return;
        }
        if self.send_idx >= self.send_total_len {
            self.finish_primary();
            return;
        }
        let byte = self.frame_buffer[self.send_idx];
        if self.needs_stuffing(self.send_idx, self.send_total_len, byte) {
            self.hw_if.write_byte(ESCAPE_CHAR);
            self.send_pending_byte = byte ^ 0x20;
            self.send_escape_pending = true;
        } else {
            self.hw_if.write_byte(byte);
            self.send_idx += 1;
            self.maybe_finish_primary();
        }
    }

    fn maybe_finish_primary(&mut self) {
        if self.send_idx >= self.send_total_len {
            self.finish_primary();
        }
    }

    fn finish_primary(&mut self) {
        trace!("transmit: response fully drained");
        self.rx_state = RxState::WaitingForSync;
        self.active_slot = ActiveSlot::None;
    }

    /// Byte stuffing applies only to the body (the variable-length message
    /// payload), matching the receiver: the framer only watches for
    /// `FRAME_CHAR`/`ESCAPE_CHAR` while in its `Body` state, so the start
    /// flag, version, byte count, FCS and end flag are all sent verbatim
    /// even if one of them happens to collide with a reserved byte value.
    fn needs_stuffing(&self, idx: usize, total_len: usize, byte: u8) -> bool {
        let body_start = 3;
        let body_end = total_len - 3; // exclusive: fcs_hi, fcs_lo, end flag follow
        idx >= body_start && idx < body_end && (byte == FRAME_CHAR || byte == ESCAPE_CHAR)
    }
}

#[cfg(feature = "event-tx")]
impl<'a, P: Platform> Endpoint<'a, P> {
    /// Queue an endpoint-originated event datagram for transmission.
    ///
    /// `body` is the already-framed MCTP message body (destination/source
    /// EID, flags, message type, and payload) without start flag, byte
    /// count, FCS, or end flag — those are computed here, matching the
    /// response path. Returns [`Error::EventSlotOccupied`] if a previous
    /// event frame has not finished draining, or [`Error::EventTooLarge`]
    /// if `body` does not fit the event buffer.
    pub fn send_event(&mut self, body: &[u8]) -> Result<(), Error> {
        if self.event_pending {
            return Err(Error::EventSlotOccupied);
        }
        let total_len = body.len() + 6;
        if total_len > crate::EVENT_TX_BUF_SIZE {
            return Err(Error::EventTooLarge);
        }

        self.event_buffer[0] = FRAME_CHAR;
        self.event_buffer[1] = 0x01; // protocol version
        self.event_buffer[2] = body.len() as u8;
        self.event_buffer[3..3 + body.len()].copy_from_slice(body);

        let fcs = crate::fcs_update(crate::INITIAL_FCS, &self.event_buffer[1..3 + body.len()]);
        self.event_buffer[3 + body.len()] = (fcs >> 8) as u8;
        self.event_buffer[4 + body.len()] = (fcs & 0xff) as u8;
        self.event_buffer[5 + body.len()] = FRAME_CHAR;

        self.event_len = total_len;
        self.event_idx = 0;
        self.event_escape_pending = false;
        self.event_pending = true;
        debug!("transmit: queued {total_len}-byte event frame");
        Ok(())
    }

    /// True iff no event frame is queued or in flight.
    pub fn is_event_queue_empty(&self) -> bool {
        !self.event_pending
    }

    fn drive_event(&mut self) {
        if !self.hw_if.can_write() {
            return;
        }
        if self.event_escape_pending {
            self.hw_if.write_byte(self.event_pending_byte);
            self.event_escape_pending = false;
            self.event_idx += 1;
            self.maybe_finish_event();
            return;
        }
        if self.event_idx >= self.event_len {
            self.finish_event();
            return;
        }
        let byte = self.event_buffer[self.event_idx];
        if self.needs_stuffing(self.event_idx, self.event_len, byte) {
            self.hw_if.write_byte(ESCAPE_CHAR);
            self.event_pending_byte = byte ^ 0x20;
            self.event_escape_pending = true;
        } else {
            self.hw_if.write_byte(byte);
            self.event_idx += 1;
            self.maybe_finish_event();
        }
    }

    fn maybe_finish_event(&mut self) {
        if self.event_idx >= self.event_len {
            self.finish_event();
        }
    }

    fn finish_event(&mut self) {
        trace!("transmit: event frame fully drained");
        self.event_pending = false;
        self.active_slot = ActiveSlot::None;
    }
}
