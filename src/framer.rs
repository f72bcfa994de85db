//! The receive path: a byte-driven state machine that reassembles escaped
//! frames into the shared buffer, enforces its bounds, validates the FCS,
//! and filters by destination endpoint ID.

use crate::fcs::{fcs_update, INITIAL_FCS};
use crate::{Endpoint, Platform, RxState, ESCAPE_CHAR, FRAME_CHAR, OFFSET_BYTE_COUNT, OFFSET_DEST_EID};
use log::{debug, trace, warn};

impl<'a, P: Platform> Endpoint<'a, P> {
    /// Advance one byte of work: either consume a single byte from the
    /// platform and feed it to the framer, or (while `Sending`) delegate to
    /// the transmitter. Call this regularly from the main loop.
    pub fn update(&mut self) {
        if self.rx_state == RxState::Sending {
            self.drive_tx();
            return;
        }
        #[cfg(feature = "event-tx")]
        if self.event_pending {
            // The event buffer is independent of the shared frame buffer, so
            // draining it does not need to hold off reception.
            self.drive_tx();
            return;
        }
        if self.rx_state == RxState::PacketAvailable {
            // Nothing to do here; the caller is expected to dispatch via
            // `process_control_message` or drop via `ignore_packet`.
            return;
        }
        if !self.hw_if.has_data() {
            return;
        }
        let byte = self.hw_if.read_byte();
        self.feed_byte(byte);
    }

    /// Reset the receive attempt to a fresh frame starting with `byte`
    /// (always `FRAME_CHAR`). Used both for the initial sync and for the
    /// "unexpected start flag mid-frame" recovery the spec requires.
    fn restart_frame(&mut self, byte: u8) {
        self.buffer_idx = 0;
        self.frame_buffer[0] = byte;
        self.buffer_idx = 1;
        self.body_remaining = 0;
        self.rx_state = RxState::Header1;
    }

    fn feed_byte(&mut self, byte: u8) {
        trace!("framer: state={:?} byte=0x{:02x}", self.rx_state, byte);
        match self.rx_state {
            RxState::WaitingForSync => {
                if byte == FRAME_CHAR {
                    self.restart_frame(byte);
                }
                // any other byte is discarded while hunting for sync
            }
            RxState::Header1 => {
                self.frame_buffer[self.buffer_idx] = byte;
                self.buffer_idx += 1;
                self.rx_state = RxState::Header2;
            }
            RxState::Header2 => {
                self.frame_buffer[self.buffer_idx] = byte;
                self.buffer_idx += 1;
                self.body_remaining = byte;
                // header(3) + body(N) + fcs(2) + end(1) must fit the buffer
                if byte as usize + 6 > crate::FRAME_BUFFER_LEN {
                    warn!("framer: declared body length {byte} overflows the buffer, dropping");
                    self.rx_state = RxState::WaitingForSync;
                } else {
                    self.rx_state = RxState::Body;
                }
            }
            RxState::Body => match byte {
                ESCAPE_CHAR => self.rx_state = RxState::Escape,
                FRAME_CHAR => self.restart_frame(byte),
                _ => self.store_body_byte(byte),
            },
            RxState::Escape => {
                if byte == ESCAPE_CHAR - 0x20 || byte == FRAME_CHAR - 0x20 {
                    self.store_body_byte(byte + 0x20);
                } else if byte == FRAME_CHAR {
                    self.restart_frame(byte);
                } else {
                    warn!("framer: invalid escape sequence 0x{byte:02x}, dropping frame");
                    self.rx_state = RxState::WaitingForSync;
                }
            }
            RxState::Fcs1 => {
                self.frame_buffer[self.buffer_idx] = byte;
                self.buffer_idx += 1;
                self.rx_state = RxState::Fcs2;
            }
            RxState::Fcs2 => {
                self.frame_buffer[self.buffer_idx] = byte;
                self.buffer_idx += 1;
                self.rx_state = RxState::End;
            }
            RxState::End => {
                if byte != FRAME_CHAR {
                    warn!("framer: missing end flag, dropping frame");
                    self.rx_state = RxState::WaitingForSync;
                    return;
                }
                self.frame_buffer[self.buffer_idx] = byte;
                self.buffer_idx += 1;
                self.rx_state = self.accept_or_reject();
            }
            RxState::PacketAvailable | RxState::Sending => {
                // update() never calls feed_byte in these states.
                unreachable!("feed_byte called outside the receive path")
            }
        }
    }

    /// Store a body byte (already unstuffed, if it came through `Escape`)
    /// and move to the FCS stage once the declared body length is consumed.
    fn store_body_byte(&mut self, byte: u8) {
        self.frame_buffer[self.buffer_idx] = byte;
        self.buffer_idx += 1;
        self.body_remaining -= 1;
        self.rx_state = if self.body_remaining == 0 {
            RxState::Fcs1
        } else {
            RxState::Body
        };
    }

    /// Validate the structure and FCS of the just-completed frame and, if
    /// valid, apply the destination-EID filter. Returns the next state.
    fn accept_or_reject(&self) -> RxState {
        if !self.validate_frame() {
            warn!("framer: frame failed validation, dropping");
            return RxState::WaitingForSync;
        }
        let dest = self.frame_buffer[OFFSET_DEST_EID];
        if dest == crate::EID_UNASSIGNED || dest == crate::EID_BROADCAST || dest == self.endpoint_id {
            debug!("framer: accepted frame addressed to 0x{dest:02x}");
            RxState::PacketAvailable
        } else {
            trace!("framer: frame addressed to 0x{dest:02x}, not us (0x{:02x})", self.endpoint_id);
            RxState::WaitingForSync
        }
    }

    /// Minimum frame size, declared byte-count, and FCS checks. Destination
    /// filtering happens only after this passes, per the spec.
    fn validate_frame(&self) -> bool {
        if self.buffer_idx < 11 {
            return false;
        }
        let byte_count = self.frame_buffer[OFFSET_BYTE_COUNT];
        if byte_count as usize != self.buffer_idx - 6 {
            return false;
        }
        let computed = fcs_update(INITIAL_FCS, &self.frame_buffer[1..self.buffer_idx - 3]);
        let transmitted = (u16::from(self.frame_buffer[self.buffer_idx - 3]) << 8)
            | u16::from(self.frame_buffer[self.buffer_idx - 2]);
        computed == transmitted
    }
}
