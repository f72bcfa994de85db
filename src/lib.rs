//! # mctp-serial
//!
//! An endpoint-side implementation of the Management Component Transport
//! Protocol (MCTP) over a byte-oriented serial transport: a
//! single-endpoint responder on one bus that reassembles escaped frames,
//! validates them, dispatches the four MCTP control-message requests, and
//! drains responses (and, optionally, asynchronous event datagrams) back
//! out through a byte-at-a-time, backpressure-aware transmitter.
//!
//! The crate is written for resource-constrained, single-threaded
//! environments: no heap allocation, fixed-size buffers sized at compile
//! time, and a single [`Endpoint`] polled cooperatively from a main loop.
//! The serial driver itself — reading/writing individual bytes and
//! reporting whether the link can accept more — is an injected capability
//! ([`Platform`]), not something this crate talks to hardware for directly.
//!
//! ## Example
//! ```
//! use mctp_serial::{Endpoint, Platform};
//! use std::cell::{Cell, RefCell};
//!
//! struct Loopback {
//!     rx: RefCell<Vec<u8>>,
//!     tx: RefCell<Vec<u8>>,
//!     writes_left: Cell<u32>,
//! }
//!
//! impl Platform for Loopback {
//!     fn has_data(&self) -> bool {
//!         !self.rx.borrow().is_empty()
//!     }
//!     fn read_byte(&self) -> u8 {
//!         self.rx.borrow_mut().remove(0)
//!     }
//!     fn can_write(&self) -> bool {
//!         self.writes_left.get() > 0
//!     }
//!     fn write_byte(&self, byte: u8) {
//!         self.tx.borrow_mut().push(byte);
//!         self.writes_left.set(self.writes_left.get() - 1);
//!     }
//! }
//!
//! let platform = Loopback {
//!     rx: RefCell::new(Vec::new()),
//!     tx: RefCell::new(Vec::new()),
//!     writes_left: Cell::new(u32::MAX),
//! };
//! let mut endpoint = Endpoint::new(&platform);
//! assert!(!endpoint.is_packet_available());
//! ```

#![warn(missing_docs)]

mod control;
mod fcs;
mod framer;
mod platform;
mod transmit;

#[cfg(test)]
pub(crate) mod test_support;

pub use fcs::{fcs_update, INITIAL_FCS};
pub use platform::Platform;

/// Maximum MCTP body (payload) size this endpoint supports in a single
/// frame, in bytes. Fixed at compile time per the spec's "no dynamic
/// allocation" constraint.
pub const BASELINE_TRANSMISSION_UNIT: usize = 64;

/// Size of the shared frame buffer: a start flag, protocol version byte,
/// byte-count byte, the baseline transmission unit of payload, two FCS
/// bytes, and an end flag.
pub const FRAME_BUFFER_LEN: usize = BASELINE_TRANSMISSION_UNIT + 6;

/// Size of the optional event transmit buffer (feature `event-tx`).
#[cfg(feature = "event-tx")]
pub const EVENT_TX_BUF_SIZE: usize = 128;

pub(crate) const FRAME_CHAR: u8 = 0x7E;
pub(crate) const ESCAPE_CHAR: u8 = 0x7D;

pub(crate) const OFFSET_BYTE_COUNT: usize = 2;
pub(crate) const OFFSET_DEST_EID: usize = 4;
pub(crate) const OFFSET_SRC_EID: usize = 5;
pub(crate) const OFFSET_FLAGS: usize = 6;
pub(crate) const OFFSET_MSG_TYPE: usize = 7;
pub(crate) const OFFSET_CTRL_INSTANCE_ID: usize = 8;
pub(crate) const OFFSET_CTRL_COMMAND_CODE: usize = 9;
pub(crate) const OFFSET_CTRL_COMPLETION_CODE: usize = 10;

/// Reserved endpoint ID meaning "unassigned" on requests, "broadcast" as a
/// destination.
pub const EID_UNASSIGNED: u8 = 0x00;
/// Reserved endpoint ID meaning "all endpoints" as a destination.
pub const EID_BROADCAST: u8 = 0xFF;

/// MCTP control command codes this endpoint dispatches on.
pub mod command {
    /// Set Endpoint ID.
    pub const SET_ENDPOINT_ID: u8 = 0x01;
    /// Get Endpoint ID.
    pub const GET_ENDPOINT_ID: u8 = 0x02;
    /// Get MCTP Version Support.
    pub const GET_MCTP_VERSION_SUPPORT: u8 = 0x04;
    /// Get Message Type Support.
    pub const GET_MESSAGE_TYPE_SUPPORT: u8 = 0x05;
}

/// MCTP control message completion codes.
pub mod completion {
    /// Request succeeded.
    pub const SUCCESS: u8 = 0x00;
    /// Unspecified error.
    pub const ERROR: u8 = 0x01;
    /// Request data is invalid for this command.
    pub const INVALID_DATA: u8 = 0x02;
    /// Request length is invalid for this command.
    pub const INVALID_LENGTH: u8 = 0x03;
    /// Endpoint is not ready to process the request.
    pub const NOT_READY: u8 = 0x04;
    /// Command code is not supported by this endpoint.
    pub const UNSUPPORTED_CMD: u8 = 0x05;
    /// Start of the command-specific completion code range (0x80..0xFF).
    pub const COMMAND_SPECIFIC_START: u8 = 0x80;
}

/// Errors this crate's public API can return.
///
/// Protocol-level outcomes (bad FCS, oversize frames, an unsupported
/// control command, ...) are not represented here: they either drop a
/// frame silently (the spec: "MCTP has no negative acknowledgement for
/// these") or are written into the response buffer as a completion code,
/// which the remote side — not the caller of this API — consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// [`Endpoint::send_event`] was called while an event frame is still
    /// queued or being drained.
    EventSlotOccupied,
    /// The frame passed to [`Endpoint::send_event`] does not fit in the
    /// event buffer.
    EventTooLarge,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::EventSlotOccupied => write!(f, "event transmit slot is already occupied"),
            Error::EventTooLarge => write!(f, "event frame is larger than the event buffer"),
        }
    }
}

/// Receiver state. The state tag doubles as the mutex between the framer
/// and the transmitter described in the spec: while `Sending`, `update()`
/// declines to read a byte; while anything else, the transmitter has
/// nothing of the primary slot to drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RxState {
    /// Discarding bytes until the next start flag.
    WaitingForSync,
    /// Just saw the start flag; next byte is the protocol version.
    Header1,
    /// Next byte is the body byte count.
    Header2,
    /// Accumulating body bytes.
    Body,
    /// Just saw an escape character inside the body.
    Escape,
    /// Next byte is the FCS high byte.
    Fcs1,
    /// Next byte is the FCS low byte.
    Fcs2,
    /// Next byte must be the end flag.
    End,
    /// A validated frame addressed to this endpoint is sitting in the
    /// buffer, waiting for [`Endpoint::process_control_message`] or
    /// [`Endpoint::ignore_packet`].
    PacketAvailable,
    /// The primary slot is draining the buffer; reception is suspended.
    Sending,
}

/// Which transmit slot, if any, currently owns the shared frame buffer (or
/// the event buffer) and is mid-emission.
///
/// Chosen once at the start of a transmit burst and held until that slot's
/// frame completes — frames from different slots are never interleaved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActiveSlot {
    /// Nothing is being transmitted.
    None,
    /// The primary (response) slot is draining.
    Primary,
    /// The event slot is draining.
    #[cfg(feature = "event-tx")]
    Event,
}

/// A single MCTP-over-serial endpoint.
///
/// Owns the shared frame buffer, the receive state machine, the resumable
/// transmit cursor, and (with feature `event-tx`) a second prioritized
/// event slot. Constructed once per bus and threaded through every call —
/// there is no hidden global state.
pub struct Endpoint<'a, P: Platform> {
    pub(crate) hw_if: &'a P,
    pub(crate) endpoint_id: u8,

    pub(crate) frame_buffer: [u8; FRAME_BUFFER_LEN],
    pub(crate) buffer_idx: usize,
    pub(crate) body_remaining: u8,
    pub(crate) rx_state: RxState,

    pub(crate) send_idx: usize,
    pub(crate) send_total_len: usize,
    pub(crate) send_escape_pending: bool,
    pub(crate) send_pending_byte: u8,

    pub(crate) active_slot: ActiveSlot,

    #[cfg(feature = "event-tx")]
    pub(crate) event_buffer: [u8; EVENT_TX_BUF_SIZE],
    #[cfg(feature = "event-tx")]
    pub(crate) event_len: usize,
    #[cfg(feature = "event-tx")]
    pub(crate) event_idx: usize,
    #[cfg(feature = "event-tx")]
    pub(crate) event_pending: bool,
    #[cfg(feature = "event-tx")]
    pub(crate) event_escape_pending: bool,
    #[cfg(feature = "event-tx")]
    pub(crate) event_pending_byte: u8,
}

impl<'a, P: Platform> Endpoint<'a, P> {
    /// Construct an endpoint against the given platform and reset the
    /// framer to `WaitingForSync`.
    ///
    /// This folds the spec's separate `init()` entry point into
    /// construction: a freshly-built `Endpoint` is already initialized,
    /// so there is no two-phase "construct, then call init" dance.
    /// `endpoint_id` starts at `0x00` (unprogrammed), matching the spec.
    pub fn new(hw_if: &'a P) -> Self {
        hw_if.init();
        Endpoint {
            hw_if,
            endpoint_id: EID_UNASSIGNED,
            frame_buffer: [0u8; FRAME_BUFFER_LEN],
            buffer_idx: 0,
            body_remaining: 0,
            rx_state: RxState::WaitingForSync,
            send_idx: 0,
            send_total_len: 0,
            send_escape_pending: false,
            send_pending_byte: 0,
            active_slot: ActiveSlot::None,
            #[cfg(feature = "event-tx")]
            event_buffer: [0u8; EVENT_TX_BUF_SIZE],
            #[cfg(feature = "event-tx")]
            event_len: 0,
            #[cfg(feature = "event-tx")]
            event_idx: 0,
            #[cfg(feature = "event-tx")]
            event_pending: false,
            #[cfg(feature = "event-tx")]
            event_escape_pending: false,
            #[cfg(feature = "event-tx")]
            event_pending_byte: 0,
        }
    }

    /// The endpoint ID currently programmed into this endpoint (`0x00` if
    /// still unprogrammed).
    pub fn endpoint_id(&self) -> u8 {
        self.endpoint_id
    }

    /// True iff a complete, validated frame addressed to this endpoint is
    /// waiting in the buffer.
    pub fn is_packet_available(&self) -> bool {
        self.rx_state == RxState::PacketAvailable
    }

    /// True iff the available packet's message type is "control"
    /// (low nibble `0x0`). Only meaningful when [`Self::is_packet_available`]
    /// is true.
    pub fn is_control_packet(&self) -> bool {
        (self.frame_buffer[OFFSET_MSG_TYPE] & 0x0F) == 0x00
    }

    /// True iff the available packet's message type is PLDM
    /// (low nibble `0x1`). Only meaningful when [`Self::is_packet_available`]
    /// is true.
    pub fn is_pldm_packet(&self) -> bool {
        (self.frame_buffer[OFFSET_MSG_TYPE] & 0x0F) == 0x01
    }

    /// Drop the currently available packet and resume waiting for a new
    /// frame, without sending any response.
    pub fn ignore_packet(&mut self) {
        self.rx_state = RxState::WaitingForSync;
    }
}
