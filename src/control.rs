//! Dispatch and handling of the four MCTP control-message requests this
//! endpoint understands: Set Endpoint ID, Get Endpoint ID, Get MCTP Version
//! Support, and Get Message Type Support.
//!
//! Every handler works the same way: rewrite the shared frame buffer's
//! transport header in place (swap source/destination EID, mark the packet
//! a response), append a completion code and any command-specific data
//! after the command code, then hand the buffer to the transmitter.

use crate::{
    command, completion, Endpoint, Platform, OFFSET_CTRL_COMMAND_CODE, OFFSET_CTRL_COMPLETION_CODE,
    OFFSET_CTRL_INSTANCE_ID, OFFSET_DEST_EID, OFFSET_FLAGS, OFFSET_SRC_EID, EID_BROADCAST,
    EID_UNASSIGNED,
};
use log::{debug, warn};

/// Byte offset of the first response data byte, right after the completion
/// code.
const OFFSET_RESPONSE_DATA: usize = OFFSET_CTRL_COMPLETION_CODE + 1;

/// Rq/D/instance-ID byte with the request bit cleared.
const RQ_BIT: u8 = 0x80;

impl<'a, P: Platform> Endpoint<'a, P> {
    /// Process the control message currently sitting in the shared buffer
    /// and queue its response for transmission. Only meaningful when
    /// [`Self::is_packet_available`] and [`Self::is_control_packet`] are
    /// both true; the caller is expected to have checked both.
    pub fn process_control_message(&mut self) {
        let command_code = self.frame_buffer[OFFSET_CTRL_COMMAND_CODE];
        debug!("control: dispatching command 0x{command_code:02x}");

        self.rewrite_header_for_response();

        match command_code {
            command::SET_ENDPOINT_ID => self.handle_set_endpoint_id(),
            command::GET_ENDPOINT_ID => self.handle_get_endpoint_id(),
            command::GET_MCTP_VERSION_SUPPORT => self.handle_get_mctp_version_support(),
            command::GET_MESSAGE_TYPE_SUPPORT => self.handle_get_message_type_support(),
            other => {
                warn!("control: command 0x{other:02x} is not supported");
                self.send_response(completion::UNSUPPORTED_CMD, &[])
            }
        }
    }

    /// Swap source/destination EID, clear the request bit, toggle Tag
    /// Owner, and mark the packet single-fragment. Shared by every handler
    /// regardless of outcome, since even an error response needs a valid
    /// transport header.
    fn rewrite_header_for_response(&mut self) {
        let requester_eid = self.frame_buffer[OFFSET_SRC_EID];
        self.frame_buffer[OFFSET_DEST_EID] = requester_eid;
        self.frame_buffer[OFFSET_SRC_EID] = self.endpoint_id;
        self.frame_buffer[OFFSET_FLAGS] |= 0xC0; // SOM | EOM, single-packet response
        self.frame_buffer[OFFSET_FLAGS] ^= 0x08; // toggle Tag Owner
        self.frame_buffer[OFFSET_CTRL_INSTANCE_ID] &= !RQ_BIT;
    }

    /// Write the completion code and response-specific payload, recompute
    /// the byte count and FCS, append the end flag, and queue it.
    fn send_response(&mut self, completion_code: u8, data: &[u8]) {
        self.frame_buffer[OFFSET_CTRL_COMPLETION_CODE] = completion_code;
        self.frame_buffer[OFFSET_RESPONSE_DATA..OFFSET_RESPONSE_DATA + data.len()]
            .copy_from_slice(data);

        let body_end = OFFSET_RESPONSE_DATA + data.len();
        let byte_count = (body_end - 3) as u8;
        self.frame_buffer[crate::OFFSET_BYTE_COUNT] = byte_count;

        let fcs = crate::fcs_update(crate::INITIAL_FCS, &self.frame_buffer[1..body_end]);
        self.frame_buffer[body_end] = (fcs >> 8) as u8;
        self.frame_buffer[body_end + 1] = (fcs & 0xff) as u8;
        self.frame_buffer[body_end + 2] = crate::FRAME_CHAR;

        self.begin_primary_send(body_end + 3);
    }

    /// Commits `self.endpoint_id` immediately, before the response frame
    /// has actually left the wire. The transport header was already
    /// rewritten by [`Self::rewrite_header_for_response`] using the *old*
    /// ID, so the acknowledgement still appears to originate from the
    /// endpoint's pre-assignment identity even though the new ID is live
    /// by the time this function returns — matching the reference
    /// implementation's timing rather than deferring the commit until the
    /// transmitter drains.
    fn handle_set_endpoint_id(&mut self) {
        let operation = self.frame_buffer[OFFSET_RESPONSE_DATA] & 0x03;
        let requested_eid = self.frame_buffer[OFFSET_RESPONSE_DATA + 1];

        match operation {
            0x00 | 0x01 => {
                if requested_eid == EID_UNASSIGNED || requested_eid == EID_BROADCAST {
                    warn!("control: refusing to set reserved endpoint ID 0x{requested_eid:02x}");
                    // assignment status 0x10: EID rejected
                    self.send_response(completion::INVALID_DATA, &[0x10, 0x00, 0x00]);
                    return;
                }
                self.endpoint_id = requested_eid;
                debug!("control: endpoint ID set to 0x{requested_eid:02x}");
                // assignment status 0x00 (accepted), EID setting, no pool
                self.send_response(completion::SUCCESS, &[0x00, self.endpoint_id, 0x00]);
            }
            // Reset EID to the statically configured default, and set the
            // discovered flag: neither is backed by persistent configuration
            // on this endpoint.
            _ => {
                warn!("control: Set Endpoint ID operation 0x{operation:02x} is not supported");
                // assignment status 0x10: EID rejected (default, never accepted here)
                self.send_response(completion::INVALID_DATA, &[0x10, 0x00, 0x00]);
            }
        }
    }

    fn handle_get_endpoint_id(&mut self) {
        // endpoint ID, endpoint type (0x00: simple endpoint, dynamic EID,
        // no pool)
        self.send_response(completion::SUCCESS, &[self.endpoint_id, 0x00]);
    }

    fn handle_get_mctp_version_support(&mut self) {
        let message_type_selector = self.frame_buffer[OFFSET_RESPONSE_DATA];

        // 0xff requests the version of the base MCTP transport itself.
        const BASE_PROTOCOL_SELECTOR: u8 = 0xff;
        const CONTROL_MESSAGE_TYPE: u8 = 0x00;
        #[cfg(feature = "pldm")]
        const PLDM_MESSAGE_TYPE: u8 = 0x01;

        let version = match message_type_selector {
            BASE_PROTOCOL_SELECTOR | CONTROL_MESSAGE_TYPE => Some([0x01, 0x03, 0x01, 0x00]),
            #[cfg(feature = "pldm")]
            PLDM_MESSAGE_TYPE => Some([0x01, 0x00, 0x00, 0x00]),
            _ => None,
        };

        match version {
            Some(entry) => {
                let mut data = [0u8; 5];
                data[0] = 0x01; // one version entry follows
                data[1..5].copy_from_slice(&entry);
                self.send_response(completion::SUCCESS, &data);
            }
            None => {
                warn!("control: version support requested for unsupported message type 0x{message_type_selector:02x}");
                self.send_response(completion::COMMAND_SPECIFIC_START, &[0x00]);
            }
        }
    }

    fn handle_get_message_type_support(&mut self) {
        // The four control command codes this endpoint supports, reported
        // verbatim as the spec's wire layout requires (not the MCTP
        // message-type value 0x00 "control").
        #[cfg(not(feature = "pldm"))]
        let types: &[u8] = &[
            command::SET_ENDPOINT_ID,
            command::GET_ENDPOINT_ID,
            command::GET_MCTP_VERSION_SUPPORT,
            command::GET_MESSAGE_TYPE_SUPPORT,
        ];
        #[cfg(feature = "pldm")]
        let types: &[u8] = &[
            command::SET_ENDPOINT_ID,
            command::GET_ENDPOINT_ID,
            command::GET_MCTP_VERSION_SUPPORT,
            command::GET_MESSAGE_TYPE_SUPPORT,
            0x01,
        ];

        let mut data = [0u8; 6];
        data[0] = types.len() as u8;
        data[1..1 + types.len()].copy_from_slice(types);
        self.send_response(completion::SUCCESS, &data[..1 + types.len()]);
    }
}
