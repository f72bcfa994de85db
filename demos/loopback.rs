//! In-memory demonstration: build a Get Endpoint ID request by hand, feed
//! it to an endpoint through a loopback `Platform`, and print the response
//! it sends back. No real serial hardware involved — run with
//! `cargo run --example loopback`.

use mctp_serial::{Endpoint, Platform};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

struct Loopback {
    rx: RefCell<VecDeque<u8>>,
    tx: RefCell<Vec<u8>>,
    writes_left: Cell<u32>,
}

impl Platform for Loopback {
    fn has_data(&self) -> bool {
        !self.rx.borrow().is_empty()
    }

    fn read_byte(&self) -> u8 {
        self.rx.borrow_mut().pop_front().expect("read_byte with no data queued")
    }

    fn can_write(&self) -> bool {
        self.writes_left.get() > 0
    }

    fn write_byte(&self, byte: u8) {
        self.tx.borrow_mut().push(byte);
        self.writes_left.set(self.writes_left.get() - 1);
    }
}

fn build_get_endpoint_id_request() -> Vec<u8> {
    // Dest EID 0x00 (unassigned, accepted by every endpoint), source EID
    // 0x09, flags SOM|EOM|TO, control message type, request instance 0.
    let body = [0x00u8, 0x00, 0x09, 0xC8, 0x00, 0x80, mctp_serial::command::GET_ENDPOINT_ID];
    let mut unescaped = vec![0x01u8, body.len() as u8];
    unescaped.extend_from_slice(&body);
    let fcs = mctp_serial::fcs_update(mctp_serial::INITIAL_FCS, &unescaped);

    let mut frame = vec![0x7E];
    frame.extend_from_slice(&unescaped);
    frame.push((fcs >> 8) as u8);
    frame.push((fcs & 0xff) as u8);
    frame.push(0x7E);
    frame
}

fn main() {
    env_logger::init();

    let platform = Loopback {
        rx: RefCell::new(VecDeque::new()),
        tx: RefCell::new(Vec::new()),
        writes_left: Cell::new(u32::MAX),
    };
    let mut endpoint = Endpoint::new(&platform);

    platform.rx.borrow_mut().extend(build_get_endpoint_id_request());

    // The request is a handful of bytes and the response fits in one
    // frame, so a fixed number of polls is enough to both receive it and
    // fully drain the response.
    for _ in 0..256 {
        endpoint.update();
        if endpoint.is_packet_available() {
            if endpoint.is_control_packet() {
                endpoint.process_control_message();
            } else {
                endpoint.ignore_packet();
            }
        }
    }

    let response: Vec<u8> = platform.tx.borrow().clone();
    println!("sent {} bytes: {:02x?}", response.len(), response);
}
