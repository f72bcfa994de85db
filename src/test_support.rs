//! A tiny in-memory [`Platform`](crate::Platform) used by this crate's own
//! unit tests. Mirrors the `platform_mock.c` pattern from the reference
//! implementation: push bytes to be "received", drain bytes that were
//! "transmitted", and throttle writes to exercise backpressure.

use crate::Platform;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

pub(crate) struct Loopback {
    rx: RefCell<VecDeque<u8>>,
    tx: RefCell<Vec<u8>>,
    can_write: Cell<bool>,
}

impl Loopback {
    pub(crate) fn new() -> Self {
        Loopback {
            rx: RefCell::new(VecDeque::new()),
            tx: RefCell::new(Vec::new()),
            can_write: Cell::new(true),
        }
    }

    pub(crate) fn push_rx(&self, bytes: &[u8]) {
        self.rx.borrow_mut().extend(bytes.iter().copied());
    }

    pub(crate) fn tx_bytes(&self) -> Vec<u8> {
        self.tx.borrow().clone()
    }

    pub(crate) fn clear_tx(&self) {
        self.tx.borrow_mut().clear();
    }

    /// Gate every future `write_byte` until this is set back to `true`.
    pub(crate) fn set_can_write(&self, value: bool) {
        self.can_write.set(value);
    }
}

impl Platform for Loopback {
    fn has_data(&self) -> bool {
        !self.rx.borrow().is_empty()
    }

    fn read_byte(&self) -> u8 {
        self.rx.borrow_mut().pop_front().expect("read_byte called with no data queued")
    }

    fn can_write(&self) -> bool {
        self.can_write.get()
    }

    fn write_byte(&self, byte: u8) {
        self.tx.borrow_mut().push(byte);
    }
}
