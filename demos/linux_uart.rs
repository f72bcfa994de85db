//! A real serial port endpoint. Opens the device path given as the first
//! command-line argument (default `/dev/ttyUSB0`) and runs an MCTP
//! endpoint responder against it until interrupted.
//!
//! Run with `cargo run --example linux_uart -- /dev/ttyUSB0`.

use log::{info, warn};
use mctp_serial::{Endpoint, Platform};
use std::cell::RefCell;
use std::time::Duration;

/// Adapts a `serialport::SerialPort` to the single-byte, non-blocking
/// [`Platform`] trait this crate polls. `bytes_to_read`/`bytes_to_write`
/// let us ask the OS driver's buffers, rather than risking a blocking
/// read or write call on every tick.
struct UartPlatform {
    port: RefCell<Box<dyn serialport::SerialPort>>,
}

impl UartPlatform {
    fn open(path: &str) -> Self {
        let port = serialport::new(path, 115_200)
            .timeout(Duration::from_millis(0))
            .open()
            .unwrap_or_else(|err| panic!("failed to open {path}: {err}"));
        UartPlatform { port: RefCell::new(port) }
    }
}

impl Platform for UartPlatform {
    fn has_data(&self) -> bool {
        self.port.borrow().bytes_to_read().unwrap_or(0) > 0
    }

    fn read_byte(&self) -> u8 {
        use std::io::Read;
        let mut byte = [0u8; 1];
        self.port
            .borrow_mut()
            .read_exact(&mut byte)
            .expect("read_byte called without has_data being true");
        byte[0]
    }

    fn can_write(&self) -> bool {
        // A real UART driver's output buffer is large relative to one
        // frame; treat it as always ready and let the OS block briefly on
        // write_byte instead of polling a write-space query.
        true
    }

    fn write_byte(&self, byte: u8) {
        use std::io::Write;
        let mut port = self.port.borrow_mut();
        if let Err(err) = port.write_all(&[byte]) {
            warn!("uart: write failed: {err}");
        }
    }
}

fn main() {
    env_logger::init();

    let device = std::env::args().nth(1).unwrap_or_else(|| "/dev/ttyUSB0".to_string());
    info!("opening {device}");
    let platform = UartPlatform::open(&device);
    let mut endpoint = Endpoint::new(&platform);

    loop {
        endpoint.update();
        if endpoint.is_packet_available() {
            if endpoint.is_control_packet() {
                endpoint.process_control_message();
            } else {
                info!("ignoring non-control packet");
                endpoint.ignore_packet();
            }
        }
    }
}
