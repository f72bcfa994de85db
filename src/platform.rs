//! The injected hardware capability the core is built against.
//!
//! This is the "external collaborator" the endpoint-side framer, transmitter
//! and control responder are all written against instead of a concrete UART
//! driver. Tests and examples supply their own `Platform` (an in-memory
//! loopback for tests, a real serial port for `demos/linux_uart.rs`).

/// Minimal byte-oriented serial interface the core polls cooperatively.
///
/// Every method is non-blocking: `has_data`/`can_write` are queried before
/// `read_byte`/`write_byte` are ever called, and none of the four may block
/// the caller.
pub trait Platform {
    /// One-time hardware setup. Called once from [`crate::Endpoint::new`].
    fn init(&self) {}

    /// Returns true if at least one byte can be read without blocking.
    fn has_data(&self) -> bool;

    /// Consume and return one byte. Only called when `has_data` just
    /// returned true.
    fn read_byte(&self) -> u8;

    /// Returns true if a subsequent `write_byte` will not block.
    fn can_write(&self) -> bool;

    /// Emit one byte. Only called when `can_write` just returned true.
    fn write_byte(&self, byte: u8);
}
