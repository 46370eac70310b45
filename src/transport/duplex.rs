//! Byte-level serial duplex abstraction.
//!
//! [`Connection`](crate::transport::Connection) is generic over anything
//! that can write and (blocking-)read raw bytes. `native::NativePort`
//! (behind the `serial` feature) is the real implementation; `mock::MockDuplex`
//! is an in-memory stand-in used by tests, realizing the two-realization
//! split the design notes call for without needing actual hardware.

use std::io;
use std::time::Duration;

/// A raw byte-oriented serial connection. Implementors do blocking I/O;
/// [`crate::transport::Connection`] runs calls through `spawn_blocking`.
pub trait SerialDuplex: Send + 'static {
    /// Writes all of `buf`, blocking until done or erroring.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Reads whatever bytes are available within `timeout`, returning an
    /// empty vec on timeout with no error (distinguishing "nothing yet"
    /// from "the link is gone").
    fn read_available(&mut self, timeout: Duration) -> io::Result<Vec<u8>>;
}
