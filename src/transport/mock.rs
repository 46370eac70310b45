//! In-memory [`SerialDuplex`] used by tests to exercise `Connection` without
//! real hardware (scenarios S1/S2 in the spec's testable-properties list).

use super::duplex::SerialDuplex;
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared byte queues between the test harness and the duplex the
/// `Connection` under test writes to / reads from.
#[derive(Clone, Default)]
pub struct MockWire {
    inner: Arc<Mutex<MockWireInner>>,
}

#[derive(Default)]
struct MockWireInner {
    /// Bytes the `Connection` has written (what the "controller" received).
    written: Vec<u8>,
    /// Bytes queued for the `Connection` to read (what the "controller" sent back).
    to_read: VecDeque<u8>,
}

impl MockWire {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues bytes for the connection's next read.
    pub fn push_incoming(&self, bytes: &[u8]) {
        let mut inner = self.inner.lock().unwrap();
        inner.to_read.extend(bytes.iter().copied());
    }

    /// Queues a line (with `\n` appended) for the connection's next read —
    /// convenience for feeding canned `ok`/`error:N`/status responses.
    pub fn push_line(&self, line: &str) {
        let mut bytes = line.as_bytes().to_vec();
        bytes.push(b'\n');
        self.push_incoming(&bytes);
    }

    /// Returns (and clears) everything written to the wire so far, as a
    /// UTF-8 string (the protocol is ASCII).
    pub fn take_written(&self) -> String {
        let mut inner = self.inner.lock().unwrap();
        let s = String::from_utf8_lossy(&inner.written).into_owned();
        inner.written.clear();
        s
    }

    pub fn duplex(&self) -> MockDuplex {
        MockDuplex {
            wire: self.clone(),
        }
    }
}

/// The [`SerialDuplex`] handed to [`crate::transport::Connection`] in tests.
pub struct MockDuplex {
    wire: MockWire,
}

impl SerialDuplex for MockDuplex {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.wire.inner.lock().unwrap().written.extend_from_slice(buf);
        Ok(())
    }

    fn read_available(&mut self, timeout: Duration) -> io::Result<Vec<u8>> {
        // Poll briefly rather than blocking the full timeout, since test
        // wires are fed asynchronously by the harness.
        let step = Duration::from_millis(2);
        let mut waited = Duration::ZERO;
        loop {
            {
                let mut inner = self.wire.inner.lock().unwrap();
                if !inner.to_read.is_empty() {
                    return Ok(inner.to_read.drain(..).collect());
                }
            }
            if waited >= timeout {
                return Ok(Vec::new());
            }
            std::thread::sleep(step);
            waited += step;
        }
    }
}
