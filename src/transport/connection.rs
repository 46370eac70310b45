//! The serial request/response + streaming connection state machine.
//!
//! This is the non-negotiable core the design notes call out: the
//! character-counting protocol that keeps the controller's receive buffer
//! full without overflowing it, built around a single background reader
//! task and a small set of shared counters guarded by one mutex (§5
//! "a lock-free design is over-engineering").

use super::duplex::SerialDuplex;
use super::error::TransportError;
use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, oneshot, Mutex as AsyncMutex, Notify};
use tracing::{debug, warn};

/// Conservative cap on the controller's 128-byte RX buffer (§3).
pub const RX_BUFFER_CAPACITY: usize = 100;

const READ_POLL: Duration = Duration::from_millis(50);
const PAUSE_BETWEEN_POLLS: Duration = Duration::from_millis(2);

/// Line terminator to append before writing a command to the wire (§6 "Line
/// discipline").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminator {
    None,
    Newline,
    CarriageReturn,
}

/// How to recognize that a request's response is complete (§4.2 command
/// classification table).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Completion {
    Realtime { is_status_query: bool },
    LineOkErrorAlarm,
    Legacy,
}

fn classify(cmd: &str) -> (Terminator, Completion) {
    if matches!(cmd, "?" | "!" | "~") || cmd.as_bytes() == [0x18] {
        (
            Terminator::None,
            Completion::Realtime {
                is_status_query: cmd == "?",
            },
        )
    } else if cmd.starts_with('G') || cmd.starts_with('M') || cmd.starts_with('$') {
        (Terminator::Newline, Completion::LineOkErrorAlarm)
    } else {
        (Terminator::CarriageReturn, Completion::Legacy)
    }
}

fn is_complete(completion: Completion, buffer: &str) -> bool {
    match completion {
        Completion::Realtime { is_status_query } => {
            buffer.contains("ok") || (is_status_query && buffer.trim_end().ends_with('>'))
        }
        Completion::LineOkErrorAlarm => {
            buffer.contains("ok") || buffer.contains("error:") || buffer.contains("alarm:")
        }
        Completion::Legacy => buffer.ends_with("\r\n") || buffer.contains("OK"),
    }
}

/// Extracts a numeric `error:N` code from a response, if present.
fn extract_error_code(buffer: &str) -> Option<u32> {
    let idx = buffer.find("error:")?;
    let rest = &buffer[idx + "error:".len()..];
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

struct PendingRequest {
    buffer: String,
    completion: Completion,
    responder: Option<oneshot::Sender<Result<String, TransportError>>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Idle,
    Request,
    Streaming,
}

struct PendingEntry {
    char_count: usize,
}

struct State {
    mode: Mode,
    connected: bool,
    pending_request: Option<PendingRequest>,
    pending_queue: VecDeque<PendingEntry>,
    waiters: VecDeque<oneshot::Sender<Result<(), TransportError>>>,
    rx_buffer_used: usize,
}

impl State {
    fn new() -> Self {
        Self {
            mode: Mode::Idle,
            connected: true,
            pending_request: None,
            pending_queue: VecDeque::new(),
            waiters: VecDeque::new(),
            rx_buffer_used: 0,
        }
    }

    fn drain_with_disconnect(&mut self) {
        self.pending_queue.clear();
        self.rx_buffer_used = 0;
        for waiter in self.waiters.drain(..) {
            let _ = waiter.send(Err(TransportError::DeviceDisconnected));
        }
        if let Some(req) = self.pending_request.take() {
            if let Some(tx) = req.responder {
                let _ = tx.send(Err(TransportError::DeviceDisconnected));
            }
        }
        self.mode = Mode::Idle;
        self.connected = false;
    }
}

/// Introspection snapshot for [`Connection::streaming_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingStatus {
    pub used: usize,
    pub capacity: usize,
    pub pending: usize,
}

struct Shared<D: SerialDuplex> {
    duplex: AsyncMutex<D>,
    state: StdMutex<State>,
    queue_drained: Notify,
    status_lines: broadcast::Sender<String>,
    shutdown: Notify,
}

/// Owns one physical serial link: a background reader task plus the
/// character-counting streaming accounting described in §3/§4.1.
pub struct Connection<D: SerialDuplex> {
    shared: Arc<Shared<D>>,
    reader: Option<tokio::task::JoinHandle<()>>,
}

impl<D: SerialDuplex> Connection<D> {
    /// Wraps an already-open duplex and starts the background reader.
    pub fn new(duplex: D) -> Self {
        let (status_tx, _rx) = broadcast::channel(32);
        let shared = Arc::new(Shared {
            duplex: AsyncMutex::new(duplex),
            state: StdMutex::new(State::new()),
            queue_drained: Notify::new(),
            status_lines: status_tx,
            shutdown: Notify::new(),
        });
        let reader_shared = Arc::clone(&shared);
        let reader = tokio::spawn(async move { reader_loop(reader_shared).await });
        Self {
            shared,
            reader: Some(reader),
        }
    }

    /// Raw `<...>` status lines observed while idle (i.e. not mid-request or
    /// mid-stream). Consumed by the GRBL layer to build its own parsed
    /// status broadcast.
    pub fn subscribe_raw_status_lines(&self) -> broadcast::Receiver<String> {
        self.shared.status_lines.subscribe()
    }

    /// Cancels any in-flight request, fails all stream waiters, stops the
    /// reader and closes the handle. Safe to call more than once.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        {
            let mut state = self.shared.state.lock().unwrap();
            if !state.connected {
                return Ok(());
            }
            state.drain_with_disconnect();
        }
        self.shared.queue_drained.notify_waiters();
        self.shared.shutdown.notify_waiters();
        if let Some(handle) = self.reader.take() {
            handle.abort();
        }
        Ok(())
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.shared.state.lock().unwrap().connected {
            Ok(())
        } else {
            Err(TransportError::DeviceDisconnected)
        }
    }

    async fn write_wire(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let bytes = bytes.to_vec();
        let shared = Arc::clone(&self.shared);
        tokio::task::spawn_blocking(move || {
            let mut guard = shared.duplex.blocking_lock();
            guard.write_all(&bytes)
        })
        .await
        .map_err(|_| TransportError::DeviceDisconnected)?
        .map_err(|_| TransportError::DeviceDisconnected)
    }

    /// Sends `cmd`, appends the protocol-appropriate terminator, and resolves
    /// once a completion marker (§6) is observed. Fails synchronously with
    /// `InvalidResponse` if a request or an active stream is already in
    /// flight.
    pub async fn send_request(
        &self,
        cmd: &str,
        timeout: Duration,
    ) -> Result<String, TransportError> {
        self.ensure_connected()?;
        let (terminator, completion) = classify(cmd);

        let (tx, rx) = oneshot::channel();
        {
            let mut state = self.shared.state.lock().unwrap();
            if state.mode != Mode::Idle {
                return Err(TransportError::InvalidResponse(
                    "request or stream already in flight".into(),
                ));
            }
            state.mode = Mode::Request;
            state.pending_request = Some(PendingRequest {
                buffer: String::new(),
                completion,
                responder: Some(tx),
            });
        }

        let mut bytes = cmd.as_bytes().to_vec();
        match terminator {
            Terminator::None => {}
            Terminator::Newline => bytes.push(b'\n'),
            Terminator::CarriageReturn => bytes.push(b'\r'),
        }
        if let Err(e) = self.write_wire(&bytes).await {
            let mut state = self.shared.state.lock().unwrap();
            state.mode = Mode::Idle;
            state.pending_request = None;
            return Err(e);
        }

        let result = tokio::time::timeout(timeout, rx).await;
        match result {
            Ok(Ok(resolved)) => resolved,
            Ok(Err(_)) => Err(TransportError::DeviceDisconnected),
            Err(_) => {
                let mut state = self.shared.state.lock().unwrap();
                state.mode = Mode::Idle;
                state.pending_request = None;
                Err(TransportError::ResponseTimeout)
            }
        }
    }

    /// Writes `cmd` with no wait for a response. Real-time bytes (`?`, `!`,
    /// `~`, `0x18`) are written with no terminator; anything else gets the
    /// line-discipline terminator. Allowed regardless of streaming mode,
    /// since real-time bytes must reach the controller immediately.
    pub async fn send_fire_and_forget(&self, cmd: &str) -> Result<(), TransportError> {
        self.ensure_connected()?;
        let (terminator, _completion) = classify(cmd);
        let mut bytes = cmd.as_bytes().to_vec();
        match terminator {
            Terminator::None => {}
            Terminator::Newline => bytes.push(b'\n'),
            Terminator::CarriageReturn => bytes.push(b'\r'),
        }
        self.write_wire(&bytes).await
    }

    /// Character-counting streaming send (§4.1 `stream`). Parks the caller
    /// until the controller's RX buffer has room, then writes `cmd\n`.
    pub async fn stream(&self, cmd: &str) -> Result<(), TransportError> {
        self.ensure_connected()?;
        let n = cmd.len() + 1;
        if n > RX_BUFFER_CAPACITY {
            return Err(TransportError::InvalidResponse(format!(
                "command of {n} chars exceeds rx buffer capacity {RX_BUFFER_CAPACITY}"
            )));
        }

        loop {
            let rx = {
                let mut state = self.shared.state.lock().unwrap();
                if state.mode == Mode::Request {
                    return Err(TransportError::InvalidResponse(
                        "request already in flight".into(),
                    ));
                }
                if state.rx_buffer_used + n <= RX_BUFFER_CAPACITY {
                    state.mode = Mode::Streaming;
                    state.pending_queue.push_back(PendingEntry { char_count: n });
                    state.rx_buffer_used += n;
                    None
                } else {
                    let (tx, rx) = oneshot::channel();
                    state.waiters.push_back(tx);
                    Some(rx)
                }
            };
            match rx {
                None => break,
                Some(rx) => {
                    rx.await.map_err(|_| TransportError::DeviceDisconnected)??;
                }
            }
        }

        let mut bytes = cmd.as_bytes().to_vec();
        bytes.push(b'\n');
        if let Err(e) = self.write_wire(&bytes).await {
            let mut state = self.shared.state.lock().unwrap();
            if let Some(entry) = state.pending_queue.pop_back() {
                state.rx_buffer_used -= entry.char_count;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Blocks until `pending_queue` is empty, then clears streaming mode.
    pub async fn drain_stream(&self, timeout: Duration) -> Result<(), TransportError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut state = self.shared.state.lock().unwrap();
                if state.pending_queue.is_empty() {
                    state.mode = Mode::Idle;
                    return Ok(());
                }
            }
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(TransportError::ResponseTimeout);
            }
            let _ = tokio::time::timeout(remaining, self.shared.queue_drained.notified()).await;
        }
    }

    /// Introspection for an outer UI; `None` once disconnected.
    pub fn streaming_status(&self) -> Option<StreamingStatus> {
        let state = self.shared.state.lock().unwrap();
        if !state.connected {
            return None;
        }
        Some(StreamingStatus {
            used: state.rx_buffer_used,
            capacity: RX_BUFFER_CAPACITY,
            pending: state.pending_queue.len(),
        })
    }
}

async fn reader_loop<D: SerialDuplex>(shared: Arc<Shared<D>>) {
    let mut incoming = String::new();
    loop {
        let bytes = {
            let duplex = Arc::clone(&shared);
            let joined = tokio::task::spawn_blocking(move || {
                let mut guard = duplex.duplex.blocking_lock();
                guard.read_available(READ_POLL)
            })
            .await;
            match joined {
                Ok(Ok(bytes)) => bytes,
                Ok(Err(_)) | Err(_) => {
                    let mut state = shared.state.lock().unwrap();
                    if state.connected {
                        state.drain_with_disconnect();
                        shared.queue_drained.notify_waiters();
                    }
                    return;
                }
            }
        };

        if bytes.is_empty() {
            tokio::time::sleep(PAUSE_BETWEEN_POLLS).await;
        } else {
            incoming.push_str(&String::from_utf8_lossy(&bytes));
        }

        loop {
            let has_request = {
                let state = shared.state.lock().unwrap();
                state.pending_request.is_some()
            };

            if has_request {
                let mut state = shared.state.lock().unwrap();
                if let Some(req) = state.pending_request.as_mut() {
                    req.buffer.push_str(&incoming);
                    incoming.clear();
                    if is_complete(req.completion, &req.buffer) {
                        let mut req = state.pending_request.take().unwrap();
                        state.mode = Mode::Idle;
                        let response = std::mem::take(&mut req.buffer);
                        let result = if let Some(code) = extract_error_code(&response) {
                            Err(TransportError::CommandRejected { code })
                        } else {
                            Ok(response)
                        };
                        if let Some(tx) = req.responder.take() {
                            let _ = tx.send(result);
                        }
                    }
                }
                break;
            }

            let streaming = {
                let state = shared.state.lock().unwrap();
                state.mode == Mode::Streaming
            };

            if streaming {
                let Some(nl) = incoming.find('\n') else {
                    break;
                };
                let line: String = incoming.drain(..=nl).collect();
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let is_ack = line.eq_ignore_ascii_case("ok");
                let is_error = line.starts_with("error:");
                let is_alarm = line.starts_with("alarm:") || line.starts_with("ALARM:");
                if is_ack || is_error || is_alarm {
                    let mut state = shared.state.lock().unwrap();
                    if let Some(entry) = state.pending_queue.pop_front() {
                        state.rx_buffer_used -= entry.char_count;
                    }
                    if is_alarm {
                        warn!(%line, "alarm during streaming, flushing waiters");
                        for waiter in state.waiters.drain(..) {
                            let _ = waiter.send(Err(TransportError::DeviceDisconnected));
                        }
                    } else if let Some(waiter) = state.waiters.pop_front() {
                        let _ = waiter.send(Ok(()));
                    }
                    if state.pending_queue.is_empty() {
                        shared.queue_drained.notify_waiters();
                    }
                } else {
                    debug!(%line, "ignored non-ack line while streaming");
                }
                continue;
            }

            // Idle: look for a complete status line to broadcast, otherwise
            // retain bytes for the next request.
            if let Some(nl) = incoming.find('\n') {
                let line: String = incoming.drain(..=nl).collect();
                let line = line.trim().to_string();
                if line.starts_with('<') {
                    let _ = shared.status_lines.send(line);
                }
                continue;
            }
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockWire;

    fn new_conn() -> (Connection<crate::transport::mock::MockDuplex>, MockWire) {
        let wire = MockWire::new();
        let conn = Connection::new(wire.duplex());
        (conn, wire)
    }

    #[tokio::test]
    async fn classify_realtime_has_no_terminator() {
        let (term, _) = classify("?");
        assert_eq!(term, Terminator::None);
        let (term, _) = classify("\u{18}");
        assert_eq!(term, Terminator::None);
    }

    #[tokio::test]
    async fn classify_gcode_uses_newline() {
        let (term, completion) = classify("G00 X10");
        assert_eq!(term, Terminator::Newline);
        assert_eq!(completion, Completion::LineOkErrorAlarm);
    }

    #[tokio::test]
    async fn classify_legacy_uses_carriage_return() {
        let (term, completion) = classify("SO,1,2,3");
        assert_eq!(term, Terminator::CarriageReturn);
        assert_eq!(completion, Completion::Legacy);
    }

    // S1 — streaming flow control: capacity 100, 20-char commands (21 w/ newline).
    #[tokio::test]
    async fn s1_streaming_flow_control() {
        let (conn, wire) = new_conn();
        let conn = Arc::new(conn);
        let cmd = "A".repeat(20);
        assert_eq!(cmd.len() + 1, 21);

        for _ in 0..4 {
            conn.stream(&cmd).await.unwrap();
        }
        assert_eq!(conn.streaming_status().unwrap().used, 84);

        let fifth = tokio::spawn({
            let conn = Arc::clone(&conn);
            let cmd = cmd.clone();
            async move { conn.stream(&cmd).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!fifth.is_finished());

        wire.push_line("ok");
        tokio::time::sleep(Duration::from_millis(30)).await;
        fifth.await.unwrap().unwrap();
        assert_eq!(conn.streaming_status().unwrap().used, 84);

        for _ in 0..4 {
            wire.push_line("ok");
        }
        conn.drain_stream(Duration::from_secs(1)).await.unwrap();
        assert_eq!(conn.streaming_status().unwrap().used, 0);
    }

    // S2 — request/stream mutual exclusion.
    #[tokio::test]
    async fn s2_request_stream_mutual_exclusion() {
        let (conn, wire) = new_conn();
        conn.stream("G00X1").await.unwrap();
        conn.stream("G00X2").await.unwrap();
        conn.stream("G00X3").await.unwrap();

        let err = conn.send_request("?", Duration::from_millis(50)).await;
        assert!(matches!(err, Err(TransportError::InvalidResponse(_))));

        wire.push_line("ok");
        wire.push_line("ok");
        wire.push_line("ok");
        conn.drain_stream(Duration::from_secs(1)).await.unwrap();

        wire.push_line("<Idle|MPos:0,0,0>");
        let resp = conn.send_request("?", Duration::from_millis(200)).await.unwrap();
        assert!(resp.contains("Idle"));
    }

    #[tokio::test]
    async fn error_response_lifted_to_command_rejected() {
        let (conn, wire) = new_conn();
        wire.push_line("error:9");
        let err = conn
            .send_request("$H", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::CommandRejected { code: 9 });
    }

    #[tokio::test]
    async fn request_times_out_when_no_response() {
        let (conn, _wire) = new_conn();
        let err = conn
            .send_request("$H", Duration::from_millis(30))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::ResponseTimeout);
    }

    #[tokio::test]
    async fn close_fails_pending_waiters_with_disconnected() {
        let (mut conn, _wire) = new_conn();
        let big = "B".repeat(99);
        for _ in 0..5 {
            let _ = conn.stream(&big).await;
        }
        conn.close().await.unwrap();
        let err = conn.stream("G00X1").await.unwrap_err();
        assert_eq!(err, TransportError::DeviceDisconnected);
    }
}
