//! GRBL v1.1 / DrawCore protocol operations layered on a [`Connection`].
//!
//! Owns the Connection exclusively (§9 "the GRBL layer owns a reference to
//! the Connection") and tracks the two pieces of state the wire protocol
//! itself doesn't give us for free: pen actuator position and last-known
//! machine position.

use super::commands::GrblCommand;
use super::config::{MotionLimits, PenHeights};
use super::error::GrblError;
use super::parser::parse_status;
use super::state::{MachineState, MachineStatus, PenState, Position};
use crate::transport::{Connection, SerialDuplex};
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_millis(5_000);
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Margin above `pen_up_z` within which the pen is still considered "up"
/// when deriving initial state from a Z position (§4.2 `initialize`).
const PEN_UP_SLOP_MM: f64 = 0.5;

pub struct GrblProtocol<D: SerialDuplex> {
    connection: Connection<D>,
    pen_heights: StdMutex<PenHeights>,
    pen_state: StdMutex<PenState>,
    position: StdMutex<Position>,
    limits: MotionLimits,
    status_tx: broadcast::Sender<MachineStatus>,
}

impl<D: SerialDuplex> GrblProtocol<D> {
    /// Wraps `connection`, starting a background task that forwards the
    /// transport's raw idle-time status lines into a parsed
    /// `broadcast::Sender<MachineStatus>` for [`Self::subscribe_status`].
    pub fn new(connection: Connection<D>) -> Self {
        let (status_tx, _rx) = broadcast::channel(32);
        let mut raw_lines = connection.subscribe_raw_status_lines();
        let forward_tx = status_tx.clone();
        tokio::spawn(async move {
            while let Ok(line) = raw_lines.recv().await {
                match parse_status(&line, Instant::now()) {
                    Ok(status) => {
                        // `send` only errors when there are currently no
                        // subscribers; a later `subscribe_status()` call
                        // should still see subsequent lines, so keep
                        // forwarding rather than exiting the task.
                        if forward_tx.send(status).is_err() {
                            debug!(%line, "status broadcast: no subscribers for this line");
                        }
                    }
                    Err(e) => warn!(%line, error = %e, "failed to parse status line"),
                }
            }
        });

        Self {
            connection,
            pen_heights: StdMutex::new(PenHeights::default()),
            pen_state: StdMutex::new(PenState::Unknown),
            position: StdMutex::new(Position {
                x: 0.0,
                y: 0.0,
                z: 0.0,
                a: None,
            }),
            limits: MotionLimits::default(),
            status_tx,
        }
    }

    /// A live feed of parsed status reports observed while the connection is
    /// idle (not mid-request, not streaming).
    pub fn subscribe_status(&self) -> broadcast::Receiver<MachineStatus> {
        self.status_tx.subscribe()
    }

    pub fn pen_state(&self) -> PenState {
        *self.pen_state.lock().unwrap()
    }

    pub fn position(&self) -> Position {
        self.position.lock().unwrap().clone()
    }

    /// `G21`, `G90`, `G17`, then a status query; derives pen state from Z.
    pub async fn initialize(&self) -> Result<(), GrblError> {
        for cmd in [
            GrblCommand::units_mm(),
            GrblCommand::absolute_mode(),
            GrblCommand::xy_plane(),
        ] {
            self.connection
                .send_request(&cmd.to_string(), DEFAULT_REQUEST_TIMEOUT)
                .await?;
        }
        let status = self.query_status().await?;
        let up_z = self.pen_heights.lock().unwrap().up_mm;
        let pen_state = if status.machine_pos.z <= up_z + PEN_UP_SLOP_MM {
            PenState::Up
        } else {
            PenState::Down
        };
        *self.pen_state.lock().unwrap() = pen_state;
        info!(?pen_state, "grbl initialized");
        Ok(())
    }

    /// `$I` build-info query.
    pub async fn get_version(&self) -> Result<String, GrblError> {
        Ok(self
            .connection
            .send_request(&GrblCommand::VersionRequest.to_string(), DEFAULT_REQUEST_TIMEOUT)
            .await?)
    }

    pub fn set_pen_heights(&self, up_mm: f64, down_mm: f64) {
        *self.pen_heights.lock().unwrap() = PenHeights { up_mm, down_mm };
    }

    async fn send_pen_move(&self, z: f64, stream: bool) -> Result<(), GrblError> {
        let cmd = GrblCommand::pen_move(z).to_string();
        if stream {
            self.connection.stream(&cmd).await?;
        } else {
            self.connection
                .send_request(&cmd, DEFAULT_REQUEST_TIMEOUT)
                .await?;
        }
        Ok(())
    }

    /// `G00 Z<pen_up_z>`. No blocking wait for motion completion.
    pub async fn pen_up(&self, stream: bool) -> Result<(), GrblError> {
        let up_mm = self.pen_heights.lock().unwrap().up_mm;
        self.send_pen_move(up_mm, stream).await?;
        *self.pen_state.lock().unwrap() = PenState::Up;
        Ok(())
    }

    /// `G00 Z<pen_down_z>`. No blocking wait for motion completion.
    pub async fn pen_down(&self, stream: bool) -> Result<(), GrblError> {
        let down_mm = self.pen_heights.lock().unwrap().down_mm;
        self.send_pen_move(down_mm, stream).await?;
        *self.pen_state.lock().unwrap() = PenState::Down;
        Ok(())
    }

    /// `$X`, clearing an alarm lock.
    pub async fn enable_motors(&self) -> Result<(), GrblError> {
        self.connection
            .send_request(&GrblCommand::Unlock.to_string(), DEFAULT_REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }

    /// `M18`; falls back to `$SLP` if the controller rejects it.
    pub async fn disable_motors(&self) -> Result<(), GrblError> {
        let result = self
            .connection
            .send_request(&GrblCommand::disable_motors().to_string(), DEFAULT_REQUEST_TIMEOUT)
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(_) => {
                self.connection
                    .send_request(&GrblCommand::Sleep.to_string(), DEFAULT_REQUEST_TIMEOUT)
                    .await?;
                Ok(())
            }
        }
    }

    /// Clamps to machine limits, emits `G00`/`G01` (§4.2 `move_absolute`).
    pub async fn move_absolute(
        &self,
        x: f64,
        y: f64,
        feed_rate: Option<f64>,
        stream: bool,
    ) -> Result<(), GrblError> {
        let x = self.limits.clamp_x(x);
        let y = self.limits.clamp_y(y);
        let cmd = match feed_rate {
            None => GrblCommand::rapid_move(x, y),
            Some(feed) => GrblCommand::linear_move(x, y, self.limits.clamp_feed(feed)),
        };
        let text = cmd.to_string();
        if stream {
            self.connection.stream(&text).await?;
        } else {
            self.connection
                .send_request(&text, DEFAULT_REQUEST_TIMEOUT)
                .await?;
        }
        let mut pos = self.position.lock().unwrap();
        pos.x = x;
        pos.y = y;
        Ok(())
    }

    /// Derives feed rate from `distance / duration` and performs a relative
    /// move as an absolute move from the last-known position.
    pub async fn move_relative(&self, dx: f64, dy: f64, duration_ms: u64) -> Result<(), GrblError> {
        let (from_x, from_y) = {
            let pos = self.position.lock().unwrap();
            (pos.x, pos.y)
        };
        let distance = (dx * dx + dy * dy).sqrt();
        let duration_min = (duration_ms.max(1) as f64) / 60_000.0;
        let feed = if duration_min > 0.0 {
            distance / duration_min
        } else {
            *self.limits.feed_mm_per_min.end()
        };
        self.move_absolute(from_x + dx, from_y + dy, Some(feed), false)
            .await
    }

    /// `?` real-time status query, parsed per §6 "Status grammar".
    pub async fn query_status(&self) -> Result<MachineStatus, GrblError> {
        let raw = self
            .connection
            .send_request(&GrblCommand::StatusRequest.to_string(), DEFAULT_REQUEST_TIMEOUT)
            .await?;
        let status = parse_status(&raw, Instant::now())
            .map_err(|e| GrblError::Transport(crate::transport::TransportError::InvalidResponse(e.to_string())))?;
        *self.position.lock().unwrap() = status.machine_pos.clone();
        if let MachineState::Alarm(code) = &status.state {
            return Err(GrblError::Alarm {
                code: code.clone(),
                position: Some((status.machine_pos.x, status.machine_pos.y, status.machine_pos.z)),
            });
        }
        Ok(status)
    }

    /// Polls status until `Idle`; raises `Alarm` immediately, `MotionTimeout`
    /// once `timeout` elapses.
    pub async fn wait_for_idle(&self, timeout: Duration) -> Result<(), GrblError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let status = self.query_status().await?;
            if matches!(status.state, MachineState::Idle) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(GrblError::MotionTimeout);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// `$H`, then confirms `Idle`, refreshes position, resets pen state.
    pub async fn home(&self, timeout: Duration) -> Result<(), GrblError> {
        self.connection
            .send_request(&GrblCommand::Home.to_string(), timeout)
            .await
            .map_err(|_| GrblError::HomingFailed)?;
        self.wait_for_idle(Duration::from_secs(5)).await?;
        self.query_status().await?;
        *self.pen_state.lock().unwrap() = PenState::Up;
        Ok(())
    }

    /// `!` (feed hold), `0x18` (soft reset), best-effort `$X`.
    pub async fn emergency_stop(&self) -> Result<(), GrblError> {
        self.connection.send_fire_and_forget("!").await?;
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.connection.send_fire_and_forget("\u{18}").await?;
        tokio::time::sleep(Duration::from_millis(500)).await;
        let _ = self
            .connection
            .send_request(&GrblCommand::Unlock.to_string(), Duration::from_millis(500))
            .await;
        Ok(())
    }

    /// Blocks until the streaming pending queue is empty, then clears
    /// streaming mode on the underlying connection. Lets the executor drop
    /// back to request/response mode (e.g. to poll status) without tearing
    /// down the connection (§5 "request/stream mutual exclusion").
    pub async fn drain_stream(&self, timeout: Duration) -> Result<(), GrblError> {
        Ok(self.connection.drain_stream(timeout).await?)
    }

    /// 1 iff `Hold`, 0 otherwise, -1 on error (§4.2).
    pub async fn query_pause_button(&self) -> i8 {
        match self.query_status().await {
            Ok(status) => {
                if matches!(status.state, MachineState::Hold(_)) {
                    1
                } else {
                    0
                }
            }
            Err(_) => -1,
        }
    }
}
