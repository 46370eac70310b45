//! Plot executor: drives a compiled `[PlotCommand]` sequence to completion
//! on a connected GRBL machine (§4.4).
//!
//! This is a bounded loop with a flag check per iteration, not a coroutine
//! (§9 "Coroutine control flow") — pause and cancel are plain atomics the
//! caller flips from another task, observed once per command.

mod config;
mod error;
mod progress;
mod transform;

pub use config::{ExecutorConfig, PaperSize};
pub use error::ExecutorError;
pub use progress::{PlotProgress, PlotState};

use crate::machines::grbl::{GrblError, GrblProtocol, PenState};
use crate::pathcompiler::PlotCommand;
use crate::transport::{SerialDuplex, TransportError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

/// How often (in commands) the loop drains the stream and polls the
/// physical pause button (§4.4 step 6b: "every 100 commands when
/// streaming" — this executor always streams its motion commands).
const POLL_INTERVAL_COMMANDS: usize = 100;

/// Moves shorter than this are not worth sending to the controller (§4.4
/// step 6d).
const MIN_MOVE_MM: f64 = 0.01;

const HOME_TIMEOUT: Duration = Duration::from_secs(60);
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
const FINAL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);
const PAUSE_POLL_INTERVAL: Duration = Duration::from_millis(100);
const SETTLE_AFTER_ORIGIN: Duration = Duration::from_secs(1);

/// Drives one plot. Holds no state the transport reads; it only ever talks
/// to the GRBL layer (§9 "the PlotExecutor holds no state the Transport
/// reads").
pub struct PlotExecutor<D: SerialDuplex> {
    grbl: Arc<GrblProtocol<D>>,
    config: ExecutorConfig,
    cancel: AtomicBool,
    paused: AtomicBool,
    progress_tx: broadcast::Sender<PlotProgress>,
}

impl<D: SerialDuplex> PlotExecutor<D> {
    pub fn new(grbl: Arc<GrblProtocol<D>>, config: ExecutorConfig) -> Self {
        let (progress_tx, _rx) = progress_channel();
        Self {
            grbl,
            config,
            cancel: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            progress_tx,
        }
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<PlotProgress> {
        self.progress_tx.subscribe()
    }

    /// Requests cancellation. Observed at the top of the next loop
    /// iteration, or while parked in the pause-wait loop (§5 "Cancellation
    /// and timeouts").
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn emit(&self, progress: PlotProgress) {
        // No subscriber is not an error; the executor runs whether or not
        // anyone is watching.
        let _ = self.progress_tx.send(progress);
    }

    /// Runs `commands` to completion. `Ok(true)` on completion, `Ok(false)`
    /// if cancelled mid-plot (§4.4 step 6a, scenario S6). On error, performs
    /// a best-effort `pen_up`, emits an `Error` progress record, and
    /// rethrows (§4.4 "Failure recovery").
    pub async fn run(&self, commands: &[PlotCommand]) -> Result<bool, ExecutorError> {
        self.cancel.store(false, Ordering::SeqCst);
        self.paused.store(false, Ordering::SeqCst);
        let total = commands.len();

        if let Err(err) = self.setup().await {
            let _ = self.grbl.pen_up(false).await;
            self.emit(PlotProgress::failed(0, total, error_code(&err), err.to_string()));
            return Err(err);
        }

        let mut current = (self.config.origin_x, self.config.origin_y);

        for (i, cmd) in commands.iter().enumerate() {
            if let Some(cancelled) = self.drain_and_stop_if_cancelled(i, total).await? {
                return Ok(cancelled);
            }

            if i > 0 && i % POLL_INTERVAL_COMMANDS == 0 {
                let _ = self.grbl.drain_stream(DRAIN_TIMEOUT).await;
                if self.grbl.query_pause_button().await == 1 {
                    self.paused.store(true, Ordering::SeqCst);
                }
            }

            while self.paused.load(Ordering::SeqCst) {
                let _ = self.grbl.drain_stream(DRAIN_TIMEOUT).await;
                self.emit(PlotProgress::running(PlotState::Paused, i, total));
                tokio::time::sleep(PAUSE_POLL_INTERVAL).await;
                if self.cancel.load(Ordering::SeqCst) {
                    break;
                }
            }
            if let Some(cancelled) = self.drain_and_stop_if_cancelled(i, total).await? {
                return Ok(cancelled);
            }

            if let Err(err) = self.execute_one(cmd, &mut current).await {
                let _ = self.grbl.pen_up(false).await;
                self.emit(PlotProgress::failed(i, total, error_code(&err), err.to_string()));
                return Err(err);
            }

            self.emit(PlotProgress::running(PlotState::Plotting, i + 1, total));
        }

        let _ = self.grbl.drain_stream(DRAIN_TIMEOUT).await;
        self.grbl.pen_up(false).await?;
        self.grbl.wait_for_idle(FINAL_IDLE_TIMEOUT).await?;
        self.emit(PlotProgress::running(PlotState::Completed, total, total));
        Ok(true)
    }

    /// If `cancel` is set, drains the stream best-effort, pens up, emits
    /// `Cancelled`, and returns `Some(false)` for the caller to bubble up;
    /// otherwise `None` and the loop continues.
    async fn drain_and_stop_if_cancelled(
        &self,
        index: usize,
        total: usize,
    ) -> Result<Option<bool>, ExecutorError> {
        if !self.cancel.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let _ = self.grbl.drain_stream(DRAIN_TIMEOUT).await;
        let _ = self.grbl.pen_up(false).await;
        self.emit(PlotProgress::running(PlotState::Cancelled, index, total));
        Ok(Some(false))
    }

    /// Steps 1–5 of the execution sequence: enable motors, pen up, home,
    /// rapid to the paper's top-right corner, settle.
    async fn setup(&self) -> Result<(), ExecutorError> {
        self.grbl.enable_motors().await?;
        self.grbl.pen_up(false).await?;

        self.grbl.home(HOME_TIMEOUT).await?;
        let status = self.grbl.query_status().await?;
        info!(
            x = status.machine_pos.x,
            y = status.machine_pos.y,
            z = status.machine_pos.z,
            "homed"
        );

        self.grbl
            .move_absolute(self.config.origin_x, self.config.origin_y, None, false)
            .await?;
        tokio::time::sleep(SETTLE_AFTER_ORIGIN).await;
        self.grbl.query_status().await?;
        Ok(())
    }

    async fn execute_one(
        &self,
        cmd: &PlotCommand,
        current: &mut (f64, f64),
    ) -> Result<(), ExecutorError> {
        match *cmd {
            PlotCommand::PenUp => {
                if self.grbl.pen_state() != PenState::Up {
                    self.grbl.pen_up(true).await?;
                }
            }
            PlotCommand::PenDown => {
                if self.grbl.pen_state() != PenState::Down {
                    self.grbl.pen_down(true).await?;
                }
            }
            PlotCommand::Move { x, y } => self.move_to(x, y, current).await?,
            PlotCommand::Line { x, y } => self.move_to(x, y, current).await?,
        }
        Ok(())
    }

    /// Transforms a drawing-space point to machine space and, if the move
    /// is non-trivial, streams it: feed-rate `G01` while the pen is down,
    /// rapid `G00` while it's up (§4.4 step 6d).
    async fn move_to(&self, sx: f64, sy: f64, current: &mut (f64, f64)) -> Result<(), ExecutorError> {
        let (mx, my) = transform::drawing_to_machine(&self.config, sx, sy);
        let dx = mx - current.0;
        let dy = my - current.1;
        if (dx * dx + dy * dy).sqrt() < MIN_MOVE_MM {
            return Ok(());
        }
        let feed = (self.grbl.pen_state() == PenState::Down).then_some(self.config.pen_down_feed);
        self.grbl.move_absolute(mx, my, feed, true).await?;
        *current = (mx, my);
        Ok(())
    }
}

fn progress_channel() -> (broadcast::Sender<PlotProgress>, broadcast::Receiver<PlotProgress>) {
    broadcast::channel(64)
}

/// Maps an [`ExecutorError`] to the stable `PLT-*` code from §6, for the
/// `error_code` field of a failed [`PlotProgress`].
fn error_code(err: &ExecutorError) -> &'static str {
    match err {
        ExecutorError::Grbl(GrblError::Transport(t)) => transport_code(t),
        ExecutorError::Grbl(GrblError::Alarm { .. }) => "PLT-G001",
        ExecutorError::Grbl(GrblError::HomingFailed) => "PLT-M001",
        ExecutorError::Grbl(GrblError::MotionTimeout) => "PLT-M002",
        ExecutorError::Grbl(GrblError::PauseButtonPressed) => "PLT-U001",
        ExecutorError::Cancelled => "PLT-U001",
    }
}

fn transport_code(err: &TransportError) -> &'static str {
    match err {
        TransportError::NoDeviceFound => "PLT-C001",
        TransportError::PortInUse => "PLT-C002",
        TransportError::PermissionDenied => "PLT-C003",
        TransportError::DeviceDisconnected => "PLT-C004",
        TransportError::NotResponding => "PLT-C005",
        TransportError::ResponseTimeout => "PLT-X001",
        TransportError::InvalidResponse(_) => "PLT-X002",
        TransportError::CommandRejected { .. } => "PLT-X003",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::mock::MockWire;
    use crate::transport::Connection;
    use std::time::Duration as StdDuration;

    fn idle_status_line() -> &'static str {
        "<Idle|MPos:0,0,0|WPos:0,0,0|FS:0,0>"
    }

    async fn settle() {
        tokio::time::sleep(StdDuration::from_millis(30)).await;
    }

    #[test]
    fn error_code_maps_transport_and_grbl_variants() {
        assert_eq!(
            error_code(&ExecutorError::Grbl(GrblError::Transport(TransportError::NoDeviceFound))),
            "PLT-C001"
        );
        assert_eq!(
            error_code(&ExecutorError::Grbl(GrblError::HomingFailed)),
            "PLT-M001"
        );
        assert_eq!(
            error_code(&ExecutorError::Grbl(GrblError::MotionTimeout)),
            "PLT-M002"
        );
        assert_eq!(error_code(&ExecutorError::Cancelled), "PLT-U001");
    }

    #[tokio::test]
    async fn pause_and_resume_toggle_flag() {
        let wire = MockWire::new();
        let conn = Connection::new(wire.duplex());
        let grbl = Arc::new(GrblProtocol::new(conn));
        let executor = PlotExecutor::new(grbl, ExecutorConfig::default());

        assert!(!executor.is_paused());
        executor.pause();
        assert!(executor.is_paused());
        executor.resume();
        assert!(!executor.is_paused());
    }

    // Drives `setup()`'s five wire exchanges: $X, pen-up, $H, two status
    // queries (inside and after home()), and the rapid move to the paper
    // origin.
    async fn drive_setup(wire: &MockWire) {
        settle().await;
        wire.push_line("ok"); // $X
        settle().await;
        wire.push_line("ok"); // pen up
        settle().await;
        wire.push_line("ok"); // $H
        settle().await;
        wire.push_line(idle_status_line()); // wait_for_idle inside home()
        settle().await;
        wire.push_line(idle_status_line()); // home()'s own query_status
        settle().await;
        wire.push_line("ok"); // rapid move to origin
    }

    #[tokio::test]
    async fn runs_an_empty_plot_to_completion() {
        let wire = MockWire::new();
        let conn = Connection::new(wire.duplex());
        let grbl = Arc::new(GrblProtocol::new(conn));
        let executor = PlotExecutor::new(grbl, ExecutorConfig::default());

        let handle = tokio::spawn(async move { executor.run(&[]).await });

        drive_setup(&wire).await;
        // SETTLE_AFTER_ORIGIN (1s) elapses before the post-origin status
        // query is sent; wait it out before supplying that response.
        tokio::time::sleep(StdDuration::from_millis(1100)).await;
        wire.push_line(idle_status_line()); // post-origin query_status
        settle().await;
        wire.push_line("ok"); // final pen_up
        settle().await;
        wire.push_line(idle_status_line()); // final wait_for_idle

        let result = handle.await.unwrap().unwrap();
        assert!(result);
    }

    #[tokio::test]
    async fn runs_a_single_line_streaming_move() {
        let wire = MockWire::new();
        let conn = Connection::new(wire.duplex());
        let grbl = Arc::new(GrblProtocol::new(conn));
        let executor = PlotExecutor::new(grbl, ExecutorConfig::default());

        let commands = vec![PlotCommand::Line { x: 50.0, y: 100.0 }];
        let handle = tokio::spawn(async move { executor.run(&commands).await });

        drive_setup(&wire).await;
        tokio::time::sleep(StdDuration::from_millis(1100)).await;
        wire.push_line(idle_status_line()); // post-origin query_status
        settle().await;
        wire.push_line("ok"); // the streamed rapid move for the Line command
        settle().await;
        wire.push_line("ok"); // final pen_up
        settle().await;
        wire.push_line(idle_status_line()); // final wait_for_idle

        let result = handle.await.unwrap().unwrap();
        assert!(result);
    }

    // S6 (simplified): cancellation observed at the top of the loop, before
    // any command executes, drains (a no-op here, nothing queued yet),
    // pens up, and returns `Ok(false)` rather than erroring.
    #[tokio::test]
    async fn cancel_before_first_command_returns_false() {
        let wire = MockWire::new();
        let conn = Connection::new(wire.duplex());
        let grbl = Arc::new(GrblProtocol::new(conn));
        let executor = Arc::new(PlotExecutor::new(grbl, ExecutorConfig::default()));
        let executor_for_run = Arc::clone(&executor);

        let commands = vec![PlotCommand::Line { x: 50.0, y: 100.0 }; 10];
        let handle = tokio::spawn(async move { executor_for_run.run(&commands).await });

        drive_setup(&wire).await;
        tokio::time::sleep(StdDuration::from_millis(1100)).await;
        wire.push_line(idle_status_line()); // post-origin query_status
        settle().await;

        // Cancel before pushing any response for the loop's first command;
        // the loop observes `cancel` before attempting to stream anything.
        executor.cancel();
        settle().await;
        wire.push_line("ok"); // the cancel-path pen_up

        let result = handle.await.unwrap().unwrap();
        assert!(!result);
    }
}
