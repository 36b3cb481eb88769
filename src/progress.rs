//! Conversion progress reporting and cancellation support.
//!
//! This module provides [`ProgressHandle`], a cloneable view of a
//! conversion's [`Phase`] and percentage, and [`CancellationToken`] for
//! cooperatively stopping a session from another task or thread.
//!
//! Progress is a two-phase model. During sampling the percentage is exact:
//! captured frames over total frames, scaled to the first half of the 0–100
//! range. During encoding the backend offers no incremental signal, so the
//! percentage is extrapolated from wall time against an up-front estimate
//! and capped at 99 — only the backend's completion snaps it to 100.
//!
//! # Example
//!
//! ```no_run
//! use gifify::{ConversionOptions, MediaSource, Phase, PipelineController};
//!
//! # async fn example() -> Result<(), gifify::ConvertError> {
//! let mut pipeline = PipelineController::new(ConversionOptions::new());
//! let progress = pipeline.progress();
//!
//! pipeline.load(MediaSource::open("input.mp4")?);
//! // ... meanwhile, from any task:
//! let snapshot = progress.snapshot();
//! println!("{:?}: {}%", snapshot.phase, snapshot.percent);
//! # Ok(())
//! # }
//! ```

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

/// Portion of the 0–100 scale allotted to the sampling phase.
pub const SAMPLING_CEILING: u8 = 50;

/// Cadence of the encoding-phase display tick.
pub const ENCODING_TICK: Duration = Duration::from_millis(100);

/// Weight of the newest remaining-time estimate in the moving average.
const SMOOTHING_WEIGHT: f64 = 0.8;

/// Floor for the smoothed remaining time, to avoid displaying zero or
/// negative estimates while the backend is still running.
const MIN_REMAINING: Duration = Duration::from_secs(1);

/// Where a conversion session currently is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    /// No session is active.
    #[default]
    Idle,
    /// Seeking through the source and capturing pixel buffers.
    Sampling,
    /// The backend is compressing captured frames into the artifact.
    Encoding,
    /// The artifact is ready.
    Done,
    /// The session failed; only a reset leaves this state.
    Failed,
}

/// A point-in-time view of conversion progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Current lifecycle phase.
    pub phase: Phase,
    /// Completion percentage, 0–100. Non-decreasing within a session.
    pub percent: u8,
    /// Wall time spent in the encoding phase so far.
    pub elapsed_encoding: Duration,
    /// The up-front estimate of total encoding time.
    pub estimated_total_encoding: Duration,
    /// Smoothed estimate of remaining encoding time (display aid only).
    pub smoothed_remaining: Duration,
}

impl Default for ProgressSnapshot {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            percent: 0,
            elapsed_encoding: Duration::ZERO,
            estimated_total_encoding: Duration::ZERO,
            smoothed_remaining: Duration::ZERO,
        }
    }
}

/// Shared, cloneable access to a conversion's progress state.
///
/// The pipeline mutates the state through crate-internal methods; everything
/// outside the crate sees read-only snapshots. `percent` never decreases
/// within a session and resets to 0 only when a new session starts.
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle {
    inner: Arc<Mutex<ProgressSnapshot>>,
}

impl ProgressHandle {
    /// Create a fresh handle in the [`Phase::Idle`] state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the current progress state.
    pub fn snapshot(&self) -> ProgressSnapshot {
        *self.lock()
    }

    /// Shorthand for `snapshot().phase`.
    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Shorthand for `snapshot().percent`.
    pub fn percent(&self) -> u8 {
        self.lock().percent
    }

    fn lock(&self) -> MutexGuard<'_, ProgressSnapshot> {
        // The state is plain data; a poisoned lock cannot leave it
        // logically inconsistent.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start a new session: the only transition that resets `percent` to 0.
    pub(crate) fn begin_sampling(&self) {
        let mut state = self.lock();
        *state = ProgressSnapshot {
            phase: Phase::Sampling,
            ..ProgressSnapshot::default()
        };
    }

    /// Record a captured frame during the sampling phase.
    ///
    /// Percent is exact here: `captured / total`, scaled to
    /// `[0, SAMPLING_CEILING]`.
    pub(crate) fn frame_captured(&self, captured: u64, total: u64) {
        if total == 0 {
            return;
        }
        let scaled = (captured as f64 / total as f64 * f64::from(SAMPLING_CEILING)).round();
        let percent = (scaled as u8).min(SAMPLING_CEILING);
        let mut state = self.lock();
        state.percent = state.percent.max(percent);
    }

    /// Transition to the encoding phase with an up-front total estimate.
    pub(crate) fn begin_encoding(&self, estimated_total: Duration) {
        let mut state = self.lock();
        state.phase = Phase::Encoding;
        state.elapsed_encoding = Duration::ZERO;
        state.estimated_total_encoding = estimated_total;
        state.smoothed_remaining = estimated_total.max(MIN_REMAINING);
    }

    /// Advance the encoding-phase clock by one display tick.
    ///
    /// Recomputes the extrapolated percentage (capped at 99) and smooths the
    /// remaining-time estimate with an exponential moving average.
    pub(crate) fn encoding_tick(&self, tick: Duration) {
        let mut state = self.lock();
        if state.phase != Phase::Encoding {
            return;
        }

        state.elapsed_encoding += tick;

        let remaining = state
            .estimated_total_encoding
            .saturating_sub(state.elapsed_encoding);
        let smoothed = SMOOTHING_WEIGHT * remaining.as_secs_f64()
            + (1.0 - SMOOTHING_WEIGHT) * state.smoothed_remaining.as_secs_f64();
        state.smoothed_remaining = Duration::from_secs_f64(smoothed).max(MIN_REMAINING);

        let total = state.estimated_total_encoding.as_secs_f64();
        if total > 0.0 {
            let span = f64::from(100 - SAMPLING_CEILING);
            let extrapolated = (state.elapsed_encoding.as_secs_f64() / total * span).round();
            let percent =
                (f64::from(SAMPLING_CEILING) + extrapolated).min(99.0) as u8;
            state.percent = state.percent.max(percent);
        }
    }

    /// Snap to 100% and [`Phase::Done`]. Driven only by the backend's
    /// completion signal, never by the tick.
    pub(crate) fn finish(&self) {
        let mut state = self.lock();
        state.phase = Phase::Done;
        state.percent = 100;
        state.smoothed_remaining = Duration::ZERO;
    }

    /// Mark the session failed. The percentage freezes where it was.
    pub(crate) fn fail(&self) {
        self.lock().phase = Phase::Failed;
    }

    /// Return to [`Phase::Idle`], clearing all session state.
    pub(crate) fn reset(&self) {
        *self.lock() = ProgressSnapshot::default();
    }
}

/// Cooperative cancellation token backed by an [`AtomicBool`].
///
/// Clone the token out of
/// [`cancellation_token`](crate::PipelineController::cancellation_token)
/// and call
/// [`cancel`](CancellationToken::cancel) from any thread to stop the
/// associated session. The sampler checks the token before issuing each
/// seek; the encoding-phase loop checks it on every tick.
///
/// # Example
///
/// ```
/// use gifify::CancellationToken;
///
/// let token = CancellationToken::new();
/// assert!(!token.is_cancelled());
///
/// token.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Create a new, non-cancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. All clones of this token observe it.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}
