//! Conversion configuration.
//!
//! [`ConversionOptions`] is a builder that carries the sampling interval,
//! GIF quality level, per-frame display duration, worker parallelism, and
//! estimator tuning through the pipeline without polluting every function
//! signature.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//!
//! use gifify::{ConversionOptions, Quality, SamplingInterval};
//!
//! let options = ConversionOptions::new()
//!     .with_sampling_interval(SamplingInterval::Coarse)
//!     .with_quality(Quality::Best)
//!     .with_worker_count(8)
//!     .with_render_timeout(Some(Duration::from_secs(120)));
//! ```

use std::time::Duration;

/// How far apart sampled frames are on the source timeline.
///
/// The presets trade output smoothness against frame count: `Fine` samples
/// ten frames per source second, `Coarse` two.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingInterval {
    /// One frame every 0.1 s of source time. This is the default.
    #[default]
    Fine,
    /// One frame every 0.2 s of source time.
    Medium,
    /// One frame every 0.5 s of source time.
    Coarse,
}

impl SamplingInterval {
    /// The spacing between sampled timestamps, in seconds.
    pub fn seconds(self) -> f64 {
        match self {
            SamplingInterval::Fine => 0.1,
            SamplingInterval::Medium => 0.2,
            SamplingInterval::Coarse => 0.5,
        }
    }
}

/// GIF palette quality level. Lower is higher fidelity, higher is faster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    /// Slowest, most faithful palette (level 1).
    Best,
    /// Middle ground (level 5).
    Balanced,
    /// Fastest quantization (level 10). This is the default.
    #[default]
    Fast,
}

impl Quality {
    /// The ordinal quality level (1 / 5 / 10).
    pub fn level(self) -> u8 {
        match self {
            Quality::Best => 1,
            Quality::Balanced => 5,
            Quality::Fast => 10,
        }
    }

    /// Map to the `gif` crate's quantization speed (1–30).
    ///
    /// The level doubles as speed: level 1 spends the most time searching
    /// for palette matches, level 10 takes the NeuQuant fast path.
    pub(crate) fn quantization_speed(self) -> i32 {
        i32::from(self.level())
    }
}

/// Configuration for one conversion session.
///
/// All fields have defaults matching the stock conversion: fine sampling,
/// fast quantization, 50 ms per GIF frame, four encode workers, and no
/// render timeout.
#[derive(Debug, Clone)]
pub struct ConversionOptions {
    /// Spacing between sampled frames on the source timeline.
    pub sampling_interval: SamplingInterval,
    /// GIF palette quality.
    pub quality: Quality,
    /// How long each frame is displayed in the output GIF.
    pub frame_delay: Duration,
    /// Number of parallel quantization workers in the encode backend.
    pub worker_count: usize,
    /// Estimator tuning: amortized encode cost per frame, used to seed the
    /// encoding-phase progress extrapolation. Display-only; never affects
    /// the actual completion signal.
    pub per_frame_encode_cost: Duration,
    /// Optional bound on the encoding phase. `None` (the default) waits
    /// indefinitely for the backend, matching the behavior of having no
    /// failure channel at all.
    pub render_timeout: Option<Duration>,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            sampling_interval: SamplingInterval::default(),
            quality: Quality::default(),
            frame_delay: Duration::from_millis(50),
            worker_count: 4,
            per_frame_encode_cost: Duration::from_millis(50),
            render_timeout: None,
        }
    }
}

impl ConversionOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the sampling interval preset.
    #[must_use]
    pub fn with_sampling_interval(mut self, interval: SamplingInterval) -> Self {
        self.sampling_interval = interval;
        self
    }

    /// Set the GIF palette quality.
    #[must_use]
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Set the per-frame display duration of the output GIF.
    ///
    /// The GIF format stores delays in hundredths of a second, so the value
    /// is rounded down to that granularity at encode time.
    #[must_use]
    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }

    /// Set the number of parallel quantization workers.
    ///
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_worker_count(mut self, count: usize) -> Self {
        self.worker_count = count.max(1);
        self
    }

    /// Tune the estimator's amortized per-frame encode cost.
    #[must_use]
    pub fn with_per_frame_encode_cost(mut self, cost: Duration) -> Self {
        self.per_frame_encode_cost = cost;
        self
    }

    /// Bound the encoding phase. `None` waits indefinitely.
    #[must_use]
    pub fn with_render_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.render_timeout = timeout;
        self
    }
}
