//! # gifify
//!
//! Convert video files into animated GIFs with live progress reporting.
//!
//! `gifify` samples frames from a video at a configurable interval, quantizes
//! them in parallel, and assembles an animated GIF — all while exposing a
//! monotonically increasing 0–100 progress percentage. Decoding is powered by
//! FFmpeg via the [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next)
//! crate; encoding uses the [`gif`](https://crates.io/crates/gif) crate on a
//! [`rayon`](https://crates.io/crates/rayon) worker pool.
//!
//! ## Quick start
//!
//! ```no_run
//! use gifify::{ConversionOptions, MediaSource, PipelineController, SamplingInterval};
//!
//! # async fn example() -> Result<(), gifify::ConvertError> {
//! let options = ConversionOptions::new()
//!     .with_sampling_interval(SamplingInterval::Medium);
//!
//! let mut pipeline = PipelineController::new(options);
//! pipeline.load(MediaSource::open("input.mp4")?);
//!
//! let artifact = pipeline.convert().await?;
//! artifact.save(artifact.suggested_filename())?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Watching progress
//!
//! Conversion runs in two phases whose durations are not known in advance.
//! Sampling progress is exact (frames captured over frames planned, scaled
//! to 0–50); encoding progress is extrapolated from wall time on a 100 ms
//! tick and capped at 99 until the encoder's completion signal snaps it to
//! 100. Poll the handle from any task:
//!
//! ```no_run
//! use gifify::{ConversionOptions, MediaSource, Phase, PipelineController};
//!
//! # async fn example() -> Result<(), gifify::ConvertError> {
//! let mut pipeline = PipelineController::new(ConversionOptions::new());
//! pipeline.load(MediaSource::open("input.mp4")?);
//!
//! let progress = pipeline.progress();
//! let watcher = tokio::spawn(async move {
//!     loop {
//!         let snapshot = progress.snapshot();
//!         println!("{:?}: {}%", snapshot.phase, snapshot.percent);
//!         if matches!(snapshot.phase, Phase::Done | Phase::Failed) {
//!             break;
//!         }
//!         tokio::time::sleep(std::time::Duration::from_millis(100)).await;
//!     }
//! });
//!
//! pipeline.convert().await?;
//! watcher.await.ok();
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Interval sampling** — one frame every 0.1 / 0.2 / 0.5 s of source
//!   time, `ceil(duration / interval)` frames total
//! - **Parallel encoding** — palette quantization fans out across a worker
//!   pool sized by [`ConversionOptions::worker_count`]
//! - **Live progress** — a cloneable [`ProgressHandle`] with phase,
//!   percentage, and a smoothed remaining-time estimate
//! - **Cancellation** — [`CancellationToken`] stops a session at the next
//!   seek or tick boundary
//! - **Pluggable seams** — [`FrameSource`] and [`EncodeBackend`] traits for
//!   custom sources and encoders
//! - **Optional render timeout** — bound the encoding phase with
//!   [`ConversionOptions::render_timeout`]
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system for
//! [`MediaSource`]; the rest of the crate has no system dependencies.

pub mod config;
pub mod encode;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod progress;
mod sampler;
pub mod source;

pub use config::{ConversionOptions, Quality, SamplingInterval};
pub use encode::{EncodeBackend, GifArtifact, GifBackend};
pub use error::ConvertError;
pub use media::MediaSource;
pub use pipeline::PipelineController;
pub use progress::{
    CancellationToken, ENCODING_TICK, Phase, ProgressHandle, ProgressSnapshot, SAMPLING_CEILING,
};
pub use source::{FrameSource, SampledFrame};
