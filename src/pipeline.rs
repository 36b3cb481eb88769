//! Conversion orchestration.
//!
//! [`PipelineController`] owns the lifecycle of one conversion at a time:
//! load a source, run [`convert`](PipelineController::convert), observe
//! progress through a shared handle, and collect the artifact or the error.
//!
//! The controller is a state machine surfaced through the progress phase:
//!
//! ```text
//! Idle -> Sampling -> Encoding -> Done
//!             |           |
//!             +--------> Failed      (reset returns any state to Idle)
//! ```
//!
//! Sampling awaits one seek at a time; encoding awaits a single one-shot
//! completion from the backend while a 100 ms tick drives display progress.
//! Cancellation (or [`reset`](PipelineController::reset)) stops the session
//! at the next seek or tick boundary and drops the completion receiver, so a
//! late finish from a discarded session is never observed.
//!
//! # Example
//!
//! ```no_run
//! use gifify::{ConversionOptions, MediaSource, PipelineController};
//!
//! # async fn example() -> Result<(), gifify::ConvertError> {
//! let mut pipeline = PipelineController::new(ConversionOptions::new());
//! pipeline.load(MediaSource::open("input.mp4")?);
//!
//! let artifact = pipeline.convert().await?;
//! artifact.save(artifact.suggested_filename())?;
//! # Ok(())
//! # }
//! ```

use tokio::time::{Instant, MissedTickBehavior, interval};

use crate::config::ConversionOptions;
use crate::encode::{EncodeBackend, GifArtifact, GifBackend};
use crate::error::ConvertError;
use crate::progress::{CancellationToken, ENCODING_TICK, Phase, ProgressHandle};
use crate::sampler;
use crate::source::FrameSource;

/// Orchestrates sampling, encoding, and progress for one source at a time.
pub struct PipelineController<S: FrameSource> {
    options: ConversionOptions,
    source: Option<S>,
    progress: ProgressHandle,
    cancel: CancellationToken,
    artifact: Option<GifArtifact>,
}

impl<S: FrameSource> PipelineController<S> {
    /// Create a controller in the [`Phase::Idle`] state.
    pub fn new(options: ConversionOptions) -> Self {
        Self {
            options,
            source: None,
            progress: ProgressHandle::new(),
            cancel: CancellationToken::new(),
            artifact: None,
        }
    }

    /// Load a source, discarding any previous source and artifact.
    pub fn load(&mut self, source: S) {
        self.source = Some(source);
        self.artifact = None;
        self.progress.reset();
    }

    /// The options this controller was built with.
    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// A cloneable view of the current session's progress.
    pub fn progress(&self) -> ProgressHandle {
        self.progress.clone()
    }

    /// The current session's cancellation token.
    ///
    /// Cancelling it stops an in-flight conversion at the next seek or tick
    /// boundary; the `convert` future then returns
    /// [`ConvertError::Cancelled`] and the phase returns to `Idle`. After a
    /// [`reset`](PipelineController::reset) the token belongs to a dead
    /// session and cancelling it has no further effect.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The artifact of the last successful session, if still held.
    pub fn artifact(&self) -> Option<&GifArtifact> {
        self.artifact.as_ref()
    }

    /// Take ownership of the last session's artifact.
    pub fn take_artifact(&mut self) -> Option<GifArtifact> {
        self.artifact.take()
    }

    /// Discard the session: cancel any in-flight work, release the source
    /// and artifact, and return the phase to [`Phase::Idle`].
    pub fn reset(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
        self.source = None;
        self.artifact = None;
        self.progress.reset();
    }

    /// Run one conversion with the stock [`GifBackend`].
    pub async fn convert(&mut self) -> Result<&GifArtifact, ConvertError> {
        let backend = GifBackend::new(&self.options);
        self.convert_with(backend).await
    }

    /// Run one conversion with a caller-supplied backend.
    ///
    /// # Errors
    ///
    /// [`ConvertError::NoSourceLoaded`] without a loaded source,
    /// [`ConvertError::SessionInFlight`] if a session is already running,
    /// plus any sampling or encoding failure. On failure the phase is
    /// [`Phase::Failed`] (or [`Phase::Idle`] after a cancellation) and only
    /// [`load`](PipelineController::load) or
    /// [`reset`](PipelineController::reset) leave that state.
    pub async fn convert_with<B: EncodeBackend>(
        &mut self,
        mut backend: B,
    ) -> Result<&GifArtifact, ConvertError> {
        match self.progress.phase() {
            Phase::Sampling | Phase::Encoding => return Err(ConvertError::SessionInFlight),
            Phase::Idle | Phase::Done | Phase::Failed => {}
        }
        let source = self.source.as_mut().ok_or(ConvertError::NoSourceLoaded)?;

        self.artifact = None;
        let cancel = self.cancel.clone();
        self.progress.begin_sampling();
        log::debug!("Conversion session started");

        let total_frames = match sampler::sample(
            source,
            &mut backend,
            &self.options,
            &self.progress,
            &cancel,
        )
        .await
        {
            Ok(total) => total,
            Err(ConvertError::Cancelled) => {
                self.progress.reset();
                return Err(ConvertError::Cancelled);
            }
            Err(error) => {
                self.progress.fail();
                return Err(error);
            }
        };

        debug_assert_eq!(backend.queued_frames() as u64, total_frames);

        // Hand off to the backend. From here the only deterministic signal
        // is the one-shot completion; the tick drives display progress.
        let estimate = self.options.per_frame_encode_cost * total_frames as u32;
        self.progress.begin_encoding(estimate);
        let mut completion = backend.begin_render();
        log::debug!("Rendering {total_frames} frames, estimated {estimate:?}");

        let started = Instant::now();
        let mut ticker = interval(ENCODING_TICK);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // An interval's first tick completes immediately; consume it so the
        // first recorded tick lands a full period in.
        ticker.tick().await;

        loop {
            tokio::select! {
                finished = &mut completion => {
                    return match finished {
                        Ok(Ok(artifact)) => {
                            self.progress.finish();
                            log::debug!(
                                "Conversion finished: {} frames, {} bytes",
                                artifact.frame_count(),
                                artifact.bytes().len(),
                            );
                            Ok(self.artifact.insert(artifact))
                        }
                        Ok(Err(error)) => {
                            self.progress.fail();
                            Err(error)
                        }
                        Err(_) => {
                            self.progress.fail();
                            Err(ConvertError::EncodeFailed(
                                "encode backend terminated without finishing".into(),
                            ))
                        }
                    };
                }
                _ = ticker.tick() => {
                    if cancel.is_cancelled() {
                        self.progress.reset();
                        return Err(ConvertError::Cancelled);
                    }
                    if let Some(timeout) = self.options.render_timeout {
                        let waited = started.elapsed();
                        if waited >= timeout {
                            self.progress.fail();
                            return Err(ConvertError::EncodeStalled { waited });
                        }
                    }
                    self.progress.encoding_tick(ENCODING_TICK);
                }
            }
        }
    }
}
