//! Error types for the `gifify` crate.
//!
//! This module defines [`ConvertError`], the unified error type returned by all
//! fallible operations in the crate. Variants carry enough context to diagnose
//! a failed conversion without additional logging at the call site.

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use ffmpeg_next::Error as FfmpegError;
use thiserror::Error;

/// The unified error type for all `gifify` operations.
///
/// Every public method that can fail returns `Result<T, ConvertError>`.
/// Failures surfaced from a running conversion leave the pipeline in
/// [`Phase::Failed`](crate::Phase::Failed); errors rejected before a session
/// starts (such as [`NoSourceLoaded`](ConvertError::NoSourceLoaded)) leave
/// the pipeline state untouched.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConvertError {
    /// A conversion was requested with no source loaded.
    #[error("No video source loaded")]
    NoSourceLoaded,

    /// A conversion was requested while another session is in flight.
    #[error("A conversion session is already in flight")]
    SessionInFlight,

    /// The source reported a duration that is zero, negative, or non-finite.
    #[error("Invalid source duration: {0} seconds")]
    InvalidDuration(f64),

    /// The sample plan computed zero frames.
    #[error("Sampling produced zero frames")]
    ZeroFramesSampled,

    /// The reusable pixel buffer or the frame scaler could not be created.
    #[error("Rendering target unavailable: {0}")]
    RenderTargetUnavailable(String),

    /// The media file could not be opened.
    #[error("Failed to open media source at {path}: {reason}")]
    SourceOpen {
        /// Path that was passed to [`crate::MediaSource::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A seek request could not be satisfied.
    #[error("Seek failed: {0}")]
    SeekFailed(String),

    /// A video frame could not be decoded after a seek.
    #[error("Failed to decode video frame: {0}")]
    DecodeFailed(String),

    /// GIF encoding failed.
    #[error("GIF encoding error: {0}")]
    EncodeFailed(String),

    /// The encode backend did not finish within the configured timeout.
    #[error("Encode backend did not finish within {waited:?}")]
    EncodeStalled {
        /// How long the controller waited before giving up.
        waited: Duration,
    },

    /// The session was cancelled or reset mid-flight.
    #[error("Conversion cancelled")]
    Cancelled,

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] IoError),
}

impl From<FfmpegError> for ConvertError {
    fn from(error: FfmpegError) -> Self {
        ConvertError::Ffmpeg(error.to_string())
    }
}
