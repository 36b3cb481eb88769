//! The frame-source seam.
//!
//! [`FrameSource`] abstracts a decodable video with a single playback
//! position: the pipeline drives it through seek requests and captures the
//! visual state after each one. The production implementation is
//! [`MediaSource`](crate::MediaSource); tests substitute scripted sources.

use std::future::Future;
use std::time::Duration;

use image::RgbaImage;

use crate::error::ConvertError;

/// A seekable video source with one playback position.
///
/// The contract mirrors a media element: `duration` and `intrinsic_size`
/// are fixed once the source is open, while `seek_to` mutates the playback
/// position and resolves when the frame at or after the requested timestamp
/// is ready for capture. At most one seek may be outstanding at a time; the
/// sampler guarantees this by awaiting each seek before issuing the next.
pub trait FrameSource: Send {
    /// Total duration of the source.
    ///
    /// A zero duration is reported as-is; the sampler rejects it as
    /// [`ConvertError::InvalidDuration`].
    fn duration(&self) -> Duration;

    /// Native frame dimensions `(width, height)` in pixels.
    fn intrinsic_size(&self) -> (u32, u32);

    /// Move the playback position to `timestamp`.
    ///
    /// Resolves once the frame at or after `timestamp` is decoded and ready
    /// for [`capture_into`](FrameSource::capture_into). Issuing a second
    /// seek before the first resolves is a contract violation.
    fn seek_to(
        &mut self,
        timestamp: Duration,
    ) -> impl Future<Output = Result<(), ConvertError>> + Send;

    /// Render the current visual state into `buffer`.
    ///
    /// The buffer is resized by the caller to the intrinsic dimensions
    /// before each capture; implementations overwrite every pixel.
    fn capture_into(&mut self, buffer: &mut RgbaImage) -> Result<(), ConvertError>;
}

/// One captured frame on its way to the encode backend.
///
/// Borrows the sampler's reusable pixel buffer; backends must copy the
/// pixels during [`add_frame`](crate::EncodeBackend::add_frame) and never
/// retain the reference, because the buffer is overwritten by the next
/// capture.
#[derive(Debug)]
pub struct SampledFrame<'a> {
    /// Zero-based position of this frame in the sample sequence.
    pub ordinal: u64,
    /// Source timestamp the frame was captured at.
    pub timestamp: Duration,
    /// How long the frame should be displayed in the output.
    pub display_duration: Duration,
    /// The captured pixels, RGBA8, intrinsic dimensions.
    pub pixels: &'a RgbaImage,
}
