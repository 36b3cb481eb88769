//! The frame sampling phase.
//!
//! Drives a [`FrameSource`] through the ordered sequence of timestamps
//! covering `[0, duration)` at the configured interval, rendering each
//! sampled instant into a single reusable pixel buffer and queueing a tagged
//! copy on the encode backend. Strictly sequential: the source has only one
//! playback position, so each seek must resolve before the next is issued.

use std::time::Duration;

use image::RgbaImage;

use crate::config::ConversionOptions;
use crate::encode::EncodeBackend;
use crate::error::ConvertError;
use crate::progress::{CancellationToken, ProgressHandle};
use crate::source::{FrameSource, SampledFrame};

/// Sample every frame of the plan, queueing each on `backend`.
///
/// Returns the total number of frames sampled, which always equals
/// `ceil(duration / interval)` on success. Progress is reported after each
/// captured frame, scaled to the sampling half of the percentage range.
pub(crate) async fn sample<S, B>(
    source: &mut S,
    backend: &mut B,
    options: &ConversionOptions,
    progress: &ProgressHandle,
    cancel: &CancellationToken,
) -> Result<u64, ConvertError>
where
    S: FrameSource,
    B: EncodeBackend,
{
    let duration = source.duration();
    let seconds = duration.as_secs_f64();
    if seconds <= 0.0 || !seconds.is_finite() {
        return Err(ConvertError::InvalidDuration(seconds));
    }

    let interval = options.sampling_interval.seconds();
    let total_frames = (seconds / interval).ceil() as u64;
    if total_frames == 0 {
        return Err(ConvertError::ZeroFramesSampled);
    }

    let (width, height) = source.intrinsic_size();
    if width == 0 || height == 0 {
        return Err(ConvertError::RenderTargetUnavailable(format!(
            "source reports {width}x{height} frames"
        )));
    }
    let mut buffer = RgbaImage::new(width, height);

    log::debug!(
        "Sampling {total_frames} frames over {seconds:.3}s at {interval}s intervals ({width}x{height})",
    );

    for ordinal in 0..total_frames {
        if cancel.is_cancelled() {
            return Err(ConvertError::Cancelled);
        }

        // Target timestamps come from the ordinal, not an accumulating
        // cursor, so float drift can never add or drop a frame.
        let timestamp = Duration::from_secs_f64(ordinal as f64 * interval);
        source.seek_to(timestamp).await?;

        // The dimensions should never change mid-session, but the buffer is
        // re-checked against the source before every capture.
        let (current_width, current_height) = source.intrinsic_size();
        if (current_width, current_height) != buffer.dimensions() {
            log::warn!(
                "Source dimensions changed mid-session: {}x{} -> {current_width}x{current_height}",
                buffer.width(),
                buffer.height(),
            );
            buffer = RgbaImage::new(current_width, current_height);
        }

        source.capture_into(&mut buffer)?;
        backend.add_frame(SampledFrame {
            ordinal,
            timestamp,
            display_duration: options.frame_delay,
            pixels: &buffer,
        })?;

        progress.frame_captured(ordinal + 1, total_frames);
        log::trace!("Captured frame {}/{total_frames} at {timestamp:?}", ordinal + 1);
    }

    Ok(total_frames)
}
