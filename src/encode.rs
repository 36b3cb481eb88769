//! GIF encoding backend.
//!
//! [`EncodeBackend`] is the pipeline's seam to an opaque, worker-parallel
//! encoder: frames are queued with [`add_frame`](EncodeBackend::add_frame),
//! then [`begin_render`](EncodeBackend::begin_render) consumes the backend
//! and returns a one-shot receiver that yields the finished artifact exactly
//! once. Dropping the receiver discards the render — a completion for a
//! reset session is unobservable by construction.
//!
//! [`GifBackend`] is the production implementation: frames are quantized to
//! 256-colour palettes in parallel on a dedicated rayon pool, then written
//! in enqueue order by the `gif` crate's encoder into an in-memory buffer.

use std::path::Path;

use gif::{Encoder, Frame, Repeat};
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tokio::sync::oneshot;

use crate::config::{ConversionOptions, Quality};
use crate::error::ConvertError;
use crate::source::SampledFrame;

/// Fixed suggested filename for downloaded artifacts.
const SUGGESTED_FILENAME: &str = "output.gif";

/// The finished, immutable GIF produced by one successful session.
#[derive(Debug, Clone)]
pub struct GifArtifact {
    bytes: Vec<u8>,
    width: u16,
    height: u16,
    frame_count: usize,
}

impl GifArtifact {
    /// Assemble an artifact from already-encoded GIF bytes.
    ///
    /// Intended for [`EncodeBackend`] implementations outside this crate;
    /// [`GifBackend`] builds its artifacts internally.
    pub fn new(bytes: Vec<u8>, width: u16, height: u16, frame_count: usize) -> Self {
        Self {
            bytes,
            width,
            height,
            frame_count,
        }
    }

    /// The encoded GIF bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Consume the artifact, returning the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Output width in pixels.
    pub fn width(&self) -> u16 {
        self.width
    }

    /// Output height in pixels.
    pub fn height(&self) -> u16 {
        self.height
    }

    /// Number of frames in the animation.
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// The fixed filename to suggest when saving the artifact.
    pub fn suggested_filename(&self) -> &'static str {
        SUGGESTED_FILENAME
    }

    /// Write the GIF bytes to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConvertError> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// A worker-parallel encoder consumed by the pipeline.
///
/// Implementations copy pixel data during `add_frame` and must not retain
/// the caller's buffer. `begin_render` takes the backend by value, so no
/// frame can be queued once rendering has started.
pub trait EncodeBackend: Send {
    /// Queue a copy of `frame` for encoding.
    fn add_frame(&mut self, frame: SampledFrame<'_>) -> Result<(), ConvertError>;

    /// Number of frames queued so far.
    fn queued_frames(&self) -> usize;

    /// Start rendering all queued frames and return the completion channel.
    ///
    /// Returns immediately; the receiver resolves exactly once with the
    /// artifact or an encode error. Must be called from within a Tokio
    /// runtime.
    fn begin_render(self) -> oneshot::Receiver<Result<GifArtifact, ConvertError>>;
}

/// One queued frame, owned by the backend.
struct QueuedFrame {
    width: u16,
    height: u16,
    delay_centis: u16,
    rgba: Vec<u8>,
}

/// The stock GIF encode backend.
///
/// Rendering runs under `tokio::task::spawn_blocking`: a rayon pool of
/// `worker_count` threads quantizes frames in parallel, then the palettized
/// frames are written sequentially in enqueue order.
pub struct GifBackend {
    quality: Quality,
    worker_count: usize,
    frames: Vec<QueuedFrame>,
}

impl GifBackend {
    /// Create a backend using the session's quality and worker settings.
    pub fn new(options: &ConversionOptions) -> Self {
        Self {
            quality: options.quality,
            worker_count: options.worker_count.max(1),
            frames: Vec::new(),
        }
    }
}

impl EncodeBackend for GifBackend {
    fn add_frame(&mut self, frame: SampledFrame<'_>) -> Result<(), ConvertError> {
        let width = u16::try_from(frame.pixels.width())
            .map_err(|_| ConvertError::EncodeFailed("frame width exceeds u16".into()))?;
        let height = u16::try_from(frame.pixels.height())
            .map_err(|_| ConvertError::EncodeFailed("frame height exceeds u16".into()))?;

        // GIF stores delays in hundredths of a second.
        let delay_centis = (frame.display_duration.as_millis() / 10)
            .try_into()
            .unwrap_or(u16::MAX);

        self.frames.push(QueuedFrame {
            width,
            height,
            delay_centis,
            rgba: frame.pixels.as_raw().clone(),
        });
        Ok(())
    }

    fn queued_frames(&self) -> usize {
        self.frames.len()
    }

    fn begin_render(self) -> oneshot::Receiver<Result<GifArtifact, ConvertError>> {
        let (sender, receiver) = oneshot::channel();
        let GifBackend {
            quality,
            worker_count,
            frames,
        } = self;

        log::debug!(
            "Rendering {} frames on {worker_count} workers (quality level {})",
            frames.len(),
            quality.level(),
        );

        tokio::task::spawn_blocking(move || {
            let result = render(frames, quality, worker_count);
            // Send fails only when the session was reset; the render is
            // discarded silently in that case.
            let _ = sender.send(result);
        });

        receiver
    }
}

/// Quantize and assemble all queued frames into a finished GIF.
fn render(
    frames: Vec<QueuedFrame>,
    quality: Quality,
    worker_count: usize,
) -> Result<GifArtifact, ConvertError> {
    if frames.is_empty() {
        return Err(ConvertError::EncodeFailed("no frames queued".into()));
    }

    let width = frames[0].width;
    let height = frames[0].height;
    let frame_count = frames.len();
    let speed = quality.quantization_speed();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(worker_count)
        .build()
        .map_err(|e| ConvertError::EncodeFailed(format!("failed to build worker pool: {e}")))?;

    // Palette quantization dominates encode time; it parallelizes per frame
    // while the ordered collect keeps enqueue order for the writer below.
    let quantized: Vec<Frame<'static>> = pool.install(|| {
        frames
            .into_par_iter()
            .map(|mut queued| {
                let mut frame = Frame::from_rgba_speed(
                    queued.width,
                    queued.height,
                    &mut queued.rgba,
                    speed,
                );
                frame.delay = queued.delay_centis;
                frame
            })
            .collect()
    });

    let mut bytes = Vec::new();
    {
        let mut encoder = Encoder::new(&mut bytes, width, height, &[])
            .map_err(|e| ConvertError::EncodeFailed(format!("failed to create encoder: {e}")))?;
        encoder
            .set_repeat(Repeat::Infinite)
            .map_err(|e| ConvertError::EncodeFailed(format!("failed to set repeat: {e}")))?;

        for frame in &quantized {
            encoder
                .write_frame(frame)
                .map_err(|e| ConvertError::EncodeFailed(format!("failed to write frame: {e}")))?;
        }
    }

    log::debug!("Rendered {frame_count} frames into {} bytes", bytes.len());

    Ok(GifArtifact {
        bytes,
        width,
        height,
        frame_count,
    })
}
