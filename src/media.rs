//! FFmpeg-backed [`FrameSource`].
//!
//! [`MediaSource`] opens a media file eagerly to validate it and cache its
//! duration and intrinsic frame size, then hands decoding to a dedicated
//! background thread that owns the demuxer, decoder, and RGBA scaler. Seek
//! requests travel to that thread over a channel and resolve through
//! per-request one-shot replies, so the pipeline can await seek completion
//! without blocking on FFmpeg.
//!
//! Each seek is a container-level keyframe seek followed by forward decode
//! until the presentation timestamp reaches the target, the same strategy the
//! demuxer uses for frame-accurate extraction.

use std::{
    path::{Path, PathBuf},
    sync::mpsc::{Receiver, Sender, channel},
    thread,
    time::Duration,
};

use ffmpeg_next::{
    Rational,
    codec::context::Context as CodecContext,
    decoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::RgbaImage;
use tokio::sync::oneshot;

use crate::error::ConvertError;
use crate::source::FrameSource;

/// A decoded, stride-stripped RGBA frame produced by the decode thread.
#[derive(Debug)]
struct RgbaPlane {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

/// One seek request for the decode thread.
struct SeekRequest {
    target: Duration,
    reply: oneshot::Sender<Result<RgbaPlane, ConvertError>>,
}

/// A video file opened for frame sampling.
///
/// Construct with [`MediaSource::open`]. Duration and intrinsic size are
/// probed once at open time; seeking and decoding happen on a background
/// thread that exits when the source is dropped.
///
/// # Example
///
/// ```no_run
/// use gifify::{FrameSource, MediaSource};
///
/// let source = MediaSource::open("input.mp4")?;
/// println!("{:?}, {:?}", source.duration(), source.intrinsic_size());
/// # Ok::<(), gifify::ConvertError>(())
/// ```
#[derive(Debug)]
pub struct MediaSource {
    duration: Duration,
    width: u32,
    height: u32,
    requests: Sender<SeekRequest>,
    current: Option<RgbaPlane>,
    // Detached on drop; the thread exits when `requests` closes.
    #[allow(dead_code)]
    worker: thread::JoinHandle<()>,
}

impl MediaSource {
    /// Open a media file for sampling.
    ///
    /// Initializes FFmpeg (idempotent), probes the file for a video stream,
    /// caches its metadata, and spawns the decode thread.
    ///
    /// # Errors
    ///
    /// [`ConvertError::SourceOpen`] if the file cannot be opened,
    /// [`ConvertError::NoVideoStream`] if it carries no video.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ConvertError> {
        let path = path.as_ref().to_path_buf();

        ffmpeg_next::init().map_err(|error| ConvertError::SourceOpen {
            path: path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        // Probe eagerly so that a bad path or stream layout fails here, not
        // on the first seek.
        let probe = ffmpeg_next::format::input(&path).map_err(|error| ConvertError::SourceOpen {
            path: path.clone(),
            reason: error.to_string(),
        })?;

        let stream = probe
            .streams()
            .best(Type::Video)
            .ok_or(ConvertError::NoVideoStream)?;
        let decoder_context = CodecContext::from_parameters(stream.parameters())?;
        let video = decoder_context.decoder().video()?;
        let width = video.width();
        let height = video.height();

        // Container duration is in AV_TIME_BASE (microseconds). Streams
        // without one report a negative value; surface that as zero and let
        // the sampler reject it.
        let raw_duration = probe.duration();
        let duration = if raw_duration > 0 {
            Duration::from_micros(raw_duration as u64)
        } else {
            Duration::ZERO
        };
        drop(probe);

        log::debug!(
            "Opened {path:?}: {width}x{height}, duration {duration:?}",
        );

        let (requests, receiver) = channel();
        let worker_path = path.clone();
        let worker = thread::spawn(move || decode_worker(worker_path, receiver));

        Ok(Self {
            duration,
            width,
            height,
            requests,
            current: None,
            worker,
        })
    }
}

impl FrameSource for MediaSource {
    fn duration(&self) -> Duration {
        self.duration
    }

    fn intrinsic_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    async fn seek_to(&mut self, timestamp: Duration) -> Result<(), ConvertError> {
        let (reply, completion) = oneshot::channel();
        self.requests
            .send(SeekRequest {
                target: timestamp,
                reply,
            })
            .map_err(|_| ConvertError::SeekFailed("decode thread terminated".into()))?;

        let plane = completion
            .await
            .map_err(|_| ConvertError::SeekFailed("decode thread dropped the request".into()))??;
        self.current = Some(plane);
        Ok(())
    }

    fn capture_into(&mut self, buffer: &mut RgbaImage) -> Result<(), ConvertError> {
        let plane = self
            .current
            .as_ref()
            .ok_or_else(|| ConvertError::DecodeFailed("no frame decoded yet".into()))?;

        if buffer.dimensions() != (plane.width, plane.height) {
            return Err(ConvertError::RenderTargetUnavailable(format!(
                "buffer is {}x{} but the decoded frame is {}x{}",
                buffer.width(),
                buffer.height(),
                plane.width,
                plane.height,
            )));
        }

        buffer.copy_from_slice(&plane.data);
        Ok(())
    }
}

/// Decode-thread entry point.
///
/// Opens its own demuxer (FFmpeg contexts stay on one thread) and serves
/// seek requests strictly in order until the request channel closes.
fn decode_worker(path: PathBuf, requests: Receiver<SeekRequest>) {
    match DecodeSession::open(&path) {
        Ok(mut session) => {
            while let Ok(request) = requests.recv() {
                let result = session.frame_at(request.target);
                // The requester may have been dropped by a reset.
                let _ = request.reply.send(result);
            }
        }
        Err(error) => {
            let reason = error.to_string();
            log::error!("Decode thread failed to open {path:?}: {reason}");
            while let Ok(request) = requests.recv() {
                let _ = request
                    .reply
                    .send(Err(ConvertError::SeekFailed(reason.clone())));
            }
        }
    }
    log::trace!("Decode thread for {path:?} exiting");
}

/// Demuxer, decoder, and scaler state owned by the decode thread.
struct DecodeSession {
    input: Input,
    stream_index: usize,
    time_base: Rational,
    decoder: decoder::Video,
    scaler: ScalingContext,
    decoded: VideoFrame,
    rgba: VideoFrame,
    width: u32,
    height: u32,
}

impl DecodeSession {
    fn open(path: &Path) -> Result<Self, ConvertError> {
        let input = ffmpeg_next::format::input(&path).map_err(|error| ConvertError::SourceOpen {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;

        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or(ConvertError::NoVideoStream)?;
        let stream_index = stream.index();
        let time_base = stream.time_base();

        let decoder_context = CodecContext::from_parameters(stream.parameters())?;
        let decoder = decoder_context.decoder().video()?;
        let width = decoder.width();
        let height = decoder.height();

        let scaler = ScalingContext::get(
            decoder.format(),
            width,
            height,
            Pixel::RGBA,
            width,
            height,
            ScalingFlags::BILINEAR,
        )
        .map_err(|error| {
            ConvertError::RenderTargetUnavailable(format!("scaler setup failed: {error}"))
        })?;

        Ok(Self {
            input,
            stream_index,
            time_base,
            decoder,
            scaler,
            decoded: VideoFrame::empty(),
            rgba: VideoFrame::empty(),
            width,
            height,
        })
    }

    /// Seek to the keyframe before `target`, decode forward until the
    /// presentation timestamp reaches it, and return the frame as RGBA.
    fn frame_at(&mut self, target: Duration) -> Result<RgbaPlane, ConvertError> {
        // Container-level seeks take AV_TIME_BASE (microsecond) timestamps.
        let seek_ts = target.as_micros() as i64;
        self.input
            .seek(seek_ts, ..seek_ts)
            .map_err(|error| ConvertError::SeekFailed(error.to_string()))?;
        self.decoder.flush();

        let target_seconds = target.as_secs_f64();
        let mut saw_frame = false;

        loop {
            let mut packet_sent = false;
            for (stream, packet) in self.input.packets() {
                if stream.index() != self.stream_index {
                    continue;
                }
                self.decoder.send_packet(&packet)?;
                packet_sent = true;
                break;
            }

            if !packet_sent {
                break;
            }

            while self.decoder.receive_frame(&mut self.decoded).is_ok() {
                saw_frame = true;
                if self.decoded_seconds() + 1e-6 >= target_seconds {
                    return self.scale_current();
                }
            }
        }

        // End of stream: flush the decoder, then fall back to the last
        // decoded frame when the target lies past the final PTS.
        self.decoder.send_eof()?;
        while self.decoder.receive_frame(&mut self.decoded).is_ok() {
            saw_frame = true;
            if self.decoded_seconds() + 1e-6 >= target_seconds {
                return self.scale_current();
            }
        }

        if saw_frame {
            return self.scale_current();
        }

        Err(ConvertError::DecodeFailed(format!(
            "no frame at or after {target:?}"
        )))
    }

    fn decoded_seconds(&self) -> f64 {
        let pts = self.decoded.pts().unwrap_or(0);
        pts as f64 * f64::from(self.time_base.numerator()) / f64::from(self.time_base.denominator())
    }

    fn scale_current(&mut self) -> Result<RgbaPlane, ConvertError> {
        self.scaler
            .run(&self.decoded, &mut self.rgba)
            .map_err(|error| ConvertError::DecodeFailed(error.to_string()))?;
        Ok(RgbaPlane {
            width: self.width,
            height: self.height,
            data: strip_stride(&self.rgba, self.width, self.height),
        })
    }
}

/// Copy RGBA pixel data out of an FFmpeg frame, dropping per-row padding.
///
/// FFmpeg frames frequently carry stride > width × 4; the output is tightly
/// packed so it can back an [`image::RgbaImage`] directly.
fn strip_stride(frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = frame.stride(0);
    let row_bytes = width as usize * 4;
    let data = frame.data(0);

    if stride == row_bytes {
        data[..row_bytes * height as usize].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_bytes * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            buffer.extend_from_slice(&data[start..start + row_bytes]);
        }
        buffer
    }
}
