//! Pipeline lifecycle integration tests.
//!
//! These run entirely on scripted sources and mock backends so they are
//! deterministic under Tokio's paused clock; only the end-to-end test at the
//! bottom exercises the real GIF backend.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use gifify::{
    CancellationToken, ConversionOptions, ConvertError, EncodeBackend, FrameSource, GifArtifact,
    Phase, PipelineController, SampledFrame, SamplingInterval,
};
use image::RgbaImage;
use tokio::sync::oneshot;

// ── Test doubles ───────────────────────────────────────────────────

/// Scripted source producing solid frames, recording seeks for the test.
struct ScriptedSource {
    duration: Duration,
    size: (u32, u32),
    seeks: Arc<Mutex<Vec<Duration>>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl ScriptedSource {
    fn new(duration: Duration) -> Self {
        Self {
            duration,
            size: (16, 12),
            seeks: Arc::new(Mutex::new(Vec::new())),
            cancel_after: None,
        }
    }

    fn seek_log(&self) -> Arc<Mutex<Vec<Duration>>> {
        Arc::clone(&self.seeks)
    }
}

impl FrameSource for ScriptedSource {
    fn duration(&self) -> Duration {
        self.duration
    }

    fn intrinsic_size(&self) -> (u32, u32) {
        self.size
    }

    async fn seek_to(&mut self, timestamp: Duration) -> Result<(), ConvertError> {
        let seek_count = {
            let mut seeks = self.seeks.lock().unwrap();
            seeks.push(timestamp);
            seeks.len()
        };
        if let Some((after, token)) = &self.cancel_after {
            if seek_count >= *after {
                token.cancel();
            }
        }
        Ok(())
    }

    fn capture_into(&mut self, buffer: &mut RgbaImage) -> Result<(), ConvertError> {
        for pixel in buffer.pixels_mut() {
            *pixel = image::Rgba([40, 80, 120, 255]);
        }
        Ok(())
    }
}

/// Backend that resolves its completion channel as soon as rendering starts.
struct InstantBackend {
    queued: usize,
    result: Option<Result<GifArtifact, ConvertError>>,
}

impl InstantBackend {
    fn succeeding() -> Self {
        Self {
            queued: 0,
            result: None,
        }
    }

    fn failing(error: ConvertError) -> Self {
        Self {
            queued: 0,
            result: Some(Err(error)),
        }
    }
}

impl EncodeBackend for InstantBackend {
    fn add_frame(&mut self, _frame: SampledFrame<'_>) -> Result<(), ConvertError> {
        self.queued += 1;
        Ok(())
    }

    fn queued_frames(&self) -> usize {
        self.queued
    }

    fn begin_render(self) -> oneshot::Receiver<Result<GifArtifact, ConvertError>> {
        let (sender, receiver) = oneshot::channel();
        let result = self.result.unwrap_or_else(|| {
            Ok(GifArtifact::new(
                b"GIF89a-mock".to_vec(),
                16,
                12,
                self.queued,
            ))
        });
        sender.send(result).ok();
        receiver
    }
}

/// Backend whose completion channel never resolves.
struct StalledBackend {
    queued: usize,
}

impl StalledBackend {
    fn new() -> Self {
        Self { queued: 0 }
    }
}

impl EncodeBackend for StalledBackend {
    fn add_frame(&mut self, _frame: SampledFrame<'_>) -> Result<(), ConvertError> {
        self.queued += 1;
        Ok(())
    }

    fn queued_frames(&self) -> usize {
        self.queued
    }

    fn begin_render(self) -> oneshot::Receiver<Result<GifArtifact, ConvertError>> {
        let (sender, receiver) = oneshot::channel();
        // Keep the channel open forever without resolving it.
        std::mem::forget(sender);
        receiver
    }
}

/// Backend that drops its completion channel without answering.
struct VanishingBackend {
    queued: usize,
}

impl EncodeBackend for VanishingBackend {
    fn add_frame(&mut self, _frame: SampledFrame<'_>) -> Result<(), ConvertError> {
        self.queued += 1;
        Ok(())
    }

    fn queued_frames(&self) -> usize {
        self.queued
    }

    fn begin_render(self) -> oneshot::Receiver<Result<GifArtifact, ConvertError>> {
        let (_sender, receiver) = oneshot::channel();
        receiver
    }
}

fn coarse_options() -> ConversionOptions {
    ConversionOptions::new().with_sampling_interval(SamplingInterval::Coarse)
}

// ── Happy path ─────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn convert_samples_then_snaps_to_done() {
    let source = ScriptedSource::new(Duration::from_secs(2));
    let seeks = source.seek_log();

    let mut pipeline = PipelineController::new(coarse_options());
    pipeline.load(source);

    let progress = pipeline.progress();
    let artifact = pipeline
        .convert_with(InstantBackend::succeeding())
        .await
        .expect("conversion succeeds");

    // 2.0s at 0.5s spacing: four frames, first at zero.
    assert_eq!(artifact.frame_count(), 4);
    assert_eq!(
        *seeks.lock().unwrap(),
        vec![
            Duration::ZERO,
            Duration::from_millis(500),
            Duration::from_millis(1000),
            Duration::from_millis(1500),
        ]
    );

    let snapshot = progress.snapshot();
    assert_eq!(snapshot.phase, Phase::Done);
    assert_eq!(snapshot.percent, 100);
    assert!(pipeline.artifact().is_some());
}

#[tokio::test(start_paused = true)]
async fn take_artifact_moves_the_result_out() {
    let mut pipeline = PipelineController::new(coarse_options());
    pipeline.load(ScriptedSource::new(Duration::from_secs(1)));

    pipeline
        .convert_with(InstantBackend::succeeding())
        .await
        .expect("conversion succeeds");

    let artifact = pipeline.take_artifact().expect("artifact is held");
    assert_eq!(artifact.frame_count(), 2);
    assert!(pipeline.artifact().is_none());
    assert!(pipeline.take_artifact().is_none());
}

// ── Precondition failures ──────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn convert_without_source_is_rejected() {
    let mut pipeline: PipelineController<ScriptedSource> =
        PipelineController::new(ConversionOptions::new());

    let result = pipeline.convert_with(InstantBackend::succeeding()).await;
    assert!(matches!(result, Err(ConvertError::NoSourceLoaded)));
    assert_eq!(pipeline.progress().phase(), Phase::Idle);
}

#[tokio::test(start_paused = true)]
async fn zero_duration_source_fails_without_an_artifact() {
    let mut pipeline = PipelineController::new(coarse_options());
    pipeline.load(ScriptedSource::new(Duration::ZERO));

    let result = pipeline.convert_with(InstantBackend::succeeding()).await;
    assert!(matches!(result, Err(ConvertError::InvalidDuration(_))));
    assert_eq!(pipeline.progress().phase(), Phase::Failed);
    assert!(pipeline.artifact().is_none());
}

#[tokio::test(start_paused = true)]
async fn concurrent_start_is_rejected_until_reset() {
    let mut pipeline = PipelineController::new(coarse_options());
    pipeline.load(ScriptedSource::new(Duration::from_secs(1)));

    // Run a conversion into the encoding phase, then abandon its future
    // while the backend is still pending.
    {
        let conversion = pipeline.convert_with(StalledBackend::new());
        tokio::pin!(conversion);
        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), conversion.as_mut()).await;
        assert!(abandoned.is_err(), "backend must still be pending");
    }
    assert_eq!(pipeline.progress().phase(), Phase::Encoding);

    // The session is still considered in flight, so a second start loses.
    let result = pipeline.convert_with(InstantBackend::succeeding()).await;
    assert!(matches!(result, Err(ConvertError::SessionInFlight)));

    // Only reset clears the stuck session.
    pipeline.reset();
    pipeline.load(ScriptedSource::new(Duration::from_secs(1)));
    pipeline
        .convert_with(InstantBackend::succeeding())
        .await
        .expect("session runs after reset");
    assert_eq!(pipeline.progress().percent(), 100);
}

// ── Cancellation ───────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn cancel_during_sampling_returns_to_idle() {
    let mut source = ScriptedSource::new(Duration::from_secs(2));
    let seeks = source.seek_log();

    let mut pipeline = PipelineController::new(coarse_options());
    source.cancel_after = Some((2, pipeline.cancellation_token()));
    pipeline.load(source);

    let result = pipeline.convert_with(InstantBackend::succeeding()).await;
    assert!(matches!(result, Err(ConvertError::Cancelled)));

    // The check runs before each seek, so the third never happens.
    assert_eq!(seeks.lock().unwrap().len(), 2);

    let snapshot = pipeline.progress().snapshot();
    assert_eq!(snapshot.phase, Phase::Idle);
    assert_eq!(snapshot.percent, 0);
    assert!(pipeline.artifact().is_none());
}

#[tokio::test(start_paused = true)]
async fn cancel_during_encoding_returns_to_idle() {
    let mut pipeline = PipelineController::new(coarse_options());
    pipeline.load(ScriptedSource::new(Duration::from_secs(1)));

    let progress = pipeline.progress();
    let token = pipeline.cancellation_token();
    let canceller = tokio::spawn(async move {
        while progress.phase() != Phase::Encoding {
            tokio::task::yield_now().await;
        }
        token.cancel();
    });

    let result = pipeline.convert_with(StalledBackend::new()).await;
    assert!(matches!(result, Err(ConvertError::Cancelled)));
    assert_eq!(pipeline.progress().phase(), Phase::Idle);

    canceller.await.expect("canceller finishes");
}

#[tokio::test(start_paused = true)]
async fn session_after_cancellation_starts_clean() {
    let mut source = ScriptedSource::new(Duration::from_secs(2));

    let mut pipeline = PipelineController::new(coarse_options());
    source.cancel_after = Some((1, pipeline.cancellation_token()));
    pipeline.load(source);

    let result = pipeline.convert_with(InstantBackend::succeeding()).await;
    assert!(matches!(result, Err(ConvertError::Cancelled)));

    // A fresh load and convert must be unaffected by the dead session.
    pipeline.reset();
    pipeline.load(ScriptedSource::new(Duration::from_secs(1)));
    let artifact = pipeline
        .convert_with(InstantBackend::succeeding())
        .await
        .expect("second session succeeds");
    assert_eq!(artifact.frame_count(), 2);
    assert_eq!(pipeline.progress().percent(), 100);
}

#[tokio::test(start_paused = true)]
async fn stale_token_does_not_affect_the_next_session() {
    let mut pipeline = PipelineController::new(coarse_options());
    pipeline.load(ScriptedSource::new(Duration::from_secs(1)));

    let stale = pipeline.cancellation_token();
    pipeline.reset();
    stale.cancel();

    pipeline.load(ScriptedSource::new(Duration::from_secs(1)));
    pipeline
        .convert_with(InstantBackend::succeeding())
        .await
        .expect("stale token must not cancel the new session");
}

// ── Encoding failures ──────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn backend_error_marks_the_session_failed() {
    let mut pipeline = PipelineController::new(coarse_options());
    pipeline.load(ScriptedSource::new(Duration::from_secs(1)));

    let backend = InstantBackend::failing(ConvertError::EncodeFailed("palette overflow".into()));
    let result = pipeline.convert_with(backend).await;

    assert!(matches!(result, Err(ConvertError::EncodeFailed(_))));
    assert_eq!(pipeline.progress().phase(), Phase::Failed);
    assert!(pipeline.artifact().is_none());
}

#[tokio::test(start_paused = true)]
async fn backend_dropping_its_channel_is_an_encode_failure() {
    let mut pipeline = PipelineController::new(coarse_options());
    pipeline.load(ScriptedSource::new(Duration::from_secs(1)));

    let result = pipeline.convert_with(VanishingBackend { queued: 0 }).await;
    assert!(matches!(result, Err(ConvertError::EncodeFailed(_))));
    assert_eq!(pipeline.progress().phase(), Phase::Failed);
}

#[tokio::test(start_paused = true)]
async fn render_timeout_stalls_out() {
    let options = coarse_options().with_render_timeout(Some(Duration::from_millis(500)));
    let mut pipeline = PipelineController::new(options);
    pipeline.load(ScriptedSource::new(Duration::from_secs(1)));

    let result = pipeline.convert_with(StalledBackend::new()).await;
    match result {
        Err(ConvertError::EncodeStalled { waited }) => {
            assert!(waited >= Duration::from_millis(500));
        }
        other => panic!("expected EncodeStalled, got {other:?}"),
    }
    assert_eq!(pipeline.progress().phase(), Phase::Failed);
}

#[tokio::test(start_paused = true)]
async fn percent_caps_at_99_until_the_backend_finishes() {
    // A 500 ms timeout against a 2-frame, 50 ms/frame estimate means the
    // estimate is blown long before the stall is declared.
    let options = coarse_options().with_render_timeout(Some(Duration::from_millis(500)));
    let mut pipeline = PipelineController::new(options);
    pipeline.load(ScriptedSource::new(Duration::from_secs(1)));

    let result = pipeline.convert_with(StalledBackend::new()).await;
    assert!(matches!(result, Err(ConvertError::EncodeStalled { .. })));
    assert!(pipeline.progress().percent() <= 99);
    assert!(pipeline.progress().percent() >= 50);
}

// ── Reset ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn reset_discards_source_and_artifact() {
    let mut pipeline = PipelineController::new(coarse_options());
    pipeline.load(ScriptedSource::new(Duration::from_secs(1)));
    pipeline
        .convert_with(InstantBackend::succeeding())
        .await
        .expect("conversion succeeds");

    pipeline.reset();
    assert!(pipeline.artifact().is_none());
    assert_eq!(pipeline.progress().phase(), Phase::Idle);
    assert_eq!(pipeline.progress().percent(), 0);

    // The source is gone too.
    let result = pipeline.convert_with(InstantBackend::succeeding()).await;
    assert!(matches!(result, Err(ConvertError::NoSourceLoaded)));
}

// ── End to end with the real backend ───────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn end_to_end_produces_a_playable_gif() {
    let mut pipeline = PipelineController::new(coarse_options());
    pipeline.load(ScriptedSource::new(Duration::from_secs(1)));

    let artifact = pipeline.convert().await.expect("conversion succeeds");

    assert!(artifact.bytes().starts_with(b"GIF89a"));
    assert_eq!(artifact.frame_count(), 2);
    assert_eq!(artifact.width(), 16);
    assert_eq!(artifact.height(), 12);
    assert_eq!(artifact.suggested_filename(), "output.gif");
    assert_eq!(pipeline.progress().percent(), 100);
}
