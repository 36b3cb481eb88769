use std::{path::PathBuf, thread, time::Duration};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use gifify::{
    ConversionOptions, FrameSource, MediaSource, Phase, PipelineController, ProgressHandle,
    ProgressSnapshot, Quality, SamplingInterval,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  gifify convert input.mp4\n  gifify convert input.mp4 -o clip.gif --interval coarse --quality best --progress\n  gifify convert input.mp4 --json > events.jsonl\n  gifify probe input.mp4 --json\n  gifify completions zsh > _gifify";

#[derive(Debug, Parser)]
#[command(
    name = "gifify",
    version,
    about = "Convert video files into animated GIFs",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Convert a video file into an animated GIF.
    #[command(
        about = "Convert a video into an animated GIF",
        after_help = "Examples:\n  gifify convert input.mp4\n  gifify convert input.mp4 -o clip.gif --interval 0.5 --quality fast --workers 8\n  gifify convert input.mp4 --timeout 120 --progress"
    )]
    Convert {
        /// Input video path.
        input: PathBuf,

        /// Output GIF path.
        #[arg(short, long, default_value = "output.gif")]
        out: PathBuf,

        /// Seconds of source time between sampled frames (fine|medium|coarse or 0.1|0.2|0.5).
        #[arg(long, default_value = "fine")]
        interval: String,

        /// Encoding quality preset (best|balanced|fast).
        #[arg(long, default_value = "fast")]
        quality: String,

        /// Worker thread count for parallel encoding.
        #[arg(long, default_value_t = 4)]
        workers: usize,

        /// Display duration per GIF frame, in milliseconds.
        #[arg(long, default_value_t = 50)]
        delay: u64,

        /// Fail the encoding phase if it exceeds this many seconds.
        #[arg(long)]
        timeout: Option<u64>,

        /// Show a progress bar.
        #[arg(long)]
        progress: bool,

        /// Emit progress and the final result as JSON lines on stdout.
        #[arg(long)]
        json: bool,

        /// Allow overwriting an existing output file.
        #[arg(long)]
        overwrite: bool,
    },

    /// Print source duration, dimensions, and the planned frame count.
    #[command(
        about = "Inspect a video without converting it",
        after_help = "Examples:\n  gifify probe input.mp4\n  gifify probe input.mp4 --interval coarse --json"
    )]
    Probe {
        /// Input video path.
        input: PathBuf,

        /// Sampling interval used for the frame-count estimate.
        #[arg(long, default_value = "fine")]
        interval: String,

        /// Output as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_interval(value: &str) -> Option<SamplingInterval> {
    match value.to_ascii_lowercase().as_str() {
        "fine" | "0.1" => Some(SamplingInterval::Fine),
        "medium" | "0.2" => Some(SamplingInterval::Medium),
        "coarse" | "0.5" => Some(SamplingInterval::Coarse),
        _ => None,
    }
}

fn parse_quality(value: &str) -> Option<Quality> {
    match value.to_ascii_lowercase().as_str() {
        "best" | "high" => Some(Quality::Best),
        "balanced" | "medium" => Some(Quality::Balanced),
        "fast" | "low" => Some(Quality::Fast),
        _ => None,
    }
}

fn ensure_writable_path(path: &std::path::Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn watch_progress(progress: ProgressHandle, json: bool) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let bar = if json {
            None
        } else {
            let pb = ProgressBar::new(100);
            let style = ProgressStyle::with_template(
                "{spinner:.green} {bar:40.cyan/blue} {pos}% {msg}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar());
            pb.set_style(style.progress_chars("##-"));
            Some(pb)
        };

        let mut last_percent = 0_u8;
        let mut session_seen = false;
        loop {
            let snapshot = progress.snapshot();
            session_seen |= !matches!(snapshot.phase, Phase::Idle);

            if snapshot.percent != last_percent || matches!(snapshot.phase, Phase::Done | Phase::Failed) {
                last_percent = snapshot.percent;
                if json {
                    println!("{}", progress_event(&snapshot));
                } else if let Some(pb) = &bar {
                    pb.set_position(snapshot.percent as u64);
                    pb.set_message(match snapshot.phase {
                        Phase::Sampling => "sampling",
                        Phase::Encoding => "encoding",
                        _ => "",
                    });
                }
            }

            match snapshot.phase {
                Phase::Done => {
                    if let Some(pb) = bar {
                        pb.finish_with_message("done");
                    }
                    break;
                }
                // Idle is terminal only once a session has started; before
                // that it just means convert has not begun yet.
                Phase::Failed | Phase::Idle if session_seen => {
                    if let Some(pb) = bar {
                        pb.abandon();
                    }
                    break;
                }
                _ => {}
            }

            thread::sleep(Duration::from_millis(100));
        }
    })
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Convert {
            input,
            out,
            interval,
            quality,
            workers,
            delay,
            timeout,
            progress,
            json,
            overwrite,
        } => {
            let interval =
                parse_interval(&interval).ok_or(format!("unsupported --interval: {interval}"))?;
            let quality =
                parse_quality(&quality).ok_or(format!("unsupported --quality: {quality}"))?;

            ensure_writable_path(&out, overwrite)?;

            let mut options = ConversionOptions::new()
                .with_sampling_interval(interval)
                .with_quality(quality)
                .with_worker_count(workers)
                .with_frame_delay(Duration::from_millis(delay));
            if let Some(seconds) = timeout {
                options = options.with_render_timeout(Some(Duration::from_secs(seconds)));
            }

            let mut pipeline = PipelineController::new(options);
            pipeline.load(MediaSource::open(&input)?);

            let watcher = (progress || json).then(|| watch_progress(pipeline.progress(), json));

            let result = pipeline.convert().await;
            if let Some(watcher) = watcher {
                watcher.join().ok();
            }

            match result {
                Ok(artifact) => {
                    let bytes = artifact.bytes().len();
                    let frames = artifact.frame_count();
                    artifact.save(&out)?;
                    if json {
                        let event = json!({
                            "event": "done",
                            "output": out.display().to_string(),
                            "frames": frames,
                            "bytes": bytes,
                        });
                        println!("{event}");
                    } else {
                        println!(
                            "{} {}",
                            "saved".green().bold(),
                            format!("{} ({frames} frames, {bytes} bytes)", out.display()).green()
                        );
                    }
                }
                Err(error) => {
                    if json {
                        let event = json!({
                            "event": "failed",
                            "error": error.to_string(),
                        });
                        println!("{event}");
                    }
                    return Err(error.into());
                }
            }
        }
        Commands::Probe {
            input,
            interval,
            json,
        } => {
            let interval =
                parse_interval(&interval).ok_or(format!("unsupported --interval: {interval}"))?;

            let source = MediaSource::open(&input)?;
            let duration = source.duration();
            let (width, height) = source.intrinsic_size();
            let planned = planned_frames(duration, interval.seconds());

            if json {
                let payload = json!({
                    "duration_seconds": duration.as_secs_f64(),
                    "width": width,
                    "height": height,
                    "interval_seconds": interval.seconds(),
                    "planned_frames": planned,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Duration: {:.3}s", duration.as_secs_f64());
                println!("Size: {width}x{height}");
                println!(
                    "Planned frames at {}s interval: {planned}",
                    interval.seconds()
                );
            }
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "gifify", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn planned_frames(duration: Duration, interval: f64) -> u64 {
    (duration.as_secs_f64() / interval).ceil() as u64
}

/// One JSON progress line. The remaining-time estimate only exists during
/// the encoding phase; elsewhere it serializes as `null`.
fn progress_event(snapshot: &ProgressSnapshot) -> serde_json::Value {
    json!({
        "event": "progress",
        "phase": format!("{:?}", snapshot.phase).to_ascii_lowercase(),
        "percent": snapshot.percent,
        "remaining_seconds": (snapshot.phase == Phase::Encoding)
            .then(|| snapshot.smoothed_remaining.as_secs_f64()),
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gifify::{Phase, ProgressSnapshot};

    use super::{parse_interval, parse_quality, planned_frames, progress_event};

    #[test]
    fn parse_interval_aliases() {
        assert!(parse_interval("fine").is_some());
        assert!(parse_interval("0.2").is_some());
        assert!(parse_interval("COARSE").is_some());
        assert!(parse_interval("0.3").is_none());
    }

    #[test]
    fn parse_quality_aliases() {
        assert!(parse_quality("best").is_some());
        assert!(parse_quality("Balanced").is_some());
        assert!(parse_quality("fast").is_some());
        assert!(parse_quality("ultra").is_none());
    }

    #[test]
    fn progress_event_reports_remaining_only_while_encoding() {
        let mut snapshot = ProgressSnapshot {
            phase: Phase::Sampling,
            percent: 20,
            ..ProgressSnapshot::default()
        };
        let event = progress_event(&snapshot);
        assert_eq!(event["phase"], "sampling");
        assert_eq!(event["percent"], 20);
        assert_eq!(event["remaining_seconds"], serde_json::Value::Null);

        snapshot.phase = Phase::Encoding;
        snapshot.percent = 75;
        snapshot.smoothed_remaining = Duration::from_secs(2);
        let event = progress_event(&snapshot);
        assert_eq!(event["phase"], "encoding");
        assert_eq!(event["remaining_seconds"], 2.0);
    }

    #[test]
    fn planned_frames_rounds_up() {
        assert_eq!(planned_frames(Duration::from_secs_f64(2.0), 0.5), 4);
        assert_eq!(planned_frames(Duration::from_secs_f64(1.2), 0.5), 3);
        assert_eq!(planned_frames(Duration::from_secs_f64(0.05), 0.1), 1);
    }
}
