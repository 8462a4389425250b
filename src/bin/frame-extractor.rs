use std::{path::PathBuf, sync::Arc};

use clap::{ArgGroup, CommandFactory, Parser};
use clap_complete::Shell;
use colored::Colorize;
use frame_extractor::{
    AudioCodec, AudioMode, AudioOptions, AudioOutcome, ExtractionConfig, ExtractionReport,
    Extractor, FfmpegLogLevel, FormatHint, OperationType, ProgressCallback, ProgressInfo,
    RasterFormat, SaveMode, SelectionPolicy,
    progress::{format_eta, format_rate},
    selection::parse_frame_list,
    timecode::parse_timecode,
};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;

const CLI_AFTER_HELP: &str = "Examples:\n  frame-extractor video.mp4 --range 100 200 --step 5 --output frame_%03d.png\n  frame-extractor video.mp4 --time 00:01:30 --output still.png\n  frame-extractor video.mp4 --time-range 0:10 0:20 --extract-audio --audio-format ogg\n  frame-extractor --url https://example.com/watch?v=id --audio-only --output-audio talk\n  frame-extractor --completions zsh > _frame-extractor";

#[derive(Debug, Parser)]
#[command(
    name = "frame-extractor",
    version,
    about = "Extract still frames and audio from video files",
    after_help = CLI_AFTER_HELP
)]
#[command(group(
    ArgGroup::new("selection")
        .args(["frame", "frames", "range", "time", "time_range"])
        .multiple(false)
))]
#[command(group(ArgGroup::new("source").args(["input", "input_flag", "url"]).multiple(false)))]
struct Cli {
    /// Input video file.
    input: Option<PathBuf>,

    /// Input video file (alternative to the positional argument).
    #[arg(long = "input", value_name = "FILE")]
    input_flag: Option<PathBuf>,

    /// Fetch the input from a URL with yt-dlp.
    #[arg(long)]
    url: Option<String>,

    /// yt-dlp format selector (default: chosen from the job).
    #[arg(long, value_name = "FORMAT")]
    url_format: Option<String>,

    /// Keep the downloaded file after extraction.
    #[arg(long)]
    keep_download: bool,

    /// Output filename pattern with one integer placeholder.
    #[arg(short, long, default_value = "frame_%d.png")]
    output: String,

    /// Extract a single frame.
    #[arg(long, value_name = "N")]
    frame: Option<u64>,

    /// Extract specific frames (comma-separated).
    #[arg(long, value_name = "N1,N2,...")]
    frames: Option<String>,

    /// Extract an inclusive range of frames.
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    range: Option<Vec<u64>>,

    /// Step for range extraction.
    #[arg(long, default_value_t = 1)]
    step: u64,

    /// Extract the frame at a time (H:M:S[.f], M:S[.f] or seconds).
    #[arg(long, value_name = "TIME")]
    time: Option<String>,

    /// Extract frames between two times.
    #[arg(long, num_args = 2, value_names = ["START", "END"])]
    time_range: Option<Vec<String>>,

    /// Write raw YUV 4:2:0 planes instead of encoded images.
    #[arg(long)]
    fast: bool,

    /// Image format (png, jpg, bmp).
    #[arg(long, default_value = "png")]
    format: String,

    /// Also extract audio while frames are saved.
    #[arg(long, conflicts_with = "audio_only")]
    extract_audio: bool,

    /// Extract audio only.
    #[arg(long)]
    audio_only: bool,

    /// Audio output path (extension added if missing).
    #[arg(long, default_value = "audio")]
    output_audio: PathBuf,

    /// Audio format (mp3, aac, wav, ogg).
    #[arg(long, default_value = "mp3")]
    audio_format: String,

    /// Audio bitrate in kbps (32-320).
    #[arg(long, default_value_t = 128)]
    audio_bitrate: u32,

    /// Number of saver threads.
    #[arg(long, default_value_t = 4)]
    threads: usize,

    /// Frames buffered between the decoder and the savers.
    #[arg(long, default_value_t = 32)]
    queue_capacity: usize,

    /// Show informational log output.
    #[arg(long)]
    verbose: bool,

    /// FFmpeg log level (quiet, fatal, error, warning, info, verbose, debug).
    #[arg(long, default_value = "quiet")]
    log_level: String,

    /// Print the run report as JSON.
    #[arg(long)]
    json: bool,

    /// Print shell completions and exit.
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn parse_raster_format(value: &str) -> Option<RasterFormat> {
    value.parse().ok()
}

fn parse_audio_codec(value: &str) -> Option<AudioCodec> {
    value.parse().ok()
}

fn parse_log_level(value: &str) -> Option<FfmpegLogLevel> {
    value.parse().ok()
}

fn build_selection(cli: &Cli) -> Result<SelectionPolicy, Box<dyn std::error::Error>> {
    if let Some(frame) = cli.frame {
        return Ok(SelectionPolicy::single(frame));
    }
    if let Some(frames) = &cli.frames {
        return Ok(SelectionPolicy::Frames(parse_frame_list(frames)?));
    }
    if let Some(range) = &cli.range {
        let [start, end] = range.as_slice() else {
            return Err("--range takes START and END".into());
        };
        return Ok(SelectionPolicy::Range {
            start: Some(*start),
            end: Some(*end),
            step: cli.step,
        });
    }
    if let Some(time) = &cli.time {
        return Ok(SelectionPolicy::TimePoint(parse_timecode(time)?));
    }
    if let Some(range) = &cli.time_range {
        let [start, end] = range.as_slice() else {
            return Err("--time-range takes START and END".into());
        };
        return Ok(SelectionPolicy::TimeRange {
            start: parse_timecode(start)?,
            end: parse_timecode(end)?,
            step: cli.step,
        });
    }
    Ok(SelectionPolicy::Range {
        start: None,
        end: None,
        step: cli.step,
    })
}

fn build_config(
    cli: &Cli,
    progress: Arc<dyn ProgressCallback>,
) -> Result<ExtractionConfig, Box<dyn std::error::Error>> {
    let config = match (&cli.input, &cli.input_flag, &cli.url) {
        (Some(path), _, _) | (None, Some(path), _) => ExtractionConfig::new(path),
        (None, None, Some(url)) => {
            let hint = cli
                .url_format
                .clone()
                .map_or(FormatHint::Auto, FormatHint::Custom);
            ExtractionConfig::from_url(url).with_url_format(hint)
        }
        (None, None, None) => return Err("no input given (pass a file or --url)".into()),
    };

    let save_mode = if cli.fast {
        SaveMode::RawPlanar
    } else {
        SaveMode::Raster(
            parse_raster_format(&cli.format)
                .ok_or(format!("unsupported --format: {}", cli.format))?,
        )
    };

    let audio_mode = if cli.audio_only {
        AudioMode::Only
    } else if cli.extract_audio {
        AudioMode::WithFrames
    } else {
        AudioMode::Disabled
    };

    let codec = parse_audio_codec(&cli.audio_format)
        .ok_or(format!("unsupported --audio-format: {}", cli.audio_format))?;
    let audio = AudioOptions::new()
        .with_codec(codec)
        .with_bitrate(cli.audio_bitrate)
        .with_output(&cli.output_audio);

    Ok(config
        .with_output_pattern(&cli.output)?
        .with_selection(build_selection(cli)?)
        .with_save_mode(save_mode)
        .with_audio_mode(audio_mode)
        .with_audio(audio)
        .with_workers(cli.threads)
        .with_queue_capacity(cli.queue_capacity)
        .with_keep_download(cli.keep_download)
        .with_progress(progress))
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .try_init()
        .ok();
}

struct TerminalProgress {
    bar: ProgressBar,
}

impl TerminalProgress {
    fn new(hidden: bool) -> Result<Self, Box<dyn std::error::Error>> {
        let bar = if hidden {
            ProgressBar::hidden()
        } else {
            ProgressBar::new(0)
        };
        let style = ProgressStyle::with_template("{bar:50.cyan/blue} {percent:>3}% {msg}")?;
        bar.set_style(style.progress_chars("#>-"));
        Ok(Self { bar })
    }
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.operation == OperationType::Download {
            self.bar.set_length(100);
            self.bar
                .set_position(info.percentage.unwrap_or(0.0).round() as u64);
            self.bar
                .set_message(if info.finished { "downloaded" } else { "downloading" });
            return;
        }

        let Some(total) = info.total else {
            let reached = info
                .current_timestamp
                .map(|time| format!(" at {:.1}s", time.as_secs_f64()))
                .unwrap_or_default();
            self.bar
                .set_message(format!("audio: {} packets{reached}", info.audio_units));
            if info.finished {
                self.bar.finish();
            }
            return;
        };

        self.bar.set_length(total);
        self.bar.set_position(info.current);
        let eta = info
            .estimated_remaining
            .map(|remaining| format!(" | ETA {}", format_eta(remaining)))
            .unwrap_or_default();
        self.bar.set_message(format!(
            "{}/{} | {}{eta}",
            info.current,
            total,
            format_rate(info.frames_per_second)
        ));
        if info.finished {
            self.bar.finish();
        }
    }
}

fn print_report(report: &ExtractionReport) {
    if let Some(metadata) = &report.metadata {
        let video = &metadata.video;
        println!(
            "{} {} ({}x{}, {:.2} fps, {} frames)",
            "input:".bold(),
            report.input.display(),
            video.width,
            video.height,
            video.frames_per_second,
            video.frame_count
        );
        if report.saved.failed == 0 {
            println!(
                "{} {}",
                "success:".green().bold(),
                format!("Extracted {} frame(s)", report.saved.saved).green()
            );
        } else {
            println!(
                "{} {}",
                "warning:".yellow().bold(),
                format!(
                    "Extracted {} of {} frame(s); {} failed",
                    report.saved.saved, report.saved.attempted, report.saved.failed
                )
                .yellow()
            );
        }
    }

    match &report.audio {
        Some(AudioOutcome::Written(path)) => {
            println!("{} {}", "saved".green().bold(), path.display());
        }
        Some(AudioOutcome::Failed(reason)) => {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("audio extraction failed: {reason}").yellow()
            );
        }
        None => {}
    }

    if let Some(path) = &report.kept_download {
        println!("{} {}", "kept".cyan().bold(), path.display());
    }
    println!("{}", report.progress);
}

fn report_json(report: &ExtractionReport) -> serde_json::Value {
    json!({
        "input": report.input.display().to_string(),
        "video": report.metadata.as_ref().map(|metadata| json!({
            "width": metadata.video.width,
            "height": metadata.video.height,
            "frames_per_second": metadata.video.frames_per_second,
            "frame_count": metadata.video.frame_count,
            "codec": metadata.video.codec,
            "pixel_format": metadata.video.pixel_format,
        })),
        "planned": report.planned,
        "decoded": report.drive.decoded,
        "queued": report.drive.pushed,
        "attempted": report.saved.attempted,
        "saved": report.saved.saved,
        "failed": report.saved.failed,
        "audio": report.audio.as_ref().map(|outcome| match outcome {
            AudioOutcome::Written(path) => json!({ "path": path.display().to_string() }),
            AudioOutcome::Failed(reason) => json!({ "error": reason }),
        }),
        "audio_units": report.progress.audio_units,
        "elapsed_seconds": report.progress.elapsed.as_secs_f64(),
        "kept_download": report.kept_download.as_ref().map(|path| path.display().to_string()),
    })
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut command = Cli::command();
        clap_complete::generate(shell, &mut command, "frame-extractor", &mut std::io::stdout());
        return Ok(());
    }

    init_logging(cli.verbose);
    let level = parse_log_level(&cli.log_level)
        .ok_or(format!("unsupported --log-level: {}", cli.log_level))?;
    frame_extractor::set_ffmpeg_log_level(level);

    let progress = Arc::new(TerminalProgress::new(cli.json)?);
    let config = build_config(&cli, progress.clone())?;
    let report = Extractor::new(config)?.run()?;
    progress.bar.finish_and_clear();

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report_json(&report))?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use clap::Parser;
    use frame_extractor::{AudioCodec, RasterFormat, SelectionPolicy};

    use super::{Cli, build_selection, parse_audio_codec, parse_log_level, parse_raster_format};

    fn selection_for(args: &[&str]) -> SelectionPolicy {
        let cli = Cli::try_parse_from(args).unwrap();
        build_selection(&cli).unwrap()
    }

    #[test]
    fn parse_format_aliases() {
        assert_eq!(parse_raster_format("PNG"), Some(RasterFormat::Png));
        assert_eq!(parse_raster_format("jpeg"), Some(RasterFormat::Jpeg));
        assert_eq!(parse_raster_format("bmp"), Some(RasterFormat::Bmp));
        assert!(parse_raster_format("tiff").is_none());

        assert_eq!(parse_audio_codec("m4a"), Some(AudioCodec::Aac));
        assert!(parse_audio_codec("flac").is_none());
        assert!(parse_log_level("warning").is_some());
        assert!(parse_log_level("loud").is_none());
    }

    #[test]
    fn range_with_step() {
        let policy = selection_for(&[
            "frame-extractor", "in.mp4", "--range", "100", "200", "--step", "5",
        ]);
        assert_eq!(
            policy,
            SelectionPolicy::Range { start: Some(100), end: Some(200), step: 5 }
        );
    }

    #[test]
    fn time_range_and_point() {
        let policy = selection_for(&["frame-extractor", "in.mp4", "--time-range", "0:10", "0:20"]);
        assert_eq!(
            policy,
            SelectionPolicy::TimeRange {
                start: Duration::from_secs(10),
                end: Duration::from_secs(20),
                step: 1,
            }
        );

        let policy = selection_for(&["frame-extractor", "--input", "in.mp4", "--time", "00:01:30.500"]);
        assert_eq!(policy, SelectionPolicy::TimePoint(Duration::from_millis(90_500)));
    }

    #[test]
    fn default_selects_every_frame() {
        assert_eq!(selection_for(&["frame-extractor", "in.mp4"]), SelectionPolicy::all());
    }

    #[test]
    fn selections_are_mutually_exclusive() {
        let result = Cli::try_parse_from([
            "frame-extractor", "in.mp4", "--frame", "3", "--frames", "1,2",
        ]);
        assert!(result.is_err());

        let result = Cli::try_parse_from(["frame-extractor", "in.mp4", "--url", "https://x"]);
        assert!(result.is_err());
    }
}
