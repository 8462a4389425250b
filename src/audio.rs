//! Audio side-task.
//!
//! Audio is extracted by a single run of the external `ffmpeg` executable,
//! independent of the frame pipeline. [`AudioOptions`] describes the job,
//! [`AudioOptions::command_args`] turns it into an argument vector, and
//! [`extract_audio`] runs it while feeding `-progress pipe:1` blocks into the
//! shared [`ProgressTracker`].

use std::{
    ffi::OsString,
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    error::ExtractError,
    pattern::has_extension,
    progress::ProgressTracker,
    timecode::parse_timecode,
    tool::{ExternalTool, ProgressEvent},
};

/// Lowest accepted bitrate in kbps.
pub const MIN_AUDIO_BITRATE: u32 = 32;
/// Highest accepted bitrate in kbps.
pub const MAX_AUDIO_BITRATE: u32 = 320;
/// Bitrate used when none is given.
pub const DEFAULT_AUDIO_BITRATE: u32 = 128;

/// Output audio codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioCodec {
    /// MPEG-1 Layer III via `libmp3lame`. The default.
    #[default]
    Mp3,
    /// AAC in an `.m4a` container.
    Aac,
    /// Uncompressed 16-bit PCM WAV. Bitrate is ignored.
    Wav,
    /// Vorbis in an Ogg container.
    Ogg,
}

impl AudioCodec {
    /// Encoder name passed to `-acodec`.
    pub fn encoder(self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "libmp3lame",
            AudioCodec::Aac => "aac",
            AudioCodec::Wav => "pcm_s16le",
            AudioCodec::Ogg => "libvorbis",
        }
    }

    /// File extension for the codec's container.
    pub fn extension(self) -> &'static str {
        match self {
            AudioCodec::Mp3 => "mp3",
            AudioCodec::Aac => "m4a",
            AudioCodec::Wav => "wav",
            AudioCodec::Ogg => "ogg",
        }
    }

    /// Whether `-b:a` applies to this codec.
    pub fn uses_bitrate(self) -> bool {
        !matches!(self, AudioCodec::Wav)
    }
}

impl FromStr for AudioCodec {
    type Err = ExtractError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "mp3" => Ok(AudioCodec::Mp3),
            "aac" | "m4a" => Ok(AudioCodec::Aac),
            "wav" => Ok(AudioCodec::Wav),
            "ogg" | "vorbis" => Ok(AudioCodec::Ogg),
            other => Err(ExtractError::ConfigurationError(format!(
                "unknown audio format {other:?} (expected mp3, aac, wav or ogg)"
            ))),
        }
    }
}

impl Display for AudioCodec {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            AudioCodec::Mp3 => "mp3",
            AudioCodec::Aac => "aac",
            AudioCodec::Wav => "wav",
            AudioCodec::Ogg => "ogg",
        })
    }
}

/// Clamp a bitrate into `[MIN_AUDIO_BITRATE, MAX_AUDIO_BITRATE]`.
pub fn clamp_bitrate(kbps: u32) -> u32 {
    kbps.clamp(MIN_AUDIO_BITRATE, MAX_AUDIO_BITRATE)
}

/// A time window of the source to transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioWindow {
    start: Duration,
    end: Duration,
}

impl AudioWindow {
    /// Create a window.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::ConfigurationError`] if `end <= start`.
    pub fn new(start: Duration, end: Duration) -> Result<Self, ExtractError> {
        if end <= start {
            return Err(ExtractError::ConfigurationError(format!(
                "audio window end ({:.3}s) must be after start ({:.3}s)",
                end.as_secs_f64(),
                start.as_secs_f64()
            )));
        }
        Ok(Self { start, end })
    }

    /// Start of the window.
    pub fn start(&self) -> Duration {
        self.start
    }

    /// End of the window.
    pub fn end(&self) -> Duration {
        self.end
    }

    /// Length of the window.
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Settings for the audio side-task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioOptions {
    /// Output codec.
    pub codec: AudioCodec,
    /// Bitrate in kbps; clamped when set through the builder.
    pub bitrate_kbps: u32,
    /// Output path. The codec's extension is appended if missing.
    pub output: PathBuf,
    /// Optional time window.
    pub window: Option<AudioWindow>,
}

impl Default for AudioOptions {
    fn default() -> Self {
        Self {
            codec: AudioCodec::default(),
            bitrate_kbps: DEFAULT_AUDIO_BITRATE,
            output: PathBuf::from("audio"),
            window: None,
        }
    }
}

impl AudioOptions {
    /// Default options: mp3 at 128 kbps into `audio.mp3`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the codec.
    #[must_use]
    pub fn with_codec(mut self, codec: AudioCodec) -> Self {
        self.codec = codec;
        self
    }

    /// Set the bitrate, clamped to the accepted range.
    #[must_use]
    pub fn with_bitrate(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = clamp_bitrate(kbps);
        self
    }

    /// Set the output path.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = output.into();
        self
    }

    /// Restrict extraction to a time window.
    #[must_use]
    pub fn with_window(mut self, window: AudioWindow) -> Self {
        self.window = Some(window);
        self
    }

    /// The output path with the codec's extension appended if it is missing.
    pub fn output_path(&self) -> PathBuf {
        let extension = self.codec.extension();
        if has_extension(&self.output, &[extension]) {
            return self.output.clone();
        }
        let mut path = self.output.clone().into_os_string();
        path.push(".");
        path.push(extension);
        PathBuf::from(path)
    }

    /// Build the `ffmpeg` argument vector for `input`.
    ///
    /// # Example
    ///
    /// ```
    /// use std::path::Path;
    ///
    /// use frame_extractor::{AudioCodec, AudioOptions};
    ///
    /// let args = AudioOptions::new()
    ///     .with_codec(AudioCodec::Wav)
    ///     .command_args(Path::new("talk.mp4"));
    /// assert!(args.iter().any(|a| a == "pcm_s16le"));
    /// assert!(!args.iter().any(|a| a == "-b:a"));
    /// assert_eq!(args.last().map(|a| a.to_str()), Some(Some("audio.wav")));
    /// ```
    pub fn command_args(&self, input: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
            .into_iter()
            .map(OsString::from)
            .collect();
        args.push(input.as_os_str().to_os_string());

        if let Some(window) = self.window {
            args.push("-ss".into());
            args.push(format!("{:.3}", window.start().as_secs_f64()).into());
            args.push("-t".into());
            args.push(format!("{:.3}", window.duration().as_secs_f64()).into());
        }

        args.push("-vn".into());
        if self.codec.uses_bitrate() {
            args.push("-b:a".into());
            args.push(format!("{}k", clamp_bitrate(self.bitrate_kbps)).into());
        }
        args.push("-acodec".into());
        args.push(self.codec.encoder().into());
        args.push("-progress".into());
        args.push("pipe:1".into());
        args.push("-nostats".into());
        args.push(self.output_path().into_os_string());
        args
    }
}

/// Parse one line of `ffmpeg -progress` output.
///
/// Only the fields needed for reporting are recognised; everything else
/// yields `None`.
pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let (key, value) = line.trim().split_once('=')?;
    let value = value.trim();
    match key.trim() {
        "out_time_us" => value
            .parse::<u64>()
            .ok()
            .map(|micros| ProgressEvent::Elapsed(Duration::from_micros(micros))),
        // `out_time_us` usually precedes this, but some builds only emit it.
        "out_time" => parse_timecode(value).ok().map(ProgressEvent::Elapsed),
        "progress" if value == "end" => Some(ProgressEvent::Finished),
        "progress" => Some(ProgressEvent::Checkpoint),
        _ => None,
    }
}

/// Run the audio side-task to completion.
///
/// Each progress block reported by the encoder counts as one audio unit on
/// `tracker`. Returns the path that was written.
///
/// # Errors
///
/// Returns [`ExtractError::ExternalProcess`] if `ffmpeg` fails.
pub fn extract_audio(
    tool: &ExternalTool,
    input: &Path,
    options: &AudioOptions,
    tracker: &ProgressTracker,
) -> Result<PathBuf, ExtractError> {
    let output = options.output_path();
    log::info!(
        "Extracting {} audio at {} kbps to {}",
        options.codec,
        options.bitrate_kbps,
        output.display()
    );

    let mut reached = None;
    tool.run(options.command_args(input), |line| {
        match parse_progress_line(line) {
            Some(ProgressEvent::Elapsed(time)) => reached = Some(time),
            Some(ProgressEvent::Checkpoint | ProgressEvent::Finished) => {
                tracker.record_audio(reached);
            }
            _ => {}
        }
    })?;

    log::info!("Audio written to {}", output.display());
    Ok(output)
}

/// Run [`extract_audio`] on a dedicated thread.
///
/// # Errors
///
/// Returns [`ExtractError::IoError`] if the thread cannot be spawned.
pub fn spawn_audio(
    tool: ExternalTool,
    input: PathBuf,
    options: AudioOptions,
    tracker: Arc<ProgressTracker>,
) -> Result<JoinHandle<Result<PathBuf, ExtractError>>, ExtractError> {
    let handle = thread::Builder::new()
        .name("audio-extract".to_string())
        .spawn(move || extract_audio(&tool, &input, &options, &tracker))?;
    Ok(handle)
}
