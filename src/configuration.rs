//! Job configuration.
//!
//! [`ExtractionConfig`] is a builder carrying everything one run needs: the
//! input, the output naming and encoding, the frame selection, the audio
//! side-task and the pipeline's tuning knobs. It is consumed by
//! [`Extractor::new`](crate::Extractor::new), which validates it once.
//!
//! # Example
//!
//! ```
//! use frame_extractor::{ExtractionConfig, RasterFormat, SaveMode, SelectionPolicy};
//!
//! let config = ExtractionConfig::new("input.mp4")
//!     .with_output_pattern("shots/frame_%05d")?
//!     .with_selection(SelectionPolicy::Range { start: Some(100), end: Some(200), step: 5 })
//!     .with_save_mode(SaveMode::Raster(RasterFormat::Jpeg))
//!     .with_workers(8);
//! assert!(config.validate().is_ok());
//! # Ok::<(), frame_extractor::ExtractError>(())
//! ```

use std::{
    env,
    fmt::{Debug, Formatter, Result as FmtResult},
    path::PathBuf,
    str::FromStr,
    sync::Arc,
    time::Duration,
};

use image::ImageFormat;

use crate::{
    audio::AudioOptions,
    download::FormatHint,
    error::ExtractError,
    pattern::OutputPattern,
    progress::{DEFAULT_REDRAW_INTERVAL, NoOpProgress, ProgressCallback},
    queue::DEFAULT_QUEUE_CAPACITY,
    selection::SelectionPolicy,
    tool::ExternalTool,
};

/// Number of saver threads used when none is configured.
pub const DEFAULT_WORKERS: usize = 4;

/// Encoded image format for saved frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RasterFormat {
    /// Lossless PNG. The default.
    #[default]
    Png,
    /// Baseline JPEG.
    Jpeg,
    /// Uncompressed BMP.
    Bmp,
}

impl RasterFormat {
    /// Extension appended to names that lack one.
    pub fn extension(self) -> &'static str {
        match self {
            RasterFormat::Png => "png",
            RasterFormat::Jpeg => "jpg",
            RasterFormat::Bmp => "bmp",
        }
    }

    /// Extensions accepted as already present.
    pub fn recognized_extensions(self) -> &'static [&'static str] {
        match self {
            RasterFormat::Png => &["png"],
            RasterFormat::Jpeg => &["jpg", "jpeg"],
            RasterFormat::Bmp => &["bmp"],
        }
    }

    pub(crate) fn image_format(self) -> ImageFormat {
        match self {
            RasterFormat::Png => ImageFormat::Png,
            RasterFormat::Jpeg => ImageFormat::Jpeg,
            RasterFormat::Bmp => ImageFormat::Bmp,
        }
    }
}

impl FromStr for RasterFormat {
    type Err = ExtractError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "png" => Ok(RasterFormat::Png),
            "jpg" | "jpeg" => Ok(RasterFormat::Jpeg),
            "bmp" => Ok(RasterFormat::Bmp),
            other => Err(ExtractError::ConfigurationError(format!(
                "unknown image format {other:?} (expected png, jpg or bmp)"
            ))),
        }
    }
}

/// How a frame is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveMode {
    /// Convert to RGB and encode as an image.
    Raster(RasterFormat),
    /// Dump the native 4:2:0 planes ("fast mode").
    RawPlanar,
}

impl Default for SaveMode {
    fn default() -> Self {
        SaveMode::Raster(RasterFormat::default())
    }
}

impl SaveMode {
    /// Extension appended to names that lack one.
    pub fn extension(self) -> &'static str {
        match self {
            SaveMode::Raster(format) => format.extension(),
            SaveMode::RawPlanar => "yuv",
        }
    }

    /// Extensions accepted as already present.
    pub fn recognized_extensions(self) -> &'static [&'static str] {
        match self {
            SaveMode::Raster(format) => format.recognized_extensions(),
            SaveMode::RawPlanar => &["yuv"],
        }
    }
}

/// Where the media comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    /// A local file (or anything FFmpeg can open directly).
    File(PathBuf),
    /// A page URL resolved by `yt-dlp`.
    Url {
        /// The URL to fetch.
        url: String,
        /// Format selector for the downloader.
        format: FormatHint,
    },
}

/// Whether and how audio is extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioMode {
    /// Frames only.
    #[default]
    Disabled,
    /// Frames, with audio extracted concurrently.
    WithFrames,
    /// Audio only; frame extraction is skipped.
    Only,
}

/// Configuration for one extraction run.
#[derive(Clone)]
pub struct ExtractionConfig {
    pub(crate) input: InputSource,
    pub(crate) output: OutputPattern,
    pub(crate) selection: SelectionPolicy,
    pub(crate) save_mode: SaveMode,
    pub(crate) audio_mode: AudioMode,
    pub(crate) audio: AudioOptions,
    pub(crate) workers: usize,
    pub(crate) queue_capacity: usize,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) progress_interval: Duration,
    pub(crate) keep_download: bool,
    pub(crate) download_dir: PathBuf,
    pub(crate) ffmpeg: ExternalTool,
    pub(crate) downloader: ExternalTool,
}

impl Debug for ExtractionConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ExtractionConfig")
            .field("input", &self.input)
            .field("output", &self.output.as_str())
            .field("selection", &self.selection)
            .field("save_mode", &self.save_mode)
            .field("audio_mode", &self.audio_mode)
            .field("audio", &self.audio)
            .field("workers", &self.workers)
            .field("queue_capacity", &self.queue_capacity)
            .field("has_progress", &true)
            .field("keep_download", &self.keep_download)
            .finish()
    }
}

impl ExtractionConfig {
    /// Configuration for a local file with default settings.
    ///
    /// Defaults: every frame, PNG output named `frame_%d.png`, no audio,
    /// 4 saver threads, queue capacity 32, no progress callback.
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self::with_source(InputSource::File(input.into()))
    }

    /// Configuration for a remote URL fetched with `yt-dlp`.
    pub fn from_url(url: impl Into<String>) -> Self {
        Self::with_source(InputSource::Url {
            url: url.into(),
            format: FormatHint::Auto,
        })
    }

    fn with_source(input: InputSource) -> Self {
        Self {
            input,
            output: OutputPattern::default(),
            selection: SelectionPolicy::all(),
            save_mode: SaveMode::default(),
            audio_mode: AudioMode::Disabled,
            audio: AudioOptions::default(),
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            progress: Arc::new(NoOpProgress),
            progress_interval: DEFAULT_REDRAW_INTERVAL,
            keep_download: false,
            download_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            ffmpeg: ExternalTool::ffmpeg(),
            downloader: ExternalTool::yt_dlp(),
        }
    }

    /// Set the output filename template.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::ConfigurationError`] if the template is
    /// malformed.
    pub fn with_output_pattern(mut self, template: &str) -> Result<Self, ExtractError> {
        self.output = OutputPattern::parse(template)?;
        Ok(self)
    }

    /// Set the downloader format selector. Ignored for local files.
    #[must_use]
    pub fn with_url_format(mut self, hint: FormatHint) -> Self {
        if let InputSource::Url { format, .. } = &mut self.input {
            *format = hint;
        }
        self
    }

    /// Set which frames to extract.
    #[must_use]
    pub fn with_selection(mut self, selection: SelectionPolicy) -> Self {
        self.selection = selection;
        self
    }

    /// Set how frames are persisted.
    #[must_use]
    pub fn with_save_mode(mut self, mode: SaveMode) -> Self {
        self.save_mode = mode;
        self
    }

    /// Enable or disable audio extraction.
    #[must_use]
    pub fn with_audio_mode(mut self, mode: AudioMode) -> Self {
        self.audio_mode = mode;
        self
    }

    /// Set the audio side-task options.
    #[must_use]
    pub fn with_audio(mut self, options: AudioOptions) -> Self {
        self.audio = options;
        self
    }

    /// Set the number of saver threads.
    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Set the frame queue capacity.
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Set the minimum time between progress snapshots.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Keep a downloaded source file after the run instead of deleting it.
    #[must_use]
    pub fn with_keep_download(mut self, keep: bool) -> Self {
        self.keep_download = keep;
        self
    }

    /// Directory remote sources are downloaded into.
    #[must_use]
    pub fn with_download_dir(mut self, directory: impl Into<PathBuf>) -> Self {
        self.download_dir = directory.into();
        self
    }

    /// Use a specific `ffmpeg` executable for audio extraction.
    #[must_use]
    pub fn with_ffmpeg_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.ffmpeg = self.ffmpeg.with_program(program);
        self
    }

    /// Use a specific `yt-dlp` executable for downloads.
    #[must_use]
    pub fn with_downloader_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.downloader = self.downloader.with_program(program);
        self
    }

    /// The configured input.
    pub fn input(&self) -> &InputSource {
        &self.input
    }

    /// The configured output pattern.
    pub fn output_pattern(&self) -> &OutputPattern {
        &self.output
    }

    /// The configured selection.
    pub fn selection(&self) -> &SelectionPolicy {
        &self.selection
    }

    /// The configured save mode.
    pub fn save_mode(&self) -> SaveMode {
        self.save_mode
    }

    /// The configured audio mode.
    pub fn audio_mode(&self) -> AudioMode {
        self.audio_mode
    }

    /// Check the settings that do not depend on the media.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::ConfigurationError`] (or the selection's own
    /// error) describing the first problem found.
    pub fn validate(&self) -> Result<(), ExtractError> {
        if self.workers == 0 {
            return Err(ExtractError::ConfigurationError(
                "at least one saver thread is required".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ExtractError::ConfigurationError(
                "queue capacity must be at least 1".to_string(),
            ));
        }
        match &self.input {
            InputSource::File(path) if path.as_os_str().is_empty() => {
                return Err(ExtractError::ConfigurationError(
                    "no input file given".to_string(),
                ));
            }
            InputSource::Url { url, .. } if url.trim().is_empty() => {
                return Err(ExtractError::ConfigurationError("no URL given".to_string()));
            }
            _ => {}
        }
        if self.audio.output.as_os_str().is_empty() {
            return Err(ExtractError::ConfigurationError(
                "audio output path is empty".to_string(),
            ));
        }
        if self.audio_mode != AudioMode::Only {
            self.selection.validate()?;
        }
        Ok(())
    }

    /// Whether the selection targets specific frames rather than the whole
    /// video.
    pub(crate) fn has_explicit_selection(&self) -> bool {
        self.selection != SelectionPolicy::all()
    }
}
