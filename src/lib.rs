//! # frame_extractor
//!
//! Extract still frames and audio from video files.
//!
//! A run decodes the video on the calling thread and hands selected frames
//! through a bounded queue to a fixed pool of saver threads, which write
//! each frame as a PNG, JPEG or BMP image, or as raw 4:2:0 planes. Audio is
//! transcoded concurrently by the external `ffmpeg` executable, and remote
//! sources are fetched first with `yt-dlp`. Decoding and pixel conversion
//! use the FFmpeg libraries via
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next).
//!
//! ## Quick Start
//!
//! ```no_run
//! use frame_extractor::{ExtractionConfig, Extractor, SelectionPolicy};
//!
//! let config = ExtractionConfig::new("input.mp4")
//!     .with_output_pattern("frames/frame_%05d.png")?
//!     .with_selection(SelectionPolicy::Range { start: Some(100), end: Some(200), step: 5 });
//!
//! let report = Extractor::new(config)?.run()?;
//! println!("{} saved, {} failed", report.saved.saved, report.saved.failed);
//! # Ok::<(), frame_extractor::ExtractError>(())
//! ```
//!
//! ## Selecting frames
//!
//! - [`SelectionPolicy::Frames`]: explicit frame numbers
//! - [`SelectionPolicy::Range`]: inclusive range with a step
//! - [`SelectionPolicy::TimePoint`]: the frame on screen at a timestamp
//! - [`SelectionPolicy::TimeRange`]: frames between two timestamps
//!
//! Frame numbers count decoded frames from zero. A selection is resolved
//! against the video's frame count into an [`ExtractionPlan`]; frames past
//! the end are dropped with a warning, and an empty plan is an error.
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://crates.io/crates/log) facade.
//! FFmpeg's own console output is controlled separately with
//! [`set_ffmpeg_log_level`].

pub mod audio;
pub mod configuration;
pub mod convert;
pub mod decoder;
pub mod download;
pub mod error;
pub mod ffmpeg;
pub mod frame;
pub mod media;
pub mod metadata;
pub mod pattern;
pub mod pipeline;
pub mod progress;
pub mod queue;
pub mod saver;
pub mod selection;
pub mod timecode;
pub mod tool;

pub use audio::{AudioCodec, AudioOptions, AudioWindow};
pub use configuration::{AudioMode, ExtractionConfig, InputSource, RasterFormat, SaveMode};
pub use convert::RgbConverter;
pub use decoder::{FrameNumbering, FrameSource, StreamDecoder};
pub use download::{DownloadedFile, Downloader, FormatHint};
pub use error::ExtractError;
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use frame::QueuedFrame;
pub use media::MediaSource;
pub use metadata::{FrameCountSource, MediaMetadata, VideoMetadata};
pub use pattern::OutputPattern;
pub use pipeline::{AudioOutcome, DriveStats, ExtractionReport, Extractor, drive};
pub use progress::{
    NoOpProgress, OperationType, ProgressCallback, ProgressInfo, ProgressSummary, ProgressTracker,
};
pub use queue::{FrameQueue, QueueClosed};
pub use saver::{FrameSaver, SaveSettings, SaveSummary, SaverPool};
pub use selection::{ExtractionPlan, SelectionPolicy};
pub use tool::{ExternalTool, ProgressEvent};
