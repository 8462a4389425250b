//! Error types for the `frame_extractor` crate.
//!
//! [`ExtractError`] is the single error type returned by every fallible
//! operation. Fatal conditions (unopenable input, missing video stream,
//! unknown duration, decoder failure, bad configuration) surface here and
//! stop the run. Per-frame save failures are logged and counted by the saver
//! pool instead of being propagated.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

/// The unified error type for all extraction operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExtractError {
    /// The media source could not be opened.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path or locator that was passed to [`crate::MediaSource::open`].
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The source does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// Neither a declared frame count nor a usable duration is available.
    #[error("Cannot determine video duration (no frame count in header)")]
    UnknownDuration,

    /// The video decoder could not be opened.
    #[error("Failed to open video decoder: {0}")]
    DecoderOpen(String),

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The job configuration is invalid.
    #[error("Invalid configuration: {0}")]
    ConfigurationError(String),

    /// A time value could not be parsed.
    #[error("Invalid time value: {0:?}")]
    InvalidTimecode(String),

    /// A range's start value is greater than its end value.
    #[error("Invalid range: start ({start}) must not exceed end ({end})")]
    InvalidRange {
        /// The start of the range.
        start: String,
        /// The end of the range.
        end: String,
    },

    /// A step value of zero was provided.
    #[error("Step must be greater than zero")]
    InvalidInterval,

    /// The selection policy produced no frames inside the video.
    #[error("No frames to extract (video has {total_frames} frames)")]
    NoFramesSelected {
        /// The total number of frames in the video.
        total_frames: u64,
    },

    /// Raw planar output was requested for a frame that is not 4:2:0.
    #[error("Unsupported pixel layout for raw planar output: {0}")]
    UnsupportedPixelLayout(String),

    /// An external program could not be found or did not respond.
    #[error("{tool} not found: {hint}")]
    ToolUnavailable {
        /// Program name (e.g. `ffmpeg`, `yt-dlp`).
        tool: String,
        /// Installation hint shown to the user.
        hint: String,
    },

    /// An external program exited unsuccessfully.
    #[error("{tool} failed: {reason}")]
    ExternalProcess {
        /// Program name.
        tool: String,
        /// Exit status or other failure description.
        reason: String,
    },

    /// The downloader finished but no output file could be located.
    #[error("Download produced no file for {0}")]
    DownloadMissing(String),

    /// A worker thread panicked.
    #[error("Worker thread panicked: {0}")]
    WorkerPanicked(String),

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate during encoding.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),
}

impl From<FfmpegError> for ExtractError {
    fn from(error: FfmpegError) -> Self {
        ExtractError::FfmpegError(error.to_string())
    }
}
