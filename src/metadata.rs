//! Media metadata types.
//!
//! Metadata is read once when a [`MediaSource`](crate::MediaSource) is
//! opened. The frame count used for planning comes from
//! [`resolve_frame_count`].

use std::time::Duration;

use crate::error::ExtractError;

/// How [`VideoMetadata::frame_count`] was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameCountSource {
    /// The container declared it.
    Declared,
    /// Computed from duration and frame rate, rounded up.
    Estimated,
}

/// Metadata for the selected video stream.
#[derive(Debug, Clone)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Average frames per second.
    pub frames_per_second: f64,
    /// Total number of frames.
    pub frame_count: u64,
    /// Whether `frame_count` was declared or estimated.
    pub frame_count_source: FrameCountSource,
    /// Codec name (e.g. `"h264"`).
    pub codec: String,
    /// Decoder pixel format (e.g. `"YUV420P"`).
    pub pixel_format: String,
}

/// Metadata for an opened media source.
#[derive(Debug, Clone)]
#[must_use]
pub struct MediaMetadata {
    /// The video stream.
    pub video: VideoMetadata,
    /// Total duration, if known.
    pub duration: Option<Duration>,
    /// Container format name (e.g. `"mov,mp4,m4a,3gp,3g2,mj2"`).
    pub format: String,
    /// Whether the container also carries an audio stream.
    pub has_audio: bool,
}

/// Determine the total frame count.
///
/// A positive declared count wins. Otherwise the duration is multiplied by
/// the frame rate and rounded up.
///
/// # Errors
///
/// Returns [`ExtractError::UnknownDuration`] when there is no declared
/// count and no usable duration or frame rate.
///
/// # Example
///
/// ```
/// use frame_extractor::metadata::{FrameCountSource, resolve_frame_count};
///
/// assert_eq!(resolve_frame_count(Some(300), None, 30.0)?, (300, FrameCountSource::Declared));
/// assert_eq!(resolve_frame_count(None, Some(10.01), 30.0)?, (301, FrameCountSource::Estimated));
/// assert!(resolve_frame_count(None, None, 30.0).is_err());
/// # Ok::<(), frame_extractor::ExtractError>(())
/// ```
pub fn resolve_frame_count(
    declared: Option<u64>,
    duration_seconds: Option<f64>,
    frames_per_second: f64,
) -> Result<(u64, FrameCountSource), ExtractError> {
    if let Some(count) = declared.filter(|&count| count > 0) {
        return Ok((count, FrameCountSource::Declared));
    }

    let duration = duration_seconds
        .filter(|seconds| seconds.is_finite() && *seconds > 0.0)
        .ok_or(ExtractError::UnknownDuration)?;
    if !frames_per_second.is_finite() || frames_per_second <= 0.0 {
        return Err(ExtractError::UnknownDuration);
    }

    // Tolerance keeps exact products such as 10.0 * 30.0 from rounding up.
    let estimate = (duration * frames_per_second - 1e-6).ceil();
    if estimate < 1.0 {
        return Err(ExtractError::UnknownDuration);
    }
    Ok((estimate as u64, FrameCountSource::Estimated))
}
