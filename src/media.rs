//! Opening media sources.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use ffmpeg_next::{
    Rational,
    codec::context::Context as CodecContext,
    format::context::Input,
    media::Type,
};

use crate::{
    error::ExtractError,
    metadata::{MediaMetadata, VideoMetadata, resolve_frame_count},
    timecode::pts_to_seconds,
};

/// An opened media file with its best video stream located.
///
/// Owns the demuxer context. Frames are pulled through a
/// [`StreamDecoder`](crate::StreamDecoder), which borrows the source
/// mutably for its lifetime.
pub struct MediaSource {
    path: PathBuf,
    pub(crate) input_context: Input,
    pub(crate) video_stream_index: usize,
    pub(crate) time_base: Rational,
    pub(crate) start_time: i64,
    metadata: MediaMetadata,
}

impl MediaSource {
    /// Open a media file and read its video metadata.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::FileOpen`] if the file cannot be opened or probed.
    /// - [`ExtractError::NoVideoStream`] if there is no video stream.
    /// - [`ExtractError::DecoderOpen`] if the video codec cannot be opened.
    /// - [`ExtractError::UnknownDuration`] if neither a frame count nor a
    ///   duration is available.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ExtractError> {
        let path = path.as_ref();
        let owned_path = path.to_path_buf();

        log::debug!("Opening media file: {}", owned_path.display());

        ffmpeg_next::init().map_err(|error| ExtractError::FileOpen {
            path: owned_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| ExtractError::FileOpen {
                path: owned_path.clone(),
                reason: error.to_string(),
            })?;

        let format = input_context.format().name().to_string();
        let has_audio = input_context.streams().best(Type::Audio).is_some();
        let container_duration = input_context.duration();

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or(ExtractError::NoVideoStream)?;
        let video_stream_index = stream.index();
        let time_base = stream.time_base();

        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| {
                ExtractError::DecoderOpen(format!(
                    "video stream {video_stream_index}: {error}"
                ))
            })?;

        let frames_per_second = rational_to_f64(stream.avg_frame_rate())
            .or_else(|| rational_to_f64(stream.rate()))
            .unwrap_or(0.0);

        // AV_NOPTS_VALUE is i64::MIN; anything negative means "unknown" here.
        let start_time = stream.start_time().max(0);

        let duration_seconds = if container_duration > 0 {
            // Container duration is in AV_TIME_BASE units (microseconds).
            Some(container_duration as f64 / 1_000_000.0)
        } else if stream.duration() > 0 {
            Some(pts_to_seconds(stream.duration(), time_base))
        } else {
            None
        };

        let declared = u64::try_from(stream.frames()).ok();
        let (frame_count, frame_count_source) =
            resolve_frame_count(declared, duration_seconds, frames_per_second)?;

        let codec = decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let video = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            frames_per_second,
            frame_count,
            frame_count_source,
            codec,
            pixel_format: format!("{:?}", decoder.format()),
        };

        log::info!(
            "Opened {}: {}x{} {} @ {:.3} fps, {} frames ({:?})",
            owned_path.display(),
            video.width,
            video.height,
            video.codec,
            video.frames_per_second,
            video.frame_count,
            video.frame_count_source,
        );

        Ok(Self {
            path: owned_path,
            input_context,
            video_stream_index,
            time_base,
            start_time,
            metadata: MediaMetadata {
                video,
                duration: duration_seconds.map(Duration::from_secs_f64),
                format,
                has_audio,
            },
        })
    }

    /// Path the source was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata read at open time.
    pub fn metadata(&self) -> &MediaMetadata {
        &self.metadata
    }
}

fn rational_to_f64(rate: Rational) -> Option<f64> {
    if rate.numerator() > 0 && rate.denominator() > 0 {
        Some(f64::from(rate.numerator()) / f64::from(rate.denominator()))
    } else {
        None
    }
}
