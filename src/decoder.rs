//! Pull-based video decoding with sequence numbering.
//!
//! [`StreamDecoder`] reads packets from a [`MediaSource`], feeds the video
//! stream's packets to the decoder, and hands out owned frames one at a
//! time together with their sequence number. It implements
//! [`FrameSource`], the seam the extraction driver is written against.

use ffmpeg_next::{
    Error as FfmpegError,
    Packet,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    frame::Video as VideoFrame,
};

use crate::{
    error::ExtractError,
    media::MediaSource,
    timecode::{frame_number_to_seek_timestamp, pts_to_frame_number},
};

/// A producer of decoded frames in decoder output order.
pub trait FrameSource {
    /// Decode the next frame.
    ///
    /// Returns `Ok(None)` once the input is exhausted and the decoder has
    /// been drained.
    fn next_frame(&mut self) -> Result<Option<(u64, VideoFrame)>, ExtractError>;
}

/// Assigns sequence numbers to decoded frames.
///
/// Without a seek, numbering starts at zero. After a seek the first frame
/// is anchored at the index derived from its timestamp and every later
/// frame increments by one, whatever its own timestamp says.
///
/// # Example
///
/// ```
/// use frame_extractor::FrameNumbering;
///
/// let mut numbering = FrameNumbering::anchored();
/// assert_eq!(numbering.number(Some(240)), Some(240));
/// // Later timestamps are ignored once anchored.
/// assert_eq!(numbering.number(Some(238)), Some(241));
/// assert_eq!(numbering.number(None), Some(242));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameNumbering {
    next: Option<u64>,
}

impl FrameNumbering {
    /// Number from zero in output order.
    pub fn sequential() -> Self {
        Self { next: Some(0) }
    }

    /// Wait for the first frame's timestamp before numbering.
    pub fn anchored() -> Self {
        Self { next: None }
    }

    /// Number the next frame.
    ///
    /// `timestamp_index` is the frame index derived from the frame's
    /// timestamp, if it has one. Returns `None` when an anchor is needed and
    /// the frame has no timestamp.
    pub fn number(&mut self, timestamp_index: Option<u64>) -> Option<u64> {
        let current = match self.next {
            Some(next) => next,
            None => timestamp_index?,
        };
        self.next = Some(current + 1);
        Some(current)
    }
}

/// Decodes the video stream of a [`MediaSource`].
///
/// Borrows the source mutably, so nothing else can read from it while the
/// decoder is alive.
pub struct StreamDecoder<'a> {
    source: &'a mut MediaSource,
    decoder: VideoDecoder,
    numbering: FrameNumbering,
    frames_per_second: f64,
    eof_sent: bool,
}

impl<'a> StreamDecoder<'a> {
    /// Open a decoder positioned at `start_frame`.
    ///
    /// For `start_frame > 0` the demuxer seeks backward-biased to that
    /// frame's timestamp, so decoding starts at or before it. If the seek
    /// fails, decoding starts from the beginning instead.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::NoVideoStream`] or
    /// [`ExtractError::DecoderOpen`] if the decoder cannot be created.
    pub fn new(source: &'a mut MediaSource, start_frame: u64) -> Result<Self, ExtractError> {
        let stream = source
            .input_context
            .stream(source.video_stream_index)
            .ok_or(ExtractError::NoVideoStream)?;
        let decoder = CodecContext::from_parameters(stream.parameters())
            .and_then(|context| context.decoder().video())
            .map_err(|error| ExtractError::DecoderOpen(error.to_string()))?;

        let frames_per_second = source.metadata().video.frames_per_second;
        let mut numbering = FrameNumbering::sequential();

        if start_frame > 0 {
            let target = frame_number_to_seek_timestamp(start_frame, frames_per_second);
            match source.input_context.seek(target, ..target) {
                Ok(()) => {
                    log::debug!("Seeked to frame {start_frame} (timestamp {target} us)");
                    numbering = FrameNumbering::anchored();
                }
                Err(error) => {
                    log::warn!("Seek to frame {start_frame} failed ({error}); decoding from start");
                }
            }
        }

        Ok(Self {
            source,
            decoder,
            numbering,
            frames_per_second,
            eof_sent: false,
        })
    }

    fn timestamp_index(&self, frame: &VideoFrame) -> Option<u64> {
        frame.timestamp().or_else(|| frame.pts()).map(|pts| {
            pts_to_frame_number(
                pts,
                self.source.start_time,
                self.source.time_base,
                self.frames_per_second,
            )
        })
    }

    // The first frame after a seek had no timestamp to anchor on; start over
    // from the beginning and count from zero.
    fn rewind(&mut self) -> Result<(), ExtractError> {
        log::warn!("First frame after seek has no timestamp; rewinding to start");
        self.source.input_context.seek(0, ..0)?;
        self.decoder.flush();
        self.numbering = FrameNumbering::sequential();
        self.eof_sent = false;
        Ok(())
    }
}

impl FrameSource for StreamDecoder<'_> {
    fn next_frame(&mut self) -> Result<Option<(u64, VideoFrame)>, ExtractError> {
        loop {
            let mut frame = VideoFrame::empty();
            if self.decoder.receive_frame(&mut frame).is_ok() {
                let index = self.timestamp_index(&frame);
                match self.numbering.number(index) {
                    Some(sequence) => return Ok(Some((sequence, frame))),
                    None => {
                        self.rewind()?;
                        continue;
                    }
                }
            }

            if self.eof_sent {
                return Ok(None);
            }

            let mut packet = Packet::empty();
            match packet.read(&mut self.source.input_context) {
                Ok(()) => {
                    if packet.stream() != self.source.video_stream_index {
                        continue;
                    }
                    if let Err(error) = self.decoder.send_packet(&packet) {
                        log::warn!("Skipping undecodable packet: {error}");
                    }
                }
                Err(error) => {
                    if error != FfmpegError::Eof {
                        log::warn!("Packet read failed ({error}); treating as end of input");
                    }
                    self.decoder
                        .send_eof()
                        .map_err(|error| ExtractError::VideoDecodeError(error.to_string()))?;
                    self.eof_sent = true;
                }
            }
        }
    }
}
