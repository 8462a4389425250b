//! Queued frames and raw planar output.

use std::io::Write;

use ffmpeg_next::{format::Pixel, frame::Video as VideoFrame};

use crate::error::ExtractError;

/// A decoded frame in flight between the driver and a saver worker.
///
/// Ownership moves with the value: the driver gives it up on push, and the
/// worker that pops it drops it once the frame is persisted.
pub struct QueuedFrame {
    /// Zero-based sequence number used to name the output file.
    pub sequence: u64,
    /// The decoded frame in the decoder's native pixel format.
    pub frame: VideoFrame,
}

impl QueuedFrame {
    /// Pair a decoded frame with its sequence number.
    pub fn new(sequence: u64, frame: VideoFrame) -> Self {
        Self { sequence, frame }
    }
}

/// Returns `true` for the 4:2:0 planar layouts accepted by raw output.
pub fn is_yuv420(format: Pixel) -> bool {
    matches!(format, Pixel::YUV420P | Pixel::YUVJ420P)
}

/// Size in bytes of a raw 4:2:0 dump of a `width` × `height` frame.
///
/// Chroma planes round odd dimensions up.
pub fn planar_yuv420_len(width: u32, height: u32) -> usize {
    let (width, height) = (width as usize, height as usize);
    width * height + 2 * width.div_ceil(2) * height.div_ceil(2)
}

/// Write the Y, U and V planes of a 4:2:0 frame back to back, with row
/// padding removed and no header.
///
/// # Errors
///
/// Returns [`ExtractError::UnsupportedPixelLayout`] for any other pixel
/// format, or [`ExtractError::IoError`] if writing fails.
pub fn write_planar_yuv420<W: Write>(frame: &VideoFrame, out: &mut W) -> Result<(), ExtractError> {
    let format = frame.format();
    if !is_yuv420(format) {
        return Err(ExtractError::UnsupportedPixelLayout(format!("{format:?}")));
    }

    let width = frame.width() as usize;
    let height = frame.height() as usize;
    let planes = [
        (0, width, height),
        (1, width.div_ceil(2), height.div_ceil(2)),
        (2, width.div_ceil(2), height.div_ceil(2)),
    ];

    for (plane, row_len, rows) in planes {
        let stride = frame.stride(plane);
        let data = frame.data(plane);
        for row in 0..rows {
            let start = row * stride;
            out.write_all(&data[start..start + row_len])?;
        }
    }
    Ok(())
}
