//! Pixel format conversion to interleaved RGB.

use ffmpeg_next::{
    format::Pixel,
    frame::Video as VideoFrame,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::RgbImage;

use crate::error::ExtractError;

/// Converts decoded frames to [`RgbImage`]s at their native size.
///
/// The swscale context is cached and only rebuilt when the source format
/// or dimensions change. A converter is not shared between threads; each
/// saver worker owns one.
#[derive(Default)]
pub struct RgbConverter {
    scaler: Option<(ScalingContext, Pixel, u32, u32)>,
    scaled: Option<VideoFrame>,
}

impl RgbConverter {
    /// Create a converter with no cached context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert `frame` to 8-bit RGB.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::FfmpegError`] if swscale rejects the format,
    /// or [`ExtractError::VideoDecodeError`] if the converted buffer does not
    /// form a valid image.
    pub fn convert(&mut self, frame: &VideoFrame) -> Result<RgbImage, ExtractError> {
        let (format, width, height) = (frame.format(), frame.width(), frame.height());

        let reuse = matches!(
            &self.scaler,
            Some((_, cached_format, cached_width, cached_height))
                if *cached_format == format && *cached_width == width && *cached_height == height
        );
        if !reuse {
            log::debug!("Creating RGB converter for {format:?} {width}x{height}");
            let context = ScalingContext::get(
                format,
                width,
                height,
                Pixel::RGB24,
                width,
                height,
                ScalingFlags::BILINEAR,
            )?;
            self.scaler = Some((context, format, width, height));
            self.scaled = None;
        }

        let Some((scaler, ..)) = self.scaler.as_mut() else {
            return Err(ExtractError::FfmpegError(
                "RGB scaler missing after initialisation".to_string(),
            ));
        };
        let scaled = self.scaled.get_or_insert_with(VideoFrame::empty);
        scaler.run(frame, scaled)?;

        let buffer = packed_rgb(scaled, width, height);
        RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
            ExtractError::VideoDecodeError(
                "Failed to construct RGB image from decoded frame data".to_string(),
            )
        })
    }
}

/// Copy the first plane of an RGB24 frame into a tightly-packed buffer.
fn packed_rgb(frame: &VideoFrame, width: u32, height: u32) -> Vec<u8> {
    let stride = frame.stride(0);
    let row_len = width as usize * 3;
    let data = frame.data(0);

    if stride == row_len {
        data[..row_len * height as usize].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_len * height as usize);
        for row in 0..height as usize {
            let start = row * stride;
            buffer.extend_from_slice(&data[start..start + row_len]);
        }
        buffer
    }
}
