//! Time parsing and frame/time conversions.
//!
//! User-facing time values are accepted as `H:M:S[.fraction]`, `M:S[.fraction]`
//! or a bare number of seconds. Conversions to frame numbers truncate, so a
//! timestamp always maps to the frame that is on screen at that instant.

use std::time::Duration;

use ffmpeg_next::Rational;

use crate::error::ExtractError;

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Parse a time value into a [`Duration`].
///
/// Patterns are tried in priority order: `H:M:S[.fraction]`, then
/// `M:S[.fraction]`, then bare seconds (`"5"`, `"2.25"`).
///
/// # Errors
///
/// Returns [`ExtractError::InvalidTimecode`] for empty input, negative or
/// non-numeric components, or more than three colon-separated fields.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use frame_extractor::timecode::parse_timecode;
///
/// assert_eq!(parse_timecode("00:01:30.500")?, Duration::from_millis(90_500));
/// assert_eq!(parse_timecode("1:15")?, Duration::from_secs(75));
/// assert_eq!(parse_timecode("5")?, Duration::from_secs(5));
/// # Ok::<(), frame_extractor::ExtractError>(())
/// ```
pub fn parse_timecode(value: &str) -> Result<Duration, ExtractError> {
    let trimmed = value.trim();
    let invalid = || ExtractError::InvalidTimecode(value.to_string());
    if trimmed.is_empty() {
        return Err(invalid());
    }

    let fields: Vec<&str> = trimmed.split(':').collect();
    let (hours, minutes, seconds) = match fields.as_slice() {
        [h, m, s] => (parse_whole(h).ok_or_else(invalid)?, parse_whole(m).ok_or_else(invalid)?, *s),
        [m, s] => (0, parse_whole(m).ok_or_else(invalid)?, *s),
        [s] => (0, 0, *s),
        _ => return Err(invalid()),
    };

    let seconds = parse_seconds(seconds).ok_or_else(invalid)?;
    let whole = hours
        .checked_mul(3600)
        .and_then(|h| minutes.checked_mul(60).and_then(|m| h.checked_add(m)))
        .ok_or_else(invalid)?;

    Duration::from_secs(whole)
        .checked_add(seconds)
        .ok_or_else(invalid)
}

fn parse_whole(field: &str) -> Option<u64> {
    let field = field.trim();
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    field.parse().ok()
}

/// Parse `SS[.fraction]` exactly, without going through `f64`.
fn parse_seconds(field: &str) -> Option<Duration> {
    let field = field.trim();
    let (whole, fraction) = match field.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (field, ""),
    };

    let whole = if whole.is_empty() && !fraction.is_empty() {
        0
    } else {
        parse_whole(whole)?
    };

    if !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // Digits past nanosecond precision are dropped.
    let mut nanos = 0_u64;
    let mut scale = NANOS_PER_SECOND;
    for digit in fraction.bytes().take(9) {
        scale /= 10;
        nanos += u64::from(digit - b'0') * scale;
    }

    Some(Duration::new(whole, u32::try_from(nanos).ok()?))
}

/// Convert a [`Duration`] to a frame number using the video's frame rate.
///
/// The product is truncated toward zero.
pub fn timestamp_to_frame_number(timestamp: Duration, frames_per_second: f64) -> u64 {
    if frames_per_second <= 0.0 || !frames_per_second.is_finite() {
        return 0;
    }
    // Small bias so products like 0.1 * 30 do not land on 2.9999.
    (timestamp.as_secs_f64() * frames_per_second + 1e-6) as u64
}

/// Parse a time value and convert it straight to a frame number.
pub fn timecode_to_frame_number(
    value: &str,
    frames_per_second: f64,
) -> Result<u64, ExtractError> {
    parse_timecode(value).map(|timestamp| timestamp_to_frame_number(timestamp, frames_per_second))
}

/// Convert a frame number to a seek timestamp in AV_TIME_BASE (microseconds).
///
/// `input_context.seek()` (via `avformat_seek_file` with `stream_index = -1`)
/// expects container-level timestamps in microseconds.
pub fn frame_number_to_seek_timestamp(frame_number: u64, frames_per_second: f64) -> i64 {
    if frames_per_second <= 0.0 {
        return 0;
    }
    let seconds = frame_number as f64 / frames_per_second;
    (seconds * 1_000_000.0) as i64
}

/// Rescale a PTS value from stream time base to seconds.
pub fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    if time_base.denominator() == 0 {
        return 0.0;
    }
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Rescale a presentation timestamp to a frame index.
///
/// `start_time` is the stream's first timestamp; indices are relative to it
/// and rounded to the nearest frame to absorb timestamp jitter.
pub fn pts_to_frame_number(
    pts: i64,
    start_time: i64,
    time_base: Rational,
    frames_per_second: f64,
) -> u64 {
    let seconds = pts_to_seconds(pts.saturating_sub(start_time), time_base);
    let frame = (seconds * frames_per_second).round();
    if frame <= 0.0 { 0 } else { frame as u64 }
}
