//! Frame selection policies.
//!
//! A [`SelectionPolicy`] describes which frames the user asked for. Once the
//! video's frame count and frame rate are known it is resolved into an
//! [`ExtractionPlan`]: the exact set of sequence numbers to extract, already
//! intersected with the frames that exist in the video.

use std::{collections::BTreeSet, time::Duration};

use crate::{error::ExtractError, timecode::timestamp_to_frame_number};

/// Specifies which frames to extract.
///
/// Exactly one policy is active per run. The default selects every frame.
///
/// # Example
///
/// ```
/// use frame_extractor::{ExtractionPlan, SelectionPolicy};
///
/// let policy = SelectionPolicy::Range { start: Some(100), end: Some(200), step: 5 };
/// let plan = ExtractionPlan::resolve(&policy, 300, 30.0)?;
/// assert_eq!(plan.len(), 21);
/// assert!(plan.contains(105));
/// assert!(!plan.contains(106));
/// # Ok::<(), frame_extractor::ExtractError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum SelectionPolicy {
    /// Specific frame numbers, in any order. Duplicates are collapsed.
    Frames(Vec<u64>),
    /// Frames from `start` to `end` inclusive, every `step` frames.
    /// Missing bounds default to the first and last frame of the video.
    Range {
        /// First frame (inclusive). `None` means frame 0.
        start: Option<u64>,
        /// Last frame (inclusive). `None` means the last frame.
        end: Option<u64>,
        /// Distance between selected frames. Must be at least 1.
        step: u64,
    },
    /// The single frame shown at a timestamp.
    TimePoint(Duration),
    /// Frames between two timestamps (inclusive), every `step` frames.
    TimeRange {
        /// Start of the window.
        start: Duration,
        /// End of the window.
        end: Duration,
        /// Distance between selected frames. Must be at least 1.
        step: u64,
    },
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        SelectionPolicy::all()
    }
}

impl SelectionPolicy {
    /// Every frame of the video.
    pub fn all() -> Self {
        SelectionPolicy::Range {
            start: None,
            end: None,
            step: 1,
        }
    }

    /// A single frame by number.
    pub fn single(frame_number: u64) -> Self {
        SelectionPolicy::Frames(vec![frame_number])
    }

    /// Check the policy for errors that do not depend on the video.
    pub(crate) fn validate(&self) -> Result<(), ExtractError> {
        match self {
            SelectionPolicy::Frames(frames) if frames.is_empty() => Err(
                ExtractError::ConfigurationError("frame list is empty".to_string()),
            ),
            SelectionPolicy::Range { step: 0, .. } | SelectionPolicy::TimeRange { step: 0, .. } => {
                Err(ExtractError::InvalidInterval)
            }
            SelectionPolicy::Range {
                start: Some(start),
                end: Some(end),
                ..
            } if start > end => Err(ExtractError::InvalidRange {
                start: format!("frame {start}"),
                end: format!("frame {end}"),
            }),
            SelectionPolicy::TimeRange { start, end, .. } if start > end => {
                Err(ExtractError::InvalidRange {
                    start: format!("{start:?}"),
                    end: format!("{end:?}"),
                })
            }
            _ => Ok(()),
        }
    }
}

/// Parse a comma-separated frame list such as `"10,20,30"`.
///
/// # Errors
///
/// Returns [`ExtractError::ConfigurationError`] if any entry is not a
/// non-negative integer or the list is empty.
pub fn parse_frame_list(value: &str) -> Result<Vec<u64>, ExtractError> {
    let frames = value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry.parse::<u64>().map_err(|_| {
                ExtractError::ConfigurationError(format!("invalid frame number {entry:?}"))
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if frames.is_empty() {
        return Err(ExtractError::ConfigurationError(
            "frame list is empty".to_string(),
        ));
    }
    Ok(frames)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Targets {
    Stepped(u64),
    Listed(Vec<u64>),
}

/// The resolved set of frames to extract.
///
/// Sequence numbers are unique and lie inside `[start_frame, end_frame]`,
/// which itself lies inside `[0, total_frames - 1]`. Since every selected
/// number is unique, every saved frame maps to a distinct output path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPlan {
    start: u64,
    end: u64,
    total_frames: u64,
    targets: Targets,
}

impl ExtractionPlan {
    /// Resolve `policy` against a video with `total_frames` frames.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::InvalidInterval`] for a zero step.
    /// - [`ExtractError::InvalidRange`] when start exceeds end.
    /// - [`ExtractError::NoFramesSelected`] when nothing inside the video
    ///   matches the policy.
    pub fn resolve(
        policy: &SelectionPolicy,
        total_frames: u64,
        frames_per_second: f64,
    ) -> Result<Self, ExtractError> {
        policy.validate()?;
        let none_selected = ExtractError::NoFramesSelected { total_frames };
        let Some(last) = total_frames.checked_sub(1) else {
            return Err(none_selected);
        };

        let (start, end, targets) = match policy {
            SelectionPolicy::Frames(frames) => {
                let unique: BTreeSet<u64> = frames.iter().copied().collect();
                let (inside, outside): (Vec<u64>, Vec<u64>) =
                    unique.into_iter().partition(|&frame| frame <= last);
                for frame in outside {
                    log::warn!("Frame {frame} exceeds video length ({total_frames})");
                }
                (0, last, Targets::Listed(inside))
            }
            SelectionPolicy::Range { start, end, step } => (
                start.unwrap_or(0),
                end.unwrap_or(last).min(last),
                Targets::Stepped(*step),
            ),
            SelectionPolicy::TimePoint(timestamp) => {
                let frame = timestamp_to_frame_number(*timestamp, frames_per_second);
                (frame, frame.min(last), Targets::Stepped(1))
            }
            SelectionPolicy::TimeRange { start, end, step } => (
                timestamp_to_frame_number(*start, frames_per_second),
                timestamp_to_frame_number(*end, frames_per_second).min(last),
                Targets::Stepped(*step),
            ),
        };

        let plan = Self {
            start,
            end,
            total_frames,
            targets,
        };
        if plan.is_empty() {
            return Err(none_selected);
        }

        log::debug!(
            "Resolved selection: {} frame(s) in [{}, {}] of {total_frames}",
            plan.len(),
            plan.start,
            plan.end,
        );
        Ok(plan)
    }

    /// First frame of the window.
    pub fn start_frame(&self) -> u64 {
        self.start
    }

    /// Last frame of the window (inclusive).
    pub fn end_frame(&self) -> u64 {
        self.end
    }

    /// Frame count of the video the plan was resolved against.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Number of frames to extract.
    pub fn len(&self) -> u64 {
        if self.start > self.end {
            return 0;
        }
        match &self.targets {
            Targets::Stepped(step) => (self.end - self.start) / step + 1,
            Targets::Listed(frames) => frames
                .iter()
                .filter(|&&frame| frame >= self.start && frame <= self.end)
                .count() as u64,
        }
    }

    /// Returns `true` when no frame is selected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `sequence` should be extracted.
    pub fn contains(&self, sequence: u64) -> bool {
        if sequence < self.start || sequence > self.end {
            return false;
        }
        match &self.targets {
            Targets::Stepped(step) => (sequence - self.start) % step == 0,
            Targets::Listed(frames) => frames.binary_search(&sequence).is_ok(),
        }
    }

    /// Selected sequence numbers in ascending order.
    pub fn frames(&self) -> Vec<u64> {
        if self.start > self.end {
            return Vec::new();
        }
        match &self.targets {
            Targets::Stepped(step) => (self.start..=self.end).step_by(*step as usize).collect(),
            Targets::Listed(frames) => frames
                .iter()
                .copied()
                .filter(|&frame| frame >= self.start && frame <= self.end)
                .collect(),
        }
    }
}
