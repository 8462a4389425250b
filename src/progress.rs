//! Progress reporting.
//!
//! [`ProgressTracker`] is the single, thread-safe accumulator of completed
//! work for a run. Saver workers report saved frames, the decode driver
//! reports decoded frames, and the audio side-task reports encoder progress
//! blocks. Every mutation goes through one lock; snapshots are delivered to
//! a [`ProgressCallback`] no more often than the configured redraw interval,
//! except that the completing update is always delivered.
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use frame_extractor::{ProgressCallback, ProgressInfo, ProgressTracker};
//!
//! struct Last(Mutex<Option<u64>>);
//!
//! impl ProgressCallback for Last {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         *self.0.lock().unwrap() = Some(info.current);
//!     }
//! }
//!
//! let sink = Arc::new(Last(Mutex::new(None)));
//! let tracker = ProgressTracker::new(sink.clone(), 10);
//! tracker.update(4, 0);
//! let summary = tracker.finish();
//! assert_eq!(summary.frames, 10);
//! assert_eq!(*sink.0.lock().unwrap(), Some(10));
//! ```

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

/// Default minimum time between two delivered snapshots.
pub const DEFAULT_REDRAW_INTERVAL: Duration = Duration::from_millis(100);

/// The kind of operation a snapshot describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Decoding and saving video frames.
    FrameExtraction,
    /// Transcoding the audio track with the external encoder.
    AudioExtraction,
    /// Fetching a remote source with the external downloader.
    Download,
}

/// A snapshot of run progress.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// What kind of work is being performed.
    pub operation: OperationType,
    /// Frames saved (or attempted) so far. Never exceeds `total`.
    pub current: u64,
    /// Total frames expected, if known.
    pub total: Option<u64>,
    /// Completion percentage (0.0 – 100.0), if `total` is known.
    pub percentage: Option<f32>,
    /// Frames decoded and queued by the driver so far.
    pub decoded: u64,
    /// Audio progress blocks reported by the encoder so far.
    pub audio_units: u64,
    /// Wall-clock time since the tracker was created.
    pub elapsed: Duration,
    /// Saved frames per second of wall-clock time.
    pub frames_per_second: f64,
    /// Estimated time remaining, when throughput is meaningful.
    pub estimated_remaining: Option<Duration>,
    /// Media time reached by an external encoder, if applicable.
    pub current_timestamp: Option<Duration>,
    /// `true` for the snapshot emitted by [`ProgressTracker::finish`].
    pub finished: bool,
}

impl ProgressInfo {
    /// Snapshot for a download step, which has no frame counts.
    pub(crate) fn download(percentage: f32, elapsed: Duration, finished: bool) -> Self {
        Self {
            operation: OperationType::Download,
            current: 0,
            total: None,
            percentage: Some(percentage),
            decoded: 0,
            audio_units: 0,
            elapsed,
            frames_per_second: 0.0,
            estimated_remaining: None,
            current_timestamp: None,
            finished,
        }
    }
}

/// Trait for receiving progress snapshots.
///
/// Implementations must be [`Send`] and [`Sync`]: snapshots are delivered
/// from whichever thread performed the update, while the tracker's lock is
/// held, so callbacks should return quickly.
pub trait ProgressCallback: Send + Sync {
    /// Called with each delivered snapshot.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Discards all snapshots. The default when no callback is configured.
pub struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Final figures returned by [`ProgressTracker::finish`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSummary {
    /// Total wall-clock time of the run.
    pub elapsed: Duration,
    /// Frames accounted for (equal to the tracker's total).
    pub frames: u64,
    /// Audio progress blocks reported.
    pub audio_units: u64,
    /// Average frames per second over the whole run.
    pub frames_per_second: f64,
}

impl Display for ProgressSummary {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "Completed in {:.2} seconds", self.elapsed.as_secs_f64())?;
        if self.frames > 0 {
            write!(
                f,
                " ({} frames, {})",
                self.frames,
                format_rate(self.frames_per_second)
            )?;
        }
        if self.audio_units > 0 {
            write!(f, ", {} audio packets", self.audio_units)?;
        }
        Ok(())
    }
}

struct ProgressState {
    completed: u64,
    decoded: u64,
    audio_units: u64,
    last_timestamp: Option<Duration>,
    last_render: Option<Duration>,
    completion_rendered: bool,
    summary: Option<ProgressSummary>,
}

/// Thread-safe progress accumulator with rate-limited delivery.
///
/// Shared between threads behind an [`Arc`]. Each tracker owns its own
/// clock, so independent runs in one process do not interfere.
pub struct ProgressTracker {
    callback: Arc<dyn ProgressCallback>,
    total: u64,
    min_interval: Duration,
    start_time: Instant,
    state: Mutex<ProgressState>,
}

impl ProgressTracker {
    /// Create a tracker expecting `total` frames.
    ///
    /// A `total` of zero (audio-only runs) disables percentage and ETA.
    pub fn new(callback: Arc<dyn ProgressCallback>, total: u64) -> Self {
        Self {
            callback,
            total,
            min_interval: DEFAULT_REDRAW_INTERVAL,
            start_time: Instant::now(),
            state: Mutex::new(ProgressState {
                completed: 0,
                decoded: 0,
                audio_units: 0,
                last_timestamp: None,
                last_render: None,
                completion_rendered: false,
                summary: None,
            }),
        }
    }

    /// Set the minimum time between delivered snapshots.
    #[must_use]
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Total frames expected.
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Frames completed so far.
    pub fn completed(&self) -> u64 {
        self.lock().completed
    }

    /// Audio units reported so far.
    pub fn audio_units(&self) -> u64 {
        self.lock().audio_units
    }

    /// Add completed frames and audio units.
    ///
    /// `completed` is clamped to the total. A snapshot is delivered if the
    /// redraw interval has elapsed since the previous one or if this update
    /// completes the run.
    pub fn update(&self, frames: u64, audio_units: u64) {
        let mut state = self.lock();
        state.completed = state.completed.saturating_add(frames).min(self.total);
        state.audio_units = state.audio_units.saturating_add(audio_units);
        self.maybe_render(&mut state, OperationType::FrameExtraction);
    }

    /// Add frames decoded and queued by the driver.
    pub fn record_decoded(&self, frames: u64) {
        let mut state = self.lock();
        state.decoded = state.decoded.saturating_add(frames);
        self.maybe_render(&mut state, OperationType::FrameExtraction);
    }

    /// Record one audio progress block and the media time it reached.
    pub fn record_audio(&self, timestamp: Option<Duration>) {
        let mut state = self.lock();
        state.audio_units = state.audio_units.saturating_add(1);
        if timestamp.is_some() {
            state.last_timestamp = timestamp;
        }
        self.maybe_render(&mut state, OperationType::AudioExtraction);
    }

    /// Force completion, deliver a final snapshot, and return the summary.
    ///
    /// Only the first call renders; later calls return the same summary.
    pub fn finish(&self) -> ProgressSummary {
        let mut state = self.lock();
        if let Some(summary) = state.summary {
            return summary;
        }

        state.completed = self.total;
        let elapsed = self.start_time.elapsed();
        let info = self.snapshot(&state, elapsed, OperationType::FrameExtraction, true);
        state.last_render = Some(elapsed);
        self.callback.on_progress(&info);

        let summary = ProgressSummary {
            elapsed,
            frames: self.total,
            audio_units: state.audio_units,
            frames_per_second: info.frames_per_second,
        };
        state.summary = Some(summary);
        summary
    }

    fn maybe_render(&self, state: &mut ProgressState, operation: OperationType) {
        if state.summary.is_some() {
            return;
        }
        let elapsed = self.start_time.elapsed();
        // Reaching the total renders once immediately; later updates are
        // rate limited again.
        let just_completed =
            self.total > 0 && state.completed >= self.total && !state.completion_rendered;
        let due = state
            .last_render
            .is_none_or(|last| elapsed.saturating_sub(last) >= self.min_interval);
        if !due && !just_completed {
            return;
        }

        if just_completed {
            state.completion_rendered = true;
        }
        state.last_render = Some(elapsed);
        let info = self.snapshot(state, elapsed, operation, false);
        self.callback.on_progress(&info);
    }

    fn snapshot(
        &self,
        state: &ProgressState,
        elapsed: Duration,
        operation: OperationType,
        finished: bool,
    ) -> ProgressInfo {
        let total = (self.total > 0).then_some(self.total);
        let fraction = total.map(|t| state.completed as f64 / t as f64);

        let seconds = elapsed.as_secs_f64();
        let frames_per_second = if seconds > 0.001 {
            state.completed as f64 / seconds
        } else {
            0.0
        };

        let estimated_remaining = match fraction {
            Some(fraction) if fraction > 0.01 && frames_per_second > 0.0 => {
                let remaining = self.total.saturating_sub(state.completed) as f64;
                Some(Duration::from_secs_f64(remaining / frames_per_second))
            }
            _ => None,
        };

        ProgressInfo {
            operation,
            current: state.completed,
            total,
            percentage: fraction.map(|f| (f * 100.0) as f32),
            decoded: state.decoded,
            audio_units: state.audio_units,
            elapsed,
            frames_per_second,
            estimated_remaining,
            current_timestamp: state.last_timestamp,
            finished,
        }
    }
}

/// Format a frame rate, switching to `Kfps` above 1000.
pub fn format_rate(frames_per_second: f64) -> String {
    if frames_per_second > 1000.0 {
        format!("{:.1} Kfps", frames_per_second / 1000.0)
    } else {
        format!("{frames_per_second:.1} fps")
    }
}

/// Format an ETA as seconds, minutes or hours.
pub fn format_eta(remaining: Duration) -> String {
    let seconds = remaining.as_secs_f64();
    if seconds < 60.0 {
        format!("{seconds:.0}s")
    } else if seconds < 3600.0 {
        format!("{:.1}m", seconds / 60.0)
    } else {
        format!("{:.1}h", seconds / 3600.0)
    }
}
