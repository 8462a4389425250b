//! Progress tracker integration tests.

use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use frame_extractor::{
    NoOpProgress, OperationType, ProgressCallback, ProgressInfo, ProgressTracker,
    progress::{format_eta, format_rate},
};

struct RecordingProgress {
    infos: Mutex<Vec<ProgressInfo>>,
}

impl RecordingProgress {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            infos: Mutex::new(Vec::new()),
        })
    }

    fn snapshots(&self) -> Vec<ProgressInfo> {
        self.infos.lock().unwrap().clone()
    }
}

impl ProgressCallback for RecordingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.infos.lock().unwrap().push(info.clone());
    }
}

// ── accumulation ───────────────────────────────────────────────────

#[test]
fn completed_is_clamped_to_total() {
    let tracker = ProgressTracker::new(Arc::new(NoOpProgress), 5);
    tracker.update(3, 0);
    tracker.update(10, 0);
    assert_eq!(tracker.completed(), 5);
    assert_eq!(tracker.total(), 5);
}

#[test]
fn finish_forces_completion() {
    let recorder = RecordingProgress::new();
    let tracker = ProgressTracker::new(recorder.clone(), 10);
    tracker.update(4, 0);

    let summary = tracker.finish();
    assert_eq!(summary.frames, 10);
    assert_eq!(tracker.completed(), 10);

    let last = recorder.snapshots().pop().unwrap();
    assert!(last.finished);
    assert_eq!(last.current, 10);
    assert_eq!(last.percentage, Some(100.0));
}

#[test]
fn finish_renders_once() {
    let recorder = RecordingProgress::new();
    let tracker = ProgressTracker::new(recorder.clone(), 3);
    let first = tracker.finish();
    let second = tracker.finish();
    assert_eq!(first, second);

    let finished = recorder
        .snapshots()
        .into_iter()
        .filter(|info| info.finished)
        .count();
    assert_eq!(finished, 1);
}

#[test]
fn updates_after_finish_are_not_rendered() {
    let recorder = RecordingProgress::new();
    let tracker = ProgressTracker::new(recorder.clone(), 2).with_min_interval(Duration::ZERO);
    tracker.finish();
    let count = recorder.snapshots().len();

    tracker.record_decoded(1);
    tracker.record_audio(None);
    assert_eq!(recorder.snapshots().len(), count);
}

#[test]
fn audio_units_are_counted() {
    let recorder = RecordingProgress::new();
    let tracker = ProgressTracker::new(recorder.clone(), 0).with_min_interval(Duration::ZERO);
    tracker.record_audio(Some(Duration::from_secs(1)));
    tracker.record_audio(None);
    tracker.record_audio(Some(Duration::from_secs(3)));
    assert_eq!(tracker.audio_units(), 3);

    let last = recorder.snapshots().pop().unwrap();
    assert_eq!(last.operation, OperationType::AudioExtraction);
    assert_eq!(last.audio_units, 3);
    assert_eq!(last.current_timestamp, Some(Duration::from_secs(3)));
    // Audio-only runs have no frame total.
    assert_eq!(last.total, None);
    assert_eq!(last.percentage, None);

    let summary = tracker.finish();
    assert_eq!(summary.audio_units, 3);
    assert_eq!(summary.frames, 0);
}

// ── delivery ───────────────────────────────────────────────────────

#[test]
fn snapshots_are_rate_limited() {
    let recorder = RecordingProgress::new();
    let tracker =
        ProgressTracker::new(recorder.clone(), 1000).with_min_interval(Duration::from_secs(3600));

    for _ in 0..500 {
        tracker.update(1, 0);
    }
    // Only the very first update falls outside the interval.
    assert_eq!(recorder.snapshots().len(), 1);

    // Completing the run is always delivered.
    tracker.update(500, 0);
    let snapshots = recorder.snapshots();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[1].current, 1000);
}

#[test]
fn updates_after_completion_are_rate_limited() {
    let recorder = RecordingProgress::new();
    let tracker =
        ProgressTracker::new(recorder.clone(), 10).with_min_interval(Duration::from_secs(3600));

    tracker.update(10, 0);
    assert_eq!(recorder.snapshots().len(), 1);

    // Audio keeps reporting while frames are done.
    for _ in 0..100 {
        tracker.record_audio(Some(Duration::from_secs(1)));
        tracker.record_decoded(1);
        tracker.update(1, 0);
    }
    assert_eq!(recorder.snapshots().len(), 1);

    tracker.finish();
    let snapshots = recorder.snapshots();
    assert_eq!(snapshots.len(), 2);
    assert!(snapshots[1].finished);
    assert_eq!(snapshots[1].audio_units, 100);
}

#[test]
fn eta_is_absent_at_start() {
    let recorder = RecordingProgress::new();
    let tracker = ProgressTracker::new(recorder.clone(), 1000);
    tracker.update(1, 0);

    let first = recorder.snapshots().remove(0);
    assert_eq!(first.current, 1);
    assert_eq!(first.estimated_remaining, None);
}

#[test]
fn decoded_frames_are_reported_separately() {
    let recorder = RecordingProgress::new();
    let tracker = ProgressTracker::new(recorder.clone(), 10).with_min_interval(Duration::ZERO);
    tracker.record_decoded(4);
    tracker.update(2, 0);

    let last = recorder.snapshots().pop().unwrap();
    assert_eq!(last.decoded, 4);
    assert_eq!(last.current, 2);
    assert_eq!(last.operation, OperationType::FrameExtraction);
}

#[test]
fn concurrent_updates_are_monotonic() {
    const WORKERS: u64 = 8;
    const PER_WORKER: u64 = 250;

    let recorder = RecordingProgress::new();
    let tracker = Arc::new(
        ProgressTracker::new(recorder.clone(), WORKERS * PER_WORKER)
            .with_min_interval(Duration::ZERO),
    );

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let tracker = Arc::clone(&tracker);
            thread::spawn(move || {
                for _ in 0..PER_WORKER {
                    tracker.update(1, 0);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(tracker.completed(), WORKERS * PER_WORKER);

    let snapshots = recorder.snapshots();
    assert!(
        snapshots
            .windows(2)
            .all(|pair| pair[0].current <= pair[1].current)
    );
    assert!(snapshots.iter().all(|info| info.current <= WORKERS * PER_WORKER));
    assert_eq!(snapshots.last().unwrap().current, WORKERS * PER_WORKER);
}

// ── formatting ─────────────────────────────────────────────────────

#[test]
fn rate_switches_to_kilo_frames() {
    assert_eq!(format_rate(24.0), "24.0 fps");
    assert_eq!(format_rate(1500.0), "1.5 Kfps");
}

#[test]
fn eta_uses_coarser_units_when_long() {
    assert_eq!(format_eta(Duration::from_secs(42)), "42s");
    assert_eq!(format_eta(Duration::from_secs(90)), "1.5m");
    assert_eq!(format_eta(Duration::from_secs(5400)), "1.5h");
}

#[test]
fn summary_display_mentions_counts() {
    let tracker = ProgressTracker::new(Arc::new(NoOpProgress), 12);
    tracker.record_audio(None);
    let text = tracker.finish().to_string();
    assert!(text.starts_with("Completed in "));
    assert!(text.contains("12 frames"));
    assert!(text.contains("1 audio packets"));
}
