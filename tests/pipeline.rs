//! Decode driver tests against an in-memory frame source, plus a full
//! driver-to-disk run through the saver pool.

use std::{collections::VecDeque, fs, sync::Arc, thread, time::Duration};

use ffmpeg_next::{format::Pixel, frame::Video as VideoFrame};
use frame_extractor::{
    ExtractError, ExtractionPlan, FrameNumbering, FrameQueue, FrameSource, NoOpProgress,
    OutputPattern, ProgressTracker, QueuedFrame, SaveMode, SaveSettings, SaverPool,
    SelectionPolicy, drive,
};

/// Yields tiny frames carrying the given sequence numbers and counts how
/// many were pulled.
struct FakeSource {
    pending: VecDeque<u64>,
    pulled: u64,
}

impl FakeSource {
    fn new(sequences: impl IntoIterator<Item = u64>) -> Self {
        ffmpeg_next::init().unwrap();
        Self {
            pending: sequences.into_iter().collect(),
            pulled: 0,
        }
    }
}

impl FrameSource for FakeSource {
    fn next_frame(&mut self) -> Result<Option<(u64, VideoFrame)>, ExtractError> {
        let Some(sequence) = self.pending.pop_front() else {
            return Ok(None);
        };
        self.pulled += 1;
        Ok(Some((sequence, VideoFrame::new(Pixel::YUV420P, 8, 8))))
    }
}

struct FailingSource {
    remaining: u32,
}

impl FrameSource for FailingSource {
    fn next_frame(&mut self) -> Result<Option<(u64, VideoFrame)>, ExtractError> {
        if self.remaining == 0 {
            return Err(ExtractError::VideoDecodeError("corrupt stream".to_string()));
        }
        self.remaining -= 1;
        Ok(Some((0, VideoFrame::new(Pixel::YUV420P, 8, 8))))
    }
}

fn drain(queue: &FrameQueue<QueuedFrame>) -> Vec<u64> {
    queue.signal_done();
    std::iter::from_fn(|| queue.pop())
        .map(|item| item.sequence)
        .collect()
}

fn tracker(total: u64) -> ProgressTracker {
    ProgressTracker::new(Arc::new(NoOpProgress), total)
}

// ── drive ──────────────────────────────────────────────────────────

#[test]
fn drive_pushes_only_planned_frames() {
    let policy = SelectionPolicy::Range {
        start: Some(10),
        end: Some(30),
        step: 10,
    };
    let plan = ExtractionPlan::resolve(&policy, 100, 25.0).unwrap();
    let mut source = FakeSource::new(0..100);
    let queue = FrameQueue::new(16).unwrap();
    let tracker = tracker(plan.len());

    let stats = drive(&mut source, &plan, &queue, &tracker).unwrap();

    assert_eq!(stats.pushed, 3);
    assert_eq!(drain(&queue), vec![10, 20, 30]);
}

#[test]
fn drive_stops_once_the_plan_is_met() {
    let plan = ExtractionPlan::resolve(&SelectionPolicy::Frames(vec![2, 4]), 1000, 25.0).unwrap();
    let mut source = FakeSource::new(0..1000);
    let queue = FrameQueue::new(4).unwrap();

    let stats = drive(&mut source, &plan, &queue, &tracker(plan.len())).unwrap();

    // Frame 4 completes the plan; nothing after it is decoded.
    assert_eq!(stats.decoded, 5);
    assert_eq!(source.pulled, 5);
    assert_eq!(drain(&queue), vec![2, 4]);
}

#[test]
fn drive_stops_past_the_window() {
    let policy = SelectionPolicy::Range {
        start: Some(0),
        end: Some(5),
        step: 1,
    };
    let plan = ExtractionPlan::resolve(&policy, 100, 25.0).unwrap();
    // A gap in the numbering leaves frame 5 unseen, so the driver has to
    // notice it has moved past the window.
    let mut source = FakeSource::new([0, 1, 2, 3, 4, 7, 8, 9]);
    let queue = FrameQueue::new(16).unwrap();

    let stats = drive(&mut source, &plan, &queue, &tracker(plan.len())).unwrap();

    assert_eq!(stats.decoded, 6);
    assert_eq!(stats.pushed, 5);
    assert_eq!(source.pulled, 6);
}

#[test]
fn drive_tolerates_a_short_video() {
    let plan = ExtractionPlan::resolve(&SelectionPolicy::all(), 50, 25.0).unwrap();
    let mut source = FakeSource::new(0..20);
    let queue = FrameQueue::new(64).unwrap();

    let stats = drive(&mut source, &plan, &queue, &tracker(plan.len())).unwrap();

    assert_eq!(stats.decoded, 20);
    assert_eq!(stats.pushed, 20);
}

#[test]
fn drive_reports_decoded_frames_to_progress() {
    let plan = ExtractionPlan::resolve(&SelectionPolicy::single(9), 10, 25.0).unwrap();
    let mut source = FakeSource::new(0..10);
    let queue = FrameQueue::new(1).unwrap();
    let tracker = tracker(plan.len());

    drive(&mut source, &plan, &queue, &tracker).unwrap();

    // Decoding is not saving: nothing has completed yet.
    assert_eq!(tracker.completed(), 0);
}

#[test]
fn drive_propagates_decoder_errors() {
    let plan = ExtractionPlan::resolve(&SelectionPolicy::all(), 10, 25.0).unwrap();
    let mut source = FailingSource { remaining: 1 };
    let queue = FrameQueue::new(4).unwrap();

    let result = drive(&mut source, &plan, &queue, &tracker(plan.len()));
    assert!(matches!(result, Err(ExtractError::VideoDecodeError(_))));
}

#[test]
fn drive_fails_when_the_queue_is_closed() {
    let plan = ExtractionPlan::resolve(&SelectionPolicy::all(), 10, 25.0).unwrap();
    let mut source = FakeSource::new(0..10);
    let queue = FrameQueue::new(4).unwrap();
    queue.signal_done();

    let result = drive(&mut source, &plan, &queue, &tracker(plan.len()));
    assert!(matches!(result, Err(ExtractError::WorkerPanicked(_))));
}

#[test]
fn drive_blocks_on_a_full_queue_until_drained() {
    let plan = ExtractionPlan::resolve(&SelectionPolicy::all(), 40, 25.0).unwrap();
    let queue = Arc::new(FrameQueue::new(2).unwrap());

    let consumer = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || {
            let mut seen = Vec::new();
            while let Some(item) = queue.pop() {
                assert!(queue.len() <= 2);
                seen.push(item.sequence);
                thread::sleep(Duration::from_millis(1));
            }
            seen
        })
    };

    let mut source = FakeSource::new(0..40);
    let stats = drive(&mut source, &plan, &queue, &tracker(plan.len())).unwrap();
    queue.signal_done();

    assert_eq!(stats.pushed, 40);
    assert_eq!(consumer.join().unwrap(), (0..40).collect::<Vec<_>>());
}

// ── numbering ──────────────────────────────────────────────────────

#[test]
fn sequential_numbering_ignores_timestamps() {
    let mut numbering = FrameNumbering::sequential();
    assert_eq!(numbering.number(Some(50)), Some(0));
    assert_eq!(numbering.number(None), Some(1));
    assert_eq!(numbering.number(Some(3)), Some(2));
}

#[test]
fn anchored_numbering_follows_output_order() {
    // B-frame reordering: presentation timestamps arrive out of order after
    // a seek, but output numbering still counts up from the anchor.
    let mut numbering = FrameNumbering::anchored();
    let timestamps = [Some(120), Some(123), Some(121), Some(122), None];
    let numbers: Vec<_> = timestamps
        .into_iter()
        .map(|index| numbering.number(index))
        .collect();
    assert_eq!(
        numbers,
        vec![Some(120), Some(121), Some(122), Some(123), Some(124)]
    );
}

#[test]
fn anchored_numbering_needs_a_timestamp() {
    let mut numbering = FrameNumbering::anchored();
    assert_eq!(numbering.number(None), None);
    // Still waiting for an anchor.
    assert_eq!(numbering.number(Some(7)), Some(7));
}

// ── driver to disk ─────────────────────────────────────────────────

#[test]
fn fake_source_through_saver_pool() {
    let dir = tempfile::tempdir().unwrap();
    let template = dir.path().join("frames/frame_%03d");
    let pattern = OutputPattern::parse(template.to_str().unwrap()).unwrap();
    let settings = Arc::new(SaveSettings::new(pattern, SaveMode::RawPlanar));

    let policy = SelectionPolicy::Range {
        start: Some(4),
        end: Some(24),
        step: 4,
    };
    let plan = ExtractionPlan::resolve(&policy, 30, 25.0).unwrap();
    let tracker = Arc::new(tracker(plan.len()));
    let queue = Arc::new(FrameQueue::new(2).unwrap());
    let pool = SaverPool::spawn(
        3,
        Arc::clone(&queue),
        Arc::clone(&settings),
        Arc::clone(&tracker),
    )
    .unwrap();

    let mut source = FakeSource::new(0..30);
    let stats = drive(&mut source, &plan, &queue, &tracker).unwrap();
    queue.signal_done();
    let saved = pool.join().unwrap();
    let summary = tracker.finish();

    assert_eq!(stats.pushed, 6);
    assert_eq!(saved.saved, 6);
    assert_eq!(summary.frames, 6);

    let mut names: Vec<String> = fs::read_dir(dir.path().join("frames"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(
        names,
        [
            "frame_004.yuv",
            "frame_008.yuv",
            "frame_012.yuv",
            "frame_016.yuv",
            "frame_020.yuv",
            "frame_024.yuv"
        ]
    );
}
