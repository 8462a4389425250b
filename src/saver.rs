//! Frame saver workers.
//!
//! A [`SaverPool`] is a fixed set of named threads draining the shared
//! [`FrameQueue`]. Each popped frame is written to the path its sequence
//! number renders to, then dropped, and one unit of progress is reported.
//! A frame that fails to convert, encode or write is logged and counted; the
//! worker moves on to the next one.
//!
//! With one worker, files are written in queue order. With several, the
//! order in which files appear on disk is not defined.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::PathBuf,
    sync::Arc,
    thread::{self, JoinHandle},
};

use crate::{
    configuration::SaveMode,
    convert::RgbConverter,
    error::ExtractError,
    frame::{QueuedFrame, write_planar_yuv420},
    pattern::OutputPattern,
    progress::ProgressTracker,
    queue::FrameQueue,
};

/// Naming and encoding shared by every worker.
#[derive(Debug, Clone)]
pub struct SaveSettings {
    /// Output filename template.
    pub pattern: OutputPattern,
    /// Raster or raw planar output.
    pub mode: SaveMode,
}

impl SaveSettings {
    /// Create settings from a pattern and a mode.
    pub fn new(pattern: OutputPattern, mode: SaveMode) -> Self {
        Self { pattern, mode }
    }

    /// Output path for `sequence`, with the mode's extension appended when
    /// the rendered name does not already carry one.
    pub fn path_for(&self, sequence: u64) -> PathBuf {
        self.pattern.path_for(
            sequence,
            self.mode.recognized_extensions(),
            self.mode.extension(),
        )
    }
}

/// Writes single frames to disk. Owned by one worker thread.
pub struct FrameSaver {
    settings: Arc<SaveSettings>,
    converter: RgbConverter,
}

impl FrameSaver {
    /// Create a saver with an empty conversion cache.
    pub fn new(settings: Arc<SaveSettings>) -> Self {
        Self {
            settings,
            converter: RgbConverter::new(),
        }
    }

    /// Persist `item` and return the path written.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::UnsupportedPixelLayout`] for raw output of a
    ///   non-4:2:0 frame.
    /// - [`ExtractError::FfmpegError`] or [`ExtractError::ImageError`] if
    ///   conversion or encoding fails.
    /// - [`ExtractError::IoError`] if the file cannot be written.
    pub fn save(&mut self, item: &QueuedFrame) -> Result<PathBuf, ExtractError> {
        let path = self.settings.path_for(item.sequence);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        match self.settings.mode {
            SaveMode::RawPlanar => {
                let mut writer = BufWriter::new(File::create(&path)?);
                write_planar_yuv420(&item.frame, &mut writer)?;
                writer.flush()?;
            }
            SaveMode::Raster(format) => {
                let image = self.converter.convert(&item.frame)?;
                image.save_with_format(&path, format.image_format())?;
            }
        }
        Ok(path)
    }
}

/// Per-run counts of saver outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaveSummary {
    /// Frames popped from the queue.
    pub attempted: u64,
    /// Frames written successfully.
    pub saved: u64,
    /// Frames that failed to convert, encode or write.
    pub failed: u64,
}

impl SaveSummary {
    fn merge(&mut self, other: SaveSummary) {
        self.attempted += other.attempted;
        self.saved += other.saved;
        self.failed += other.failed;
    }
}

/// A running pool of saver threads.
pub struct SaverPool {
    handles: Vec<JoinHandle<SaveSummary>>,
}

impl SaverPool {
    /// Start `workers` threads draining `queue`.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::ConfigurationError`] for zero workers, or
    /// [`ExtractError::IoError`] if a thread cannot be spawned. Threads
    /// already started are released by signalling the queue done before
    /// returning.
    pub fn spawn(
        workers: usize,
        queue: Arc<FrameQueue<QueuedFrame>>,
        settings: Arc<SaveSettings>,
        tracker: Arc<ProgressTracker>,
    ) -> Result<Self, ExtractError> {
        if workers == 0 {
            return Err(ExtractError::ConfigurationError(
                "at least one saver thread is required".to_string(),
            ));
        }

        let mut handles = Vec::with_capacity(workers);
        for index in 0..workers {
            let queue_for_worker = Arc::clone(&queue);
            let settings = Arc::clone(&settings);
            let tracker = Arc::clone(&tracker);
            let spawned = thread::Builder::new()
                .name(format!("frame-saver-{index}"))
                .spawn(move || run_worker(index, &queue_for_worker, settings, &tracker));

            match spawned {
                Ok(handle) => handles.push(handle),
                Err(error) => {
                    queue.signal_done();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(error.into());
                }
            }
        }

        log::debug!("Started {workers} saver thread(s)");
        Ok(Self { handles })
    }

    /// Number of running threads.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns `true` if the pool has no threads.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every worker to exit and combine their counts.
    ///
    /// The queue must have been signalled done first, or this blocks
    /// forever.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::WorkerPanicked`] if any worker panicked. All
    /// workers are joined before the error is returned.
    pub fn join(self) -> Result<SaveSummary, ExtractError> {
        let mut summary = SaveSummary::default();
        let mut panicked = None;

        for handle in self.handles {
            let name = handle.thread().name().unwrap_or("frame-saver").to_string();
            match handle.join() {
                Ok(counts) => summary.merge(counts),
                Err(_) => panicked = Some(name),
            }
        }

        match panicked {
            Some(name) => Err(ExtractError::WorkerPanicked(name)),
            None => Ok(summary),
        }
    }
}

fn run_worker(
    index: usize,
    queue: &FrameQueue<QueuedFrame>,
    settings: Arc<SaveSettings>,
    tracker: &ProgressTracker,
) -> SaveSummary {
    let mut saver = FrameSaver::new(settings);
    let mut counts = SaveSummary::default();

    while let Some(item) = queue.pop() {
        counts.attempted += 1;
        match saver.save(&item) {
            Ok(path) => {
                counts.saved += 1;
                log::debug!("Saved frame {} to {}", item.sequence, path.display());
            }
            Err(error) => {
                counts.failed += 1;
                log::warn!("Failed to save frame {}: {error}", item.sequence);
            }
        }
        drop(item);
        tracker.update(1, 0);
    }

    log::debug!(
        "Saver {index} finished: {} saved, {} failed",
        counts.saved,
        counts.failed
    );
    counts
}
