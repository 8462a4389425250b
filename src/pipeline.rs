//! The extraction pipeline.
//!
//! [`Extractor::run`] wires the pieces together for one job:
//!
//! 1. Probe the external tools the job needs, once.
//! 2. Fetch a remote source, if the input is a URL.
//! 3. Open the media and resolve the selection into an [`ExtractionPlan`].
//! 4. Start the saver pool and, optionally, the audio side-task.
//! 5. Decode on the calling thread with [`drive`], pushing selected frames
//!    into the bounded queue.
//! 6. Signal the queue done, join the savers, join the audio task, and
//!    finish progress.
//!
//! Step 6 runs even when decoding fails, so no worker thread outlives the
//! call.

use std::{
    path::PathBuf,
    sync::Arc,
    thread::JoinHandle,
    time::Instant,
};

use crate::{
    audio::{AudioOptions, AudioWindow, extract_audio, spawn_audio},
    configuration::{AudioMode, ExtractionConfig, InputSource},
    decoder::{FrameSource, StreamDecoder},
    download::{DownloadedFile, Downloader},
    error::ExtractError,
    frame::QueuedFrame,
    media::MediaSource,
    metadata::MediaMetadata,
    progress::{ProgressInfo, ProgressSummary, ProgressTracker},
    queue::FrameQueue,
    saver::{SaveSettings, SaveSummary, SaverPool},
    selection::{ExtractionPlan, SelectionPolicy},
    tool::ProgressEvent,
};

/// Counts reported by [`drive`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriveStats {
    /// Frames received from the decoder.
    pub decoded: u64,
    /// Frames pushed into the queue.
    pub pushed: u64,
}

/// Pull frames from `source` and push the ones in `plan` into `queue`.
///
/// Stops when every planned frame has been pushed, when a frame past the
/// plan's window is decoded, or when the source is exhausted. Frames not in
/// the plan are dropped immediately.
///
/// # Errors
///
/// Propagates decoder errors. Returns [`ExtractError::WorkerPanicked`] if
/// the queue was closed underneath the driver.
pub fn drive<S: FrameSource + ?Sized>(
    source: &mut S,
    plan: &ExtractionPlan,
    queue: &FrameQueue<QueuedFrame>,
    tracker: &ProgressTracker,
) -> Result<DriveStats, ExtractError> {
    let wanted = plan.len();
    let mut stats = DriveStats::default();

    while stats.pushed < wanted {
        let Some((sequence, frame)) = source.next_frame()? else {
            break;
        };
        stats.decoded += 1;
        tracker.record_decoded(1);

        if sequence > plan.end_frame() {
            break;
        }
        if !plan.contains(sequence) {
            continue;
        }

        queue.push(QueuedFrame::new(sequence, frame)).map_err(|_| {
            ExtractError::WorkerPanicked("frame queue closed during decoding".to_string())
        })?;
        stats.pushed += 1;
    }

    if stats.pushed < wanted {
        log::warn!(
            "Video ended after {} of {wanted} selected frame(s)",
            stats.pushed
        );
    }
    log::debug!(
        "Decoded {} frame(s), queued {}",
        stats.decoded,
        stats.pushed
    );
    Ok(stats)
}

/// Result of the audio side-task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioOutcome {
    /// Audio was written to this path.
    Written(PathBuf),
    /// The task failed; frame extraction was not affected.
    Failed(String),
}

/// Summary of a finished run.
#[derive(Debug, Clone)]
pub struct ExtractionReport {
    /// Local media path that was processed.
    pub input: PathBuf,
    /// Metadata of the video, when frames were extracted.
    pub metadata: Option<MediaMetadata>,
    /// Number of frames the plan selected.
    pub planned: u64,
    /// Decoder and queue counts.
    pub drive: DriveStats,
    /// Saver outcomes.
    pub saved: SaveSummary,
    /// Audio side-task outcome, if audio was requested.
    pub audio: Option<AudioOutcome>,
    /// Final progress figures.
    pub progress: ProgressSummary,
    /// Downloaded source file that was kept on disk.
    pub kept_download: Option<PathBuf>,
}

/// Runs one extraction job.
///
/// # Example
///
/// ```no_run
/// use frame_extractor::{ExtractionConfig, Extractor, SelectionPolicy};
///
/// let config = ExtractionConfig::new("input.mp4")
///     .with_output_pattern("frame_%04d.png")?
///     .with_selection(SelectionPolicy::Frames(vec![0, 10, 20]));
/// let report = Extractor::new(config)?.run()?;
/// println!("saved {} frames", report.saved.saved);
/// # Ok::<(), frame_extractor::ExtractError>(())
/// ```
#[derive(Debug)]
pub struct Extractor {
    config: ExtractionConfig,
}

impl Extractor {
    /// Validate `config` and build an extractor.
    ///
    /// # Errors
    ///
    /// Returns the first configuration problem found.
    pub fn new(config: ExtractionConfig) -> Result<Self, ExtractError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The configuration this extractor runs.
    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Run the job to completion.
    ///
    /// # Errors
    ///
    /// Returns fatal errors: missing tools, download failure, unopenable
    /// input, no video stream, unknown duration, decoder failure, empty
    /// selection, or invalid configuration. Per-frame save failures and
    /// audio failures alongside frames are reported in the
    /// [`ExtractionReport`] instead.
    pub fn run(&self) -> Result<ExtractionReport, ExtractError> {
        let config = &self.config;

        if config.audio_mode != AudioMode::Disabled {
            config.ffmpeg.check_available()?;
        }
        if matches!(config.input, InputSource::Url { .. }) {
            config.downloader.check_available()?;
        }

        let download = self.fetch_input()?;
        let input = match (&download, &config.input) {
            (Some(file), _) => file.path().to_path_buf(),
            (None, InputSource::File(path)) => path.clone(),
            (None, InputSource::Url { url, .. }) => {
                return Err(ExtractError::DownloadMissing(url.clone()));
            }
        };
        let kept_download = download
            .as_ref()
            .filter(|_| config.keep_download)
            .map(|file| file.path().to_path_buf());

        let audio_options = self.audio_options();

        let mut report = if config.audio_mode == AudioMode::Only {
            self.run_audio_only(input, &audio_options)?
        } else {
            self.run_frames(input, audio_options)?
        };
        report.kept_download = kept_download;
        Ok(report)
    }

    fn fetch_input(&self) -> Result<Option<DownloadedFile>, ExtractError> {
        let config = &self.config;
        let InputSource::Url { url, format } = &config.input else {
            return Ok(None);
        };

        let selector = format.selector(config.audio_mode, config.has_explicit_selection());
        let downloader = Downloader::new(config.downloader.clone(), &config.download_dir);
        let started = Instant::now();
        let callback = Arc::clone(&config.progress);

        let mut file = downloader.download(url, selector, |event| match event {
            ProgressEvent::Percent(percent) => {
                callback.on_progress(&ProgressInfo::download(percent, started.elapsed(), false));
            }
            ProgressEvent::Finished => {
                callback.on_progress(&ProgressInfo::download(100.0, started.elapsed(), true));
            }
            _ => {}
        })?;
        file.set_keep(config.keep_download);
        Ok(Some(file))
    }

    // An explicit window wins; otherwise a time-range selection also bounds
    // the audio.
    /// A time-range selection bounds the audio unless a window was set.
    /// A zero-length range leaves the audio unbounded.
    fn audio_options(&self) -> AudioOptions {
        let mut options = self.config.audio.clone();
        if options.window.is_none() && self.config.audio_mode != AudioMode::Disabled {
            if let SelectionPolicy::TimeRange { start, end, .. } = self.config.selection {
                match AudioWindow::new(start, end) {
                    Ok(window) => options.window = Some(window),
                    Err(error) => log::warn!("Extracting full audio track: {error}"),
                }
            }
        }
        options
    }

    fn run_audio_only(
        &self,
        input: PathBuf,
        options: &AudioOptions,
    ) -> Result<ExtractionReport, ExtractError> {
        let tracker = self.tracker(0);
        let written = extract_audio(&self.config.ffmpeg, &input, options, &tracker)?;
        let progress = tracker.finish();

        Ok(ExtractionReport {
            input,
            metadata: None,
            planned: 0,
            drive: DriveStats::default(),
            saved: SaveSummary::default(),
            audio: Some(AudioOutcome::Written(written)),
            progress,
            kept_download: None,
        })
    }

    fn run_frames(
        &self,
        input: PathBuf,
        audio_options: AudioOptions,
    ) -> Result<ExtractionReport, ExtractError> {
        let config = &self.config;

        let mut media = MediaSource::open(&input)?;
        let metadata = media.metadata().clone();
        let plan = ExtractionPlan::resolve(
            &config.selection,
            metadata.video.frame_count,
            metadata.video.frames_per_second,
        )?;

        if !config.output.has_placeholder() && plan.len() > 1 {
            return Err(ExtractError::ConfigurationError(format!(
                "output pattern {:?} has no frame number placeholder but {} frames are selected",
                config.output.as_str(),
                plan.len()
            )));
        }

        log::info!(
            "Extracting {} frame(s) from {} to {}",
            plan.len(),
            input.display(),
            config.output
        );

        let tracker = Arc::new(self.tracker(plan.len()));
        let queue = Arc::new(FrameQueue::new(config.queue_capacity)?);
        let settings = Arc::new(SaveSettings::new(config.output.clone(), config.save_mode));
        let pool = SaverPool::spawn(
            config.workers,
            Arc::clone(&queue),
            settings,
            Arc::clone(&tracker),
        )?;

        let audio = if config.audio_mode == AudioMode::WithFrames {
            match spawn_audio(
                config.ffmpeg.clone(),
                input.clone(),
                audio_options,
                Arc::clone(&tracker),
            ) {
                Ok(handle) => Some(handle),
                Err(error) => {
                    queue.signal_done();
                    let _ = pool.join();
                    return Err(error);
                }
            }
        } else {
            None
        };

        let driven = StreamDecoder::new(&mut media, plan.start_frame())
            .and_then(|mut decoder| drive(&mut decoder, &plan, &queue, &tracker));

        queue.signal_done();
        let saved = pool.join();
        let audio = audio.map(join_audio);
        let drive = driven?;
        let saved = saved?;
        let progress = tracker.finish();

        if saved.failed > 0 {
            log::warn!("{} of {} frame(s) failed to save", saved.failed, saved.attempted);
        }

        Ok(ExtractionReport {
            input,
            metadata: Some(metadata),
            planned: plan.len(),
            drive,
            saved,
            audio,
            progress,
            kept_download: None,
        })
    }

    fn tracker(&self, total: u64) -> ProgressTracker {
        ProgressTracker::new(Arc::clone(&self.config.progress), total)
            .with_min_interval(self.config.progress_interval)
    }
}

fn join_audio(handle: JoinHandle<Result<PathBuf, ExtractError>>) -> AudioOutcome {
    match handle.join() {
        Ok(Ok(path)) => AudioOutcome::Written(path),
        Ok(Err(error)) => {
            log::warn!("Audio extraction failed: {error}");
            AudioOutcome::Failed(error.to_string())
        }
        Err(_) => {
            log::warn!("Audio extraction thread panicked");
            AudioOutcome::Failed("audio thread panicked".to_string())
        }
    }
}
