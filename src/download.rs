//! Remote sources via `yt-dlp`.
//!
//! A URL input is fetched into a local file before extraction starts. The
//! downloader is asked to print the final file path (`--print
//! after_move:filepath`), so nothing has to guess at the output name, and
//! its `[download]  42.0%` lines are surfaced as [`ProgressEvent`]s.

use std::{
    ffi::OsString,
    fs,
    path::{Path, PathBuf},
};

use crate::{
    configuration::AudioMode,
    error::ExtractError,
    tool::{ExternalTool, ProgressEvent},
};

/// Format selector passed to `yt-dlp -f`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FormatHint {
    /// Choose from the job: audio only, video with audio, or video only.
    #[default]
    Auto,
    /// A caller-supplied selector, passed through unchanged.
    Custom(String),
}

impl FormatHint {
    /// Resolve to a concrete selector.
    ///
    /// `explicit_selection` is `true` when the job selects specific frames
    /// rather than the whole video.
    pub fn selector(&self, audio: AudioMode, explicit_selection: bool) -> &str {
        match self {
            FormatHint::Custom(format) => format,
            FormatHint::Auto => match audio {
                AudioMode::Only => "bestaudio",
                AudioMode::WithFrames => "bestvideo+bestaudio",
                AudioMode::Disabled if explicit_selection => "bestvideo[ext=mp4]",
                AudioMode::Disabled => "best[ext=mp4]",
            },
        }
    }
}

/// Parse a `[download]  12.3% of ...` progress line.
pub fn parse_download_line(line: &str) -> Option<ProgressEvent> {
    let rest = line.trim_start().strip_prefix("[download]")?;
    let (number, _) = rest.trim_start().split_once('%')?;
    number
        .trim()
        .parse::<f32>()
        .ok()
        .map(|percent| ProgressEvent::Percent(percent.clamp(0.0, 100.0)))
}

/// A file fetched by [`Downloader::download`].
///
/// The file is removed when the value is dropped unless
/// [`set_keep`](DownloadedFile::set_keep) was called with `true`.
#[derive(Debug)]
pub struct DownloadedFile {
    path: PathBuf,
    keep: bool,
}

impl DownloadedFile {
    /// Local path of the downloaded media.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep or discard the file when this value is dropped.
    pub fn set_keep(&mut self, keep: bool) {
        self.keep = keep;
    }
}

impl Drop for DownloadedFile {
    fn drop(&mut self) {
        if self.keep {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => log::debug!("Removed downloaded file {}", self.path.display()),
            Err(error) => log::warn!(
                "Could not remove downloaded file {}: {error}",
                self.path.display()
            ),
        }
    }
}

/// Fetches remote media with `yt-dlp`.
#[derive(Debug, Clone)]
pub struct Downloader {
    tool: ExternalTool,
    directory: PathBuf,
}

impl Downloader {
    /// Download into `directory` using `tool`.
    pub fn new(tool: ExternalTool, directory: impl Into<PathBuf>) -> Self {
        Self {
            tool,
            directory: directory.into(),
        }
    }

    /// Argument vector for fetching `url` with format selector `format`.
    pub fn command_args(&self, url: &str, format: &str) -> Vec<OsString> {
        let template = self.directory.join("ytdl_%(title)s.%(ext)s");
        vec![
            "-f".into(),
            format.into(),
            "--newline".into(),
            "--progress".into(),
            "--print".into(),
            "after_move:filepath".into(),
            "-o".into(),
            template.into_os_string(),
            url.into(),
        ]
    }

    /// Fetch `url`, reporting progress through `on_progress`.
    ///
    /// # Errors
    ///
    /// - [`ExtractError::ExternalProcess`] if `yt-dlp` fails.
    /// - [`ExtractError::DownloadMissing`] if it succeeds without printing
    ///   the path of an existing file.
    pub fn download(
        &self,
        url: &str,
        format: &str,
        mut on_progress: impl FnMut(ProgressEvent),
    ) -> Result<DownloadedFile, ExtractError> {
        log::info!("Downloading {url} with format {format:?}");

        let mut printed = None;
        self.tool.run(self.command_args(url, format), |line| {
            if let Some(event) = parse_download_line(line) {
                on_progress(event);
            } else if !line.is_empty() && !line.starts_with('[') {
                printed = Some(PathBuf::from(line));
            }
        })?;
        on_progress(ProgressEvent::Finished);

        let path = printed
            .filter(|path| path.is_file())
            .ok_or_else(|| ExtractError::DownloadMissing(url.to_string()))?;
        log::info!("Downloaded {}", path.display());
        Ok(DownloadedFile { path, keep: false })
    }
}
