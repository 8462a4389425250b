//! External program invocation.
//!
//! The audio side-task and the remote downloader both drive a child process
//! (`ffmpeg` and `yt-dlp`). [`ExternalTool`] handles the parts they share:
//! a one-off availability probe, building the command from an argument
//! vector (never a shell string), streaming stdout line by line, and turning
//! a non-zero exit status into an [`ExtractError::ExternalProcess`].

use std::{
    ffi::{OsStr, OsString},
    io::{BufRead, BufReader, Read},
    path::PathBuf,
    process::{Command, Stdio},
    thread,
    time::Duration,
};

use crate::error::ExtractError;

/// Most stderr bytes kept for an error message.
const STDERR_TAIL_LIMIT: usize = 2048;

/// A progress report parsed from a child process's output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressEvent {
    /// Media time processed so far.
    Elapsed(Duration),
    /// Completion percentage (0.0 – 100.0).
    Percent(f32),
    /// End of one progress block; more will follow.
    Checkpoint,
    /// The final progress block.
    Finished,
}

/// An external program the crate shells out to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalTool {
    name: &'static str,
    program: PathBuf,
    version_flag: &'static str,
    install_hint: &'static str,
}

impl ExternalTool {
    /// The `ffmpeg` executable, used for audio extraction.
    pub fn ffmpeg() -> Self {
        Self {
            name: "ffmpeg",
            program: PathBuf::from("ffmpeg"),
            version_flag: "-version",
            install_hint: "install FFmpeg and make sure `ffmpeg` is on PATH",
        }
    }

    /// The `yt-dlp` executable, used to fetch remote sources.
    pub fn yt_dlp() -> Self {
        Self {
            name: "yt-dlp",
            program: PathBuf::from("yt-dlp"),
            version_flag: "--version",
            install_hint: "install with `pip install yt-dlp`",
        }
    }

    /// Use a different executable path for the same tool.
    #[must_use]
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Short tool name used in messages.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Executable that will be run.
    pub fn program(&self) -> &PathBuf {
        &self.program
    }

    /// Run the tool's version command and fail if it cannot be executed.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::ToolUnavailable`] when the program is missing
    /// or exits unsuccessfully.
    pub fn check_available(&self) -> Result<(), ExtractError> {
        let unavailable = || ExtractError::ToolUnavailable {
            tool: self.name.to_string(),
            hint: self.install_hint.to_string(),
        };

        let status = Command::new(&self.program)
            .arg(self.version_flag)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map_err(|error| {
                log::debug!("{} probe failed: {error}", self.name);
                unavailable()
            })?;

        if !status.success() {
            return Err(unavailable());
        }
        log::debug!("{} is available at {}", self.name, self.program.display());
        Ok(())
    }

    /// Run the tool with `args`, calling `on_line` for each stdout line.
    ///
    /// Stderr is drained on a helper thread and its tail is attached to the
    /// error when the process fails.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::ExternalProcess`] if the process cannot be
    /// started or exits with a non-zero status.
    pub fn run<I, S>(&self, args: I, mut on_line: impl FnMut(&str)) -> Result<(), ExtractError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        log::debug!("Running {} {:?}", self.program.display(), args);

        let failed = |reason: String| ExtractError::ExternalProcess {
            tool: self.name.to_string(),
            reason,
        };

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|error| failed(format!("could not start: {error}")))?;

        let stderr_reader = child.stderr.take().map(|stderr| {
            thread::spawn(move || {
                let mut captured = Vec::new();
                let _ = BufReader::new(stderr).read_to_end(&mut captured);
                captured
            })
        });

        if let Some(stdout) = child.stdout.take() {
            for line in BufReader::new(stdout).lines() {
                match line {
                    Ok(line) => on_line(line.trim_end()),
                    Err(error) => {
                        log::debug!("{} stdout read error: {error}", self.name);
                        break;
                    }
                }
            }
        }

        let status = child
            .wait()
            .map_err(|error| failed(format!("could not wait for process: {error}")))?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&stderr);
        let tail = stderr.trim();
        let tail = match tail.char_indices().rev().nth(STDERR_TAIL_LIMIT) {
            Some((index, _)) => &tail[index..],
            None => tail,
        };
        Err(failed(if tail.is_empty() {
            format!("exited with {status}")
        } else {
            format!("exited with {status}: {tail}")
        }))
    }
}
