//! Output filename templates.
//!
//! An [`OutputPattern`] is a printf-style template such as `frame_%05d.png`
//! that consumes one integer, the frame's sequence number. Supported
//! placeholders are `%d`, `%Nd` (space padded) and `%0Nd` (zero padded);
//! `%%` produces a literal percent sign.

use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use crate::error::ExtractError;

/// Longest template accepted, in bytes.
pub const MAX_PATTERN_LENGTH: usize = 4096;

/// A parsed output filename template.
///
/// # Example
///
/// ```
/// use frame_extractor::OutputPattern;
///
/// let pattern = OutputPattern::parse("frames/shot_%04d")?;
/// assert_eq!(pattern.render(42), "frames/shot_0042");
/// assert_eq!(
///     pattern.path_for(42, &["png"], "png").to_str(),
///     Some("frames/shot_0042.png"),
/// );
/// # Ok::<(), frame_extractor::ExtractError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPattern {
    template: String,
    prefix: String,
    suffix: String,
    placeholder: Option<Placeholder>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Placeholder {
    width: usize,
    zero_pad: bool,
}

impl OutputPattern {
    /// Parse a template.
    ///
    /// A template without a placeholder is accepted and renders to the same
    /// name for every frame; the extractor only allows that when a single
    /// frame is selected.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::ConfigurationError`] if the template is empty,
    /// longer than [`MAX_PATTERN_LENGTH`], has a field width that would render
    /// names longer than that, contains more than one integer placeholder, or
    /// contains any other `%` conversion.
    pub fn parse(template: &str) -> Result<Self, ExtractError> {
        if template.is_empty() {
            return Err(ExtractError::ConfigurationError(
                "output pattern must not be empty".to_string(),
            ));
        }
        if template.len() > MAX_PATTERN_LENGTH {
            return Err(ExtractError::ConfigurationError(format!(
                "output pattern is {} bytes long (limit {MAX_PATTERN_LENGTH})",
                template.len()
            )));
        }

        let mut prefix = String::new();
        let mut suffix = String::new();
        let mut placeholder = None;
        let mut chars = template.chars().peekable();

        while let Some(c) = chars.next() {
            if c != '%' {
                if placeholder.is_some() {
                    suffix.push(c);
                } else {
                    prefix.push(c);
                }
                continue;
            }

            if chars.peek() == Some(&'%') {
                chars.next();
                if placeholder.is_some() {
                    suffix.push('%');
                } else {
                    prefix.push('%');
                }
                continue;
            }

            let zero_pad = chars.next_if_eq(&'0').is_some();
            let mut digits = String::new();
            while let Some(digit) = chars.next_if(|d| d.is_ascii_digit()) {
                digits.push(digit);
            }
            match chars.next() {
                Some('d') | Some('i') | Some('u') => {}
                other => {
                    return Err(ExtractError::ConfigurationError(format!(
                        "unsupported conversion {:?} in output pattern {template:?}",
                        other.map(String::from).unwrap_or_default()
                    )));
                }
            }
            if placeholder.is_some() {
                return Err(ExtractError::ConfigurationError(format!(
                    "output pattern {template:?} has more than one frame number placeholder"
                )));
            }
            let width = if digits.is_empty() {
                0
            } else {
                digits.parse().map_err(|_| {
                    ExtractError::ConfigurationError(format!(
                        "invalid field width in output pattern {template:?}"
                    ))
                })?
            };
            placeholder = Some(Placeholder { width, zero_pad });
        }

        if let Some(Placeholder { width, .. }) = placeholder {
            let rendered = prefix.len().saturating_add(width).saturating_add(suffix.len());
            if rendered > MAX_PATTERN_LENGTH {
                return Err(ExtractError::ConfigurationError(format!(
                    "field width {width} in output pattern {template:?} exceeds the \
                     {MAX_PATTERN_LENGTH} byte name limit"
                )));
            }
        }

        Ok(Self {
            template: template.to_string(),
            prefix,
            suffix,
            placeholder,
        })
    }

    /// Whether the template consumes the sequence number.
    pub fn has_placeholder(&self) -> bool {
        self.placeholder.is_some()
    }

    /// The template as given.
    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Substitute `sequence` into the template.
    pub fn render(&self, sequence: u64) -> String {
        let mut name = String::with_capacity(self.template.len() + 20);
        name.push_str(&self.prefix);
        match self.placeholder {
            Some(Placeholder { width, zero_pad: true }) => {
                name.push_str(&format!("{sequence:0width$}"));
            }
            Some(Placeholder { width, zero_pad: false }) => {
                name.push_str(&format!("{sequence:>width$}"));
            }
            None => {}
        }
        name.push_str(&self.suffix);
        name
    }

    /// Render the path for `sequence`, appending `.{default_extension}` unless
    /// the rendered name already ends in one of `recognized` (compared
    /// case-insensitively).
    pub fn path_for(
        &self,
        sequence: u64,
        recognized: &[&str],
        default_extension: &str,
    ) -> PathBuf {
        let rendered = self.render(sequence);
        if has_extension(Path::new(&rendered), recognized) {
            PathBuf::from(rendered)
        } else {
            PathBuf::from(format!("{rendered}.{default_extension}"))
        }
    }
}

impl Default for OutputPattern {
    /// `frame_%d.png`.
    fn default() -> Self {
        Self {
            template: "frame_%d.png".to_string(),
            prefix: "frame_".to_string(),
            suffix: ".png".to_string(),
            placeholder: Some(Placeholder {
                width: 0,
                zero_pad: false,
            }),
        }
    }
}

impl Display for OutputPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.template)
    }
}

/// Returns `true` if `path` ends in one of `extensions` (case-insensitive).
pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|known| known.eq_ignore_ascii_case(ext)))
}
