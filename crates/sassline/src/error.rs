//! Error normalization.
//!
//! Compiler failures arrive as [`RawCompileError`] in whichever shape the
//! compiler produced. [`normalize`] turns every one of them into a
//! [`NormalizedError`], which is the only error shape the rest of the crate
//! and its consumers deal with.

use crate::compiler::RawCompileError;
use crate::paths::relative_to;
use crate::sourcemap::STDIN_MARKER;
use crate::types::PLUGIN_NAME;
use owo_colors::OwoColorize;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;

/// A compile failure in the uniform shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedError {
    /// `message_formatted` without terminal escape sequences
    pub message: String,

    /// Underlined relative path followed by the compiler's rendering of the error
    pub message_formatted: String,

    /// The compiler's message, exactly as reported
    pub message_original: String,

    /// Failing file relative to the working directory
    pub relative_path: PathBuf,

    /// Failing file, absolute
    pub file: PathBuf,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<u32>,
}

/// Error signalled for a single file unit
#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Streaming not supported")]
    StreamingNotSupported,

    #[error("{}", .0.message)]
    Compile(Box<NormalizedError>),

    #[error("Invalid source map from compiler for {path}: {source}")]
    SourceMap {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PluginError {
    /// Plugin the error originates from
    pub fn plugin(&self) -> &str {
        PLUGIN_NAME
    }

    pub fn normalized(&self) -> Option<&NormalizedError> {
        match self {
            PluginError::Compile(normalized) => Some(normalized),
            _ => None,
        }
    }

    /// File the error belongs to, when known
    pub fn path(&self) -> Option<&Path> {
        match self {
            PluginError::StreamingNotSupported => None,
            PluginError::Compile(normalized) => Some(&normalized.file),
            PluginError::SourceMap { path, .. } => Some(path),
        }
    }

    /// Message for display on a terminal
    pub fn message_formatted(&self) -> Cow<'_, str> {
        match self {
            PluginError::Compile(normalized) => Cow::Borrowed(&normalized.message_formatted),
            other => Cow::Owned(other.to_string()),
        }
    }
}

fn ansi_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]").unwrap())
}

/// Remove terminal color and style escape sequences
pub fn strip_ansi(text: &str) -> Cow<'_, str> {
    ansi_regex().replace_all(text, "")
}

/// Normalize a raw compiler failure for the unit at `unit_path`.
///
/// The compiler's `file` wins when it names a real file; the in-memory input
/// marker, or no file at all, falls back to the unit itself.
pub fn normalize(raw: RawCompileError, unit_path: &Path, cwd: &Path) -> NormalizedError {
    let (message_original, formatted, file, line, column) = match raw {
        RawCompileError::Formatted { message, formatted, file, line, column } => {
            (message, formatted, file, line, column)
        }
        RawCompileError::Plain(message) => (message, None, None, None, None),
    };

    let file = match file.as_deref() {
        Some(STDIN_MARKER) | Some("") | None => unit_path.to_path_buf(),
        Some(reported) => {
            let reported = Path::new(reported);
            if reported.is_absolute() {
                reported.to_path_buf()
            } else {
                cwd.join(reported)
            }
        }
    };
    let relative_path = relative_to(&file, cwd);

    let body = formatted.as_deref().unwrap_or(&message_original);
    let message_formatted = format!("{}\n{}", relative_path.display().underline(), body);
    let message = strip_ansi(&message_formatted).into_owned();

    NormalizedError {
        message,
        message_formatted,
        message_original,
        relative_path,
        file,
        line,
        column,
    }
}

/// Render an error the way [`log_error`] prints it
pub fn render_error(error: &PluginError) -> String {
    let mut rendered = format!("Error in plugin \"{}\"\nMessage:\n", error.plugin());
    for line in error.message_formatted().lines() {
        rendered.push_str("    ");
        rendered.push_str(line);
        rendered.push('\n');
    }
    if let Some(normalized) = error.normalized() {
        if let (Some(line), Some(column)) = (normalized.line, normalized.column) {
            rendered.push_str(&format!("Details:\n    line: {line}\n    column: {column}\n"));
        }
    }
    rendered
}

/// Write an error to stderr.
///
/// Meant as an error handler for a pipeline: it only reports, the pipeline
/// keeps going with the next unit.
pub fn log_error(error: &PluginError) {
    let mut stderr = std::io::stderr().lock();
    let _ = writeln!(stderr, "{}", render_error(error));
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formatted(file: Option<&str>) -> RawCompileError {
        RawCompileError::Formatted {
            message: "property \"font\" must be followed by a ':'".to_string(),
            formatted: Some(
                "Error: property \"font\" must be followed by a ':'\n        on line 2 of stdin"
                    .to_string(),
            ),
            file: file.map(str::to_string),
            line: Some(2),
            column: Some(9),
        }
    }

    #[test]
    fn test_stdin_falls_back_to_unit_path() {
        let err = normalize(
            formatted(Some("stdin")),
            Path::new("/proj/test/scss/error.scss"),
            Path::new("/proj"),
        );

        assert_eq!(err.file, PathBuf::from("/proj/test/scss/error.scss"));
        assert_eq!(err.relative_path, PathBuf::from("test/scss/error.scss"));
        assert_eq!(err.line, Some(2));
        assert_eq!(err.column, Some(9));
    }

    #[test]
    fn test_missing_file_falls_back_to_unit_path() {
        let err = normalize(formatted(None), Path::new("/proj/a.scss"), Path::new("/proj"));
        assert_eq!(err.relative_path, PathBuf::from("a.scss"));
    }

    #[test]
    fn test_reported_file_wins() {
        let err = normalize(
            formatted(Some("/proj/scss/_partial.scss")),
            Path::new("/proj/scss/main.scss"),
            Path::new("/proj"),
        );
        assert_eq!(err.relative_path, PathBuf::from("scss/_partial.scss"));

        let err = normalize(
            formatted(Some("scss/_x.scss")),
            Path::new("/proj/a.scss"),
            Path::new("/proj"),
        );
        assert_eq!(err.file, PathBuf::from("/proj/scss/_x.scss"));
    }

    #[test]
    fn test_messages() {
        let err = normalize(
            formatted(Some("stdin")),
            Path::new("/proj/test/error.scss"),
            Path::new("/proj"),
        );

        assert_eq!(err.message_original, "property \"font\" must be followed by a ':'");
        assert!(!err.message_original.contains("on line 2"));
        assert!(err.message_formatted.contains('\x1b'));
        assert!(!err.message.contains('\x1b'));
        assert!(err.message.starts_with("test/error.scss\n"));
        assert!(err.message.contains("on line 2 of stdin"));
    }

    #[test]
    fn test_plain_error_uses_message_as_body() {
        let err = normalize(
            RawCompileError::Plain("boom".to_string()),
            Path::new("/p/a.scss"),
            Path::new("/p"),
        );

        assert_eq!(err.message, "a.scss\nboom");
        assert_eq!(err.message_original, "boom");
        assert_eq!(err.line, None);
    }

    #[test]
    fn test_strip_ansi() {
        assert_eq!(strip_ansi("\x1b[4mpath\x1b[24m\nbody"), "path\nbody");
        assert_eq!(strip_ansi("\x1b[1;31mred\x1b[0m"), "red");
        assert_eq!(strip_ansi("plain"), "plain");
    }

    #[test]
    fn test_plugin_error_display() {
        assert_eq!(PluginError::StreamingNotSupported.to_string(), "Streaming not supported");

        let normalized = normalize(
            formatted(Some("stdin")),
            Path::new("/p/a.scss"),
            Path::new("/p"),
        );
        let message = normalized.message.clone();
        let err = PluginError::Compile(Box::new(normalized));
        assert_eq!(err.to_string(), message);
    }

    #[test]
    fn test_render_error() {
        let normalized = normalize(
            formatted(Some("stdin")),
            Path::new("/p/a.scss"),
            Path::new("/p"),
        );
        let rendered = render_error(&PluginError::Compile(Box::new(normalized)));

        assert!(rendered.starts_with("Error in plugin \"sassline\"\nMessage:\n    "));
        assert!(rendered.contains("line: 2"));
        assert!(rendered.contains("column: 9"));
    }

    #[test]
    fn test_serializes_camel_case() {
        let normalized = normalize(
            formatted(Some("stdin")),
            Path::new("/p/a.scss"),
            Path::new("/p"),
        );
        let json = serde_json::to_value(&normalized).unwrap();

        assert_eq!(json["relativePath"], "a.scss");
        assert!(json["messageOriginal"].is_string());
        assert!(json["messageFormatted"].is_string());
    }
}
