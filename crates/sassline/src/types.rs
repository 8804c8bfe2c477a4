use crate::options::SassOptions;
use crate::paths::{relative_to, to_slash};
use crate::sourcemap::SourceMap;
use serde::Deserialize;
use std::borrow::Cow;
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name used in error envelopes and log output
pub const PLUGIN_NAME: &str = "sassline";

/// Extension compiled units are rewritten to
pub const DEFAULT_OUTPUT_EXTENSION: &str = ".css";

/// Default source patterns, relative to the base directory
pub const DEFAULT_SOURCE_PATTERNS: &[&str] = &["**/*.{scss,sass}"];

/// Contents of a file unit as handed over by the upstream producer
pub enum Contents {
    /// No contents at all (e.g. a directory entry); passed through untouched
    Null,
    /// Streaming contents; not supported by the transform
    Stream(Box<dyn Read + Send>),
    /// Fully buffered contents
    Buffer(Vec<u8>),
}

impl Contents {
    pub fn len(&self) -> Option<usize> {
        match self {
            Contents::Buffer(bytes) => Some(bytes.len()),
            Contents::Null | Contents::Stream(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Contents::Buffer(bytes) => Some(bytes),
            Contents::Null | Contents::Stream(_) => None,
        }
    }
}

impl fmt::Debug for Contents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Contents::Null => f.write_str("Null"),
            Contents::Stream(_) => f.write_str("Stream(..)"),
            Contents::Buffer(bytes) => write!(f, "Buffer({} bytes)", bytes.len()),
        }
    }
}

impl From<Vec<u8>> for Contents {
    fn from(bytes: Vec<u8>) -> Self {
        Contents::Buffer(bytes)
    }
}

impl From<&str> for Contents {
    fn from(text: &str) -> Self {
        Contents::Buffer(text.as_bytes().to_vec())
    }
}

impl From<String> for Contents {
    fn from(text: String) -> Self {
        Contents::Buffer(text.into_bytes())
    }
}

/// One source file flowing through the pipeline
#[derive(Debug)]
pub struct FileUnit {
    /// Absolute location of the file
    pub path: PathBuf,

    /// Directory `path` is considered relative to
    pub base: PathBuf,

    pub contents: Contents,

    /// Source map state attached by an upstream collaborator
    pub source_map: Option<SourceMap>,
}

impl FileUnit {
    pub fn new(
        path: impl Into<PathBuf>,
        base: impl Into<PathBuf>,
        contents: impl Into<Contents>,
    ) -> Self {
        Self { path: path.into(), base: base.into(), contents: contents.into(), source_map: None }
    }

    /// Path relative to `base`
    pub fn relative(&self) -> PathBuf {
        match self.path.strip_prefix(&self.base) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => relative_to(&self.path, &self.base),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self.contents, Contents::Null)
    }

    pub fn is_stream(&self) -> bool {
        matches!(self.contents, Contents::Stream(_))
    }

    /// Contents decoded as UTF-8 (lossy); empty for null or streaming contents
    pub fn text(&self) -> Cow<'_, str> {
        match self.contents.as_bytes() {
            Some(bytes) => String::from_utf8_lossy(bytes),
            None => Cow::Borrowed(""),
        }
    }

    /// Attach an upstream source map
    pub fn with_source_map(mut self, map: SourceMap) -> Self {
        self.source_map = Some(map);
        self
    }

    /// Attach the identity map an upstream map initializer would produce:
    /// the file itself as the only source, with its current contents.
    pub fn init_source_map(mut self) -> Self {
        let relative = to_slash(&self.relative());
        let map = SourceMap::identity(&relative, &self.text());
        self.source_map = Some(map);
        self
    }
}

/// Configuration for compiling a directory of style sheets
#[derive(Debug, Clone)]
pub struct SassConfig {
    /// Source files to compile (glob patterns relative to `base`)
    pub src: Vec<String>,

    /// Base directory; output keeps paths relative to it
    pub base: PathBuf,

    /// Output directory
    pub dest: PathBuf,

    /// Patterns to ignore
    pub ignore: Vec<String>,

    /// Options handed to the compiler for every file
    pub options: SassOptions,

    /// Use the blocking compiler calling convention
    pub sync: bool,

    /// Generate and write source maps
    pub source_maps: bool,

    /// Compile partials (`_name.scss`) instead of dropping them
    pub include_partials: bool,
}

impl Default for SassConfig {
    fn default() -> Self {
        Self {
            src: DEFAULT_SOURCE_PATTERNS.iter().map(|s| (*s).to_string()).collect(),
            base: PathBuf::from("."),
            dest: PathBuf::from("dist"),
            ignore: Vec::new(),
            options: SassOptions::default(),
            sync: false,
            source_maps: false,
            include_partials: false,
        }
    }
}

/// Config file structure for sassline.json / sassline.jsonc
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileConfig {
    #[serde(default)]
    pub src: Vec<String>,

    #[serde(default)]
    pub base: Option<PathBuf>,

    #[serde(default)]
    pub dest: Option<PathBuf>,

    #[serde(default)]
    pub ignore: Vec<String>,

    #[serde(default)]
    pub options: Option<SassOptions>,

    #[serde(default)]
    pub sync: Option<bool>,

    #[serde(default)]
    pub source_maps: Option<bool>,

    #[serde(default)]
    pub include_partials: Option<bool>,
}

impl FileConfig {
    /// Load a config file, accepting comments (`.jsonc`)
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut content = std::fs::read_to_string(path)?;
        json_strip_comments::strip(&mut content).map_err(|e| ConfigError::Comments(e.to_string()))?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Error types for loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid comment syntax: {0}")]
    Comments(String),
}

/// Error types for a whole compile run
#[derive(Error, Debug)]
pub enum SasslineError {
    #[error("No source files found matching patterns: {0:?}")]
    NoSourceFiles(Vec<String>),

    #[error("Invalid base directory: {0}")]
    InvalidBase(#[source] std::io::Error),

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_relative_strips_base() {
        let unit = FileUnit::new("/proj/src/scss/app.scss", "/proj/src", "a {}");
        assert_eq!(unit.relative(), PathBuf::from("scss/app.scss"));
    }

    #[test]
    fn test_relative_outside_base() {
        let unit = FileUnit::new("/proj/other/app.scss", "/proj/src", "a {}");
        assert_eq!(unit.relative(), PathBuf::from("../other/app.scss"));
    }

    #[test]
    fn test_contents_states() {
        let null = FileUnit::new("/a.scss", "/", Contents::Null);
        assert!(null.is_null());
        assert_eq!(null.text(), "");

        let stream = FileUnit::new("/a.scss", "/", Contents::Stream(Box::new(std::io::empty())));
        assert!(stream.is_stream());
        assert_eq!(stream.contents.len(), None);

        let empty = FileUnit::new("/a.scss", "/", "");
        assert!(empty.contents.is_empty());
    }

    #[test]
    fn test_init_source_map() {
        let unit = FileUnit::new("/proj/scss/app.scss", "/proj", "a { b: c }").init_source_map();
        let map = unit.source_map.unwrap();
        assert_eq!(map.sources, vec!["scss/app.scss".to_string()]);
        assert_eq!(map.sources_content, Some(vec![Some("a { b: c }".to_string())]));
    }

    #[test]
    fn test_file_config_with_comments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sassline.jsonc");
        fs::write(
            &path,
            r#"{
                // where the sheets live
                "src": ["scss/**/*.scss"],
                "dest": "out",
                "sourceMaps": true,
                "options": { "includePaths": "vendor" }
            }"#,
        )
        .unwrap();

        let config = FileConfig::load(&path).unwrap();
        assert_eq!(config.src, vec!["scss/**/*.scss".to_string()]);
        assert_eq!(config.dest, Some(PathBuf::from("out")));
        assert_eq!(config.source_maps, Some(true));
        assert!(config.options.is_some());
    }

    #[test]
    fn test_file_config_invalid_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sassline.json");
        fs::write(&path, "invalid json").unwrap();

        assert!(matches!(FileConfig::load(&path), Err(ConfigError::Parse(_))));
    }
}
