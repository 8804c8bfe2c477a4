use super::{CompileOutput, CompileResult, Compiler, RawCompileError};
use crate::options::{CompileOptions, OutputStyle, SourceMapRequest};
use crate::paths::{relative_to, to_slash};
use crate::sourcemap::{SourceMap, STDIN_MARKER, STDOUT_MARKER};
use regex::Regex;
use rustc_hash::FxHashSet;
use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Sass compiler backed by the `grass` crate.
///
/// grass has no source map support of its own. When a map is requested this
/// compiler records every stylesheet grass loads and returns a coarse map in
/// the libsass shape: the in-memory input as `stdin`, imports relative to the
/// compiled file's directory, contents embedded, no mappings.
pub struct GrassCompiler {
    quiet: bool,
}

impl GrassCompiler {
    pub fn new() -> Self {
        Self { quiet: true }
    }

    /// Let `@warn` and `@debug` output through to stderr
    pub fn with_warnings(mut self) -> Self {
        self.quiet = false;
        self
    }
}

impl Default for GrassCompiler {
    fn default() -> Self {
        Self::new()
    }
}

/// Filesystem that remembers the stylesheets grass reads.
///
/// The compiled file itself is served from memory so the unit's contents win
/// over whatever is on disk; it is not recorded.
#[derive(Debug)]
struct RecordingFs<'a> {
    entry: &'a Path,
    entry_data: &'a str,
    loaded: RefCell<Vec<(PathBuf, Vec<u8>)>>,
}

impl<'a> RecordingFs<'a> {
    fn new(entry: &'a Path, entry_data: &'a str) -> Self {
        Self { entry, entry_data, loaded: RefCell::new(Vec::new()) }
    }
}

impl ::grass::Fs for RecordingFs<'_> {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_file(&self, path: &Path) -> bool {
        path == self.entry || path.is_file()
    }

    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        if path == self.entry {
            return Ok(self.entry_data.as_bytes().to_vec());
        }
        let bytes = std::fs::read(path)?;
        self.loaded.borrow_mut().push((path.to_path_buf(), bytes.clone()));
        Ok(bytes)
    }
}

/// Matches the location trailer of a rendered grass error, e.g. `  stdin 1:13  root stylesheet`
/// or `./stdin:1:13`
fn location_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?m)^\s*(?:\./)?(\S+?)[ :](\d+):(\d+)\s*(?:\s\S.*)?$").unwrap()
    })
}

/// Split a rendered grass error into message, location and the full rendering
fn parse_error(rendered: &str) -> RawCompileError {
    let first_line = rendered.lines().next().unwrap_or_default();
    let message = first_line.strip_prefix("Error: ").unwrap_or(first_line).to_string();

    let location = location_regex().captures_iter(rendered).last();
    let file = location.as_ref().map(|cap| cap[1].to_string());
    let line = location.as_ref().and_then(|cap| cap[2].parse().ok());
    let column = location.as_ref().and_then(|cap| cap[3].parse().ok());

    RawCompileError::Formatted {
        message,
        formatted: Some(rendered.to_string()),
        file,
        line,
        column,
    }
}

fn build_map(
    request: &SourceMapRequest,
    data: &str,
    loaded: &[(PathBuf, Vec<u8>)],
) -> Result<String, serde_json::Error> {
    let map_dir = request.path.parent().unwrap_or_else(|| Path::new(""));
    let cwd = std::env::current_dir().unwrap_or_default();

    let mut seen = FxHashSet::default();
    let mut sources = vec![STDIN_MARKER.to_string()];
    let mut contents = vec![Some(data.to_string())];

    for (path, bytes) in loaded {
        let absolute = if path.is_absolute() { path.clone() } else { cwd.join(path) };
        let source = to_slash(&relative_to(&absolute, map_dir));
        if seen.insert(source.clone()) {
            sources.push(source);
            contents.push(Some(String::from_utf8_lossy(bytes).into_owned()));
        }
    }

    let mut map = SourceMap::identity(STDOUT_MARKER, "");
    map.sources = sources;
    map.sources_content = request.embed_contents.then_some(contents);
    map.to_json()
}

impl Compiler for GrassCompiler {
    fn name(&self) -> &str {
        "grass"
    }

    fn render_sync(&self, options: &CompileOptions) -> CompileResult {
        let fs = RecordingFs::new(&options.file, &options.data);

        let style = match options.output_style {
            OutputStyle::Expanded => ::grass::OutputStyle::Expanded,
            OutputStyle::Compressed => ::grass::OutputStyle::Compressed,
        };
        let syntax = if options.indented_syntax {
            ::grass::InputSyntax::Sass
        } else {
            ::grass::InputSyntax::Scss
        };

        let grass_options = ::grass::Options::default()
            .fs(&fs)
            .load_paths(options.include_paths.as_slice())
            .style(style)
            .input_syntax(syntax)
            .quiet(self.quiet);

        // Relative imports resolve against the file's own directory
        let mut css = ::grass::from_path(&options.file, &grass_options)
            .map_err(|err| parse_error(&err.to_string()))?;

        let map = match &options.source_map {
            Some(request) => {
                let map = build_map(request, &options.data, &fs.loaded.borrow()).map_err(|err| {
                    RawCompileError::Plain(format!("failed to serialize source map: {err}"))
                })?;
                if !request.omit_url {
                    if let Some(name) = request.path.file_stem() {
                        css.push_str(&format!(
                            "\n/*# sourceMappingURL={}.css.map */\n",
                            name.to_string_lossy()
                        ));
                    }
                }
                Some(map)
            }
            None => None,
        };

        Ok(CompileOutput { css: css.into_bytes(), map })
    }
}
