use napi::bindgen_prelude::*;
use napi_derive::napi;
use sassline::{
    FileUnit, GrassCompiler, IncludePaths, Outcome, OutputStyle, PluginError, SassOptions,
    SassTransform,
};
use std::path::PathBuf;
use std::sync::Arc;

/// A style sheet handed over from JavaScript
#[napi(object)]
pub struct SassFile {
    /// Absolute path of the file
    pub path: String,

    /// Base directory (defaults to the file's directory)
    pub base: Option<String>,

    /// File contents; `null` passes the file through untouched
    pub contents: Option<String>,

    /// Attach an initial source map and return a reconciled one
    pub source_map: Option<bool>,
}

/// Options for compiling a file
#[napi(object)]
pub struct SassCompileOptions {
    /// Additional include paths for imports
    pub include_paths: Option<Vec<String>>,

    /// Parse the contents as indented syntax
    pub indented_syntax: Option<bool>,

    /// `expanded` (default) or `compressed`
    pub output_style: Option<String>,

    /// Compile partials instead of skipping them
    pub include_partials: Option<bool>,

    /// Directory error paths are reported relative to (defaults to current directory)
    pub cwd: Option<String>,
}

/// Normalized compile error
#[napi(object)]
pub struct SassError {
    pub plugin: String,
    pub message: String,
    pub message_formatted: String,
    pub message_original: Option<String>,
    pub relative_path: Option<String>,
    pub file: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

/// Result of compiling one file
#[napi(object)]
pub struct CompiledFile {
    /// `emitted`, `skipped` or `failed`
    pub status: String,

    /// Output path (with the `.css` extension once compiled)
    pub path: Option<String>,

    pub contents: Option<String>,

    /// Reconciled source map as JSON
    pub source_map: Option<String>,

    pub error: Option<SassError>,
}

fn build_transform(options: Option<SassCompileOptions>) -> Result<SassTransform> {
    let Some(options) = options else {
        return Ok(SassTransform::new(Arc::new(GrassCompiler::new()), None));
    };

    let output_style = match options.output_style.as_deref() {
        None | Some("expanded") => OutputStyle::Expanded,
        Some("compressed") => OutputStyle::Compressed,
        Some(other) => return Err(Error::from_reason(format!("Unknown output style: {other}"))),
    };

    let sass_options = SassOptions {
        include_paths: options
            .include_paths
            .map(|paths| IncludePaths::Many(paths.into_iter().map(PathBuf::from).collect())),
        indented_syntax: options.indented_syntax.unwrap_or_default(),
        output_style,
        ..Default::default()
    };

    let mut transform = SassTransform::new(Arc::new(GrassCompiler::new()), Some(sass_options))
        .include_partials(options.include_partials.unwrap_or_default());
    if let Some(cwd) = options.cwd {
        transform = transform.with_cwd(cwd);
    }
    Ok(transform)
}

impl From<SassFile> for FileUnit {
    fn from(file: SassFile) -> Self {
        let path = PathBuf::from(&file.path);
        let base = file
            .base
            .map(PathBuf::from)
            .or_else(|| path.parent().map(PathBuf::from))
            .unwrap_or_default();

        let unit = match file.contents {
            Some(contents) => FileUnit::new(path, base, contents),
            None => FileUnit::new(path, base, sassline::Contents::Null),
        };

        if file.source_map.unwrap_or_default() {
            unit.init_source_map()
        } else {
            unit
        }
    }
}

impl From<&PluginError> for SassError {
    fn from(err: &PluginError) -> Self {
        let normalized = err.normalized();
        SassError {
            plugin: err.plugin().to_string(),
            message: err.to_string(),
            message_formatted: err.message_formatted().into_owned(),
            message_original: normalized.map(|n| n.message_original.clone()),
            relative_path: normalized.map(|n| n.relative_path.to_string_lossy().to_string()),
            file: err.path().map(|p| p.to_string_lossy().to_string()),
            line: normalized.and_then(|n| n.line),
            column: normalized.and_then(|n| n.column),
        }
    }
}

fn to_compiled_file(outcome: Outcome) -> Result<CompiledFile> {
    let compiled = match outcome {
        Outcome::Emitted(unit) => {
            let source_map = unit
                .source_map
                .as_ref()
                .map(|map| map.to_json())
                .transpose()
                .map_err(|e| Error::from_reason(format!("Failed to serialize source map: {e}")))?;

            CompiledFile {
                status: "emitted".to_string(),
                path: Some(unit.path.to_string_lossy().to_string()),
                contents: unit.contents.as_bytes().map(|_| unit.text().into_owned()),
                source_map,
                error: None,
            }
        }
        Outcome::Skipped => CompiledFile {
            status: "skipped".to_string(),
            path: None,
            contents: None,
            source_map: None,
            error: None,
        },
        Outcome::Failed(err) => CompiledFile {
            status: "failed".to_string(),
            path: err.path().map(|p| p.to_string_lossy().to_string()),
            contents: None,
            source_map: None,
            error: Some(SassError::from(&err)),
        },
    };
    Ok(compiled)
}

/// Compile a Sass file (async)
///
/// @param file - The file to compile
/// @param options - Compiler options
/// @returns Promise with the emitted file, or the normalized error
#[napi]
pub async fn compile(file: SassFile, options: Option<SassCompileOptions>) -> Result<CompiledFile> {
    let transform = build_transform(options)?;
    let outcome = transform.transform(file.into()).await;
    to_compiled_file(outcome)
}

/// Compile a Sass file (sync)
///
/// @param file - The file to compile
/// @param options - Compiler options
/// @returns The emitted file, or the normalized error
#[napi]
pub fn compile_sync(file: SassFile, options: Option<SassCompileOptions>) -> Result<CompiledFile> {
    let transform = build_transform(options)?.sync();
    to_compiled_file(transform.transform_sync(file.into()))
}
