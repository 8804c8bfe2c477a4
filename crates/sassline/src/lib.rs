pub mod cli;
pub mod collector;
pub mod compiler;
pub mod error;
pub mod options;
pub mod paths;
pub mod reporter;
pub mod sourcemap;
pub mod transform;
pub mod types;
pub mod writer;

use std::sync::Arc;

pub use compiler::{
    CompileOutput, CompileResult, Compiler, GrassCompiler, RawCompileError, RenderCallback,
    RenderMode,
};
pub use error::{log_error, NormalizedError, PluginError};
pub use options::{CompileOptions, IncludePaths, OutputStyle, SassOptions};
pub use reporter::{Failure, Report};
pub use sourcemap::SourceMap;
pub use transform::{Outcome, SassTransform};
pub use types::{
    ConfigError, Contents, FileConfig, FileUnit, SassConfig, SasslineError,
    DEFAULT_OUTPUT_EXTENSION, DEFAULT_SOURCE_PATTERNS, PLUGIN_NAME,
};

use collector::Collector;
use paths::relative_to;
use tracing::{debug, warn};
use writer::Writer;

/// Compile every style sheet of a project and write the results
///
/// # Arguments
/// * `config` - Sources, output directory and compiler options
/// * `compiler` - Compiler every file is handed to
///
/// # Returns
/// * `Ok(Report)` - Written files, per-file failures and statistics
/// * `Err(SasslineError)` - Error if no sources match, the base is invalid or writing fails
///
/// # Example
/// ```no_run
/// use sassline::{compile_project, GrassCompiler, SassConfig};
/// use std::path::PathBuf;
/// use std::sync::Arc;
///
/// # async fn run() -> Result<(), sassline::SasslineError> {
/// let config = SassConfig {
///     base: PathBuf::from("styles"),
///     dest: PathBuf::from("public/css"),
///     source_maps: true,
///     ..Default::default()
/// };
///
/// let report = compile_project(config, Arc::new(GrassCompiler::new())).await?;
/// println!("Compiled {} files", report.compiled_count);
/// # Ok(())
/// # }
/// ```
pub async fn compile_project(
    config: SassConfig,
    compiler: Arc<dyn Compiler>,
) -> Result<Report, SasslineError> {
    let base = config.base.canonicalize().map_err(SasslineError::InvalidBase)?;

    let collector = Collector::new(&base, &config.src, &config.ignore);
    let files = collector.collect();
    if files.is_empty() {
        return Err(SasslineError::NoSourceFiles(config.src));
    }
    debug!(count = files.len(), base = %base.display(), "collected sources");

    let mut units = Vec::with_capacity(files.len());
    let mut failures = Vec::new();
    for path in &files {
        match collector.load(path, config.source_maps) {
            Ok(unit) => units.push(unit),
            Err(e) => {
                warn!("{e}");
                failures.push(Failure { path: relative_to(path, &base), message: e.to_string() });
            }
        }
    }

    let mode = if config.sync { RenderMode::Sync } else { RenderMode::Async };
    let transform = Arc::new(
        SassTransform::new(compiler, Some(config.options))
            .with_mode(mode)
            .include_partials(config.include_partials),
    );

    let writer = Writer::new(&config.dest);
    let mut compiled = Vec::new();
    let mut errors = Vec::new();

    for result in transform.run_all(units).await {
        match result {
            Ok(unit) => {
                if let Some(written) = writer.write(&unit)? {
                    compiled.push(written);
                }
            }
            Err(err) => {
                let path = err.path().map(|p| relative_to(p, &base)).unwrap_or_default();
                failures.push(Failure { path, message: err.to_string() });
                errors.push(err);
            }
        }
    }

    compiled.sort();
    failures.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(Report::new(compiled, failures, files.len()).with_errors(errors))
}
