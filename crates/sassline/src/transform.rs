use crate::compiler::{compile_async, compile_sync, CompileResult, Compiler, RenderMode};
use crate::error::{normalize, PluginError};
use crate::options::{CompileOptions, SassOptions};
use crate::paths::{is_partial, replace_extension};
use crate::sourcemap::{reconcile, MapContext};
use crate::types::{Contents, FileUnit, DEFAULT_OUTPUT_EXTENSION};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error};

/// What became of one file unit
#[derive(Debug)]
pub enum Outcome {
    /// Forwarded downstream: compiled, empty, or without contents
    Emitted(FileUnit),
    /// Dropped from the stream (partials)
    Skipped,
    /// Failed; the stream continues with the next unit
    Failed(PluginError),
}

impl Outcome {
    pub fn into_result(self) -> Option<Result<FileUnit, PluginError>> {
        match self {
            Outcome::Emitted(unit) => Some(Ok(unit)),
            Outcome::Skipped => None,
            Outcome::Failed(err) => Some(Err(err)),
        }
    }
}

/// Replaces the default error signalling of [`SassTransform::pipe`]
pub type ErrorHandler = Arc<dyn Fn(&PluginError) + Send + Sync>;

enum Triage {
    Done(Outcome),
    Compile(FileUnit),
}

/// Compiles Sass file units with an injected [`Compiler`].
///
/// # Example
/// ```no_run
/// use sassline::{FileUnit, GrassCompiler, SassTransform};
/// use std::sync::Arc;
///
/// let transform = SassTransform::new(Arc::new(GrassCompiler::new()), None).sync();
/// let unit = FileUnit::new("/site/scss/app.scss", "/site", "body { color: red; }");
///
/// match transform.transform_sync(unit).into_result() {
///     Some(Ok(css)) => println!("wrote {}", css.path.display()),
///     Some(Err(err)) => sassline::log_error(&err),
///     None => {}
/// }
/// ```
pub struct SassTransform {
    compiler: Arc<dyn Compiler>,
    options: Option<SassOptions>,
    mode: RenderMode,
    include_partials: bool,
    output_extension: String,
    cwd: PathBuf,
    on_error: Option<ErrorHandler>,
}

impl SassTransform {
    pub fn new(compiler: Arc<dyn Compiler>, options: Option<SassOptions>) -> Self {
        Self {
            compiler,
            options,
            mode: RenderMode::Async,
            include_partials: false,
            output_extension: DEFAULT_OUTPUT_EXTENSION.to_string(),
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            on_error: None,
        }
    }

    /// Use the blocking calling convention for every unit
    pub fn sync(self) -> Self {
        self.with_mode(RenderMode::Sync)
    }

    pub fn with_mode(mut self, mode: RenderMode) -> Self {
        self.mode = mode;
        self
    }

    /// Compile partials instead of dropping them
    pub fn include_partials(mut self, include: bool) -> Self {
        self.include_partials = include;
        self
    }

    pub fn with_output_extension(mut self, extension: impl Into<String>) -> Self {
        self.output_extension = extension.into();
        self
    }

    /// Directory error paths are reported relative to
    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = cwd.into();
        self
    }

    /// Send failures to `handler` instead of the output channel of [`SassTransform::pipe`]
    pub fn on_error(mut self, handler: impl Fn(&PluginError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(handler));
        self
    }

    pub fn mode(&self) -> RenderMode {
        self.mode
    }

    fn triage(&self, mut unit: FileUnit) -> Triage {
        if unit.is_null() {
            debug!(path = %unit.path.display(), "no contents, passing through");
            return Triage::Done(Outcome::Emitted(unit));
        }
        if unit.is_stream() {
            return Triage::Done(Outcome::Failed(PluginError::StreamingNotSupported));
        }
        if !self.include_partials && is_partial(&unit.path) {
            debug!(path = %unit.path.display(), "skipping partial");
            return Triage::Done(Outcome::Skipped);
        }
        if unit.contents.is_empty() {
            unit.path = replace_extension(&unit.path, &self.output_extension);
            debug!(path = %unit.path.display(), "empty contents, passing through");
            return Triage::Done(Outcome::Emitted(unit));
        }
        Triage::Compile(unit)
    }

    fn prepare(&self, unit: &FileUnit) -> CompileOptions {
        CompileOptions::for_file(
            self.options.as_ref(),
            &unit.path,
            unit.text().into_owned(),
            unit.source_map.is_some(),
        )
    }

    fn finish(&self, mut unit: FileUnit, result: CompileResult) -> Outcome {
        let output = match result {
            Ok(output) => output,
            Err(raw) => {
                debug!(path = %unit.path.display(), error = %raw, "compile failed");
                let normalized = normalize(raw, &unit.path, &self.cwd);
                return Outcome::Failed(PluginError::Compile(Box::new(normalized)));
            }
        };

        if let Some(raw_map) = output.map.as_deref() {
            let relative = unit.relative();
            let text = unit.text().into_owned();
            let ctx = MapContext {
                base: &unit.base,
                relative: &relative,
                contents: &text,
                upstream: unit.source_map.as_ref(),
                output_extension: &self.output_extension,
            };

            match reconcile(raw_map, &ctx) {
                Ok(map) => unit.source_map = Some(map),
                Err(source) => {
                    return Outcome::Failed(PluginError::SourceMap { path: unit.path, source });
                }
            }
        }

        unit.contents = Contents::Buffer(output.css);
        unit.path = replace_extension(&unit.path, &self.output_extension);
        debug!(path = %unit.path.display(), "compiled");
        Outcome::Emitted(unit)
    }

    /// Transform one unit with the blocking calling convention, whatever the configured mode
    pub fn transform_sync(&self, unit: FileUnit) -> Outcome {
        match self.triage(unit) {
            Triage::Done(outcome) => outcome,
            Triage::Compile(unit) => {
                let options = self.prepare(&unit);
                let result = compile_sync(self.compiler.as_ref(), &options);
                self.finish(unit, result)
            }
        }
    }

    /// Transform one unit in the configured mode
    pub async fn transform(&self, unit: FileUnit) -> Outcome {
        if self.mode == RenderMode::Sync {
            return self.transform_sync(unit);
        }

        match self.triage(unit) {
            Triage::Done(outcome) => outcome,
            Triage::Compile(unit) => {
                let options = self.prepare(&unit);
                let result = compile_async(Arc::clone(&self.compiler), options).await;
                self.finish(unit, result)
            }
        }
    }

    fn dispatch(
        &self,
        outcome: Outcome,
        output: &mpsc::UnboundedSender<Result<FileUnit, PluginError>>,
    ) {
        // A closed receiver means nobody is listening anymore
        match outcome {
            Outcome::Emitted(unit) => {
                let _ = output.send(Ok(unit));
            }
            Outcome::Skipped => {}
            Outcome::Failed(err) => match &self.on_error {
                Some(handler) => handler(&err),
                None => {
                    let _ = output.send(Err(err));
                }
            },
        }
    }

    /// Transform every unit received on `input`.
    ///
    /// Emitted units and failures are sent on the returned channel, which
    /// closes once `input` is closed and every unit is done. In async mode
    /// each unit is compiled in its own task and results arrive in completion
    /// order; in sync mode they arrive in input order. A unit whose task
    /// panics is logged and dropped; the rest keep flowing.
    ///
    /// Must be called from within a tokio runtime.
    pub fn pipe(
        self: Arc<Self>,
        mut input: mpsc::Receiver<FileUnit>,
    ) -> mpsc::UnboundedReceiver<Result<FileUnit, PluginError>> {
        let (output, results) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let mut in_flight = JoinSet::new();

            while let Some(unit) = input.recv().await {
                match self.mode {
                    RenderMode::Sync => {
                        let transform = Arc::clone(&self);
                        let output = output.clone();
                        let task = tokio::task::spawn_blocking(move || {
                            let outcome = transform.transform_sync(unit);
                            transform.dispatch(outcome, &output);
                        });
                        if let Err(e) = task.await {
                            error!("file unit task failed: {e}");
                        }
                    }
                    RenderMode::Async => {
                        let transform = Arc::clone(&self);
                        let output = output.clone();
                        in_flight.spawn(async move {
                            let outcome = transform.transform(unit).await;
                            transform.dispatch(outcome, &output);
                        });
                    }
                }
            }

            while let Some(joined) = in_flight.join_next().await {
                if let Err(e) = joined {
                    error!("file unit task failed: {e}");
                }
            }
        });

        results
    }

    /// Transform a batch of units and collect every result
    pub async fn run_all(
        self: Arc<Self>,
        units: Vec<FileUnit>,
    ) -> Vec<Result<FileUnit, PluginError>> {
        let (input, receiver) = mpsc::channel(units.len().max(1));
        let mut results = self.pipe(receiver);

        for unit in units {
            if input.send(unit).await.is_err() {
                break;
            }
        }
        drop(input);

        let mut collected = Vec::new();
        while let Some(result) = results.recv().await {
            collected.push(result);
        }
        collected
    }
}
