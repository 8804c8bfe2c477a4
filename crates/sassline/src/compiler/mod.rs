mod grass;

pub use self::grass::GrassCompiler;

use crate::options::CompileOptions;
use std::fmt;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Output of a successful compile
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileOutput {
    pub css: Vec<u8>,

    /// Raw source map JSON, present when a map was requested and produced
    pub map: Option<String>,
}

/// A compiler failure, in one of the shapes compilers report them
#[derive(Debug, Clone, PartialEq)]
pub enum RawCompileError {
    /// A message with a rendered, human readable version and optional location.
    /// `file` may be a real path or the in-memory input marker (`stdin`).
    Formatted {
        message: String,
        formatted: Option<String>,
        file: Option<String>,
        line: Option<u32>,
        column: Option<u32>,
    },

    /// Nothing but a message
    Plain(String),
}

impl RawCompileError {
    pub fn message(&self) -> &str {
        match self {
            RawCompileError::Formatted { message, .. } => message,
            RawCompileError::Plain(message) => message,
        }
    }
}

impl fmt::Display for RawCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

impl std::error::Error for RawCompileError {}

pub type CompileResult = Result<CompileOutput, RawCompileError>;

/// Continuation a non-blocking compile completes with
pub struct RenderCallback(Box<dyn FnOnce(CompileResult) + Send>);

impl RenderCallback {
    pub fn new(done: impl FnOnce(CompileResult) + Send + 'static) -> Self {
        Self(Box::new(done))
    }

    /// Build a continuation from a separate success/error callback pair
    pub fn from_parts(
        success: impl FnOnce(CompileOutput) + Send + 'static,
        error: impl FnOnce(RawCompileError) + Send + 'static,
    ) -> Self {
        Self::new(move |result| match result {
            Ok(output) => success(output),
            Err(err) => error(err),
        })
    }

    pub fn complete(self, result: CompileResult) {
        (self.0)(result)
    }
}

/// Calling convention used for every file of a pipeline
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderMode {
    /// Compiles run off the pipeline task; later units start before earlier ones finish
    #[default]
    Async,
    /// Compiles block the pipeline; units complete in arrival order
    Sync,
}

/// An external Sass compiler.
///
/// Implementations must produce exactly one outcome per call.
pub trait Compiler: Send + Sync + 'static {
    /// Compiler identifier (e.g., "grass")
    fn name(&self) -> &str;

    /// Compile, blocking until the compiler returns
    fn render_sync(&self, options: &CompileOptions) -> CompileResult;

    /// Compile without blocking the caller, completing `done` later.
    ///
    /// The default runs [`Compiler::render_sync`] on tokio's blocking pool and
    /// must be called from within a tokio runtime.
    fn render(self: Arc<Self>, options: CompileOptions, done: RenderCallback) {
        tokio::task::spawn_blocking(move || done.complete(self.render_sync(&options)));
    }
}

/// Run a compile in the blocking convention
pub fn compile_sync(compiler: &dyn Compiler, options: &CompileOptions) -> CompileResult {
    compiler.render_sync(options)
}

/// Run a compile in the non-blocking convention and wait for its continuation
pub async fn compile_async(compiler: Arc<dyn Compiler>, options: CompileOptions) -> CompileResult {
    let (tx, rx) = oneshot::channel();
    let name = compiler.name().to_string();

    compiler.render(
        options,
        RenderCallback::new(move |result| {
            // The receiver only goes away when the caller stopped waiting
            let _ = tx.send(result);
        }),
    );

    rx.await.unwrap_or_else(|_| {
        Err(RawCompileError::Plain(format!(
            "compiler '{name}' dropped the render without completing it"
        )))
    })
}
