//! Source map reconciliation.
//!
//! Compilers report map sources in whatever form suits them: relative to the
//! directory of the compiled file, as absolute paths or `file://` URLs, and
//! with a stand-in for the in-memory input (`stdin`, or a `data:` URI holding
//! the source text). [`reconcile`] rewrites all of them relative to the base
//! of the file unit the map belongs to.

use crate::paths::{normalize, relative_to, replace_extension, to_slash};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, warn};

/// Name compilers give to in-memory input
pub const STDIN_MARKER: &str = "stdin";

/// Name compilers give to in-memory output; pairs with [`STDIN_MARKER`]
pub const STDOUT_MARKER: &str = "stdout";

const DATA_URI_PREFIX: &str = "data:";
const FILE_URL_PREFIX: &str = "file://";

fn default_version() -> u32 {
    3
}

/// A version 3 source map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,

    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,

    #[serde(default)]
    pub names: Vec<String>,

    #[serde(default)]
    pub mappings: String,

    /// Fields outside the v3 core (`x_google_ignoreList`, ...), kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SourceMap {
    /// Map with the file itself as the only source and no mappings yet
    pub fn identity(relative: &str, contents: &str) -> Self {
        Self {
            version: default_version(),
            file: Some(relative.to_string()),
            source_root: None,
            sources: vec![relative.to_string()],
            sources_content: Some(vec![Some(contents.to_string())]),
            names: Vec::new(),
            mappings: String::new(),
            extra: Map::new(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Content recorded for `source`, if any
    pub fn content_for(&self, source: &str) -> Option<&str> {
        let index = self.sources.iter().position(|s| s == source)?;
        self.sources_content.as_ref()?.get(index)?.as_deref()
    }
}

/// Identity of the file unit a compiled map belongs to
#[derive(Debug, Clone, Copy)]
pub struct MapContext<'a> {
    /// Base directory of the unit
    pub base: &'a Path,

    /// Unit path relative to `base`, with its source extension
    pub relative: &'a Path,

    /// Source text the unit was compiled from
    pub contents: &'a str,

    /// Map the unit carried before compiling
    pub upstream: Option<&'a SourceMap>,

    /// Extension the compiled unit gets (`.css`)
    pub output_extension: &'a str,
}

fn is_placeholder(source: &str, root_marker: &str) -> bool {
    source == root_marker || source == STDIN_MARKER || source.starts_with(DATA_URI_PREFIX)
}

/// Rewrite one non-placeholder source relative to the unit base
fn rebase_source(source: &str, base: &Path, relative_dir: &Path) -> String {
    let source = source.strip_prefix(FILE_URL_PREFIX).unwrap_or(source);
    let path = Path::new(source);

    if path.is_absolute() {
        to_slash(&relative_to(path, base))
    } else {
        to_slash(&normalize(&relative_dir.join(path)))
    }
}

/// Parse a compiler map and rewrite it against the unit identity in `ctx`.
///
/// Only unparseable JSON is an error; missing fields fall back to their
/// defaults and the steps that depend on them become no-ops.
pub fn reconcile(raw: &str, ctx: &MapContext<'_>) -> Result<SourceMap, serde_json::Error> {
    let mut map: SourceMap = serde_json::from_str(raw)?;

    let own = to_slash(ctx.relative);
    let relative_dir = ctx.relative.parent().unwrap_or_else(|| Path::new(""));

    // A map written to "stdout" names its root source "stdin"
    let root_marker = match map.file.as_deref() {
        Some(STDOUT_MARKER) | None => STDIN_MARKER.to_string(),
        Some(file) => file.to_string(),
    };

    if map.sources.is_empty() {
        warn!(file = %own, "compiler map lists no sources, using the file itself");
    }
    if let Some(contents) = &map.sources_content {
        if contents.len() != map.sources.len() {
            warn!(
                file = %own,
                sources = map.sources.len(),
                contents = contents.len(),
                "compiler map sourcesContent does not line up with sources"
            );
        }
    }

    let compiler_contents = map.sources_content.take();
    let mut entries: Vec<(String, Option<String>)> = Vec::with_capacity(map.sources.len().max(1));

    for (index, source) in std::mem::take(&mut map.sources).into_iter().enumerate() {
        let content =
            compiler_contents.as_ref().and_then(|contents| contents.get(index).cloned().flatten());

        let resolved = if is_placeholder(&source, &root_marker) {
            if own.is_empty() {
                continue;
            }
            own.clone()
        } else {
            rebase_source(&source, ctx.base, relative_dir)
        };

        if entries.iter().any(|(existing, _)| *existing == resolved) {
            continue;
        }
        entries.push((resolved, content));
    }

    if entries.is_empty() && !own.is_empty() {
        entries.push((own.clone(), None));
    }

    if compiler_contents.is_none() {
        if let Some(upstream) = ctx.upstream.filter(|upstream| upstream.sources_content.is_some()) {
            for (source, content) in &mut entries {
                *content = upstream.content_for(source).map(str::to_string).or_else(|| {
                    (*source == own).then(|| ctx.contents.to_string())
                });
            }
        }
    }

    if ctx.upstream.is_some_and(|upstream| !upstream.mappings.is_empty()) {
        debug!(file = %own, "upstream mappings replaced by compiler map");
    }

    let has_contents = entries.iter().any(|(_, content)| content.is_some());
    let (sources, contents): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
    map.sources = sources;
    map.sources_content = has_contents.then_some(contents);
    map.file = Some(to_slash(&replace_extension(ctx.relative, ctx.output_extension)));

    debug!(file = %own, sources = ?map.sources, "reconciled source map");
    Ok(map)
}
