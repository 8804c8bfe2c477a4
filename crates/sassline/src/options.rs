use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// CSS output style
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputStyle {
    #[default]
    Expanded,
    Compressed,
}

/// Include paths as callers write them: a single path or a list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IncludePaths {
    One(PathBuf),
    Many(Vec<PathBuf>),
}

impl Default for IncludePaths {
    fn default() -> Self {
        IncludePaths::Many(Vec::new())
    }
}

impl IncludePaths {
    pub fn to_vec(&self) -> Vec<PathBuf> {
        match self {
            IncludePaths::One(path) => vec![path.clone()],
            IncludePaths::Many(paths) => paths.clone(),
        }
    }
}

/// Caller-supplied compiler options, shared by every file of a pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SassOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_paths: Option<IncludePaths>,

    #[serde(default)]
    pub indented_syntax: bool,

    #[serde(default)]
    pub output_style: OutputStyle,

    /// Options this crate does not interpret; handed to the compiler as-is
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Source map generation flags for one compile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapRequest {
    /// Path the map is generated for; sources are relative to its directory
    pub path: PathBuf,

    /// Embed original file contents in `sourcesContent`
    pub embed_contents: bool,

    /// Leave the `sourceMappingURL` comment out of the CSS
    pub omit_url: bool,
}

/// Compiler-ready options for a single file.
///
/// Built fresh for every file from the caller's options, so no file ever sees
/// another file's include paths or data.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileOptions {
    /// Absolute path of the file, so relative imports resolve against its real location
    pub file: PathBuf,

    /// Source text
    pub data: String,

    pub indented_syntax: bool,

    /// Load paths, the file's own directory first
    pub include_paths: Vec<PathBuf>,

    pub output_style: OutputStyle,

    pub source_map: Option<SourceMapRequest>,

    pub extra: Map<String, Value>,
}

impl CompileOptions {
    pub fn for_file(
        options: Option<&SassOptions>,
        path: &Path,
        data: String,
        wants_map: bool,
    ) -> Self {
        let options = options.cloned().unwrap_or_default();

        let indented_syntax =
            options.indented_syntax || path.extension().is_some_and(|ext| ext == "sass");

        let own_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut include_paths = vec![own_dir];
        include_paths.extend(options.include_paths.unwrap_or_default().to_vec());

        let source_map = wants_map.then(|| SourceMapRequest {
            path: path.to_path_buf(),
            embed_contents: true,
            omit_url: true,
        });

        Self {
            file: path.to_path_buf(),
            data,
            indented_syntax,
            include_paths,
            output_style: options.output_style,
            source_map,
            extra: options.extra,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn for_file(caller: &SassOptions, path: &str) -> CompileOptions {
        CompileOptions::for_file(Some(caller), Path::new(path), String::new(), false)
    }

    #[test]
    fn test_defaults_without_caller_options() {
        let opts =
            CompileOptions::for_file(None, Path::new("/proj/scss/app.scss"), "a {}".into(), false);

        assert_eq!(opts.file, PathBuf::from("/proj/scss/app.scss"));
        assert_eq!(opts.data, "a {}");
        assert!(!opts.indented_syntax);
        assert_eq!(opts.include_paths, vec![PathBuf::from("/proj/scss")]);
        assert_eq!(opts.source_map, None);
    }

    #[test]
    fn test_single_include_path_is_wrapped() {
        let caller: SassOptions = serde_json::from_str(r#"{ "includePaths": "/vendor" }"#).unwrap();
        let opts = for_file(&caller, "/proj/app.scss");

        assert_eq!(opts.include_paths, vec![PathBuf::from("/proj"), PathBuf::from("/vendor")]);
    }

    #[test]
    fn test_own_directory_is_prepended() {
        let caller: SassOptions =
            serde_json::from_str(r#"{ "includePaths": ["/a", "/b"] }"#).unwrap();
        let opts = for_file(&caller, "/proj/app.scss");

        assert_eq!(
            opts.include_paths,
            vec![PathBuf::from("/proj"), PathBuf::from("/a"), PathBuf::from("/b")]
        );
    }

    #[test]
    fn test_caller_options_are_not_mutated() {
        let caller = SassOptions::default();

        let first = for_file(&caller, "/one/a.scss");
        let second = for_file(&caller, "/two/b.scss");

        assert_eq!(first.include_paths, vec![PathBuf::from("/one")]);
        assert_eq!(second.include_paths, vec![PathBuf::from("/two")]);
        assert_eq!(caller, SassOptions::default());
    }

    #[test]
    fn test_sass_extension_forces_indented_syntax() {
        let opts =
            CompileOptions::for_file(None, Path::new("/proj/app.sass"), String::new(), false);
        assert!(opts.indented_syntax);
    }

    #[test]
    fn test_source_map_flags() {
        let opts = CompileOptions::for_file(None, Path::new("/proj/app.scss"), String::new(), true);
        let request = opts.source_map.unwrap();

        assert_eq!(request.path, PathBuf::from("/proj/app.scss"));
        assert!(request.embed_contents);
        assert!(request.omit_url);
    }

    #[test]
    fn test_unknown_options_are_kept() {
        let caller: SassOptions =
            serde_json::from_str(r#"{ "outputStyle": "compressed", "precision": 10 }"#).unwrap();
        let opts = for_file(&caller, "/p/a.scss");

        assert_eq!(opts.output_style, OutputStyle::Compressed);
        assert_eq!(opts.extra.get("precision"), Some(&Value::from(10)));
    }
}
