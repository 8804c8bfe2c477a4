use crate::types::{Contents, FileUnit};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::overrides::OverrideBuilder;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Error types for reading source files
#[derive(Error, Debug)]
pub enum CollectError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Precompiled glob matchers for efficient file matching
struct CompiledMatchers {
    src: GlobSet,
    ignore: GlobSet,
}

impl CompiledMatchers {
    fn new(src_patterns: &[String], ignore_patterns: &[String]) -> Self {
        Self { src: compile_globset(src_patterns), ignore: compile_globset(ignore_patterns) }
    }
}

/// Expand brace patterns like `**/*.{scss,sass}` into multiple patterns
fn expand_brace_pattern(pattern: &str) -> Vec<String> {
    if let Some(start) = pattern.find('{') {
        if let Some(end) = pattern[start..].find('}') {
            let end = start + end;
            let prefix = &pattern[..start];
            let suffix = &pattern[end + 1..];
            let alternatives = &pattern[start + 1..end];

            return alternatives
                .split(',')
                .flat_map(|alt| expand_brace_pattern(&format!("{prefix}{alt}{suffix}")))
                .collect();
        }
    }
    vec![pattern.to_string()]
}

/// Compile a list of glob patterns into a GlobSet; invalid patterns are skipped
fn compile_globset(patterns: &[String]) -> GlobSet {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        for expanded in expand_brace_pattern(pattern) {
            match Glob::new(&expanded) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => tracing::warn!("ignoring invalid pattern '{}': {}", expanded, e),
            }
        }
    }
    builder.build().unwrap_or_else(|_| GlobSet::empty())
}

/// Upstream producer: finds style sheets under a base directory and reads them into file units
pub struct Collector {
    base: PathBuf,
    matchers: CompiledMatchers,
}

impl Collector {
    pub fn new(base: &Path, src_patterns: &[String], ignore_patterns: &[String]) -> Self {
        let matchers = CompiledMatchers::new(src_patterns, ignore_patterns);
        Self { base: base.to_path_buf(), matchers }
    }

    /// Walk the base directory once and return matching files, sorted
    pub fn collect(&self) -> Vec<PathBuf> {
        let mut files = Vec::new();

        let mut walker_builder = WalkBuilder::new(&self.base);
        walker_builder.hidden(false).git_ignore(true);

        // Always exclude node_modules directories during traversal
        let mut overrides = OverrideBuilder::new(&self.base);
        overrides.add("!**/node_modules/").ok();
        if let Ok(built) = overrides.build() {
            walker_builder.overrides(built);
        }

        for entry in walker_builder.build().flatten() {
            let path = entry.path();

            if !path.is_file() {
                continue;
            }

            let relative = path.strip_prefix(&self.base).unwrap_or(path);
            let relative_str = relative.to_string_lossy();

            if self.matchers.ignore.is_match(&*relative_str) {
                continue;
            }

            if self.matchers.src.is_match(&*relative_str) {
                files.push(path.to_path_buf());
            }
        }

        files.sort();
        files
    }

    /// Read one file into a unit based at the collector's base directory
    pub fn load(&self, path: &Path, source_maps: bool) -> Result<FileUnit, CollectError> {
        let bytes = std::fs::read(path)
            .map_err(|source| CollectError::Read { path: path.to_path_buf(), source })?;

        let unit = FileUnit::new(path, &self.base, Contents::Buffer(bytes));
        Ok(if source_maps { unit.init_source_map() } else { unit })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn patterns(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_expand_brace_pattern() {
        assert_eq!(expand_brace_pattern("**/*.{scss,sass}"), vec!["**/*.scss", "**/*.sass"]);
        assert_eq!(expand_brace_pattern("a.scss"), vec!["a.scss"]);
    }

    #[test]
    fn test_collect_matches_and_ignores() {
        let dir = tempdir().unwrap();
        let base = dir.path();
        fs::create_dir_all(base.join("scss/includes")).unwrap();
        fs::create_dir_all(base.join("vendor")).unwrap();
        fs::create_dir_all(base.join("node_modules/pkg")).unwrap();
        fs::write(base.join("scss/app.scss"), "a { b: c }").unwrap();
        fs::write(base.join("scss/indent.sass"), "a\n  b: c").unwrap();
        fs::write(base.join("scss/includes/_cats.scss"), ".cat {}").unwrap();
        fs::write(base.join("scss/readme.md"), "# styles").unwrap();
        fs::write(base.join("vendor/grid.scss"), ".grid {}").unwrap();
        fs::write(base.join("node_modules/pkg/index.scss"), ".pkg {}").unwrap();

        let collector =
            Collector::new(base, &patterns(&["**/*.{scss,sass}"]), &patterns(&["vendor/**"]));
        let files: Vec<_> = collector
            .collect()
            .into_iter()
            .map(|p| p.strip_prefix(base).unwrap().to_path_buf())
            .collect();

        assert_eq!(
            files,
            vec![
                PathBuf::from("scss/app.scss"),
                PathBuf::from("scss/includes/_cats.scss"),
                PathBuf::from("scss/indent.sass"),
            ]
        );
    }

    #[test]
    fn test_load_builds_unit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("app.scss");
        fs::write(&path, "a { b: c }").unwrap();

        let collector = Collector::new(dir.path(), &[], &[]);
        let unit = collector.load(&path, true).unwrap();

        assert_eq!(unit.relative(), PathBuf::from("app.scss"));
        assert_eq!(unit.text(), "a { b: c }");
        assert_eq!(unit.source_map.unwrap().sources, vec!["app.scss"]);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let collector = Collector::new(dir.path(), &[], &[]);

        let result = collector.load(&dir.path().join("nope.scss"), false);
        assert!(matches!(result, Err(CollectError::Read { .. })));
    }
}
