use crate::types::{FileUnit, SasslineError};
use std::fs;
use std::path::{Path, PathBuf};

/// Downstream consumer: writes emitted units below an output directory,
/// keeping their path relative to the unit base.
pub struct Writer {
    dest: PathBuf,
}

impl Writer {
    pub fn new(dest: &Path) -> Self {
        Self { dest: dest.to_path_buf() }
    }

    /// Write the unit's contents, and its source map next to it as `<name>.map`.
    ///
    /// Returns the written CSS path, or `None` for a unit without contents.
    pub fn write(&self, unit: &FileUnit) -> Result<Option<PathBuf>, SasslineError> {
        let Some(contents) = unit.contents.as_bytes() else {
            return Ok(None);
        };

        let target = self.dest.join(unit.relative());
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| write_error(parent, source))?;
        }

        let mut css = contents.to_vec();

        if let Some(map) = &unit.source_map {
            let file_name =
                target.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
            let map_name = format!("{file_name}.map");
            let map_path = target.with_file_name(&map_name);

            let json = map.to_json().map_err(|e| write_error(&map_path, e.into()))?;
            fs::write(&map_path, json).map_err(|source| write_error(&map_path, source))?;

            if !css.is_empty() && !css.ends_with(b"\n") {
                css.push(b'\n');
            }
            css.extend_from_slice(format!("/*# sourceMappingURL={map_name} */\n").as_bytes());
        }

        fs::write(&target, css).map_err(|source| write_error(&target, source))?;
        Ok(Some(target))
    }
}

fn write_error(path: &Path, source: std::io::Error) -> SasslineError {
    SasslineError::Write { path: path.to_path_buf(), source }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sourcemap::SourceMap;
    use crate::types::Contents;
    use tempfile::tempdir;

    #[test]
    fn test_writes_relative_to_dest() {
        let dir = tempdir().unwrap();
        let unit = FileUnit::new("/proj/scss/app.css", "/proj", "a{b:c}");

        let written = Writer::new(dir.path()).write(&unit).unwrap().unwrap();

        assert_eq!(written, dir.path().join("scss/app.css"));
        assert_eq!(fs::read_to_string(written).unwrap(), "a{b:c}");
    }

    #[test]
    fn test_writes_map_and_url_comment() {
        let dir = tempdir().unwrap();
        let unit = FileUnit::new("/proj/app.css", "/proj", "a{b:c}")
            .with_source_map(SourceMap::identity("app.scss", "a { b: c }"));

        let written = Writer::new(dir.path()).write(&unit).unwrap().unwrap();

        let css = fs::read_to_string(&written).unwrap();
        assert_eq!(css, "a{b:c}\n/*# sourceMappingURL=app.css.map */\n");

        let raw_map = fs::read_to_string(dir.path().join("app.css.map")).unwrap();
        let map = SourceMap::from_json(&raw_map).unwrap();
        assert_eq!(map.sources, vec!["app.scss"]);
    }

    #[test]
    fn test_null_unit_is_not_written() {
        let dir = tempdir().unwrap();
        let unit = FileUnit::new("/proj/app.scss", "/proj", Contents::Null);

        assert_eq!(Writer::new(dir.path()).write(&unit).unwrap(), None);
    }
}
