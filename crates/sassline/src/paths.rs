use std::path::{Component, Path, PathBuf};

/// Marker prefix for Sass partials (`_mixins.scss`)
pub const PARTIAL_PREFIX: char = '_';

/// Check whether a path names a partial, i.e. its basename starts with `_`
pub fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(PARTIAL_PREFIX))
}

/// Replace (or add) the extension of `path`. Accepts the extension with or without the dot.
pub fn replace_extension(path: &Path, extension: &str) -> PathBuf {
    path.with_extension(extension.trim_start_matches('.'))
}

/// Fold `.` and `..` components without touching the filesystem.
///
/// Leading `..` components of a relative path are kept, since there is
/// nothing to fold them into.
pub fn normalize(path: &Path) -> PathBuf {
    let mut parts: Vec<Component<'_>> = Vec::new();

    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }

    parts.iter().collect()
}

/// Express `path` relative to `base`, inserting `..` where `path` is not below `base`.
///
/// When only one of the two is absolute there is no common ground; `path` is
/// returned normalized but otherwise unchanged.
pub fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let path = normalize(path);
    let base = normalize(base);

    if path.is_absolute() != base.is_absolute() {
        return path;
    }

    let path_parts: Vec<_> = path.components().collect();
    let base_parts: Vec<_> = base.components().collect();

    let common = path_parts.iter().zip(&base_parts).take_while(|(a, b)| a == b).count();

    let mut relative = PathBuf::new();
    for _ in common..base_parts.len() {
        relative.push("..");
    }
    for part in &path_parts[common..] {
        relative.push(part);
    }
    relative
}

/// Render a relative path with `/` separators, the form source maps use
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            Component::RootDir => Some(String::new()),
            Component::CurDir | Component::Prefix(_) => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
