//! Lexical path helpers for origin resolution.

use std::path::{Component, Path, PathBuf};

use crate::core::types::ResolvedOrigin;

/// Resolve a dependency reference relative to the test file that imports it.
///
/// Joins the test file's directory with `dependency_path`, normalizes `.` and
/// `..` segments lexically, and appends `.{extension}` unless the result
/// already ends with it. Root or prefix components inside the dependency are
/// ignored, so the reference is always treated as relative. Existence is not
/// checked.
pub fn resolve_origin(
    test_file_path: &str,
    dependency_path: &str,
    extension: &str,
) -> ResolvedOrigin {
    let base = Path::new(test_file_path).parent().unwrap_or(Path::new(""));
    let dependency = Path::new(dependency_path)
        .components()
        .filter(|component| !matches!(component, Component::RootDir | Component::Prefix(_)));

    let mut resolved = normalize(base.components().chain(dependency))
        .to_string_lossy()
        .into_owned();
    let suffix = format!(".{extension}");
    if !resolved.ends_with(&suffix) {
        resolved.push_str(&suffix);
    }
    ResolvedOrigin::new(PathBuf::from(resolved))
}

/// Whether a project-relative path stays inside the project directory.
pub fn stays_within_root(path: &Path) -> bool {
    if path.is_absolute() {
        return false;
    }
    let normalized = normalize(path.components());
    !matches!(
        normalized.components().next(),
        Some(Component::ParentDir | Component::RootDir | Component::Prefix(_))
    )
}

fn normalize<'a>(components: impl Iterator<Item = Component<'a>>) -> PathBuf {
    let mut parts: Vec<Component<'a>> = Vec::new();
    for component in components {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return PathBuf::from(".");
    }
    parts.iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(test: &str, dep: &str) -> PathBuf {
        resolve_origin(test, dep, "js").as_path().to_path_buf()
    }

    #[test]
    fn resolves_parent_reference_from_test_dir() {
        assert_eq!(
            resolve("tests/main.test.js", "../main"),
            PathBuf::from("main.js")
        );
    }

    #[test]
    fn resolves_same_directory_reference() {
        assert_eq!(
            resolve("src/app.test.js", "./util"),
            PathBuf::from("src/util.js")
        );
        assert_eq!(resolve("main.test.js", "main"), PathBuf::from("main.js"));
    }

    #[test]
    fn keeps_existing_extension() {
        assert_eq!(
            resolve("a/b/c.test.js", "../../lib/x.js"),
            PathBuf::from("lib/x.js")
        );
    }

    #[test]
    fn other_extensions_still_get_the_source_extension() {
        assert_eq!(
            resolve("t/a.test.js", "./data.json"),
            PathBuf::from("t/data.json.js")
        );
        assert_eq!(
            resolve_origin("t/a.test.ts", "./util", "ts").as_path(),
            Path::new("t/util.ts")
        );
    }

    #[test]
    fn traversal_above_the_project_is_preserved() {
        assert_eq!(
            resolve("t.test.js", "../lib/x"),
            PathBuf::from("../lib/x.js")
        );
    }

    #[test]
    fn absolute_dependency_is_treated_as_relative() {
        assert_eq!(
            resolve("tests/a.test.js", "/main"),
            PathBuf::from("tests/main.js")
        );
    }

    #[test]
    fn stays_within_root_rejects_escapes() {
        assert!(stays_within_root(Path::new("main.js")));
        assert!(stays_within_root(Path::new("tests/../main.js")));
        assert!(!stays_within_root(Path::new("../main.js")));
        assert!(!stays_within_root(Path::new("a/../../main.js")));
        assert!(!stays_within_root(Path::new("/etc/passwd")));
    }
}
