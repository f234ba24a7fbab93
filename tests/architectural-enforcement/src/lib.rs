//! Architectural Enforcement Integration Tests
//!
//! Source scanners shared by the integration tests in `tests/`:
//! - No sleep() calls in production code outside the reconnect timer
//! - No blocking I/O inside async functions
//!
//! The scanners are line based. They are meant to catch violations early,
//! not to parse Rust.

use std::fs;
use std::path::{Path, PathBuf};

/// Production source directories, relative to the workspace root
pub const PRODUCTION_DIRS: &[&str] = &["hmi/core/src", "hmi/console/src"];

/// Workspace root, resolved from this crate's manifest
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// One production source file, with test modules stripped
pub struct SourceFile {
    /// Path as reported in violations
    pub path: PathBuf,
    /// Lines up to the first `#[cfg(test)]`
    pub lines: Vec<String>,
}

/// Load every `.rs` file under the production directories
pub fn production_sources() -> Vec<SourceFile> {
    let root = workspace_root();
    let mut files = Vec::new();

    for dir in PRODUCTION_DIRS {
        let path = root.join(dir);
        if !path.exists() {
            continue;
        }
        for entry in walkdir::WalkDir::new(&path)
            .into_iter()
            .filter_map(Result::ok)
        {
            if entry.path().extension().and_then(|s| s.to_str()) != Some("rs") {
                continue;
            }
            let Ok(content) = fs::read_to_string(entry.path()) else {
                continue;
            };
            files.push(SourceFile {
                path: entry.path().to_path_buf(),
                lines: production_lines(&content),
            });
        }
    }
    files
}

/// Lines before the test module (by convention at the bottom of the file)
pub fn production_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .take_while(|line| !line.trim().starts_with("#[cfg(test)]"))
        .map(str::to_string)
        .collect()
}

/// Code part of a line, without a trailing `//` comment
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Signature line of the function enclosing `current_idx`, if any
pub fn enclosing_fn<S: AsRef<str>>(lines: &[S], current_idx: usize) -> Option<&str> {
    for i in (0..current_idx).rev() {
        let line = lines[i].as_ref().trim();
        if is_fn_signature(line) {
            return Some(line);
        }
        // Stop at module/impl boundaries
        if line.starts_with("mod ") || (line.starts_with("impl") && line.contains('{')) {
            return None;
        }
    }
    None
}

/// Whether a trimmed line starts a function item
pub fn is_fn_signature(line: &str) -> bool {
    let rest = line
        .strip_prefix("pub(crate) ")
        .or_else(|| line.strip_prefix("pub "))
        .unwrap_or(line);
    let rest = rest.strip_prefix("async ").unwrap_or(rest);
    rest.starts_with("fn ")
}

/// Whether `current_idx` sits inside an `async fn`
pub fn is_in_async_function<S: AsRef<str>>(lines: &[S], current_idx: usize) -> bool {
    enclosing_fn(lines, current_idx).is_some_and(|sig| sig.contains("async fn "))
}

/// Whether `current_idx` sits inside a plain (non-async) function
pub fn is_in_non_async_function<S: AsRef<str>>(lines: &[S], current_idx: usize) -> bool {
    enclosing_fn(lines, current_idx).is_some_and(|sig| !sig.contains("async fn "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_signature_forms() {
        assert!(is_fn_signature("fn load(&self) {"));
        assert!(is_fn_signature("pub fn load_config_from_path(path: Option<PathBuf>) {"));
        assert!(is_fn_signature("pub(crate) async fn fetch() {"));
        assert!(!is_fn_signature("let f = |x| x;"));
    }

    #[test]
    fn test_async_detection() {
        let code = [
            "async fn bad_function() {",
            "    let contents = std::fs::read_to_string(\"file.txt\")?;",
            "}",
        ];
        assert!(is_in_async_function(&code, 1));
        assert!(!is_in_non_async_function(&code, 1));
    }

    #[test]
    fn test_non_async_detection() {
        let code = [
            "impl TokenStore for FileTokenStore {",
            "    fn load(&self) -> Result<Option<BearerToken>, StorageError> {",
            "        std::fs::read_to_string(&self.path)",
            "    }",
        ];
        assert!(is_in_non_async_function(&code, 2));
    }

    #[test]
    fn test_top_level_is_neither() {
        let code = ["use std::fs;", "const X: u8 = 1;"];
        assert!(!is_in_async_function(&code, 1));
        assert!(!is_in_non_async_function(&code, 1));
    }

    #[test]
    fn test_test_module_stripped() {
        let lines = production_lines("fn a() {}\n#[cfg(test)]\nmod tests {\n}\n");
        assert_eq!(lines, vec!["fn a() {}".to_string()]);
    }
}
