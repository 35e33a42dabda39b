//! Read-only view of the files the local agents search.

use chrono::{DateTime, Utc};
use conductor_domain::ResearchConstraints;
use glob::{MatchOptions, Pattern, glob_with};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Files larger than this are never read.
pub const MAX_READ_SIZE: u64 = 1024 * 1024;

/// Upper bound on files visited per scan.
const MAX_SCAN_FILES: usize = 20_000;

/// Top-level directories never worth searching.
const SKIPPED_DIRS: &[&str] = &["target", "node_modules", "dist", "build", "vendor"];

const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "kt", "c", "h", "cc", "cpp", "hpp", "cs",
    "rb", "php", "swift", "scala", "sh", "lua", "sql", "toml", "yaml", "yml", "json",
];

const DOC_EXTENSIONS: &[&str] = &["md", "markdown", "rst", "adoc", "txt"];

/// A candidate file, with its path relative to the workspace root.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkspaceFile {
    /// Forward-slash path relative to the root
    pub path: String,
    pub absolute: PathBuf,
    pub modified: Option<DateTime<Utc>>,
    pub size: u64,
}

impl WorkspaceFile {
    fn extension(&self) -> Option<String> {
        Path::new(&self.path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }

    pub fn is_code(&self) -> bool {
        self.extension()
            .is_some_and(|e| CODE_EXTENSIONS.contains(&e.as_str()))
    }

    pub fn is_doc(&self) -> bool {
        self.extension()
            .is_some_and(|e| DOC_EXTENSIONS.contains(&e.as_str()))
    }

    /// File contents, or `None` when too large or not UTF-8.
    pub fn read(&self) -> Option<String> {
        if self.size > MAX_READ_SIZE {
            return None;
        }
        fs::read_to_string(&self.absolute).ok()
    }

    /// File name without extension, lowercased.
    pub fn stem(&self) -> String {
        Path::new(&self.path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_lowercase()
    }
}

#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every visible file under the root that passes `constraints`, in path order.
    ///
    /// Hidden entries and well-known build/dependency directories are skipped.
    pub fn scan(&self, constraints: &ResearchConstraints) -> Vec<WorkspaceFile> {
        self.scan_capped(constraints, MAX_SCAN_FILES)
    }

    fn scan_capped(&self, constraints: &ResearchConstraints, cap: usize) -> Vec<WorkspaceFile> {
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: true,
        };

        let mut files = Vec::new();
        'scan: for top in self.top_level_entries() {
            let pattern = if top.is_dir() {
                format!("{}/**/*", Pattern::escape(&top.to_string_lossy()))
            } else {
                Pattern::escape(&top.to_string_lossy())
            };
            let Ok(entries) = glob_with(&pattern, options) else {
                continue;
            };
            for path in entries.flatten() {
                if files.len() >= cap {
                    debug!("Workspace scan capped at {} files", cap);
                    break 'scan;
                }
                if let Some(file) = self.candidate(&path, constraints) {
                    files.push(file);
                }
            }
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }

    /// Look up specific relative paths (e.g. paths found by discovery).
    ///
    /// Absolute paths and paths that climb out with `..` are ignored.
    pub fn files(&self, paths: &[&str]) -> Vec<WorkspaceFile> {
        let all = ResearchConstraints::default();
        paths
            .iter()
            .filter_map(|p| self.resolve(p))
            .filter_map(|p| self.candidate(&p, &all))
            .collect()
    }

    fn resolve(&self, relative: &str) -> Option<PathBuf> {
        let mut path = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => path.push(part),
                Component::CurDir => {}
                _ => {
                    debug!("Ignoring path outside the workspace: {}", relative);
                    return None;
                }
            }
        }
        Some(path)
    }

    fn top_level_entries(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|e| e.path())
            .filter(|p| {
                let name = p.file_name().and_then(|n| n.to_str()).unwrap_or_default();
                !name.starts_with('.') && !(p.is_dir() && SKIPPED_DIRS.contains(&name))
            })
            .collect();
        paths.sort();
        paths
    }

    fn candidate(&self, path: &Path, constraints: &ResearchConstraints) -> Option<WorkspaceFile> {
        let metadata = fs::metadata(path).ok()?;
        if !metadata.is_file() {
            return None;
        }
        let relative = path
            .strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/");
        let modified = metadata.modified().ok().map(DateTime::<Utc>::from);
        if !constraints.allows_path(&relative) || !constraints.allows_modified(modified) {
            return None;
        }
        Some(WorkspaceFile {
            path: relative,
            absolute: path.to_path_buf(),
            modified,
            size: metadata.len(),
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::fs;
    use std::path::Path;

    /// Write `files` (relative path, content) under `root`.
    pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
        for (path, content) in files {
            let full = root.join(path);
            if let Some(parent) = full.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(full, content).unwrap();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::write_tree;
    use super::*;

    #[test]
    fn test_scan_skips_hidden_and_build_dirs() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(
            dir.path(),
            &[
                ("src/lib.rs", "pub fn auth() {}"),
                ("src/.secret.rs", "hidden"),
                (".git/config", "[core]"),
                ("target/debug/out.rs", "generated"),
                ("node_modules/x/index.js", "dep"),
                ("README.md", "# Project"),
            ],
        );

        let files = Workspace::new(dir.path()).scan(&ResearchConstraints::default());
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["README.md", "src/lib.rs"]);
        assert!(files[0].is_doc());
        assert!(files[1].is_code());
    }

    #[test]
    fn test_scan_applies_file_type_constraint() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("a.rs", "x"), ("b.py", "y"), ("c.md", "z")]);

        let constraints = ResearchConstraints {
            file_types: vec!["py".to_string()],
            ..Default::default()
        };
        let files = Workspace::new(dir.path()).scan(&constraints);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "b.py");
        assert_eq!(files[0].stem(), "b");
    }

    #[test]
    fn test_files_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("src/auth.rs", "fn login() {}")]);

        let workspace = Workspace::new(dir.path());
        let files = workspace.files(&["src/auth.rs", "src/missing.rs"]);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].read().unwrap(), "fn login() {}");
    }

    #[test]
    fn test_files_ignores_paths_outside_root() {
        let outer = tempfile::tempdir().unwrap();
        write_tree(
            outer.path(),
            &[("secret.txt", "token=abc"), ("repo/src/lib.rs", "pub fn auth() {}")],
        );
        let secret = outer.path().join("secret.txt");

        let workspace = Workspace::new(outer.path().join("repo"));
        let files = workspace.files(&[
            secret.to_str().unwrap(),
            "../secret.txt",
            "src/../../secret.txt",
            "./src/lib.rs",
        ]);

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].path, "src/lib.rs");
        assert_eq!(files[0].read().unwrap(), "pub fn auth() {}");
    }

    #[test]
    fn test_capped_scan_is_still_sorted() {
        let dir = tempfile::tempdir().unwrap();
        write_tree(dir.path(), &[("a/x.rs", "x"), ("a.txt", "y"), ("b.txt", "z")]);

        let files = Workspace::new(dir.path()).scan_capped(&ResearchConstraints::default(), 2);
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "a/x.rs"]);
    }
}
