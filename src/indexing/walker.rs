//! File system walker for discovering source files to index.
//!
//! One traversal per run with .gitignore support, a built-in skip list
//! for build/VCS/cache directories, and custom ignore patterns from
//! configuration. Emits one [`FileEntry`] per readable, non-empty source
//! file with a sha256 content hash for incremental diffing.

use ignore::WalkBuilder;
use sha2::{Digest, Sha256};
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::config::Settings;
use crate::parsing::Language;

/// One discovered source file, with content decoded and hashed.
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// POSIX path relative to the repository root.
    pub path: String,
    pub content: String,
    pub language: Language,
    /// sha256 hex digest of `content`.
    pub content_hash: String,
}

/// Walks a repository root and yields files to index.
pub struct FileWalker {
    settings: Arc<Settings>,
}

impl FileWalker {
    pub fn new(settings: Arc<Settings>) -> Self {
        Self { settings }
    }

    /// Enumerate files under `root`, skipping ignored paths, classifying
    /// by extension, and dropping unreadable or empty files.
    pub fn walk(&self, root: &Path) -> Vec<FileEntry> {
        let mut builder = WalkBuilder::new(root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true)
            .follow_links(false)
            .require_git(false);

        let skip_dirs = self.settings.indexing.skip_dirs.clone();
        builder.filter_entry(move |entry| {
            let name = entry.file_name().to_string_lossy();
            !skip_dirs.iter().any(|d| d.as_str() == name)
        });

        if !self.settings.indexing.ignore_patterns.is_empty() {
            let mut overrides = ignore::overrides::OverrideBuilder::new(root);
            for pattern in &self.settings.indexing.ignore_patterns {
                if let Err(e) = overrides.add(&format!("!{pattern}")) {
                    debug!("Invalid ignore pattern '{pattern}': {e}");
                }
            }
            if let Ok(built) = overrides.build() {
                builder.overrides(built);
            }
        }

        let mut entries: Vec<FileEntry> = Vec::new();
        for entry in builder.build().filter_map(Result::ok) {
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            let path = entry.path();
            let Some(language) = Language::from_path(path) else {
                continue;
            };

            let content = match std::fs::read(path) {
                Ok(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(e) => {
                        debug!("Skipping non-UTF-8 file {}: {e}", path.display());
                        continue;
                    }
                },
                Err(e) => {
                    debug!("Skipping unreadable file {}: {e}", path.display());
                    continue;
                }
            };
            if content.trim().is_empty() {
                continue;
            }

            let relative = relative_posix(path, root);
            let content_hash = sha256_hex(&content);
            entries.push(FileEntry {
                path: relative,
                content,
                language,
                content_hash,
            });
        }

        // Walk order is filesystem-dependent; sort for determinism.
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        entries
    }
}

/// sha256 hex digest of a string.
pub fn sha256_hex(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn relative_posix(path: &Path, root: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    parts.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn walker() -> FileWalker {
        FileWalker::new(Arc::new(Settings::default()))
    }

    #[test]
    fn discovers_known_languages_only() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("src")).unwrap();
        fs::write(root.join("src/main.py"), "def main():\n    pass\n").unwrap();
        fs::write(root.join("src/lib.rs"), "fn lib() {}\n").unwrap();
        fs::write(root.join("notes.txt"), "not source\n").unwrap();

        let entries = walker().walk(root);

        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["src/lib.rs", "src/main.py"]);
        assert!(entries.iter().all(|e| !e.content_hash.is_empty()));
    }

    #[test]
    fn skips_build_directories_and_empty_files() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("node_modules/pkg/index.js"), "module.exports = 1;\n").unwrap();
        fs::write(root.join("empty.py"), "   \n").unwrap();
        fs::write(root.join("real.py"), "x = 1\n").unwrap();

        let entries = walker().walk(root);
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["real.py"]);
    }

    #[test]
    fn respects_gitignore() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::write(root.join(".gitignore"), "generated.py\n").unwrap();
        fs::write(root.join("generated.py"), "x = 1\n").unwrap();
        fs::write(root.join("kept.py"), "y = 2\n").unwrap();

        let entries = walker().walk(root);
        let paths: Vec<&str> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["kept.py"]);
    }

    #[test]
    fn hash_changes_with_content() {
        assert_ne!(sha256_hex("a"), sha256_hex("b"));
        assert_eq!(sha256_hex("same"), sha256_hex("same"));
    }
}
