//! Language detection from file extensions.

use std::path::Path;

/// Languages with a dedicated parser.
///
/// TypeScript covers JavaScript (`.js`/`.jsx` parse with the same
/// grammar family); YAML covers TOML (the parser branches on extension).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    TypeScript,
    Go,
    Rust,
    Elixir,
    Css,
    Html,
    Markdown,
    Yaml,
    Sql,
}

impl Language {
    /// Classify a path by extension. Unknown extensions return `None` and
    /// are skipped by the walker.
    pub fn from_path(path: &Path) -> Option<Language> {
        let ext = path.extension()?.to_str()?;
        Language::from_extension(ext)
    }

    pub fn from_extension(ext: &str) -> Option<Language> {
        match ext {
            "py" => Some(Language::Python),
            "ts" | "tsx" | "js" | "jsx" | "mjs" => Some(Language::TypeScript),
            "go" => Some(Language::Go),
            "rs" => Some(Language::Rust),
            "ex" | "exs" => Some(Language::Elixir),
            "css" | "scss" => Some(Language::Css),
            "html" | "htm" => Some(Language::Html),
            "md" | "markdown" => Some(Language::Markdown),
            "yaml" | "yml" | "toml" => Some(Language::Yaml),
            "sql" => Some(Language::Sql),
            _ => None,
        }
    }

    /// Lowercase name stored on graph nodes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::TypeScript => "typescript",
            Language::Go => "go",
            Language::Rust => "rust",
            Language::Elixir => "elixir",
            Language::Css => "css",
            Language::Html => "html",
            Language::Markdown => "markdown",
            Language::Yaml => "yaml",
            Language::Sql => "sql",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn classifies_known_extensions() {
        assert_eq!(
            Language::from_path(&PathBuf::from("src/main.py")),
            Some(Language::Python)
        );
        assert_eq!(
            Language::from_path(&PathBuf::from("web/app.tsx")),
            Some(Language::TypeScript)
        );
        assert_eq!(
            Language::from_path(&PathBuf::from("lib/server.ex")),
            Some(Language::Elixir)
        );
        assert_eq!(
            Language::from_path(&PathBuf::from("Cargo.toml")),
            Some(Language::Yaml)
        );
    }

    #[test]
    fn skips_unknown_extensions() {
        assert_eq!(Language::from_path(&PathBuf::from("image.png")), None);
        assert_eq!(Language::from_path(&PathBuf::from("LICENSE")), None);
    }
}
