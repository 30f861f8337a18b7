//! YAML/TOML parser (line-based, no grammar).
//!
//! YAML: top-level keys and depth-1 nested keys (two-space indent) become
//! function-kind symbols with dotted names (`parent.child`). TOML:
//! section headers and key/value pairs, dotted as `section.key`. The
//! branch is chosen by file extension.

use regex::Regex;
use std::sync::LazyLock;

use super::{Language, ParseResult, SourceParser, SymbolInfo, SymbolKind};

static YAML_TOP_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][\w.-]*)\s*:").unwrap());
static YAML_NESTED_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^  ([A-Za-z_][\w.-]*)\s*:").unwrap());
static TOML_SECTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\[([^\]]+)\]\s*$").unwrap());
static TOML_KEY_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][\w.-]*)\s*=").unwrap());

#[derive(Default)]
pub struct YamlParser;

impl YamlParser {
    pub fn new() -> Self {
        Self
    }

    fn parse_yaml(&self, content: &str, result: &mut ParseResult) {
        let mut current_top_key = String::new();

        for (i, line) in content.lines().enumerate() {
            let line_no = i as u32 + 1;

            let stripped = line.trim_start();
            if stripped.is_empty() || stripped.starts_with('#') {
                continue;
            }

            if let Some(captures) = YAML_TOP_KEY_RE.captures(line) {
                let key = captures[1].to_string();
                result.symbols.push(
                    SymbolInfo::new(&key, SymbolKind::Function, line_no, line_no)
                        .with_content(line),
                );
                current_top_key = key;
                continue;
            }

            if let Some(captures) = YAML_NESTED_KEY_RE.captures(line) {
                if !current_top_key.is_empty() {
                    result.symbols.push(
                        SymbolInfo::new(
                            format!("{current_top_key}.{}", &captures[1]),
                            SymbolKind::Function,
                            line_no,
                            line_no,
                        )
                        .with_content(line),
                    );
                }
            }
        }
    }

    fn parse_toml(&self, content: &str, result: &mut ParseResult) {
        let mut current_section = String::new();

        for (i, line) in content.lines().enumerate() {
            let line_no = i as u32 + 1;

            let stripped = line.trim();
            if stripped.is_empty() || stripped.starts_with('#') {
                continue;
            }

            if let Some(captures) = TOML_SECTION_RE.captures(stripped) {
                current_section = captures[1].to_string();
                result.symbols.push(
                    SymbolInfo::new(&current_section, SymbolKind::Function, line_no, line_no)
                        .with_content(line),
                );
                continue;
            }

            if let Some(captures) = TOML_KEY_VALUE_RE.captures(stripped) {
                let key = &captures[1];
                let name = if current_section.is_empty() {
                    key.to_string()
                } else {
                    format!("{current_section}.{key}")
                };
                result.symbols.push(
                    SymbolInfo::new(name, SymbolKind::Function, line_no, line_no)
                        .with_content(line),
                );
            }
        }
    }
}

impl SourceParser for YamlParser {
    fn parse(&mut self, content: &str, file_path: &str) -> ParseResult {
        let mut result = ParseResult::default();
        if content.is_empty() {
            return result;
        }

        if file_path.ends_with(".toml") {
            self.parse_toml(content, &mut result);
        } else {
            self.parse_yaml(content, &mut result);
        }
        result
    }

    fn language(&self) -> Language {
        Language::Yaml
    }
}
