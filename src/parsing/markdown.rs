//! Markdown parser (line-based, no grammar).
//!
//! Four passes over the line array: YAML frontmatter keys, heading
//! sections (end line assigned by next-heading lookahead), pipe tables,
//! and links + code-fence language tags. Links inside fenced code blocks
//! are suppressed; an unterminated fence leaves the rest of the file in
//! code state, so all trailing links are suppressed too.

use regex::Regex;
use std::sync::LazyLock;

use super::{CallInfo, ImportInfo, Language, ParseResult, SourceParser, SymbolInfo, SymbolKind};

static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]*)\]\(([^)]+)\)").unwrap());
static CODE_FENCE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^```(\w+)").unwrap());
static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").unwrap());
static FRONTMATTER_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z_][\w.-]*)\s*:").unwrap());
static TABLE_LINE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*\|.+\|\s*$").unwrap());

#[derive(Default)]
pub struct MarkdownParser;

impl MarkdownParser {
    pub fn new() -> Self {
        Self
    }

    /// Frontmatter keys between `---` delimiters starting on line 1.
    fn extract_frontmatter(&self, lines: &[&str], result: &mut ParseResult) {
        if lines.first().map(|l| l.trim()) != Some("---") {
            return;
        }
        let Some(end_idx) = lines.iter().skip(1).position(|l| l.trim() == "---") else {
            return;
        };
        // end_idx is relative to the skipped iterator.
        for (i, line) in lines.iter().enumerate().take(end_idx + 1).skip(1) {
            if let Some(captures) = FRONTMATTER_KEY_RE.captures(line) {
                let key = &captures[1];
                let line_no = i as u32 + 1;
                result.symbols.push(
                    SymbolInfo::new(
                        format!("frontmatter:{key}"),
                        SymbolKind::Function,
                        line_no,
                        line_no,
                    )
                    .with_content(*line),
                );
            }
        }
    }

    /// Headings become sections spanning to the line before the next
    /// heading, or to EOF for the last one. Level-1 headings are exports.
    fn extract_sections(&self, lines: &[&str], result: &mut ParseResult) {
        let total_lines = lines.len() as u32;
        let mut headings: Vec<(u32, usize, String)> = Vec::new();

        let mut in_code = false;
        for (i, line) in lines.iter().enumerate() {
            if line.trim_start().starts_with("```") {
                in_code = !in_code;
                continue;
            }
            if in_code {
                continue;
            }
            if let Some(captures) = HEADING_RE.captures(line) {
                let level = captures[1].len();
                let name = captures[2].trim().to_string();
                if !name.is_empty() {
                    headings.push((i as u32 + 1, level, name));
                }
            }
        }

        for (idx, (start_line, level, name)) in headings.iter().enumerate() {
            let end_line = if idx + 1 < headings.len() {
                headings[idx + 1].0 - 1
            } else {
                total_lines
            };
            let content =
                lines[*start_line as usize - 1..end_line as usize].join("\n");

            result.symbols.push(
                SymbolInfo::new(name, SymbolKind::Section, *start_line, end_line)
                    .with_content(content),
            );
            if *level == 1 {
                result.exports.push(name.clone());
            }
        }
    }

    /// Contiguous blocks of `|...|` lines with at least two rows become
    /// `table:<first-header>` sections.
    fn extract_tables(&self, lines: &[&str], result: &mut ParseResult) {
        let mut i = 0;
        while i < lines.len() {
            if !TABLE_LINE_RE.is_match(lines[i]) {
                i += 1;
                continue;
            }
            let table_start = i;
            let mut j = i + 1;
            while j < lines.len() && TABLE_LINE_RE.is_match(lines[j]) {
                j += 1;
            }

            if j - table_start >= 2 {
                let first_header = lines[table_start]
                    .split('|')
                    .map(str::trim)
                    .find(|c| !c.is_empty())
                    .unwrap_or("table");

                result.symbols.push(
                    SymbolInfo::new(
                        format!("table:{first_header}"),
                        SymbolKind::Section,
                        table_start as u32 + 1,
                        j as u32,
                    )
                    .with_content(lines[table_start..j].join("\n")),
                );
                i = j;
            } else {
                i += 1;
            }
        }
    }

    /// Links become imports, opening fence language tags become calls.
    fn extract_links_and_fences(&self, lines: &[&str], result: &mut ParseResult) {
        let mut in_code_block = false;
        for (i, line) in lines.iter().enumerate() {
            let line_no = i as u32 + 1;

            if let Some(captures) = CODE_FENCE_RE.captures(line) {
                if !in_code_block {
                    in_code_block = true;
                    result
                        .calls
                        .push(CallInfo::new(&captures[1], line_no));
                } else {
                    in_code_block = false;
                }
                continue;
            }

            if line.trim() == "```" {
                in_code_block = !in_code_block;
                continue;
            }

            if !in_code_block {
                for captures in LINK_RE.captures_iter(line) {
                    let text = &captures[1];
                    let url = &captures[2];
                    let names = if text.is_empty() {
                        Vec::new()
                    } else {
                        vec![text.to_string()]
                    };
                    result
                        .imports
                        .push(ImportInfo::new(url).with_names(names));
                }
            }
        }
    }
}

impl SourceParser for MarkdownParser {
    fn parse(&mut self, content: &str, _file_path: &str) -> ParseResult {
        let mut result = ParseResult::default();
        if content.is_empty() {
            return result;
        }

        let lines: Vec<&str> = content.lines().collect();
        self.extract_frontmatter(&lines, &mut result);
        self.extract_sections(&lines, &mut result);
        self.extract_tables(&lines, &mut result);
        self.extract_links_and_fences(&lines, &mut result);
        result
    }

    fn language(&self) -> Language {
        Language::Markdown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(code: &str) -> ParseResult {
        MarkdownParser::new().parse(code, "README.md")
    }

    #[test]
    fn frontmatter_keys_become_symbols() {
        let code = "---\ntitle: Axon\nversion: 1.2\n---\n\n# Intro\n";
        let result = parse(code);

        let names: Vec<&str> = result.symbols.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"frontmatter:title"));
        assert!(names.contains(&"frontmatter:version"));
    }

    #[test]
    fn sections_span_to_next_heading_and_eof() {
        let code = "# One\nbody a\nbody b\n## Two\nbody c\n";
        let result = parse(code);

        let one = result.symbols.iter().find(|s| s.name == "One").unwrap();
        assert_eq!(one.kind, SymbolKind::Section);
        assert_eq!((one.start_line, one.end_line), (1, 3));

        // Last section runs to the file's total line count.
        let two = result.symbols.iter().find(|s| s.name == "Two").unwrap();
        assert_eq!((two.start_line, two.end_line), (4, 5));

        // Only level-1 headings are exported.
        assert_eq!(result.exports, vec!["One"]);
    }

    #[test]
    fn tables_are_named_after_first_header() {
        let code = "| Phase | Time |\n|---|---|\n| walk | 1ms |\n";
        let result = parse(code);

        let table = result
            .symbols
            .iter()
            .find(|s| s.name == "table:Phase")
            .unwrap();
        assert_eq!((table.start_line, table.end_line), (1, 3));
    }

    #[test]
    fn single_pipe_line_is_not_a_table() {
        let result = parse("| lonely |\n\ntext\n");
        assert!(!result.symbols.iter().any(|s| s.name.starts_with("table:")));
    }

    #[test]
    fn links_in_code_blocks_are_suppressed() {
        let code = "\
[outside](https://example.com)

```python
x = \"[inside](https://hidden.com)\"
```

[after](https://after.com)
";
        let result = parse(code);

        let modules: Vec<&str> = result.imports.iter().map(|i| i.module.as_str()).collect();
        assert!(modules.contains(&"https://example.com"));
        assert!(modules.contains(&"https://after.com"));
        assert!(!modules.contains(&"https://hidden.com"));

        // Fence language tags are recorded as calls at the opening line.
        let py = result.calls.iter().find(|c| c.name == "python").unwrap();
        assert_eq!(py.line, 3);
    }

    #[test]
    fn unterminated_fence_suppresses_trailing_links() {
        let code = "```rust\nlet x = 1;\n[never](https://nope.com)\n";
        let result = parse(code);
        assert!(result.imports.is_empty());
        assert!(result.calls.iter().any(|c| c.name == "rust"));
    }

    #[test]
    fn full_document_scenario() {
        let code = "\
---
author: dev
---
# Guide

| Col | Val |
|---|---|

```sh
echo [no](https://no.com)
```

[yes](https://yes.com)
";
        let result = parse(code);

        assert!(result.symbols.iter().any(|s| s.name == "frontmatter:author"));
        assert!(result.symbols.iter().any(|s| s.name == "table:Col"));
        assert!(result.symbols.iter().any(|s| s.name == "Guide"));
        assert!(result.calls.iter().any(|c| c.name == "sh"));
        let modules: Vec<&str> = result.imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["https://yes.com"]);
    }
}
