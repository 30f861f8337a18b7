//! SQL parser (regex-based, no grammar).
//!
//! `CREATE TABLE` statements become class-kind symbols; `CREATE VIEW`,
//! `CREATE [OR REPLACE] FUNCTION`, and `CREATE [OR REPLACE] PROCEDURE`
//! become function-kind symbols. A statement's span runs from its CREATE
//! line to the next line containing `;` (or EOF). `DROP:<name>` and
//! `ALTER:<name>` are recorded as calls.

use regex::Regex;
use std::sync::LazyLock;

use super::{CallInfo, Language, ParseResult, SourceParser, SymbolInfo, SymbolKind};

static CREATE_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?im)^\s*CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?[`"]?(\w+)[`"]?"#).unwrap()
});
static CREATE_VIEW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?im)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?(?:MATERIALIZED\s+)?VIEW\s+(?:IF\s+NOT\s+EXISTS\s+)?[`"]?(\w+)[`"]?"#,
    )
    .unwrap()
});
static CREATE_FUNC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?im)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?FUNCTION\s+[`"]?(\w+)[`"]?"#).unwrap()
});
static CREATE_PROC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?im)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?PROCEDURE\s+[`"]?(\w+)[`"]?"#).unwrap()
});
static DROP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?im)^\s*DROP\s+(?:TABLE|VIEW|FUNCTION|PROCEDURE)\s+(?:IF\s+EXISTS\s+)?[`"]?(\w+)[`"]?"#,
    )
    .unwrap()
});
static ALTER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?im)^\s*ALTER\s+TABLE\s+[`"]?(\w+)[`"]?"#).unwrap());

#[derive(Default)]
pub struct SqlParser;

impl SqlParser {
    pub fn new() -> Self {
        Self
    }

    fn extract_statements(
        &self,
        content: &str,
        lines: &[&str],
        re: &Regex,
        kind: SymbolKind,
        result: &mut ParseResult,
    ) {
        for captures in re.captures_iter(content) {
            let name = captures[1].to_string();
            let whole = captures.get(0).map(|m| m.start()).unwrap_or(0);
            let line_no = content[..whole].matches('\n').count() as u32 + 1;
            let end_line = statement_end(lines, line_no as usize - 1);

            result.symbols.push(
                SymbolInfo::new(name, kind, line_no, end_line as u32)
                    .with_content(lines[line_no as usize - 1..end_line].join("\n")),
            );
        }
    }

    fn extract_calls(&self, content: &str, re: &Regex, prefix: &str, result: &mut ParseResult) {
        for captures in re.captures_iter(content) {
            let name = &captures[1];
            let whole = captures.get(0).map(|m| m.start()).unwrap_or(0);
            let line_no = content[..whole].matches('\n').count() as u32 + 1;
            result
                .calls
                .push(CallInfo::new(format!("{prefix}:{name}"), line_no));
        }
    }
}

/// End line (1-based, inclusive) of a statement starting at `start_idx`.
fn statement_end(lines: &[&str], start_idx: usize) -> usize {
    for (i, line) in lines.iter().enumerate().skip(start_idx) {
        if line.contains(';') {
            return i + 1;
        }
    }
    lines.len()
}

impl SourceParser for SqlParser {
    fn parse(&mut self, content: &str, _file_path: &str) -> ParseResult {
        let mut result = ParseResult::default();
        if content.is_empty() {
            return result;
        }

        let lines: Vec<&str> = content.lines().collect();
        self.extract_statements(content, &lines, &CREATE_TABLE_RE, SymbolKind::Class, &mut result);
        self.extract_statements(content, &lines, &CREATE_VIEW_RE, SymbolKind::Function, &mut result);
        self.extract_statements(content, &lines, &CREATE_FUNC_RE, SymbolKind::Function, &mut result);
        self.extract_statements(content, &lines, &CREATE_PROC_RE, SymbolKind::Function, &mut result);
        self.extract_calls(content, &DROP_RE, "DROP", &mut result);
        self.extract_calls(content, &ALTER_RE, "ALTER", &mut result);
        result
    }

    fn language(&self) -> Language {
        Language::Sql
    }
}
