//! CSS/SCSS parser using tree-sitter.
//!
//! Extracts `#id` and `.class` selectors as function-kind symbols (the
//! name keeps its `#`/`.` prefix) and `@import` rules as imports.

use tree_sitter::{Node, Parser};

use super::parser::{end_line, find_child_by_kind, node_text, start_line};
use super::{ImportInfo, Language, ParseResult, SourceParser, SymbolInfo, SymbolKind};
use crate::error::{IndexError, IndexResult};

pub struct CssParser {
    parser: Parser,
}

impl CssParser {
    pub fn new() -> IndexResult<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_css::LANGUAGE.into())
            .map_err(|e| IndexError::GrammarInit {
                language: "CSS".into(),
                reason: e.to_string(),
            })?;
        Ok(Self { parser })
    }

    fn walk(&self, node: Node, code: &str, result: &mut ParseResult) {
        match node.kind() {
            "id_selector" => self.extract_selector(node, code, result, "id_name", '#'),
            "class_selector" => self.extract_selector(node, code, result, "class_name", '.'),
            "import_statement" => self.extract_import(node, code, result),
            _ => {}
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, code, result);
        }
    }

    fn extract_selector(
        &self,
        node: Node,
        code: &str,
        result: &mut ParseResult,
        name_kind: &str,
        prefix: char,
    ) {
        let Some(name_node) = find_child_by_kind(&node, name_kind) else {
            return;
        };
        let name = format!("{prefix}{}", node_text(&name_node, code));
        result.symbols.push(
            SymbolInfo::new(&name, SymbolKind::Function, start_line(&node), end_line(&node))
                .with_content(&code[node.byte_range()]),
        );
    }

    fn extract_import(&self, node: Node, code: &str, result: &mut ParseResult) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if matches!(child.kind(), "string_value" | "call_expression") {
                let raw = node_text(&child, code).trim();
                // Strip url(...) and quotes.
                let mut url = raw;
                if let Some(stripped) = url.strip_prefix("url(") {
                    url = stripped.trim_end_matches(')');
                }
                let url = url.trim_matches(&['"', '\''][..]);
                if !url.is_empty() {
                    result.imports.push(ImportInfo::new(url));
                }
                return;
            }
        }
    }
}

impl SourceParser for CssParser {
    fn parse(&mut self, content: &str, _file_path: &str) -> ParseResult {
        let mut result = ParseResult::default();
        if content.is_empty() {
            return result;
        }
        let Some(tree) = self.parser.parse(content, None) else {
            return result;
        };
        self.walk(tree.root_node(), content, &mut result);
        result
    }

    fn language(&self) -> Language {
        Language::Css
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(code: &str) -> ParseResult {
        CssParser::new().unwrap().parse(code, "styles/main.css")
    }

    #[test]
    fn id_and_class_selectors_keep_prefix() {
        let code = "#header { color: red; }\n.btn-primary { padding: 4px; }\n";
        let result = parse(code);

        let names: Vec<&str> = result.symbols.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"#header"));
        assert!(names.contains(&".btn-primary"));
        assert!(result.symbols.iter().all(|s| s.kind == SymbolKind::Function));
    }

    #[test]
    fn import_forms() {
        let code = "@import \"reset.css\";\n@import url(\"theme.css\");\n";
        let result = parse(code);

        let modules: Vec<&str> = result.imports.iter().map(|i| i.module.as_str()).collect();
        assert!(modules.contains(&"reset.css"));
        assert!(modules.contains(&"theme.css"));
    }

    #[test]
    fn compound_selectors_emit_each_part() {
        let result = parse("div#app .sidebar a { margin: 0; }\n");
        let names: Vec<&str> = result.symbols.iter().map(|s| s.name.as_str()).collect();
        assert!(names.contains(&"#app"));
        assert!(names.contains(&".sidebar"));
    }
}
