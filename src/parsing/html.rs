//! HTML parser using tree-sitter.
//!
//! Elements bearing an `id` attribute become function-kind symbols (name
//! is the id value), `<script src>` and `<link href>` become imports, and
//! `<a href>` anchors become calls.

use std::collections::HashMap;

use tree_sitter::{Node, Parser};

use super::parser::{end_line, find_child_by_kind, node_text, start_line};
use super::{CallInfo, ImportInfo, Language, ParseResult, SourceParser, SymbolInfo, SymbolKind};
use crate::error::{IndexError, IndexResult};

/// Element snippets are capped so huge container divs do not bloat nodes.
const MAX_ELEMENT_CONTENT: usize = 200;

pub struct HtmlParser {
    parser: Parser,
}

impl HtmlParser {
    pub fn new() -> IndexResult<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_html::LANGUAGE.into())
            .map_err(|e| IndexError::GrammarInit {
                language: "HTML".into(),
                reason: e.to_string(),
            })?;
        Ok(Self { parser })
    }

    fn walk(&self, node: Node, code: &str, result: &mut ParseResult) {
        if matches!(node.kind(), "element" | "script_element" | "style_element") {
            self.process_element(node, code, result);
        }

        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            self.walk(child, code, result);
        }
    }

    fn process_element(&self, node: Node, code: &str, result: &mut ParseResult) {
        let start_tag = find_child_by_kind(&node, "start_tag")
            .or_else(|| find_child_by_kind(&node, "self_closing_tag"));
        let Some(start_tag) = start_tag else {
            return;
        };

        let tag_name = find_child_by_kind(&start_tag, "tag_name")
            .map(|n| node_text(&n, code).to_lowercase())
            .unwrap_or_default();
        let attrs = self.attributes(&start_tag, code);

        if let Some(id) = attrs.get("id") {
            let mut content = code[node.byte_range()].to_string();
            content.truncate(floor_char_boundary(&content, MAX_ELEMENT_CONTENT));
            result.symbols.push(
                SymbolInfo::new(id, SymbolKind::Function, start_line(&node), end_line(&node))
                    .with_content(content),
            );
        }

        if tag_name == "script" {
            if let Some(src) = attrs.get("src") {
                result.imports.push(ImportInfo::new(src));
            }
        }
        if tag_name == "link" {
            if let Some(href) = attrs.get("href") {
                result.imports.push(ImportInfo::new(href));
            }
        }
        if tag_name == "a" {
            if let Some(href) = attrs.get("href") {
                result.calls.push(CallInfo::new(href, start_line(&node)));
            }
        }
    }

    fn attributes(&self, start_tag: &Node, code: &str) -> HashMap<String, String> {
        let mut attrs = HashMap::new();
        let mut cursor = start_tag.walk();
        for child in start_tag.children(&mut cursor) {
            if child.kind() != "attribute" {
                continue;
            }
            let mut name = String::new();
            let mut value = String::new();
            let mut inner = child.walk();
            for part in child.children(&mut inner) {
                match part.kind() {
                    "attribute_name" => name = node_text(&part, code).to_lowercase(),
                    "quoted_attribute_value" => {
                        value = node_text(&part, code).trim_matches(&['"', '\''][..]).to_string();
                    }
                    "attribute_value" => value = node_text(&part, code).to_string(),
                    _ => {}
                }
            }
            if !name.is_empty() {
                attrs.insert(name, value);
            }
        }
        attrs
    }
}

/// Largest byte index `<= max` that is a char boundary.
fn floor_char_boundary(s: &str, max: usize) -> usize {
    if s.len() <= max {
        return s.len();
    }
    let mut boundary = max;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}

impl SourceParser for HtmlParser {
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
        Language::Html
    }
}
