//! Parser contract and intermediate representation.
//!
//! `ParseResult` is the sole output of any parser. Parsers are pure with
//! respect to `(content, path)`, never panic on malformed input (a partial
//! result is acceptable), and an empty input yields an empty result.

use serde::{Deserialize, Serialize};
use tree_sitter::Node;

use super::Language;
use crate::types::RelationKind;

/// Kind of a parsed symbol. Mirrors the node labels, plus `Section` for
/// document structure (Markdown headings and tables).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Class,
    Function,
    Method,
    Macro,
    Struct,
    Enum,
    Interface,
    TypeAlias,
    Module,
    Section,
}

/// A named, source-located construct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: SymbolKind,
    /// 1-based, inclusive.
    pub start_line: u32,
    pub end_line: u32,
    /// Source text of the span.
    pub content: String,
    pub signature: String,
    pub decorators: Vec<String>,
    /// Owning class/module for methods; empty for free functions.
    pub class_name: String,
}

impl SymbolInfo {
    pub fn new(name: impl Into<String>, kind: SymbolKind, start_line: u32, end_line: u32) -> Self {
        Self {
            name: name.into(),
            kind,
            start_line,
            end_line,
            content: String::new(),
            signature: String::new(),
            decorators: Vec::new(),
            class_name: String::new(),
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn with_class_name(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }
}

/// An import statement: the importee as named in source, plus any selective
/// names and local alias (`*` marks a wildcard import).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportInfo {
    pub module: String,
    pub names: Vec<String>,
    pub alias: String,
}

impl ImportInfo {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            names: Vec::new(),
            alias: String::new(),
        }
    }

    pub fn with_names(mut self, names: Vec<String>) -> Self {
        self.names = names;
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }
}

/// A call site. `receiver` is the textual left operand of a dotted or
/// scoped call, empty for free calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallInfo {
    pub name: String,
    pub line: u32,
    pub receiver: String,
}

impl CallInfo {
    pub fn new(name: impl Into<String>, line: u32) -> Self {
        Self {
            name: name.into(),
            line,
            receiver: String::new(),
        }
    }

    pub fn with_receiver(mut self, receiver: impl Into<String>) -> Self {
        self.receiver = receiver.into();
        self
    }
}

/// An inheritance-like subject/relation/object tuple
/// (`impl Display for MyStruct` → `(MyStruct, Implements, Display)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heritage {
    pub subject: String,
    pub relation: RelationKind,
    pub object: String,
}

impl Heritage {
    pub fn implements(subject: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            relation: RelationKind::Implements,
            object: object.into(),
        }
    }

    pub fn uses(subject: impl Into<String>, object: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            relation: RelationKind::Uses,
            object: object.into(),
        }
    }
}

/// The per-file output shared by all parsers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub symbols: Vec<SymbolInfo>,
    pub imports: Vec<ImportInfo>,
    pub calls: Vec<CallInfo>,
    pub heritage: Vec<Heritage>,
    pub exports: Vec<String>,
}

impl ParseResult {
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
            && self.imports.is_empty()
            && self.calls.is_empty()
            && self.heritage.is_empty()
            && self.exports.is_empty()
    }
}

/// Common interface for all language parsers.
///
/// `parse` must be deterministic for identical `(content, path)` and must
/// make progress on malformed input instead of failing: whatever was
/// unambiguously identified before a broken region is returned.
pub trait SourceParser: Send {
    fn parse(&mut self, content: &str, file_path: &str) -> ParseResult;

    fn language(&self) -> Language;
}

/// Create a parser for a language. This table is the single extension
/// point for language support.
pub fn parser_for(language: Language) -> Option<Box<dyn SourceParser>> {
    match language {
        Language::Python => super::python::PythonParser::new().ok().map(boxed),
        Language::TypeScript => super::typescript::TypeScriptParser::new().ok().map(boxed),
        Language::Go => super::go::GoParser::new().ok().map(boxed),
        Language::Rust => super::rust::RustParser::new().ok().map(boxed),
        Language::Elixir => super::elixir::ElixirParser::new().ok().map(boxed),
        Language::Css => super::css::CssParser::new().ok().map(boxed),
        Language::Html => super::html::HtmlParser::new().ok().map(boxed),
        Language::Markdown => Some(Box::new(super::markdown::MarkdownParser::new())),
        Language::Yaml => Some(Box::new(super::yaml::YamlParser::new())),
        Language::Sql => Some(Box::new(super::sql::SqlParser::new())),
    }
}

fn boxed<P: SourceParser + 'static>(parser: P) -> Box<dyn SourceParser> {
    Box::new(parser)
}

/// Return the first direct child of `node` with the given kind.
pub(crate) fn find_child_by_kind<'a>(node: &Node<'a>, kind: &str) -> Option<Node<'a>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).find(|c| c.kind() == kind)
}

/// Node text as a `&str`, empty on any encoding boundary problem.
pub(crate) fn node_text<'a>(node: &Node, code: &'a str) -> &'a str {
    node.utf8_text(code.as_bytes()).unwrap_or("")
}

/// 1-based start line of a node.
pub(crate) fn start_line(node: &Node) -> u32 {
    node.start_position().row as u32 + 1
}

/// 1-based end line of a node.
pub(crate) fn end_line(node: &Node) -> u32 {
    node.end_position().row as u32 + 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_parse_result_is_empty() {
        assert!(ParseResult::default().is_empty());
    }

    #[test]
    fn every_language_has_a_parser() {
        for language in [
            Language::Python,
            Language::TypeScript,
            Language::Go,
            Language::Rust,
            Language::Elixir,
            Language::Css,
            Language::Html,
            Language::Markdown,
            Language::Yaml,
            Language::Sql,
        ] {
            let parser = parser_for(language);
            assert!(parser.is_some(), "no parser for {language:?}");
            assert_eq!(parser.unwrap().language(), language);
        }
    }

    #[test]
    fn empty_input_yields_empty_result_for_all_parsers() {
        for language in [
            Language::Python,
            Language::TypeScript,
            Language::Go,
            Language::Rust,
            Language::Elixir,
            Language::Css,
            Language::Html,
            Language::Markdown,
            Language::Yaml,
            Language::Sql,
        ] {
            let mut parser = parser_for(language).unwrap();
            let result = parser.parse("", "empty.file");
            assert!(
                result.symbols.is_empty()
                    && result.imports.is_empty()
                    && result.calls.is_empty()
                    && result.heritage.is_empty(),
                "{language:?} produced output for empty input"
            );
        }
    }
}
