//! Go parser using tree-sitter.
//!
//! Extracts functions, methods (with receiver types), structs, interfaces,
//! and type aliases; import declarations (aliased and dot forms); and
//! calls with selector receivers. An identifier is exported when its first
//! character is uppercase.

use tree_sitter::{Node, Parser};

use super::parser::{end_line, find_child_by_kind, node_text, start_line};
use super::{CallInfo, ImportInfo, Language, ParseResult, SourceParser, SymbolInfo, SymbolKind};
use crate::error::{IndexError, IndexResult};

pub struct GoParser {
    parser: Parser,
}

impl GoParser {
    pub fn new() -> IndexResult<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .map_err(|e| IndexError::GrammarInit {
                language: "Go".into(),
                reason: e.to_string(),
            })?;
        Ok(Self { parser })
    }

    fn walk(&self, node: Node, code: &str, result: &mut ParseResult) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "function_declaration" => self.extract_function(child, code, result),
                "method_declaration" => self.extract_method(child, code, result),
                "type_declaration" => self.extract_type_declaration(child, code, result),
                "import_declaration" => self.extract_imports(child, code, result),
                "call_expression" => self.extract_call(child, code, result),
                _ => self.walk(child, code, result),
            }
        }
    }

    fn extract_function(&self, node: Node, code: &str, result: &mut ParseResult) {
        let Some(name_node) = find_child_by_kind(&node, "identifier") else {
            return;
        };
        let name = node_text(&name_node, code).to_string();

        result.symbols.push(
            SymbolInfo::new(&name, SymbolKind::Function, start_line(&node), end_line(&node))
                .with_content(&code[node.byte_range()]),
        );
        if is_exported(&name) {
            result.exports.push(name);
        }

        if let Some(body) = find_child_by_kind(&node, "block") {
            self.walk_for_calls(body, code, result, false);
        }
    }

    fn extract_method(&self, node: Node, code: &str, result: &mut ParseResult) {
        let Some(name_node) = find_child_by_kind(&node, "field_identifier") else {
            return;
        };
        let name = node_text(&name_node, code).to_string();
        let receiver_type = self.receiver_type(&node, code);

        result.symbols.push(
            SymbolInfo::new(&name, SymbolKind::Method, start_line(&node), end_line(&node))
                .with_content(&code[node.byte_range()])
                .with_class_name(receiver_type),
        );
        if is_exported(&name) {
            result.exports.push(name);
        }

        if let Some(body) = find_child_by_kind(&node, "block") {
            self.walk_for_calls(body, code, result, false);
        }
    }

    /// Receiver type from `func (r *Type) Name()`, unwrapping pointers.
    fn receiver_type(&self, node: &Node, code: &str) -> String {
        let Some(param_list) = find_child_by_kind(node, "parameter_list") else {
            return String::new();
        };
        let mut cursor = param_list.walk();
        for child in param_list.children(&mut cursor) {
            if child.kind() != "parameter_declaration" {
                continue;
            }
            if let Some(type_node) = find_child_by_kind(&child, "type_identifier") {
                return node_text(&type_node, code).to_string();
            }
            if let Some(pointer) = find_child_by_kind(&child, "pointer_type") {
                if let Some(inner) = find_child_by_kind(&pointer, "type_identifier") {
                    return node_text(&inner, code).to_string();
                }
            }
        }
        String::new()
    }

    fn extract_type_declaration(&self, node: Node, code: &str, result: &mut ParseResult) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "type_spec" {
                self.extract_type_spec(child, code, result);
            }
        }
    }

    fn extract_type_spec(&self, node: Node, code: &str, result: &mut ParseResult) {
        let Some(name_node) = find_child_by_kind(&node, "type_identifier") else {
            return;
        };
        let name = node_text(&name_node, code).to_string();

        let mut kind = SymbolKind::TypeAlias;
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "struct_type" => {
                    kind = SymbolKind::Struct;
                    break;
                }
                "interface_type" => {
                    kind = SymbolKind::Interface;
                    break;
                }
                _ => {}
            }
        }

        result.symbols.push(
            SymbolInfo::new(&name, kind, start_line(&node), end_line(&node))
                .with_content(&code[node.byte_range()]),
        );
        if is_exported(&name) {
            result.exports.push(name);
        }
    }

    fn extract_imports(&self, node: Node, code: &str, result: &mut ParseResult) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "import_spec_list" => {
                    let mut inner = child.walk();
                    for spec in child.children(&mut inner) {
                        if spec.kind() == "import_spec" {
                            self.extract_import_spec(spec, code, result);
                        }
                    }
                }
                "import_spec" => self.extract_import_spec(child, code, result),
                "interpreted_string_literal" => {
                    let path = node_text(&child, code).trim_matches('"').to_string();
                    if !path.is_empty() {
                        result.imports.push(ImportInfo::new(path));
                    }
                }
                _ => {}
            }
        }
    }

    fn extract_import_spec(&self, node: Node, code: &str, result: &mut ParseResult) {
        let mut alias = String::new();
        let mut path = String::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "package_identifier" => alias = node_text(&child, code).to_string(),
                "interpreted_string_literal" => {
                    path = node_text(&child, code).trim_matches('"').to_string();
                }
                "dot" => alias = ".".to_string(),
                _ => {}
            }
        }
        if !path.is_empty() {
            result.imports.push(ImportInfo::new(path).with_alias(alias));
        }
    }

    fn extract_call(&self, node: Node, code: &str, result: &mut ParseResult) {
        let line = start_line(&node);
        let Some(func_node) = node.child(0) else {
            return;
        };

        match func_node.kind() {
            "identifier" => {
                result
                    .calls
                    .push(CallInfo::new(node_text(&func_node, code), line));
            }
            "selector_expression" => {
                // pkg.Function() or obj.Method()
                let name = find_child_by_kind(&func_node, "field_identifier")
                    .map(|n| node_text(&n, code).to_string())
                    .unwrap_or_default();
                let receiver = func_node
                    .child(0)
                    .map(|n| node_text(&n, code).to_string())
                    .unwrap_or_default();
                if !name.is_empty() {
                    result
                        .calls
                        .push(CallInfo::new(name, line).with_receiver(receiver));
                }
            }
            _ => {}
        }

        self.walk_for_calls(node, code, result, true);
    }

    fn walk_for_calls(&self, node: Node, code: &str, result: &mut ParseResult, skip_first: bool) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor).skip(usize::from(skip_first)) {
            if child.kind() == "call_expression" {
                self.extract_call(child, code, result);
            } else {
                self.walk_for_calls(child, code, result, false);
            }
        }
    }
}

fn is_exported(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_uppercase())
}

impl SourceParser for GoParser {
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
        Language::Go
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(code: &str) -> ParseResult {
        GoParser::new().unwrap().parse(code, "main.go")
    }

    #[test]
    fn uppercase_identifiers_are_exported() {
        let code = r#"
package main

func Public() {}
func private() {}

type Server struct{}
type handler interface{}
"#;
        let result = parse(code);

        assert!(result.exports.contains(&"Public".to_string()));
        assert!(result.exports.contains(&"Server".to_string()));
        assert!(!result.exports.contains(&"private".to_string()));
        assert!(!result.exports.contains(&"handler".to_string()));
    }

    #[test]
    fn methods_carry_receiver_type() {
        let code = r#"
package main

func (s *Server) Start() {}
func (h handler) serve() {}
"#;
        let result = parse(code);

        let start = result.symbols.iter().find(|s| s.name == "Start").unwrap();
        assert_eq!(start.kind, SymbolKind::Method);
        assert_eq!(start.class_name, "Server");

        let serve = result.symbols.iter().find(|s| s.name == "serve").unwrap();
        assert_eq!(serve.class_name, "handler");
    }

    #[test]
    fn struct_interface_and_alias_kinds() {
        let code = r#"
package main

type Config struct{ Name string }
type Runner interface{ Run() }
type ID int64
"#;
        let result = parse(code);
        let kind_of = |n: &str| result.symbols.iter().find(|s| s.name == n).map(|s| s.kind);
        assert_eq!(kind_of("Config"), Some(SymbolKind::Struct));
        assert_eq!(kind_of("Runner"), Some(SymbolKind::Interface));
        assert_eq!(kind_of("ID"), Some(SymbolKind::TypeAlias));
    }

    #[test]
    fn imports_with_alias_and_dot() {
        let code = r#"
package main

import (
    "fmt"
    log "github.com/sirupsen/logrus"
    . "strings"
)
"#;
        let result = parse(code);

        assert!(result.imports.iter().any(|i| i.module == "fmt"));

        let logrus = result
            .imports
            .iter()
            .find(|i| i.module == "github.com/sirupsen/logrus")
            .unwrap();
        assert_eq!(logrus.alias, "log");

        let strings = result.imports.iter().find(|i| i.module == "strings").unwrap();
        assert_eq!(strings.alias, ".");
    }

    #[test]
    fn selector_calls_have_receivers() {
        let code = r#"
package main

func run() {
    setup()
    fmt.Println("hi")
}
"#;
        let result = parse(code);

        assert!(result
            .calls
            .iter()
            .any(|c| c.name == "setup" && c.receiver.is_empty()));
        assert!(result
            .calls
            .iter()
            .any(|c| c.name == "Println" && c.receiver == "fmt"));
    }
}
