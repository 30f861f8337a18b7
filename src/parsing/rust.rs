//! Rust parser using tree-sitter.
//!
//! Extracts functions, structs, enums, traits, impl blocks, type aliases,
//! modules, use declarations, heritage (`impl Trait for Struct`), and
//! calls (including method calls and macro invocations).

use tree_sitter::{Node, Parser};

use super::parser::{end_line, find_child_by_kind, node_text, start_line};
use super::{CallInfo, Heritage, ImportInfo, Language, ParseResult, SourceParser, SymbolInfo, SymbolKind};
use crate::error::{IndexError, IndexResult};

pub struct RustParser {
    parser: Parser,
}

impl RustParser {
    pub fn new() -> IndexResult<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_rust::LANGUAGE.into())
            .map_err(|e| IndexError::GrammarInit {
                language: "Rust".into(),
                reason: e.to_string(),
            })?;
        Ok(Self { parser })
    }

    fn walk(&self, node: Node, code: &str, result: &mut ParseResult, class_name: &str) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "function_item" => self.extract_function(child, code, result, class_name),
                "function_signature_item" => {
                    self.extract_function_signature(child, code, result, class_name)
                }
                "struct_item" => self.extract_named_type(child, code, result, SymbolKind::Struct),
                "enum_item" => self.extract_named_type(child, code, result, SymbolKind::Enum),
                "trait_item" => self.extract_trait(child, code, result),
                "impl_item" => self.extract_impl(child, code, result),
                "mod_item" => self.extract_mod(child, code, result),
                "type_item" => {
                    self.extract_named_type(child, code, result, SymbolKind::TypeAlias)
                }
                "use_declaration" => self.extract_use(child, code, result),
                "call_expression" => self.extract_call_expression(child, code, result),
                "method_call_expression" => self.extract_method_call(child, code, result),
                "macro_invocation" => self.extract_macro_invocation(child, code, result),
                _ => self.walk(child, code, result, class_name),
            }
        }
    }

    fn extract_function(&self, node: Node, code: &str, result: &mut ParseResult, class_name: &str) {
        let Some(name_node) = find_child_by_kind(&node, "identifier") else {
            return;
        };
        let name = node_text(&name_node, code).to_string();
        let kind = if class_name.is_empty() {
            SymbolKind::Function
        } else {
            SymbolKind::Method
        };

        result.symbols.push(
            SymbolInfo::new(&name, kind, start_line(&node), end_line(&node))
                .with_content(&code[node.byte_range()])
                .with_class_name(class_name),
        );

        if has_visibility(&node) && class_name.is_empty() {
            result.exports.push(name);
        }

        if let Some(block) = find_child_by_kind(&node, "block") {
            self.walk(block, code, result, class_name);
        }
    }

    // Trait method signatures have no body to descend into.
    fn extract_function_signature(
        &self,
        node: Node,
        code: &str,
        result: &mut ParseResult,
        class_name: &str,
    ) {
        let Some(name_node) = find_child_by_kind(&node, "identifier") else {
            return;
        };
        let kind = if class_name.is_empty() {
            SymbolKind::Function
        } else {
            SymbolKind::Method
        };
        result.symbols.push(
            SymbolInfo::new(
                node_text(&name_node, code),
                kind,
                start_line(&node),
                end_line(&node),
            )
            .with_content(&code[node.byte_range()])
            .with_class_name(class_name),
        );
    }

    fn extract_named_type(&self, node: Node, code: &str, result: &mut ParseResult, kind: SymbolKind) {
        let Some(name_node) = find_child_by_kind(&node, "type_identifier") else {
            return;
        };
        let name = node_text(&name_node, code).to_string();
        result.symbols.push(
            SymbolInfo::new(&name, kind, start_line(&node), end_line(&node))
                .with_content(&code[node.byte_range()]),
        );
        if has_visibility(&node) {
            result.exports.push(name);
        }
    }

    fn extract_trait(&self, node: Node, code: &str, result: &mut ParseResult) {
        let Some(name_node) = find_child_by_kind(&node, "type_identifier") else {
            return;
        };
        let name = node_text(&name_node, code).to_string();
        result.symbols.push(
            SymbolInfo::new(&name, SymbolKind::Interface, start_line(&node), end_line(&node))
                .with_content(&code[node.byte_range()]),
        );
        if has_visibility(&node) {
            result.exports.push(name.clone());
        }

        if let Some(decl_list) = find_child_by_kind(&node, "declaration_list") {
            self.walk(decl_list, code, result, &name);
        }
    }

    fn extract_impl(&self, node: Node, code: &str, result: &mut ParseResult) {
        let mut cursor = node.walk();
        let type_nodes: Vec<Node> = node
            .children(&mut cursor)
            .filter(|c| c.kind() == "type_identifier")
            .collect();
        let has_for = {
            let mut cursor = node.walk();
            node.children(&mut cursor).any(|c| c.kind() == "for")
        };

        let mut struct_name = String::new();
        if has_for && type_nodes.len() >= 2 {
            let trait_name = node_text(&type_nodes[0], code).to_string();
            struct_name = node_text(&type_nodes[1], code).to_string();
            result
                .heritage
                .push(Heritage::implements(&struct_name, trait_name));
        } else if type_nodes.len() == 1 {
            struct_name = node_text(&type_nodes[0], code).to_string();
        }

        if let Some(decl_list) = find_child_by_kind(&node, "declaration_list") {
            self.walk(decl_list, code, result, &struct_name);
        }
    }

    fn extract_mod(&self, node: Node, code: &str, result: &mut ParseResult) {
        let Some(name_node) = find_child_by_kind(&node, "identifier") else {
            return;
        };
        result.symbols.push(
            SymbolInfo::new(
                node_text(&name_node, code),
                SymbolKind::Module,
                start_line(&node),
                end_line(&node),
            )
            .with_content(&code[node.byte_range()]),
        );

        if let Some(decl_list) = find_child_by_kind(&node, "declaration_list") {
            self.walk(decl_list, code, result, "");
        }
    }

    fn extract_use(&self, node: Node, code: &str, result: &mut ParseResult) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "scoped_identifier" | "scoped_use_list" | "identifier" | "use_wildcard" => {
                    self.process_use_node(child, code, "", result);
                    return;
                }
                _ => {}
            }
        }
    }

    fn process_use_node(&self, node: Node, code: &str, prefix: &str, result: &mut ParseResult) {
        match node.kind() {
            "scoped_identifier" => {
                // e.g. std::collections::HashMap, where the last segment is the name
                let full_path = node_text(&node, code).to_string();
                let leaf = full_path.rsplit("::").next().unwrap_or(&full_path).to_string();
                result
                    .imports
                    .push(ImportInfo::new(full_path).with_names(vec![leaf]));
            }
            "scoped_use_list" => {
                // e.g. foo::{A, B}
                let mut path_prefix = String::new();
                let mut cursor = node.walk();
                for child in node.children(&mut cursor) {
                    match child.kind() {
                        "scoped_identifier" | "identifier" => {
                            path_prefix = node_text(&child, code).to_string();
                        }
                        "use_list" => {
                            self.process_use_list(child, code, &path_prefix, result);
                        }
                        _ => {}
                    }
                }
            }
            "use_list" => self.process_use_list(node, code, prefix, result),
            "identifier" => {
                let name = node_text(&node, code).to_string();
                let full_path = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}::{name}")
                };
                result
                    .imports
                    .push(ImportInfo::new(full_path).with_names(vec![name]));
            }
            _ => {}
        }
    }

    fn process_use_list(&self, node: Node, code: &str, prefix: &str, result: &mut ParseResult) {
        let mut names: Vec<String> = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "identifier" => names.push(node_text(&child, code).to_string()),
                "scoped_identifier" | "scoped_use_list" => {
                    self.process_use_node(child, code, prefix, result);
                }
                _ => {}
            }
        }
        if !names.is_empty() {
            result
                .imports
                .push(ImportInfo::new(prefix).with_names(names));
        }
    }

    fn extract_call_expression(&self, node: Node, code: &str, result: &mut ParseResult) {
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
            "field_expression" => {
                // Function pointer call through field access.
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
            "scoped_identifier" => {
                // e.g. HashMap::new()
                let full = node_text(&func_node, code);
                let (receiver, name) = match full.rsplit_once("::") {
                    Some((left, right)) => (left.to_string(), right.to_string()),
                    None => (String::new(), full.to_string()),
                };
                result
                    .calls
                    .push(CallInfo::new(name, line).with_receiver(receiver));
            }
            _ => {}
        }

        self.walk_for_calls(node, code, result, true);
    }

    fn extract_method_call(&self, node: Node, code: &str, result: &mut ParseResult) {
        let line = start_line(&node);
        let Some(name_node) = find_child_by_kind(&node, "field_identifier") else {
            return;
        };

        let receiver = node
            .child(0)
            .filter(|n| matches!(n.kind(), "identifier" | "self"))
            .map(|n| node_text(&n, code).to_string())
            .unwrap_or_default();

        result.calls.push(
            CallInfo::new(node_text(&name_node, code), line).with_receiver(receiver),
        );

        self.walk_for_calls(node, code, result, false);
    }

    fn extract_macro_invocation(&self, node: Node, code: &str, result: &mut ParseResult) {
        let Some(name_node) = find_child_by_kind(&node, "identifier") else {
            return;
        };
        let name = format!("{}!", node_text(&name_node, code));
        result.calls.push(CallInfo::new(name, start_line(&node)));
    }

    fn walk_for_calls(&self, node: Node, code: &str, result: &mut ParseResult, skip_first: bool) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor).skip(usize::from(skip_first)) {
            match child.kind() {
                "call_expression" => self.extract_call_expression(child, code, result),
                "method_call_expression" => self.extract_method_call(child, code, result),
                "macro_invocation" => self.extract_macro_invocation(child, code, result),
                _ => self.walk_for_calls(child, code, result, false),
            }
        }
    }
}

fn has_visibility(node: &Node) -> bool {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .any(|c| c.kind() == "visibility_modifier")
}

impl SourceParser for RustParser {
    fn parse(&mut self, content: &str, _file_path: &str) -> ParseResult {
        let mut result = ParseResult::default();
        if content.is_empty() {
            return result;
        }
        let Some(tree) = self.parser.parse(content, None) else {
            return result;
        };
        self.walk(tree.root_node(), content, &mut result, "");
        result
    }

    fn language(&self) -> Language {
        Language::Rust
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RelationKind;

    fn parse(code: &str) -> ParseResult {
        RustParser::new().unwrap().parse(code, "src/lib.rs")
    }

    #[test]
    fn extracts_functions_and_visibility() {
        let result = parse("pub fn add(a: i32, b: i32) -> i32 { a + b }\nfn helper() {}\n");

        let names: Vec<&str> = result.symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["add", "helper"]);
        assert!(result.symbols.iter().all(|s| s.kind == SymbolKind::Function));
        assert_eq!(result.exports, vec!["add"]);
    }

    #[test]
    fn impl_trait_for_struct_emits_heritage_and_methods() {
        let code = r#"
pub struct MyStruct;

impl Display for MyStruct {
    fn fmt(&self, f: &mut Formatter) -> Result {
        write!(f, "x")
    }
}
"#;
        let result = parse(code);

        assert_eq!(result.heritage.len(), 1);
        let heritage = &result.heritage[0];
        assert_eq!(heritage.subject, "MyStruct");
        assert_eq!(heritage.relation, RelationKind::Implements);
        assert_eq!(heritage.object, "Display");

        let fmt = result
            .symbols
            .iter()
            .find(|s| s.name == "fmt")
            .expect("fmt method extracted");
        assert_eq!(fmt.kind, SymbolKind::Method);
        assert_eq!(fmt.class_name, "MyStruct");
    }

    #[test]
    fn inherent_impl_methods_carry_type_name() {
        let code = r#"
struct Counter { count: u32 }

impl Counter {
    pub fn new() -> Self { Self { count: 0 } }
}
"#;
        let result = parse(code);
        let new = result.symbols.iter().find(|s| s.name == "new").unwrap();
        assert_eq!(new.kind, SymbolKind::Method);
        assert_eq!(new.class_name, "Counter");
        assert!(result.heritage.is_empty());
    }

    #[test]
    fn use_declarations_become_imports() {
        let code = "use std::collections::HashMap;\nuse crate::graph::{KnowledgeGraph, NodeLabel};\n";
        let result = parse(code);

        let scoped = result
            .imports
            .iter()
            .find(|i| i.module == "std::collections::HashMap")
            .unwrap();
        assert_eq!(scoped.names, vec!["HashMap"]);

        let list = result
            .imports
            .iter()
            .find(|i| i.module == "crate::graph")
            .unwrap();
        assert_eq!(list.names, vec!["KnowledgeGraph", "NodeLabel"]);
    }

    #[test]
    fn calls_cover_free_scoped_method_and_macro() {
        let code = r#"
fn run() {
    helper();
    HashMap::new();
    buffer.clear();
    println!("hi");
}
"#;
        let result = parse(code);
        let by_name = |n: &str| result.calls.iter().find(|c| c.name == n);

        assert!(by_name("helper").unwrap().receiver.is_empty());
        assert_eq!(by_name("new").unwrap().receiver, "HashMap");
        assert_eq!(by_name("clear").unwrap().receiver, "buffer");
        assert!(by_name("println!").is_some());
    }

    #[test]
    fn enums_traits_aliases_and_modules() {
        let code = r#"
pub enum Shape { Circle, Square }
pub trait Draw { fn draw(&self); }
pub type Grid = Vec<Shape>;
mod internal {
    fn hidden() {}
}
"#;
        let result = parse(code);

        let kind_of = |n: &str| result.symbols.iter().find(|s| s.name == n).map(|s| s.kind);
        assert_eq!(kind_of("Shape"), Some(SymbolKind::Enum));
        assert_eq!(kind_of("Draw"), Some(SymbolKind::Interface));
        assert_eq!(kind_of("Grid"), Some(SymbolKind::TypeAlias));
        assert_eq!(kind_of("internal"), Some(SymbolKind::Module));
        assert_eq!(kind_of("hidden"), Some(SymbolKind::Function));

        // Trait method signatures belong to the trait.
        let draw = result.symbols.iter().find(|s| s.name == "draw").unwrap();
        assert_eq!(draw.class_name, "Draw");
    }

    #[test]
    fn malformed_input_does_not_panic() {
        let result = parse("fn broken( {{{ impl for ;;; use ::");
        // Partial output is fine; the invariant is no panic and valid spans.
        for symbol in &result.symbols {
            assert!(symbol.start_line >= 1);
            assert!(symbol.start_line <= symbol.end_line);
        }
    }
}
