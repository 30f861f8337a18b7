//! TypeScript/JavaScript parser using tree-sitter.
//!
//! Extracts classes, functions (including arrow functions bound to
//! `const`), methods, interfaces, and type aliases; `import`/`require`
//! statements; calls with member receivers; and `extends`/`implements`
//! heritage. The `export` keyword drives the export list. TSX/JSX files
//! are parsed with the TSX grammar.

use tree_sitter::{Node, Parser};

use super::parser::{end_line, find_child_by_kind, node_text, start_line};
use super::{CallInfo, Heritage, ImportInfo, Language, ParseResult, SourceParser, SymbolInfo, SymbolKind};
use crate::error::{IndexError, IndexResult};

pub struct TypeScriptParser {
    parser: Parser,
}

impl TypeScriptParser {
    pub fn new() -> IndexResult<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into())
            .map_err(|e| IndexError::GrammarInit {
                language: "TypeScript".into(),
                reason: e.to_string(),
            })?;
        Ok(Self { parser })
    }

    fn walk(&self, node: Node, code: &str, result: &mut ParseResult, exported: bool) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "export_statement" => {
                    if let Some(declaration) = child.child_by_field_name("declaration") {
                        self.extract_declaration(declaration, code, result, true);
                    }
                }
                "import_statement" => self.extract_import(child, code, result),
                "call_expression" => {
                    self.extract_call(child, code, result);
                    self.walk(child, code, result, false);
                }
                _ => {
                    if !self.extract_declaration(child, code, result, exported) {
                        self.walk(child, code, result, false);
                    }
                }
            }
        }
    }

    /// Returns true if the node was a recognized declaration.
    fn extract_declaration(
        &self,
        node: Node,
        code: &str,
        result: &mut ParseResult,
        exported: bool,
    ) -> bool {
        match node.kind() {
            "class_declaration" | "abstract_class_declaration" => {
                self.extract_class(node, code, result, exported);
                true
            }
            "function_declaration" | "generator_function_declaration" => {
                self.extract_function(node, code, result, exported);
                true
            }
            "interface_declaration" => {
                self.extract_named(node, code, result, SymbolKind::Interface, exported);
                true
            }
            "type_alias_declaration" => {
                self.extract_named(node, code, result, SymbolKind::TypeAlias, exported);
                true
            }
            "lexical_declaration" | "variable_declaration" => {
                self.extract_lexical(node, code, result, exported);
                true
            }
            _ => false,
        }
    }

    fn extract_class(&self, node: Node, code: &str, result: &mut ParseResult, exported: bool) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(&name_node, code).to_string();

        result.symbols.push(
            SymbolInfo::new(&name, SymbolKind::Class, start_line(&node), end_line(&node))
                .with_content(&code[node.byte_range()]),
        );
        if exported {
            result.exports.push(name.clone());
        }

        // extends/implements live under class_heritage.
        if let Some(heritage) = find_child_by_kind(&node, "class_heritage") {
            let mut cursor = heritage.walk();
            for clause in heritage.children(&mut cursor) {
                match clause.kind() {
                    "extends_clause" | "implements_clause" => {
                        self.collect_heritage_targets(clause, code, &name, result);
                    }
                    _ => {}
                }
            }
        }

        if let Some(body) = node.child_by_field_name("body") {
            self.extract_class_body(body, code, result, &name);
        }
    }

    fn collect_heritage_targets(
        &self,
        clause: Node,
        code: &str,
        class_name: &str,
        result: &mut ParseResult,
    ) {
        let mut cursor = clause.walk();
        for target in clause.children(&mut cursor) {
            match target.kind() {
                "identifier" | "type_identifier" | "member_expression" | "nested_type_identifier"
                | "generic_type" => {
                    let text = node_text(&target, code);
                    let base = text.split('<').next().unwrap_or(text).trim();
                    if !base.is_empty() {
                        result.heritage.push(Heritage::implements(class_name, base));
                    }
                }
                _ => {}
            }
        }
    }

    fn extract_class_body(&self, body: Node, code: &str, result: &mut ParseResult, class_name: &str) {
        let mut cursor = body.walk();
        for member in body.children(&mut cursor) {
            if member.kind() == "method_definition" {
                let Some(name_node) = member.child_by_field_name("name") else {
                    continue;
                };
                result.symbols.push(
                    SymbolInfo::new(
                        node_text(&name_node, code),
                        SymbolKind::Method,
                        start_line(&member),
                        end_line(&member),
                    )
                    .with_content(&code[member.byte_range()])
                    .with_class_name(class_name),
                );
                if let Some(method_body) = member.child_by_field_name("body") {
                    self.walk(method_body, code, result, false);
                }
            }
        }
    }

    fn extract_function(&self, node: Node, code: &str, result: &mut ParseResult, exported: bool) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(&name_node, code).to_string();
        result.symbols.push(
            SymbolInfo::new(&name, SymbolKind::Function, start_line(&node), end_line(&node))
                .with_content(&code[node.byte_range()]),
        );
        if exported {
            result.exports.push(name);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, code, result, false);
        }
    }

    fn extract_named(
        &self,
        node: Node,
        code: &str,
        result: &mut ParseResult,
        kind: SymbolKind,
        exported: bool,
    ) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(&name_node, code).to_string();
        result.symbols.push(
            SymbolInfo::new(&name, kind, start_line(&node), end_line(&node))
                .with_content(&code[node.byte_range()]),
        );
        if exported {
            result.exports.push(name);
        }
    }

    // const handler = () => {} counts as a function definition.
    fn extract_lexical(&self, node: Node, code: &str, result: &mut ParseResult, exported: bool) {
        let mut cursor = node.walk();
        for declarator in node.children(&mut cursor) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            let Some(value) = declarator.child_by_field_name("value") else {
                continue;
            };
            match value.kind() {
                "arrow_function" | "function_expression" | "function" => {
                    let name = node_text(&name_node, code).to_string();
                    result.symbols.push(
                        SymbolInfo::new(
                            &name,
                            SymbolKind::Function,
                            start_line(&declarator),
                            end_line(&declarator),
                        )
                        .with_content(&code[declarator.byte_range()]),
                    );
                    if exported {
                        result.exports.push(name);
                    }
                    if let Some(body) = value.child_by_field_name("body") {
                        self.walk(body, code, result, false);
                    }
                }
                "call_expression" => {
                    self.extract_call(value, code, result);
                    self.walk(value, code, result, false);
                }
                _ => self.walk(value, code, result, false),
            }
        }
    }

    fn extract_import(&self, node: Node, code: &str, result: &mut ParseResult) {
        let Some(source) = node.child_by_field_name("source") else {
            return;
        };
        let module = node_text(&source, code).trim_matches(&['"', '\''][..]).to_string();

        let mut names: Vec<String> = Vec::new();
        let mut alias = String::new();

        if let Some(clause) = find_child_by_kind(&node, "import_clause") {
            let mut cursor = clause.walk();
            for child in clause.children(&mut cursor) {
                match child.kind() {
                    "identifier" => names.push(node_text(&child, code).to_string()),
                    "named_imports" => {
                        let mut inner = child.walk();
                        for specifier in child.children(&mut inner) {
                            if specifier.kind() == "import_specifier" {
                                if let Some(name_node) = specifier.child_by_field_name("name") {
                                    names.push(node_text(&name_node, code).to_string());
                                }
                            }
                        }
                    }
                    "namespace_import" => {
                        if let Some(ns) = find_child_by_kind(&child, "identifier") {
                            alias = node_text(&ns, code).to_string();
                        }
                    }
                    _ => {}
                }
            }
        }

        result
            .imports
            .push(ImportInfo::new(module).with_names(names).with_alias(alias));
    }

    fn extract_call(&self, node: Node, code: &str, result: &mut ParseResult) {
        let line = start_line(&node);
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };

        match function.kind() {
            "identifier" => {
                let name = node_text(&function, code);
                if name == "require" {
                    if let Some(module) = first_string_argument(&node, code) {
                        result.imports.push(ImportInfo::new(module));
                        return;
                    }
                }
                result.calls.push(CallInfo::new(name, line));
            }
            "member_expression" => {
                let name = function
                    .child_by_field_name("property")
                    .map(|n| node_text(&n, code).to_string())
                    .unwrap_or_default();
                let receiver = function
                    .child_by_field_name("object")
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
    }
}

fn first_string_argument(call: &Node, code: &str) -> Option<String> {
    let args = call.child_by_field_name("arguments")?;
    let mut cursor = args.walk();
    let string = args.children(&mut cursor).find(|c| c.kind() == "string")?;
    Some(node_text(&string, code).trim_matches(&['"', '\''][..]).to_string())
}

impl SourceParser for TypeScriptParser {
    fn parse(&mut self, content: &str, file_path: &str) -> ParseResult {
        let mut result = ParseResult::default();
        if content.is_empty() {
            return result;
        }

        // Pick the grammar variant by extension: TSX for .tsx, the
        // JavaScript grammar (which handles JSX natively) for JS files.
        let language: tree_sitter::Language = if file_path.ends_with(".tsx") {
            tree_sitter_typescript::LANGUAGE_TSX.into()
        } else if file_path.ends_with(".js")
            || file_path.ends_with(".jsx")
            || file_path.ends_with(".mjs")
        {
            tree_sitter_javascript::LANGUAGE.into()
        } else {
            tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()
        };
        let _ = self.parser.set_language(&language);

        let Some(tree) = self.parser.parse(content, None) else {
            return result;
        };
        self.walk(tree.root_node(), content, &mut result, false);
        result
    }

    fn language(&self) -> Language {
        Language::TypeScript
    }
}
