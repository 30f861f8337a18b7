//! Python parser using tree-sitter.
//!
//! Extracts classes, functions, and methods (with decorator capture),
//! `import`/`from` statements, free and attribute calls, and base-class
//! heritage. All top-level definitions are exports.

use tree_sitter::{Node, Parser};

use super::parser::{end_line, find_child_by_kind, node_text, start_line};
use super::{CallInfo, Heritage, ImportInfo, Language, ParseResult, SourceParser, SymbolInfo, SymbolKind};
use crate::error::{IndexError, IndexResult};

pub struct PythonParser {
    parser: Parser,
}

impl PythonParser {
    pub fn new() -> IndexResult<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_python::LANGUAGE.into())
            .map_err(|e| IndexError::GrammarInit {
                language: "Python".into(),
                reason: e.to_string(),
            })?;
        Ok(Self { parser })
    }

    fn walk(
        &self,
        node: Node,
        code: &str,
        result: &mut ParseResult,
        class_name: &str,
        top_level: bool,
    ) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "class_definition" => {
                    self.extract_class(child, code, result, &[], top_level);
                }
                "function_definition" => {
                    self.extract_function(child, code, result, class_name, &[], top_level);
                }
                "decorated_definition" => {
                    self.extract_decorated(child, code, result, class_name, top_level);
                }
                "import_statement" => self.extract_import(child, code, result),
                "import_from_statement" => self.extract_import_from(child, code, result),
                "call" => {
                    self.extract_call(child, code, result);
                    self.walk(child, code, result, class_name, false);
                }
                _ => self.walk(child, code, result, class_name, top_level),
            }
        }
    }

    fn extract_decorated(
        &self,
        node: Node,
        code: &str,
        result: &mut ParseResult,
        class_name: &str,
        top_level: bool,
    ) {
        let mut decorators: Vec<String> = Vec::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "decorator" {
                decorators.push(node_text(&child, code).trim().to_string());
            }
        }

        if let Some(definition) = node.child_by_field_name("definition") {
            match definition.kind() {
                "class_definition" => {
                    self.extract_class(definition, code, result, &decorators, top_level)
                }
                "function_definition" => self.extract_function(
                    definition,
                    code,
                    result,
                    class_name,
                    &decorators,
                    top_level,
                ),
                _ => {}
            }
        }
    }

    fn extract_class(
        &self,
        node: Node,
        code: &str,
        result: &mut ParseResult,
        decorators: &[String],
        top_level: bool,
    ) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(&name_node, code).to_string();

        let mut symbol = SymbolInfo::new(&name, SymbolKind::Class, start_line(&node), end_line(&node))
            .with_content(&code[node.byte_range()]);
        symbol.decorators = decorators.to_vec();
        symbol.signature = first_line(&symbol.content);
        result.symbols.push(symbol);

        if top_level {
            result.exports.push(name.clone());
        }

        // Base classes: class Foo(Base) -> (Foo, implements, Base).
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            let mut cursor = superclasses.walk();
            for arg in superclasses.children(&mut cursor) {
                match arg.kind() {
                    "identifier" | "attribute" => {
                        result
                            .heritage
                            .push(Heritage::implements(&name, node_text(&arg, code)));
                    }
                    _ => {}
                }
            }
        }

        for decorator in decorators {
            let target = decorator.trim_start_matches('@');
            result.heritage.push(Heritage::uses(&name, target));
        }

        if let Some(body) = node.child_by_field_name("body") {
            self.walk(body, code, result, &name, false);
        }
    }

    fn extract_function(
        &self,
        node: Node,
        code: &str,
        result: &mut ParseResult,
        class_name: &str,
        decorators: &[String],
        top_level: bool,
    ) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = node_text(&name_node, code).to_string();
        let kind = if class_name.is_empty() {
            SymbolKind::Function
        } else {
            SymbolKind::Method
        };

        let mut symbol = SymbolInfo::new(&name, kind, start_line(&node), end_line(&node))
            .with_content(&code[node.byte_range()])
            .with_class_name(class_name);
        symbol.decorators = decorators.to_vec();
        symbol.signature = first_line(&symbol.content);
        result.symbols.push(symbol);

        if top_level {
            result.exports.push(name);
        }

        if let Some(body) = node.child_by_field_name("body") {
            // Nested defs are free functions again.
            self.walk(body, code, result, "", false);
        }
    }

    fn extract_import(&self, node: Node, code: &str, result: &mut ParseResult) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "dotted_name" => {
                    result
                        .imports
                        .push(ImportInfo::new(node_text(&child, code)));
                }
                "aliased_import" => {
                    let module = child
                        .child_by_field_name("name")
                        .map(|n| node_text(&n, code).to_string())
                        .unwrap_or_default();
                    let alias = child
                        .child_by_field_name("alias")
                        .map(|n| node_text(&n, code).to_string())
                        .unwrap_or_default();
                    if !module.is_empty() {
                        result.imports.push(ImportInfo::new(module).with_alias(alias));
                    }
                }
                _ => {}
            }
        }
    }

    fn extract_import_from(&self, node: Node, code: &str, result: &mut ParseResult) {
        let Some(module_node) = node.child_by_field_name("module_name") else {
            return;
        };
        let module = node_text(&module_node, code).to_string();

        let mut names: Vec<String> = Vec::new();
        let mut alias = String::new();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.id() == module_node.id() {
                continue;
            }
            match child.kind() {
                "dotted_name" | "identifier" => {
                    names.push(node_text(&child, code).to_string());
                }
                "aliased_import" => {
                    if let Some(name_node) = child.child_by_field_name("name") {
                        names.push(node_text(&name_node, code).to_string());
                    }
                    if let Some(alias_node) = child.child_by_field_name("alias") {
                        alias = node_text(&alias_node, code).to_string();
                    }
                }
                "wildcard_import" => alias = "*".to_string(),
                _ => {}
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
                result
                    .calls
                    .push(CallInfo::new(node_text(&function, code), line));
            }
            "attribute" => {
                // obj.method(...): receiver is the textual left operand.
                let name = function
                    .child_by_field_name("attribute")
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

fn first_line(content: &str) -> String {
    content.lines().next().unwrap_or("").trim().to_string()
}

impl SourceParser for PythonParser {
    fn parse(&mut self, content: &str, _file_path: &str) -> ParseResult {
        let mut result = ParseResult::default();
        if content.is_empty() {
            return result;
        }
        let Some(tree) = self.parser.parse(content, None) else {
            return result;
        };
        self.walk(tree.root_node(), content, &mut result, "", true);
        result
    }

    fn language(&self) -> Language {
        Language::Python
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RelationKind;

    fn parse(code: &str) -> ParseResult {
        PythonParser::new().unwrap().parse(code, "src/app.py")
    }

    #[test]
    fn classes_and_methods() {
        let code = r#"
class User:
    def __init__(self, name):
        self.name = name

    def greet(self):
        return self.name

def standalone():
    pass
"#;
        let result = parse(code);

        let user = result.symbols.iter().find(|s| s.name == "User").unwrap();
        assert_eq!(user.kind, SymbolKind::Class);

        let greet = result.symbols.iter().find(|s| s.name == "greet").unwrap();
        assert_eq!(greet.kind, SymbolKind::Method);
        assert_eq!(greet.class_name, "User");

        let standalone = result
            .symbols
            .iter()
            .find(|s| s.name == "standalone")
            .unwrap();
        assert_eq!(standalone.kind, SymbolKind::Function);
        assert!(standalone.class_name.is_empty());

        // Top-level defs are exports; methods are not.
        assert!(result.exports.contains(&"User".to_string()));
        assert!(result.exports.contains(&"standalone".to_string()));
        assert!(!result.exports.contains(&"greet".to_string()));
    }

    #[test]
    fn from_import_collects_names() {
        let result = parse("from .auth import validate, logout\nimport os.path\n");

        let auth = result.imports.iter().find(|i| i.module == ".auth").unwrap();
        assert_eq!(auth.names, vec!["validate", "logout"]);

        assert!(result.imports.iter().any(|i| i.module == "os.path"));
    }

    #[test]
    fn aliased_and_wildcard_imports() {
        let result = parse("import numpy as np\nfrom utils import *\n");

        let numpy = result.imports.iter().find(|i| i.module == "numpy").unwrap();
        assert_eq!(numpy.alias, "np");

        let utils = result.imports.iter().find(|i| i.module == "utils").unwrap();
        assert_eq!(utils.alias, "*");
    }

    #[test]
    fn calls_carry_textual_receiver() {
        let code = r#"
def main():
    validate()
    session.user.save()
"#;
        let result = parse(code);

        let validate = result.calls.iter().find(|c| c.name == "validate").unwrap();
        assert!(validate.receiver.is_empty());

        let save = result.calls.iter().find(|c| c.name == "save").unwrap();
        assert_eq!(save.receiver, "session.user");
    }

    #[test]
    fn base_classes_and_decorators() {
        let code = r#"
@register
class Admin(User):
    pass

@lru_cache
def cached():
    pass
"#;
        let result = parse(code);

        assert!(result.heritage.iter().any(|h| h.subject == "Admin"
            && h.relation == RelationKind::Implements
            && h.object == "User"));
        assert!(result
            .heritage
            .iter()
            .any(|h| h.subject == "Admin" && h.relation == RelationKind::Uses));

        let cached = result.symbols.iter().find(|s| s.name == "cached").unwrap();
        assert_eq!(cached.decorators, vec!["@lru_cache"]);
    }

    #[test]
    fn line_spans_are_one_based_and_ordered() {
        let result = parse("def one():\n    pass\n");
        let one = &result.symbols[0];
        assert_eq!(one.start_line, 1);
        assert!(one.start_line <= one.end_line);
    }
}
