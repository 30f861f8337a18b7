//! Elixir parser using tree-sitter.
//!
//! Extracts modules, functions, macros, and structs; `alias`/`import`/
//! `use`/`require` directives; heritage (`use Mod` → uses, `@behaviour X`
//! → implements); and calls, including dotted `Mod.fun()` with receivers.
//!
//! Module attributes (`@impl`, `@doc`, `@spec`, ...) are buffered until
//! the next definition and attached as decorators. OTP entry points
//! (`handle_call`, `init`, `start_link`, ...) additionally carry their own
//! name as a decorator so downstream analyses can spot process loops.

use tree_sitter::{Node, Parser};

use super::parser::{end_line, find_child_by_kind, node_text, start_line};
use super::{CallInfo, Heritage, ImportInfo, Language, ParseResult, SourceParser, SymbolInfo, SymbolKind};
use crate::error::{IndexError, IndexResult};

/// Directives that translate to import-like relationships.
const IMPORT_DIRECTIVES: [&str; 4] = ["alias", "import", "use", "require"];

/// Callback names that mark OTP entry points.
const OTP_ENTRY_POINTS: [&str; 6] = [
    "handle_call",
    "handle_cast",
    "handle_info",
    "handle_continue",
    "init",
    "start_link",
];

pub struct ElixirParser {
    parser: Parser,
}

impl ElixirParser {
    pub fn new() -> IndexResult<Self> {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_elixir::LANGUAGE.into())
            .map_err(|e| IndexError::GrammarInit {
                language: "Elixir".into(),
                reason: e.to_string(),
            })?;
        Ok(Self { parser })
    }

    fn walk(
        &self,
        node: Node,
        code: &str,
        result: &mut ParseResult,
        module_name: &str,
        pending_attrs: &[String],
    ) {
        let mut attrs: Vec<String> = pending_attrs.to_vec();
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "call" => {
                    self.handle_call_node(child, code, result, module_name, &attrs);
                    attrs.clear();
                }
                "unary_operator" => {
                    // @attribute: collect for the next definition.
                    if let Some(attr_name) = self.attribute_name(&child, code) {
                        attrs.push(attr_name);
                    }
                    self.handle_behaviour_attribute(&child, code, result, module_name);
                }
                _ => {
                    self.walk(child, code, result, module_name, &attrs);
                    attrs.clear();
                }
            }
        }
    }

    fn handle_call_node(
        &self,
        node: Node,
        code: &str,
        result: &mut ParseResult,
        module_name: &str,
        pending_attrs: &[String],
    ) {
        let Some(identifier) = self.call_identifier(&node, code) else {
            // Dotted call (Mod.fun(...)).
            self.extract_generic_call(node, code, result);
            return;
        };

        match identifier.as_str() {
            "defmodule" => self.extract_module(node, code, result, pending_attrs),
            "def" => self.extract_def(node, code, result, module_name, pending_attrs, false, SymbolKind::Function),
            "defp" => self.extract_def(node, code, result, module_name, pending_attrs, true, SymbolKind::Function),
            "defmacro" => self.extract_def(node, code, result, module_name, pending_attrs, false, SymbolKind::Macro),
            "defmacrop" => self.extract_def(node, code, result, module_name, pending_attrs, true, SymbolKind::Macro),
            "defstruct" => self.extract_struct(node, code, result, module_name, pending_attrs),
            other if IMPORT_DIRECTIVES.contains(&other) => {
                self.extract_import_directive(node, code, result, other, module_name);
            }
            _ => self.extract_generic_call(node, code, result),
        }
    }

    fn extract_module(&self, node: Node, code: &str, result: &mut ParseResult, decorators: &[String]) {
        let mut module_name = String::new();
        if let Some(args) = find_child_by_kind(&node, "arguments") {
            if let Some(alias_node) = find_child_by_kind(&args, "alias") {
                module_name = node_text(&alias_node, code).to_string();
            }
        }

        let mut symbol = SymbolInfo::new(
            &module_name,
            SymbolKind::Module,
            start_line(&node),
            end_line(&node),
        )
        .with_content(&code[node.byte_range()]);
        symbol.decorators = decorators.to_vec();
        result.symbols.push(symbol);

        if let Some(do_block) = find_child_by_kind(&node, "do_block") {
            self.walk(do_block, code, result, &module_name, &[]);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn extract_def(
        &self,
        node: Node,
        code: &str,
        result: &mut ParseResult,
        module_name: &str,
        decorators: &[String],
        private: bool,
        kind: SymbolKind,
    ) {
        let name = self.def_name(&node, code);
        if name.is_empty() {
            return;
        }

        let mut effective = decorators.to_vec();
        if kind == SymbolKind::Function && OTP_ENTRY_POINTS.contains(&name.as_str()) {
            effective.push(name.clone());
        }

        let mut symbol = SymbolInfo::new(&name, kind, start_line(&node), end_line(&node))
            .with_content(&code[node.byte_range()])
            .with_class_name(module_name);
        symbol.decorators = effective;
        result.symbols.push(symbol);

        if !private {
            result.exports.push(name);
        }

        if let Some(do_block) = find_child_by_kind(&node, "do_block") {
            self.extract_calls_from_block(do_block, code, result);
        }
    }

    fn extract_struct(
        &self,
        node: Node,
        code: &str,
        result: &mut ParseResult,
        module_name: &str,
        decorators: &[String],
    ) {
        let name = if module_name.is_empty() {
            "struct".to_string()
        } else {
            module_name.to_string()
        };
        let mut symbol = SymbolInfo::new(&name, SymbolKind::Struct, start_line(&node), end_line(&node))
            .with_content(&code[node.byte_range()])
            .with_class_name(module_name);
        symbol.decorators = decorators.to_vec();
        result.symbols.push(symbol);
    }

    fn extract_import_directive(
        &self,
        node: Node,
        code: &str,
        result: &mut ParseResult,
        directive: &str,
        module_name: &str,
    ) {
        let Some(args) = find_child_by_kind(&node, "arguments") else {
            return;
        };

        let Some(alias_node) = find_child_by_kind(&args, "alias") else {
            return;
        };
        let module_alias = node_text(&alias_node, code).to_string();

        // `as:` keyword renames the alias locally.
        let mut as_alias = String::new();
        if let Some(keywords) = find_child_by_kind(&args, "keywords") {
            let mut cursor = keywords.walk();
            for pair in keywords.children(&mut cursor) {
                if pair.kind() != "pair" {
                    continue;
                }
                let keyword = find_child_by_kind(&pair, "keyword")
                    .map(|n| node_text(&n, code).trim_end_matches(&[':', ' '][..]).to_string());
                if keyword.as_deref() == Some("as") {
                    if let Some(value) = find_child_by_kind(&pair, "alias") {
                        as_alias = node_text(&value, code).to_string();
                    }
                }
            }
        }

        result
            .imports
            .push(ImportInfo::new(&module_alias).with_alias(as_alias));

        if directive == "use" {
            result
                .heritage
                .push(Heritage::uses(module_name, module_alias));
        }
    }

    fn extract_calls_from_block(&self, node: Node, code: &str, result: &mut ParseResult) {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            if child.kind() == "call" {
                let identifier = self.call_identifier(&child, code);
                if let Some(id) = &identifier {
                    if matches!(
                        id.as_str(),
                        "def" | "defp" | "defmodule" | "defmacro" | "defmacrop" | "defstruct"
                    ) || IMPORT_DIRECTIVES.contains(&id.as_str())
                    {
                        continue;
                    }
                }
                self.extract_generic_call(child, code, result);
            } else {
                self.extract_calls_from_block(child, code, result);
            }
        }
    }

    fn extract_generic_call(&self, node: Node, code: &str, result: &mut ParseResult) {
        let line = start_line(&node);

        // Dotted call: Mod.fun(args). The function part is a "dot" node.
        if let Some(dot_node) = find_child_by_kind(&node, "dot") {
            let mut receiver = String::new();
            let mut func_name = String::new();
            let mut cursor = dot_node.walk();
            for child in dot_node.children(&mut cursor) {
                match child.kind() {
                    "alias" => receiver = node_text(&child, code).to_string(),
                    "identifier" => func_name = node_text(&child, code).to_string(),
                    _ => {}
                }
            }
            if !func_name.is_empty() {
                result
                    .calls
                    .push(CallInfo::new(func_name, line).with_receiver(receiver));
            }
            return;
        }

        if let Some(identifier) = self.call_identifier(&node, code) {
            result.calls.push(CallInfo::new(identifier, line));
        }
    }

    fn attribute_name(&self, unary_node: &Node, code: &str) -> Option<String> {
        let mut cursor = unary_node.walk();
        for child in unary_node.children(&mut cursor) {
            if child.kind() == "call" {
                if let Some(identifier) = self.call_identifier(&child, code) {
                    return Some(format!("@{identifier}"));
                }
            }
        }
        None
    }

    /// `@behaviour SomeBehaviour` → (module, implements, SomeBehaviour).
    fn handle_behaviour_attribute(
        &self,
        unary_node: &Node,
        code: &str,
        result: &mut ParseResult,
        module_name: &str,
    ) {
        let mut cursor = unary_node.walk();
        for child in unary_node.children(&mut cursor) {
            if child.kind() != "call" {
                continue;
            }
            if self.call_identifier(&child, code).as_deref() != Some("behaviour") {
                continue;
            }
            if let Some(args) = find_child_by_kind(&child, "arguments") {
                if let Some(alias_node) = find_child_by_kind(&args, "alias") {
                    result.heritage.push(Heritage::implements(
                        module_name,
                        node_text(&alias_node, code),
                    ));
                }
            }
        }
    }

    /// Identifier text of a call node, or `None` for dotted/complex calls.
    fn call_identifier(&self, node: &Node, code: &str) -> Option<String> {
        let mut cursor = node.walk();
        for child in node.children(&mut cursor) {
            match child.kind() {
                "identifier" => return Some(node_text(&child, code).to_string()),
                "dot" => return None,
                _ => {}
            }
        }
        None
    }

    /// Function name from a def/defp/defmacro(p) call node.
    fn def_name(&self, node: &Node, code: &str) -> String {
        let Some(args) = find_child_by_kind(node, "arguments") else {
            return String::new();
        };
        let mut cursor = args.walk();
        for child in args.children(&mut cursor) {
            match child.kind() {
                "call" => {
                    if let Some(ident) = find_child_by_kind(&child, "identifier") {
                        return node_text(&ident, code).to_string();
                    }
                }
                "identifier" | "alias" => return node_text(&child, code).to_string(),
                _ => {}
            }
        }
        String::new()
    }
}

impl SourceParser for ElixirParser {
    fn parse(&mut self, content: &str, _file_path: &str) -> ParseResult {
        let mut result = ParseResult::default();
        if content.is_empty() {
            return result;
        }
        let Some(tree) = self.parser.parse(content, None) else {
            return result;
        };
        self.walk(tree.root_node(), content, &mut result, "", &[]);
        result
    }

    fn language(&self) -> Language {
        Language::Elixir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RelationKind;

    fn parse(code: &str) -> ParseResult {
        ElixirParser::new().unwrap().parse(code, "lib/server.ex")
    }

    #[test]
    fn modules_and_public_private_functions() {
        let code = r#"
defmodule MyApp.Worker do
  def run(job) do
    process(job)
  end

  defp process(job) do
    job
  end
end
"#;
        let result = parse(code);

        let module = result
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Module)
            .unwrap();
        assert_eq!(module.name, "MyApp.Worker");

        let run = result.symbols.iter().find(|s| s.name == "run").unwrap();
        assert_eq!(run.class_name, "MyApp.Worker");

        assert!(result.exports.contains(&"run".to_string()));
        assert!(!result.exports.contains(&"process".to_string()));

        assert!(result.calls.iter().any(|c| c.name == "process"));
    }

    #[test]
    fn use_genserver_emits_uses_heritage() {
        let code = r#"
defmodule MyServer do
  use GenServer

  @impl GenServer
  def handle_call(request, from, state) do
    {:reply, :ok, state}
  end
end
"#;
        let result = parse(code);

        assert!(result.heritage.iter().any(|h| h.subject == "MyServer"
            && h.relation == RelationKind::Uses
            && h.object == "GenServer"));

        let handle_call = result
            .symbols
            .iter()
            .find(|s| s.name == "handle_call")
            .unwrap();
        assert_eq!(handle_call.class_name, "MyServer");
        assert!(handle_call.decorators.contains(&"@impl".to_string()));
        // OTP entry points carry their own name as a marker.
        assert!(handle_call.decorators.contains(&"handle_call".to_string()));
    }

    #[test]
    fn behaviour_attribute_emits_implements() {
        let code = r#"
defmodule MyWorker do
  @behaviour Oban.Worker

  def perform(job) do
    :ok
  end
end
"#;
        let result = parse(code);
        assert!(result.heritage.iter().any(|h| h.subject == "MyWorker"
            && h.relation == RelationKind::Implements
            && h.object == "Oban.Worker"));
    }

    #[test]
    fn alias_with_as_and_dotted_calls() {
        let code = r#"
defmodule Caller do
  alias MyApp.Repo, as: DB

  def fetch(id) do
    DB.get(id)
  end
end
"#;
        let result = parse(code);

        let repo = result
            .imports
            .iter()
            .find(|i| i.module == "MyApp.Repo")
            .unwrap();
        assert_eq!(repo.alias, "DB");

        let get = result.calls.iter().find(|c| c.name == "get").unwrap();
        assert_eq!(get.receiver, "DB");
    }

    #[test]
    fn defmacro_and_defstruct() {
        let code = r#"
defmodule Macros do
  defstruct [:name, :value]

  defmacro assert_ok(expr) do
    quote do: unquote(expr)
  end

  defmacrop internal(expr) do
    expr
  end
end
"#;
        let result = parse(code);

        let s = result
            .symbols
            .iter()
            .find(|s| s.kind == SymbolKind::Struct)
            .unwrap();
        assert_eq!(s.name, "Macros");

        let assert_ok = result.symbols.iter().find(|s| s.name == "assert_ok").unwrap();
        assert_eq!(assert_ok.kind, SymbolKind::Macro);
        assert!(result.exports.contains(&"assert_ok".to_string()));
        assert!(!result.exports.contains(&"internal".to_string()));
    }
}
