//! Declaration Extraction
//!
//! Walks a parsed translation unit and writes one record per declaration
//! found at namespace or class scope. Function bodies are not entered.

use declex_core::{DeclKind, Declaration, Result};
use tree_sitter::Node;
use tracing::info;

use crate::report::{LogRecord, OutputLog};
use crate::treesitter::{resolve_declarator, AstContext};

/// Receives the completed parse of a successful run
pub trait DeclarationConsumer {
    fn dump_all_declarations(&mut self, ctx: &AstContext, log: &mut OutputLog) -> Result<()>;
}

/// Writes every extracted declaration to the log
#[derive(Debug, Default)]
pub struct ExtractConsumer {
    written: usize,
}

impl ExtractConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declarations_written(&self) -> usize {
        self.written
    }
}

impl DeclarationConsumer for ExtractConsumer {
    fn dump_all_declarations(&mut self, ctx: &AstContext, log: &mut OutputLog) -> Result<()> {
        let declarations = collect_declarations(ctx);
        for declaration in &declarations {
            log.write_record(&declaration_record(declaration))?;
        }
        self.written += declarations.len();
        info!("Extracted {} declarations", declarations.len());
        Ok(())
    }
}

/// Output record for a declaration
pub fn declaration_record(declaration: &Declaration) -> LogRecord {
    let mut record = LogRecord::new(declaration.kind.record_name())
        .field("name", escape_value(&declaration.name))
        .field("scope", escape_value(&declaration.scope))
        .field("type", escape_value(&declaration.type_name));
    if let Some(value) = &declaration.value {
        record = record.field("value", escape_value(value));
    }
    record
        .field("file", escape_value(&declaration.location.file))
        .field("line", declaration.location.line.to_string())
}

/// Backslash-escape quotes and backslashes inside a record value
pub fn escape_value(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == '\'' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// All declarations outside the synthetic main file, in source order
pub fn collect_declarations(ctx: &AstContext) -> Vec<Declaration> {
    let mut walker = DeclarationWalker {
        ctx,
        out: Vec::new(),
    };
    walker.visit_scope(ctx.root_node(), "", Context::Namespace);
    walker.out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Namespace,
    Record,
}

struct DeclarationWalker<'a> {
    ctx: &'a AstContext,
    out: Vec<Declaration>,
}

fn qualify(scope: &str, name: &str) -> String {
    match (scope.is_empty(), name.is_empty()) {
        (_, true) => scope.to_string(),
        (true, false) => name.to_string(),
        (false, false) => format!("{}::{}", scope, name),
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl<'a> DeclarationWalker<'a> {
    fn text(&self, node: Node) -> String {
        self.ctx.node_text(node)
    }

    fn push(
        &mut self,
        kind: DeclKind,
        name: String,
        scope: &str,
        type_name: String,
        value: Option<String>,
        node: Node,
    ) {
        if self.ctx.is_in_main_file(node) {
            return;
        }
        let Some(location) = self.ctx.location(node) else {
            return;
        };
        self.out.push(Declaration {
            kind,
            name,
            scope: scope.to_string(),
            type_name,
            value,
            location,
        });
    }

    fn visit_scope(&mut self, container: Node, scope: &str, context: Context) {
        let mut cursor = container.walk();
        for child in container.named_children(&mut cursor) {
            self.visit_item(child, scope, context);
        }
    }

    fn visit_item(&mut self, node: Node, scope: &str, context: Context) {
        match node.kind() {
            "namespace_definition" => {
                let name = node
                    .child_by_field_name("name")
                    .map(|n| self.text(n))
                    .unwrap_or_default();
                self.push(
                    DeclKind::Namespace,
                    name.clone(),
                    scope,
                    "namespace".to_string(),
                    None,
                    node,
                );
                if let Some(body) = node.child_by_field_name("body") {
                    self.visit_scope(body, &qualify(scope, &name), Context::Namespace);
                }
            }
            "linkage_specification" => {
                if let Some(body) = node.child_by_field_name("body") {
                    if body.kind() == "declaration_list" {
                        self.visit_scope(body, scope, context);
                    } else {
                        self.visit_item(body, scope, context);
                    }
                }
            }
            "template_declaration" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.kind() != "template_parameter_list" {
                        self.visit_item(child, scope, context);
                    }
                }
            }
            "function_definition" => self.visit_function(node, scope, context),
            "declaration" | "field_declaration" => self.visit_declaration(node, scope, context),
            "type_definition" => self.visit_typedef(node, scope),
            "alias_declaration" => {
                let name = node.child_by_field_name("name").map(|n| self.text(n));
                let aliased = node.child_by_field_name("type").map(|t| self.type_text(t));
                if let (Some(name), Some(aliased)) = (name, aliased) {
                    self.push(DeclKind::Typedef, name, scope, aliased, None, node);
                }
            }
            "class_specifier" | "struct_specifier" | "union_specifier" | "enum_specifier" => {
                self.visit_type_specifier(node, scope)
            }
            _ => {}
        }
    }

    /// Records and enums defined as part of another declaration
    fn visit_type_specifier(&mut self, node: Node, scope: &str) {
        match node.kind() {
            "class_specifier" | "struct_specifier" | "union_specifier" => {
                self.visit_record(node, scope)
            }
            "enum_specifier" => self.visit_enum(node, scope),
            _ => {}
        }
    }

    fn visit_record(&mut self, node: Node, scope: &str) {
        // Forward declarations have no body
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .unwrap_or_default();
        let keyword = node.kind().trim_end_matches("_specifier").to_string();

        self.push(DeclKind::Record, name.clone(), scope, keyword, None, node);
        self.visit_scope(body, &qualify(scope, &name), Context::Record);
    }

    fn visit_enum(&mut self, node: Node, scope: &str) {
        let Some(body) = node.child_by_field_name("body") else {
            return;
        };
        let name = node
            .child_by_field_name("name")
            .map(|n| self.text(n))
            .unwrap_or_default();
        let scoped = {
            let mut cursor = node.walk();
            let scoped = node
                .children(&mut cursor)
                .any(|c| matches!(c.kind(), "class" | "struct"));
            scoped
        };

        self.push(DeclKind::Enum, name.clone(), scope, "enum".to_string(), None, node);

        // Unscoped enumerators belong to the enclosing scope
        let constant_scope = if scoped {
            qualify(scope, &name)
        } else {
            scope.to_string()
        };
        let constant_type = if name.is_empty() {
            "enum".to_string()
        } else {
            name.clone()
        };

        let mut cursor = body.walk();
        for enumerator in body.named_children(&mut cursor) {
            if enumerator.kind() != "enumerator" {
                continue;
            }
            let Some(constant) = enumerator.child_by_field_name("name") else {
                continue;
            };
            let value = enumerator
                .child_by_field_name("value")
                .map(|v| collapse_whitespace(&self.text(v)));
            self.push(
                DeclKind::EnumConstant,
                self.text(constant),
                &constant_scope,
                constant_type.clone(),
                value,
                enumerator,
            );
        }
    }

    fn visit_function(&mut self, node: Node, scope: &str, context: Context) {
        let Some(declarator) = node.child_by_field_name("declarator") else {
            return;
        };
        let Some(name) = resolve_declarator(declarator) else {
            return;
        };
        let kind = if context == Context::Record || name.node.kind() == "qualified_identifier" {
            DeclKind::Method
        } else {
            DeclKind::Function
        };
        let type_name = self.type_spelling(node, declarator, name.node);
        self.push(kind, self.text(name.node), scope, type_name, None, node);
    }

    fn visit_declaration(&mut self, node: Node, scope: &str, context: Context) {
        if let Some(type_node) = node.child_by_field_name("type") {
            self.visit_type_specifier(type_node, scope);
        }

        let declarators: Vec<Node> = {
            let mut cursor = node.walk();
            let found = node
                .children_by_field_name("declarator", &mut cursor)
                .collect();
            found
        };

        for declarator in declarators {
            let Some(name) = resolve_declarator(declarator) else {
                continue;
            };
            let kind = match (name.is_function, context) {
                (true, Context::Record) => DeclKind::Method,
                (true, Context::Namespace) => DeclKind::Function,
                (false, Context::Record) => DeclKind::Field,
                (false, Context::Namespace) => DeclKind::Variable,
            };
            let type_name = self.type_spelling(node, declarator, name.node);
            self.push(kind, self.text(name.node), scope, type_name, None, node);
        }
    }

    fn visit_typedef(&mut self, node: Node, scope: &str) {
        if let Some(type_node) = node.child_by_field_name("type") {
            self.visit_type_specifier(type_node, scope);
        }

        let declarators: Vec<Node> = {
            let mut cursor = node.walk();
            let found = node
                .children_by_field_name("declarator", &mut cursor)
                .collect();
            found
        };

        for declarator in declarators {
            if let Some(name) = resolve_declarator(declarator) {
                let type_name = self.type_spelling(node, declarator, name.node);
                self.push(DeclKind::Typedef, self.text(name.node), scope, type_name, None, node);
            }
        }
    }

    /// Spelling of a type specifier; defined records are shortened to
    /// their tag
    fn type_text(&self, node: Node) -> String {
        match node.kind() {
            "class_specifier" | "struct_specifier" | "union_specifier" | "enum_specifier" => {
                let keyword = node.kind().trim_end_matches("_specifier");
                match node.child_by_field_name("name") {
                    Some(name) => format!("{} {}", keyword, self.text(name)),
                    None => keyword.to_string(),
                }
            }
            _ => collapse_whitespace(&self.text(node)),
        }
    }

    /// The declared type: qualifiers and type specifier of `decl` followed
    /// by the declarator with its name (and any initializer) removed
    fn type_spelling(&self, decl: Node, declarator: Node, name: Node) -> String {
        let mut parts = Vec::new();
        let type_id = decl.child_by_field_name("type").map(|t| t.id());

        let mut cursor = decl.walk();
        for child in decl.children(&mut cursor) {
            if child.start_byte() >= declarator.start_byte() {
                break;
            }
            if child.kind() == "type_qualifier" || Some(child.id()) == type_id {
                parts.push(self.type_text(child));
            }
        }

        let declarator = if declarator.kind() == "init_declarator" {
            declarator
                .child_by_field_name("declarator")
                .unwrap_or(declarator)
        } else {
            declarator
        };

        let source = self.ctx.source();
        let (start, end) = (declarator.start_byte(), declarator.end_byte());
        if name.start_byte() >= start && name.end_byte() <= end {
            let rest = format!(
                "{}{}",
                &source[start..name.start_byte()],
                &source[name.end_byte()..end]
            );
            let rest = collapse_whitespace(&rest);
            if !rest.is_empty() {
                parts.push(rest);
            }
        }

        parts.join(" ")
    }
}
