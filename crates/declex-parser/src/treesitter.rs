//! Tree-sitter grammar pass
//!
//! Parses the preprocessed translation unit with the C or C++ grammar.
//! Syntax errors in the tree become diagnostics at their original source
//! location, and a small semantic pass looks for functions with internal
//! linkage that are used but never defined.

use declex_core::{Error, Language, Location, Result};
use std::collections::HashSet;
use tracing::debug;
use tree_sitter::{Node, Parser as TSParser, Tree};

use crate::preprocessor::{DiagId, DiagnosticsEngine, LineMap, PreprocessedUnit};

/// A parsed translation unit
pub struct AstContext {
    tree: Tree,
    source: String,
    line_map: LineMap,
    language: Language,
}

impl AstContext {
    pub fn root_node(&self) -> Node<'_> {
        self.tree.root_node()
    }

    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// The preprocessed text the tree was built from
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn line_map(&self) -> &LineMap {
        &self.line_map
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn node_text(&self, node: Node) -> String {
        node.utf8_text(self.source.as_bytes())
            .unwrap_or("")
            .to_string()
    }

    /// Source location where `node` starts
    pub fn location(&self, node: Node) -> Option<Location> {
        let position = node.start_position();
        self.line_map
            .location(position.row, position.column as u32 + 1)
    }

    /// Whether `node` starts in the synthetic main file
    pub fn is_in_main_file(&self, node: Node) -> bool {
        self.line_map.is_main_file(node.start_position().row)
    }
}

/// Tree-sitter parser for one language
pub struct TranslationUnitParser {
    parser: TSParser,
    language: Language,
}

fn grammar(language: Language) -> tree_sitter::Language {
    match language {
        Language::C => tree_sitter_c::LANGUAGE.into(),
        Language::Cxx => tree_sitter_cpp::LANGUAGE.into(),
    }
}

impl TranslationUnitParser {
    pub fn new(language: Language) -> Result<Self> {
        let mut parser = TSParser::new();
        parser
            .set_language(&grammar(language))
            .map_err(|e| Error::Parse(format!("failed to load {} grammar: {}", language, e)))?;
        Ok(Self { parser, language })
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Parse a preprocessed unit, reporting syntax errors to `diags`
    pub fn parse(
        &mut self,
        unit: PreprocessedUnit,
        diags: &mut DiagnosticsEngine,
    ) -> Result<AstContext> {
        let tree = self
            .parser
            .parse(&unit.text, None)
            .ok_or_else(|| Error::Parse("Failed to parse source".into()))?;

        let ctx = AstContext {
            tree,
            source: unit.text,
            line_map: unit.line_map,
            language: self.language,
        };
        debug!(
            "Parsed {} bytes as {}, has errors: {}",
            ctx.source.len(),
            self.language,
            ctx.root_node().has_error()
        );

        report_syntax_errors(ctx.root_node(), &ctx, diags);
        Ok(ctx)
    }
}

fn report_syntax_errors(root: Node, ctx: &AstContext, diags: &mut DiagnosticsEngine) {
    walk_preorder(root, |node| {
        if node.is_missing() {
            diags.report(
                DiagId::MissingToken,
                ctx.location(node),
                format!("expected '{}'", node.kind()),
            );
            return false;
        }
        if node.is_error() {
            diags.report(DiagId::SyntaxError, ctx.location(node), "expected declaration");
            return false;
        }
        node.has_error()
    });
}

/// Visit `root` and its descendants in document order with a cursor, so
/// tree depth never turns into call depth. Children of a node are skipped
/// when `enter` returns false for it.
pub(crate) fn walk_preorder<'t>(root: Node<'t>, mut enter: impl FnMut(Node<'t>) -> bool) {
    let mut cursor = root.walk();
    'nodes: loop {
        if enter(cursor.node()) && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                continue 'nodes;
            }
            if !cursor.goto_parent() {
                return;
            }
        }
    }
}

/// Warn about functions declared `static`, called, and never defined
pub fn check_undefined_internal(ctx: &AstContext, diags: &mut DiagnosticsEngine) {
    let mut usage = LinkageUsage::default();
    usage.collect(ctx.root_node(), ctx);

    for (name, node) in &usage.internal {
        if usage.called.contains(name) && !usage.defined.contains(name) {
            diags.report(
                DiagId::UndefinedInternal,
                ctx.location(*node),
                format!("function '{}' has internal linkage but is not defined", name),
            );
        }
    }
}

#[derive(Default)]
struct LinkageUsage<'t> {
    internal: Vec<(String, Node<'t>)>,
    defined: HashSet<String>,
    called: HashSet<String>,
}

impl<'t> LinkageUsage<'t> {
    fn collect(&mut self, root: Node<'t>, ctx: &AstContext) {
        walk_preorder(root, |node| {
            self.visit(node, ctx);
            true
        });
    }

    fn visit(&mut self, node: Node<'t>, ctx: &AstContext) {
        match node.kind() {
            "function_definition" => {
                if let Some(name) = node
                    .child_by_field_name("declarator")
                    .and_then(resolve_declarator)
                {
                    self.defined.insert(ctx.node_text(name.node));
                }
            }
            "declaration" if has_storage_class(node, ctx, "static") => {
                let mut cursor = node.walk();
                for declarator in node.children_by_field_name("declarator", &mut cursor) {
                    if let Some(name) = resolve_declarator(declarator).filter(|d| d.is_function) {
                        let text = ctx.node_text(name.node);
                        if !self.internal.iter().any(|(n, _)| *n == text) {
                            self.internal.push((text, node));
                        }
                    }
                }
            }
            "call_expression" => {
                if let Some(function) = node
                    .child_by_field_name("function")
                    .filter(|f| f.kind() == "identifier")
                {
                    self.called.insert(ctx.node_text(function));
                }
            }
            _ => {}
        }
    }
}

pub(crate) fn has_storage_class(node: Node, ctx: &AstContext, class: &str) -> bool {
    let mut cursor = node.walk();
    let found = node
        .children(&mut cursor)
        .any(|c| c.kind() == "storage_class_specifier" && ctx.node_text(c) == class);
    found
}

/// The declared name inside a declarator
pub(crate) struct DeclaratorName<'t> {
    pub node: Node<'t>,
    /// The name is directly a function, not a pointer to one
    pub is_function: bool,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Derived {
    Function,
    Pointer,
    Array,
}

/// Find the name a declarator declares and the innermost type operator
/// applied to it: `*f(int)` is a function, `(*fp)(int)` a pointer.
pub(crate) fn resolve_declarator(node: Node<'_>) -> Option<DeclaratorName<'_>> {
    let (name, innermost) = find_declarator_name(node)?;
    Some(DeclaratorName {
        node: name,
        is_function: innermost == Some(Derived::Function),
    })
}

fn find_declarator_name(node: Node<'_>) -> Option<(Node<'_>, Option<Derived>)> {
    let derived = match node.kind() {
        "identifier" | "field_identifier" | "type_identifier" | "qualified_identifier"
        | "destructor_name" | "operator_name" | "template_function" => {
            return Some((node, None))
        }
        "function_declarator" => Derived::Function,
        "pointer_declarator" | "reference_declarator" => Derived::Pointer,
        "array_declarator" => Derived::Array,
        "parenthesized_declarator" | "attributed_declarator" | "init_declarator" => {
            return inner_declarator(node).and_then(find_declarator_name)
        }
        _ => return None,
    };

    let (name, innermost) = find_declarator_name(inner_declarator(node)?)?;
    Some((name, innermost.or(Some(derived))))
}

fn inner_declarator(node: Node<'_>) -> Option<Node<'_>> {
    if let Some(inner) = node.child_by_field_name("declarator") {
        return Some(inner);
    }
    let mut cursor = node.walk();
    let inner = node
        .named_children(&mut cursor)
        .find(|c| find_declarator_name(*c).is_some());
    inner
}
