//! Core type definitions

use serde::{Deserialize, Serialize};
use crate::location::Location;

/// A `NAME` or `NAME=VALUE` option split on its first `=`.
///
/// A missing `=` yields an empty value. Names and values are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameValue {
    pub name: String,
    pub value: String,
}

impl NameValue {
    pub fn parse(spec: &str) -> Self {
        match spec.split_once('=') {
            Some((name, value)) => Self {
                name: name.to_string(),
                value: value.to_string(),
            },
            None => Self {
                name: spec.to_string(),
                value: String::new(),
            },
        }
    }
}

/// Kind of an extracted declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeclKind {
    Namespace,
    Record,
    Field,
    Method,
    Function,
    Variable,
    Typedef,
    Enum,
    EnumConstant,
}

impl DeclKind {
    /// Record kind name used in the output log
    pub fn record_name(&self) -> &'static str {
        match self {
            DeclKind::Namespace => "Namespace",
            DeclKind::Record => "Record",
            DeclKind::Field => "Field",
            DeclKind::Method => "Method",
            DeclKind::Function => "Function",
            DeclKind::Variable => "Variable",
            DeclKind::Typedef => "Typedef",
            DeclKind::Enum => "Enum",
            DeclKind::EnumConstant => "EnumConstant",
        }
    }
}

/// A declaration found in the translation unit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    pub kind: DeclKind,
    /// Declared name (empty for anonymous records and namespaces)
    pub name: String,
    /// Enclosing scope, `::`-separated (empty at file scope)
    pub scope: String,
    /// Type spelling with the declared name removed, or the tag keyword for records
    pub type_name: String,
    /// Initializer text for enum constants
    pub value: Option<String>,
    /// Where the declaration starts
    pub location: Location,
}
