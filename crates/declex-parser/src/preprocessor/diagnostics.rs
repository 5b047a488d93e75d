//! Diagnostics Engine
//!
//! Collects diagnostics from preprocessing and parsing, applies per-class
//! severity mappings and keeps the error count that decides the outcome of
//! a run.

use declex_core::Location;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;
use std::rc::Rc;
use tracing::debug;

/// Severity of a diagnostic after mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    Ignored,
    Note,
    Warning,
    Error,
    Fatal,
}

impl Level {
    pub fn label(&self) -> &'static str {
        match self {
            Level::Ignored => "ignored",
            Level::Note => "note",
            Level::Warning => "warning",
            Level::Error => "error",
            Level::Fatal => "fatal error",
        }
    }
}

/// Diagnostic classes the engine can emit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiagId {
    FileNotFound,
    CannotOpenFile,
    EmptyFilename,
    IncludeNestedTooDeeply,
    ErrorDirective,
    WarningDirective,
    InvalidDirective,
    MacroNameMissing,
    MacroRedefined,
    BadMacroParameters,
    UnterminatedMacroCall,
    MacroArgumentCount,
    UnterminatedConditional,
    ConditionalWithoutIf,
    ElseAfterElse,
    InvalidExpression,
    DivisionByZero,
    SyntaxError,
    MissingToken,
    UndefinedInternal,
}

impl DiagId {
    /// Severity before any mapping is applied
    pub fn default_level(&self) -> Level {
        match self {
            DiagId::WarningDirective | DiagId::MacroRedefined | DiagId::UndefinedInternal => {
                Level::Warning
            }
            _ => Level::Error,
        }
    }

    /// Warning option name, as shown after a warning
    pub fn flag_name(&self) -> Option<&'static str> {
        match self {
            DiagId::WarningDirective => Some("-W#warnings"),
            DiagId::MacroRedefined => Some("-Wmacro-redefined"),
            DiagId::UndefinedInternal => Some("-Wundefined-internal"),
            _ => None,
        }
    }
}

/// A reported diagnostic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub id: DiagId,
    pub level: Level,
    pub location: Option<Location>,
    pub message: String,
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{}: ", location)?;
        }
        write!(f, "{}: {}", self.level.label(), self.message)?;
        if self.level == Level::Warning {
            if let Some(flag) = self.id.flag_name() {
                write!(f, " [{}]", flag)?;
            }
        }
        Ok(())
    }
}

/// Receives every diagnostic that survives mapping
pub trait DiagnosticConsumer {
    fn begin_source_file(&mut self) {}

    fn handle_diagnostic(&mut self, diagnostic: &Diagnostic);

    fn end_source_file(&mut self) {}
}

/// Prints diagnostics in the usual `file:line:col: level: message` form
pub struct TextDiagnosticPrinter<W: Write> {
    out: W,
}

impl<W: Write> TextDiagnosticPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl TextDiagnosticPrinter<std::io::Stderr> {
    pub fn stderr() -> Self {
        Self::new(std::io::stderr())
    }
}

impl<W: Write> DiagnosticConsumer for TextDiagnosticPrinter<W> {
    fn handle_diagnostic(&mut self, diagnostic: &Diagnostic) {
        // Diagnostics are best effort; a closed stderr must not abort the run.
        let _ = writeln!(self.out, "{}", diagnostic);
    }

    fn end_source_file(&mut self) {
        let _ = self.out.flush();
    }
}

/// Keeps every diagnostic in memory; clones share one list
#[derive(Debug, Clone, Default)]
pub struct StoredDiagnostics {
    diagnostics: Rc<RefCell<Vec<Diagnostic>>>,
}

impl StoredDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    /// Rendered diagnostics, one per entry
    pub fn messages(&self) -> Vec<String> {
        self.diagnostics.borrow().iter().map(ToString::to_string).collect()
    }
}

impl DiagnosticConsumer for StoredDiagnostics {
    fn handle_diagnostic(&mut self, diagnostic: &Diagnostic) {
        self.diagnostics.borrow_mut().push(diagnostic.clone());
    }
}

/// Counts and routes diagnostics
pub struct DiagnosticsEngine {
    client: Box<dyn DiagnosticConsumer>,
    mappings: HashMap<DiagId, Level>,
    num_errors: usize,
    num_warnings: usize,
}

impl DiagnosticsEngine {
    pub fn new(client: Box<dyn DiagnosticConsumer>) -> Self {
        Self {
            client,
            mappings: HashMap::new(),
            num_errors: 0,
            num_warnings: 0,
        }
    }

    /// Override the severity of a diagnostic class
    pub fn set_diagnostic_mapping(&mut self, id: DiagId, level: Level) {
        self.mappings.insert(id, level);
    }

    pub fn level_for(&self, id: DiagId) -> Level {
        self.mappings
            .get(&id)
            .copied()
            .unwrap_or_else(|| id.default_level())
    }

    pub fn report(&mut self, id: DiagId, location: Option<Location>, message: impl Into<String>) {
        let level = self.level_for(id);
        let diagnostic = Diagnostic {
            id,
            level,
            location,
            message: message.into(),
        };
        debug!("Diagnostic {:?}: {}", id, diagnostic);

        match level {
            Level::Ignored => return,
            Level::Error | Level::Fatal => self.num_errors += 1,
            Level::Warning => self.num_warnings += 1,
            Level::Note => {}
        }
        self.client.handle_diagnostic(&diagnostic);
    }

    pub fn has_error_occurred(&self) -> bool {
        self.num_errors > 0
    }

    pub fn num_errors(&self) -> usize {
        self.num_errors
    }

    pub fn num_warnings(&self) -> usize {
        self.num_warnings
    }

    pub fn client_mut(&mut self) -> &mut dyn DiagnosticConsumer {
        self.client.as_mut()
    }
}
