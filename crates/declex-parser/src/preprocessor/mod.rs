//! C/C++ Preprocessor
//!
//! Source and file management, header search, macro expansion and
//! conditional compilation. Inclusion directives are reported to registered
//! [`PpCallbacks`] observers, which may replace the content of a found file
//! or silence the error for a missing one.

pub mod callbacks;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod expr;
pub mod headers;
pub mod lexer;
pub mod line_map;
pub mod macros;
pub mod source;

pub use callbacks::{DirectiveContext, InclusionEvent, PpCallbacks};
pub use config::{language_predefines, Architecture, MacroDefinition};
pub use diagnostics::{
    DiagId, Diagnostic, DiagnosticConsumer, DiagnosticsEngine, Level, StoredDiagnostics,
    TextDiagnosticPrinter,
};
pub use engine::{PreprocessedUnit, Preprocessor, PreprocessorOptions, DEFAULT_MAX_INCLUDE_DEPTH};
pub use headers::{FoundFile, HeaderSearch, HeaderSearchOptions, SearchDir, SearchKind};
pub use line_map::LineMap;
pub use macros::{MacroDef, MacroTable};
pub use source::{FileEntry, FileId, FileManager, MemoryBuffer, SourceManager};
