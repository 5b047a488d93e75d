//! declex Parser
//!
//! Preprocesses and parses a synthetic translation unit built from the
//! command line, filters includes by file name, and writes the declarations
//! it finds to an output log.
//!
//! ## Modules
//!
//! - `invocation` - Builds the synthetic main file and search paths
//! - `exclude` - Empties includes whose base name matches a pattern
//! - `preprocessor` - C preprocessor with header search and diagnostics
//! - `treesitter` - Grammar pass over the preprocessed text
//! - `extract` - Declaration records from the parsed tree
//! - `orchestrator` - Runs an invocation and decides its outcome
//! - `report` - Output log records

pub mod exclude;
pub mod extract;
pub mod invocation;
pub mod orchestrator;
pub mod preprocessor;
pub mod report;
pub mod treesitter;

pub use exclude::FilenamePatternExcluder;
pub use extract::{DeclarationConsumer, ExtractConsumer};
pub use invocation::{assemble, AssembledInvocation, MAIN_FILE_NAME};
pub use orchestrator::{run_invocation, ParseOrchestrator, ParseOutcome};
pub use report::{EchoRecord, LogRecord, OutputLog, ERROR_MARKER};
pub use treesitter::{AstContext, TranslationUnitParser};

#[cfg(test)]
mod tests;
