//! Parse Orchestrator
//!
//! Runs one invocation end to end: echo, preprocessing with the inclusion
//! filter installed, the grammar pass, and either the declaration dump or
//! the failure marker.

use declex_core::{Invocation, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::exclude::FilenamePatternExcluder;
use crate::extract::{DeclarationConsumer, ExtractConsumer};
use crate::invocation::{assemble, MAIN_FILE_NAME};
use crate::preprocessor::{
    language_predefines, Architecture, DiagId, DiagnosticConsumer, DiagnosticsEngine,
    FileManager, HeaderSearch, Level, MemoryBuffer, Preprocessor, PreprocessorOptions,
    SourceManager, TextDiagnosticPrinter,
};
use crate::report::{EchoRecord, OutputLog};
use crate::treesitter::{check_undefined_internal, TranslationUnitParser};

/// Result of a run, decided by the error count alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseOutcome {
    Success,
    Failure,
}

impl ParseOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ParseOutcome::Success)
    }

    /// Process exit status for this outcome
    pub fn exit_code(&self) -> u8 {
        match self {
            ParseOutcome::Success => 0,
            ParseOutcome::Failure => 1,
        }
    }
}

/// Drives a single parse of an [`Invocation`]
pub struct ParseOrchestrator<'a> {
    invocation: &'a Invocation,
    working_dir: PathBuf,
    target: Architecture,
}

impl<'a> ParseOrchestrator<'a> {
    pub fn new(invocation: &'a Invocation, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            invocation,
            working_dir: working_dir.into(),
            target: Architecture::host(),
        }
    }

    /// Use the predefines of `target` instead of the host's
    pub fn with_target(mut self, target: Architecture) -> Self {
        self.target = target;
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Run the invocation, writing everything to `log`.
    ///
    /// `Err` is reserved for problems outside the parse itself, such as a
    /// failing output stream. Parse errors yield [`ParseOutcome::Failure`].
    pub fn run(
        &self,
        log: &mut OutputLog,
        client: Box<dyn DiagnosticConsumer>,
        consumer: &mut dyn DeclarationConsumer,
    ) -> Result<ParseOutcome> {
        let assembled = assemble(self.invocation);
        let excluder = FilenamePatternExcluder::from_patterns(&assembled.exclude_patterns)?;

        log.write_echo(&EchoRecord::WorkingDirectory(self.working_dir.clone()))?;
        for echo in &assembled.echo {
            log.write_echo(echo)?;
        }

        let mut diags = DiagnosticsEngine::new(client);
        diags.set_diagnostic_mapping(DiagId::UndefinedInternal, Level::Ignored);

        let language = self.invocation.language;
        let mut predefines = self.target.predefined_macros();
        predefines.extend(language_predefines(language));
        let options = PreprocessorOptions {
            predefines,
            remapped_files: assembled
                .remapped_files
                .iter()
                .map(|path| (path.clone(), MemoryBuffer::empty(path.to_string_lossy())))
                .collect(),
            ..Default::default()
        };

        let mut source_manager = SourceManager::new(FileManager::new(self.working_dir.clone()));
        source_manager
            .create_main_file_for_buffer(MemoryBuffer::new(MAIN_FILE_NAME, assembled.main_source));
        let header_search = HeaderSearch::new(&assembled.header_search);

        debug!(
            "Parsing as {} for {} with {} exclusion patterns",
            language,
            self.target.target_triple(),
            assembled.exclude_patterns.len()
        );

        diags.client_mut().begin_source_file();
        let unit = {
            let mut pp = Preprocessor::new(&mut diags, source_manager, header_search, options);
            pp.add_pp_callbacks(Box::new(excluder));
            pp.preprocess()
        };

        let mut parser = TranslationUnitParser::new(language)?;
        let ctx = parser.parse(unit, &mut diags)?;
        check_undefined_internal(&ctx, &mut diags);
        diags.client_mut().end_source_file();

        let outcome = if diags.has_error_occurred() {
            log.write_error_marker()?;
            ParseOutcome::Failure
        } else {
            consumer.dump_all_declarations(&ctx, log)?;
            ParseOutcome::Success
        };
        log.flush()?;

        info!(
            "Parse finished: {:?} ({} errors, {} warnings, {} records)",
            outcome,
            diags.num_errors(),
            diags.num_warnings(),
            log.records_written()
        );
        Ok(outcome)
    }
}

/// Run `invocation` from the current directory, writing the log to its
/// output path and diagnostics to stderr
pub fn run_invocation(invocation: &Invocation) -> Result<ParseOutcome> {
    let working_dir = std::env::current_dir()?;
    let mut log = OutputLog::create(invocation.output_path()?)?;
    let mut consumer = ExtractConsumer::new();

    ParseOrchestrator::new(invocation, working_dir).run(
        &mut log,
        Box::new(TextDiagnosticPrinter::stderr()),
        &mut consumer,
    )
}
