//! Preprocessor Callbacks
//!
//! Observers registered on the [`Preprocessor`](super::Preprocessor) are
//! told about each inclusion directive after header search and before the
//! included file is entered.

use declex_core::Location;

use super::source::{FileEntry, MemoryBuffer, SourceManager};

/// One `#include`-like directive, as seen by observers
#[derive(Debug)]
pub struct InclusionEvent<'a> {
    /// Where the directive was written
    pub hash_location: Location,
    /// The directive name (`include`, `include_next` or `import`)
    pub directive: &'a str,
    /// File name exactly as spelled between the delimiters
    pub file_name: &'a str,
    /// `<...>` rather than `"..."`
    pub is_angled: bool,
    /// The file found by header search, if any
    pub file: Option<&'a FileEntry>,
}

/// The parts of the preprocessor an observer may act on during a directive
pub struct DirectiveContext<'a> {
    source_manager: &'a mut SourceManager,
    suppress_include_not_found: &'a mut bool,
}

impl<'a> DirectiveContext<'a> {
    pub(crate) fn new(
        source_manager: &'a mut SourceManager,
        suppress_include_not_found: &'a mut bool,
    ) -> Self {
        Self {
            source_manager,
            suppress_include_not_found,
        }
    }

    /// Replace the content of a found file before it is entered
    pub fn override_file_contents(&mut self, file: &FileEntry, buffer: MemoryBuffer) {
        self.source_manager.override_file_contents(file, buffer);
    }

    /// Control whether a failed lookup for the current directive is reported.
    ///
    /// The flag is read once, right after the observers return, and keeps its
    /// value until an observer changes it again.
    pub fn set_suppress_include_not_found_error(&mut self, suppress: bool) {
        *self.suppress_include_not_found = suppress;
    }

    pub fn suppress_include_not_found_error(&self) -> bool {
        *self.suppress_include_not_found
    }
}

/// Observer of preprocessing events
pub trait PpCallbacks {
    /// Called for each inclusion directive in an active region
    fn inclusion_directive(&mut self, event: &InclusionEvent<'_>, ctx: &mut DirectiveContext<'_>);
}
