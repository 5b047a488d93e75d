//! Inclusion Filter
//!
//! Drops the content of included files whose base name matches one of a
//! set of wildcard patterns. A matching file that exists is entered as an
//! empty buffer; a matching file that does not exist is silently skipped.

use declex_core::{Error, Result};
use globset::{Glob, GlobBuilder, GlobMatcher};
use tracing::{debug, warn};

use crate::preprocessor::{DirectiveContext, InclusionEvent, MemoryBuffer, PpCallbacks};

struct ExcludePattern {
    source: String,
    matcher: GlobMatcher,
}

/// Preprocessor observer that empties includes matching a pattern
#[derive(Default)]
pub struct FilenamePatternExcluder {
    patterns: Vec<ExcludePattern>,
}

impl FilenamePatternExcluder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_patterns<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut excluder = Self::new();
        for pattern in patterns {
            excluder.add_excluded_pattern(pattern.as_ref())?;
        }
        Ok(excluder)
    }

    /// Add a pattern; only its final path component is used.
    ///
    /// `*` and `?` are wildcards. Matching ignores case on Windows. A
    /// pattern that is not a valid wildcard expression, such as one with an
    /// unclosed `[`, matches its text literally.
    pub fn add_excluded_pattern(&mut self, pattern: &str) -> Result<()> {
        let base = base_name(pattern);
        let glob = match build_glob(base) {
            Ok(glob) => glob,
            Err(e) => {
                warn!(
                    "Exclusion pattern '{}' is not a valid wildcard ({}), matching it literally",
                    pattern,
                    e.kind()
                );
                build_glob(&globset::escape(base)).map_err(|e| Error::Pattern {
                    pattern: pattern.to_string(),
                    reason: e.kind().to_string(),
                })?
            }
        };

        self.patterns.push(ExcludePattern {
            source: pattern.to_string(),
            matcher: glob.compile_matcher(),
        });
        Ok(())
    }

    /// The first pattern matching the base name of `file_name`
    pub fn matching_pattern(&self, file_name: &str) -> Option<&str> {
        let name = base_name(file_name);
        self.patterns
            .iter()
            .find(|p| p.matcher.is_match(name))
            .map(|p| p.source.as_str())
    }
}

impl PpCallbacks for FilenamePatternExcluder {
    fn inclusion_directive(&mut self, event: &InclusionEvent<'_>, ctx: &mut DirectiveContext<'_>) {
        // Never carry a suppression over from an earlier directive
        ctx.set_suppress_include_not_found_error(false);

        let Some(pattern) = self.matching_pattern(event.file_name) else {
            return;
        };

        match event.file {
            Some(file) => {
                debug!(
                    "{}: #{} {} excluded by '{}', replaced by an empty buffer",
                    event.hash_location,
                    event.directive,
                    file.name().display(),
                    pattern
                );
                ctx.override_file_contents(
                    file,
                    MemoryBuffer::empty(file.name().to_string_lossy()),
                );
            }
            None => {
                let (open, close) = if event.is_angled { ('<', '>') } else { ('"', '"') };
                debug!(
                    "{}: #{} {}{}{} excluded by '{}', not-found error suppressed",
                    event.hash_location, event.directive, open, event.file_name, close, pattern
                );
                ctx.set_suppress_include_not_found_error(true);
            }
        }
    }
}

fn build_glob(text: &str) -> std::result::Result<Glob, globset::Error> {
    GlobBuilder::new(text)
        .literal_separator(false)
        .case_insensitive(cfg!(windows))
        .backslash_escape(!cfg!(windows))
        .build()
}

/// Final component of a path written with `/` or `\` separators
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("a/b/c.h"), "c.h");
        assert_eq!(base_name("a\\b\\c.h"), "c.h");
        assert_eq!(base_name("c.h"), "c.h");
        assert_eq!(base_name("dir/"), "");
    }

    #[test]
    fn test_matches_base_name_only() {
        let excluder = FilenamePatternExcluder::from_patterns(["*Private*.h", "gen?.inl"]).unwrap();

        assert_eq!(excluder.matching_pattern("sub/MyPrivateApi.h"), Some("*Private*.h"));
        assert_eq!(excluder.matching_pattern("gen1.inl"), Some("gen?.inl"));
        assert_eq!(excluder.matching_pattern("Private/public.h"), None);
        assert_eq!(excluder.matching_pattern("gen12.inl"), None);
    }

    #[test]
    fn test_pattern_directories_are_ignored() {
        let excluder = FilenamePatternExcluder::from_patterns(["some/dir/*.inl"]).unwrap();
        assert_eq!(excluder.matching_pattern("other/x.inl"), Some("some/dir/*.inl"));
        assert_eq!(excluder.matching_pattern("x.h"), None);
    }

    #[test]
    fn test_first_match_wins() {
        let excluder = FilenamePatternExcluder::from_patterns(["a*.h", "*.h"]).unwrap();
        assert_eq!(excluder.matching_pattern("abc.h"), Some("a*.h"));
        assert_eq!(excluder.matching_pattern("xyz.h"), Some("*.h"));
    }

    #[test]
    fn test_unparseable_pattern_matches_literally() {
        let excluder = FilenamePatternExcluder::from_patterns(["dir/[abc", "*.inl"]).unwrap();
        assert_eq!(excluder.matching_pattern("gen/[abc"), Some("dir/[abc"));
        assert_eq!(excluder.matching_pattern("a"), None);
        assert_eq!(excluder.matching_pattern("[abc.h"), None);
        assert_eq!(excluder.matching_pattern("x.inl"), Some("*.inl"));
    }
}
