//! Invocation Assembler
//!
//! Turns an [`Invocation`] into the synthetic main file, the header search
//! configuration and the echo records. Values are passed through verbatim;
//! nothing here parses or validates them.

use declex_core::{Invocation, NameValue};
use std::path::PathBuf;
use tracing::debug;

use crate::preprocessor::{HeaderSearchOptions, SearchKind};
use crate::report::EchoRecord;

/// Name of the in-memory main file
pub const MAIN_FILE_NAME: &str = "<master-input>";

/// Everything derived from an [`Invocation`] before parsing starts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssembledInvocation {
    /// Text of the synthetic main file
    pub main_source: String,
    pub header_search: HeaderSearchOptions,
    /// Files whose content becomes empty regardless of what is on disk
    pub remapped_files: Vec<PathBuf>,
    pub exclude_patterns: Vec<String>,
    /// Echo records in construction order, excluding the working directory
    pub echo: Vec<EchoRecord>,
}

/// Build the main file, search paths and echo for one run
pub fn assemble(invocation: &Invocation) -> AssembledInvocation {
    let mut assembled = AssembledInvocation::default();

    for define in &invocation.defines {
        let nv = NameValue::parse(define);
        assembled
            .main_source
            .push_str(&format!("#define {} {}\n", nv.name, nv.value));
        assembled.echo.push(EchoRecord::Define(nv));
    }

    for dir in &invocation.include_paths {
        assembled
            .header_search
            .add_path(dir.clone(), SearchKind::Angled);
        assembled.echo.push(EchoRecord::IncludePath(dir.clone()));
    }
    if let Some(resource_dir) = &invocation.resource_dir {
        assembled
            .header_search
            .add_path(resource_dir.join("include"), SearchKind::System);
    }

    for attribute in &invocation.attributes {
        assembled
            .echo
            .push(EchoRecord::Attribute(NameValue::parse(attribute)));
    }

    for path in &invocation.force_includes {
        assembled.main_source.push_str(&include_directive(path));
        assembled.echo.push(EchoRecord::ForceInclude(path.clone()));
    }

    for path in &invocation.inputs {
        assembled.main_source.push_str(&include_directive(path));
        assembled.echo.push(EchoRecord::Input(path.clone()));
    }

    assembled.remapped_files = invocation.exclude_files.clone();
    assembled.exclude_patterns = invocation.exclude_patterns.clone();

    debug!(
        "Assembled main file with {} lines, {} search directories",
        assembled.main_source.lines().count(),
        assembled.header_search.entries.len()
    );
    assembled
}

/// Quoted form, so relative paths resolve against the working directory
fn include_directive(path: &str) -> String {
    if path.contains('"') {
        format!("#include <{}>\n", path)
    } else {
        format!("#include \"{}\"\n", path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn invocation() -> Invocation {
        Invocation {
            defines: vec!["FOO=1".into(), "BAR".into(), "EXPR=a=b".into()],
            include_paths: vec!["inc".into(), "/abs/inc".into()],
            attributes: vec!["reflect=all".into()],
            force_includes: vec!["pre.h".into()],
            exclude_files: vec!["gen/big.h".into()],
            exclude_patterns: vec!["*.inl".into()],
            inputs: vec!["a.h".into(), "dir/b.h".into()],
            resource_dir: Some("/res".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_main_source_order() {
        let assembled = assemble(&invocation());
        assert_eq!(
            assembled.main_source,
            "#define FOO 1\n#define BAR \n#define EXPR a=b\n\
             #include \"pre.h\"\n#include \"a.h\"\n#include \"dir/b.h\"\n"
        );
    }

    #[test]
    fn test_echo_order_and_split() {
        let assembled = assemble(&invocation());
        assert_eq!(
            assembled.echo,
            vec![
                EchoRecord::Define(NameValue::parse("FOO=1")),
                EchoRecord::Define(NameValue::parse("BAR")),
                EchoRecord::Define(NameValue::parse("EXPR=a=b")),
                EchoRecord::IncludePath("inc".into()),
                EchoRecord::IncludePath("/abs/inc".into()),
                EchoRecord::Attribute(NameValue::parse("reflect=all")),
                EchoRecord::ForceInclude("pre.h".into()),
                EchoRecord::Input("a.h".into()),
                EchoRecord::Input("dir/b.h".into()),
            ]
        );
    }

    #[test]
    fn test_search_paths_and_exclusions() {
        let assembled = assemble(&invocation());
        let entries = &assembled.header_search.entries;
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].path, PathBuf::from("inc"));
        assert_eq!(entries[0].kind, SearchKind::Angled);
        assert_eq!(entries[2].path, PathBuf::from("/res/include"));
        assert_eq!(entries[2].kind, SearchKind::System);

        assert_eq!(assembled.remapped_files, vec![PathBuf::from("gen/big.h")]);
        assert_eq!(assembled.exclude_patterns, vec!["*.inl".to_string()]);
    }

    #[test]
    fn test_empty_invocation() {
        let assembled = assemble(&Invocation::default());
        assert!(assembled.main_source.is_empty());
        assert!(assembled.echo.is_empty());
        assert!(assembled.header_search.entries.is_empty());
    }
}
