//! Extended tests for the declex parser
//!
//! Each test lays out a small header tree on disk, runs a full invocation
//! against it and inspects the output log and the diagnostics.

use super::*;
use crate::preprocessor::{Level, StoredDiagnostics};
use declex_core::{Invocation, Language};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Workspace {
    temp: TempDir,
}

impl Workspace {
    fn new(files: &[(&str, &str)]) -> Self {
        let temp = TempDir::new().unwrap();
        for (name, content) in files {
            let path = temp.path().join(name);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).unwrap();
            }
            fs::write(path, content).unwrap();
        }
        Self { temp }
    }

    fn root(&self) -> &Path {
        self.temp.path()
    }

    /// Path as it appears in declaration records
    fn canonical(&self, name: &str) -> PathBuf {
        fs::canonicalize(self.root()).unwrap().join(name)
    }

    fn run(&self, invocation: &Invocation) -> Run {
        let out = self.root().join("out.log");
        let mut log = OutputLog::create(&out).unwrap();
        let stored = StoredDiagnostics::new();
        let outcome = ParseOrchestrator::new(invocation, self.root())
            .run(&mut log, Box::new(stored.clone()), &mut ExtractConsumer::new())
            .unwrap();
        drop(log);

        Run {
            outcome,
            output: fs::read_to_string(out).unwrap(),
            diagnostics: stored,
        }
    }
}

struct Run {
    outcome: ParseOutcome,
    output: String,
    diagnostics: StoredDiagnostics,
}

impl Run {
    fn errors(&self) -> Vec<String> {
        self.diagnostics
            .diagnostics()
            .into_iter()
            .filter(|d| d.level >= Level::Error)
            .map(|d| d.to_string())
            .collect()
    }

    fn lines(&self) -> Vec<&str> {
        self.output.lines().collect()
    }
}

fn inputs(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

/// A define, an input including a missing header and a pattern matching it
#[test]
fn test_missing_excluded_include_is_silent() {
    let ws = Workspace::new(&[("a.h", "#include \"skip.h\"\nint kept;\n")]);
    let invocation = Invocation {
        defines: vec!["FOO=1".into()],
        inputs: inputs(&["a.h"]),
        exclude_patterns: vec!["skip.*".into()],
        ..Default::default()
    };

    let run = ws.run(&invocation);
    assert_eq!(run.outcome, ParseOutcome::Success);
    assert!(run.errors().is_empty(), "{:?}", run.errors());
    assert!(run.output.contains("InvocationDefine( name='FOO', value='1' )\n"));
    assert!(run.output.contains("InvocationInput( path='a.h' )\n"));
    assert!(!run.output.contains(ERROR_MARKER));
}

/// An existing excluded file is entered with no content at all
#[test]
fn test_existing_excluded_include_is_emptied() {
    let ws = Workspace::new(&[
        ("a.h", "#include \"private_impl.h\"\nint visible;\n"),
        ("private_impl.h", "int hidden;\n#error must not be seen\n"),
    ]);
    let invocation = Invocation {
        inputs: inputs(&["a.h"]),
        exclude_patterns: vec!["*_impl.h".into()],
        ..Default::default()
    };

    let run = ws.run(&invocation);
    assert_eq!(run.outcome, ParseOutcome::Success, "{:?}", run.errors());
    assert!(run.output.contains("Variable( name='visible'"));
    assert!(!run.output.contains("hidden"));
}

/// A suppressed not-found error must not carry over to the next include
#[test]
fn test_suppression_does_not_leak_to_next_include() {
    let ws = Workspace::new(&[("a.h", "#include \"skip.h\"\n#include \"missing.h\"\n")]);
    let invocation = Invocation {
        inputs: inputs(&["a.h"]),
        exclude_patterns: vec!["skip.h".into()],
        ..Default::default()
    };

    let run = ws.run(&invocation);
    assert_eq!(run.outcome, ParseOutcome::Failure);
    let errors = run.errors();
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(errors[0].contains("'missing.h' file not found"));
    assert!(!errors[0].contains("skip.h"));
}

/// Patterns compare base names, whatever directory the include spells
#[test]
fn test_pattern_matches_base_name_of_spelled_path() {
    let ws = Workspace::new(&[(
        "a.h",
        "#include \"some/dir/foo.h\"\n#include <foo.h>\nint kept;\n",
    )]);
    let invocation = Invocation {
        inputs: inputs(&["a.h"]),
        exclude_patterns: vec!["foo.*".into()],
        ..Default::default()
    };

    let run = ws.run(&invocation);
    assert_eq!(run.outcome, ParseOutcome::Success, "{:?}", run.errors());
}

/// Angled includes found through an include path are filtered too
#[test]
fn test_angled_include_through_search_path_is_excluded() {
    let ws = Workspace::new(&[
        ("a.h", "#include <gen/table.inl>\nint kept;\n"),
        ("inc/gen/table.inl", "#error generated table\n"),
    ]);
    let invocation = Invocation {
        include_paths: vec![PathBuf::from("inc")],
        inputs: inputs(&["a.h"]),
        exclude_patterns: vec!["*.inl".into(), "table.*".into()],
        ..Default::default()
    };

    let run = ws.run(&invocation);
    assert_eq!(run.outcome, ParseOutcome::Success, "{:?}", run.errors());
}

/// A missing include that no pattern covers fails the run
#[test]
fn test_unmatched_missing_include_fails() {
    let ws = Workspace::new(&[("a.h", "#include \"nowhere.h\"\nint x;\n")]);
    let invocation = Invocation {
        inputs: inputs(&["a.h"]),
        exclude_patterns: vec!["other.h".into()],
        ..Default::default()
    };

    let run = ws.run(&invocation);
    assert_eq!(run.outcome, ParseOutcome::Failure);
    assert_eq!(run.lines().last().copied(), Some(ERROR_MARKER));
    assert!(!run.output.contains("Variable("));
    assert_eq!(run.output.matches(ERROR_MARKER).count(), 1);
}

/// Exact exclusions remap the path to empty content, existing or not
#[test]
fn test_exact_exclusions() {
    let ws = Workspace::new(&[
        ("a.h", "#include \"gen/big.h\"\n#include \"gen/absent.h\"\nint kept;\n"),
        ("gen/big.h", "#error too big\n"),
    ]);
    let invocation = Invocation {
        inputs: inputs(&["a.h"]),
        exclude_files: vec![PathBuf::from("gen/big.h"), PathBuf::from("gen/absent.h")],
        ..Default::default()
    };

    let run = ws.run(&invocation);
    assert_eq!(run.outcome, ParseOutcome::Success, "{:?}", run.errors());
    assert!(run.output.contains("Variable( name='kept'"));
    assert!(!run.output.contains("InvocationExclude"));
}

/// Echo records come first, in a fixed order independent of the parse
#[test]
fn test_echo_block_order() {
    let ws = Workspace::new(&[
        ("pre.h", "#define READY 1\n"),
        ("a.h", "#if READY && LEVEL == 2\nint ready;\n#endif\n"),
    ]);
    let invocation = Invocation {
        defines: vec!["LEVEL=2".into(), "FLAG".into()],
        include_paths: vec![PathBuf::from("inc")],
        attributes: vec!["export=all".into()],
        force_includes: vec!["pre.h".into()],
        inputs: inputs(&["a.h"]),
        exclude_patterns: vec!["*.inl".into()],
        language: Language::C,
        ..Default::default()
    };

    let run = ws.run(&invocation);
    assert_eq!(run.outcome, ParseOutcome::Success, "{:?}", run.errors());

    let lines = run.lines();
    assert_eq!(
        lines[..7].to_vec(),
        vec![
            format!("InvocationWorkingDirectory( path='{}' )", ws.root().display()).as_str(),
            "InvocationDefine( name='LEVEL', value='2' )",
            "InvocationDefine( name='FLAG', value='' )",
            "InvocationIncludePath( path='inc' )",
            "InvocationAttribute( name='export', value='all' )",
            "InvocationForceInclude( path='pre.h' )",
            "InvocationInput( path='a.h' )",
        ]
    );
    assert_eq!(
        lines[7],
        format!(
            "Variable( name='ready', scope='', type='int', file='{}', line='2' )",
            ws.canonical("a.h").display()
        )
    );
    assert_eq!(lines.len(), 8);
}

/// Declarations keep the file and line they were written at
#[test]
fn test_declaration_locations_across_includes() {
    let ws = Workspace::new(&[
        ("a.h", "#include \"types.h\"\n\nnamespace app {\nPoint origin();\n}\n"),
        ("types.h", "#pragma once\n// points\nstruct Point {\n  int x, y;\n};\n"),
    ]);
    let invocation = Invocation {
        inputs: inputs(&["a.h", "types.h"]),
        ..Default::default()
    };

    let run = ws.run(&invocation);
    assert_eq!(run.outcome, ParseOutcome::Success, "{:?}", run.errors());

    let types = ws.canonical("types.h");
    let a = ws.canonical("a.h");
    let records: Vec<&str> = run
        .lines()
        .into_iter()
        .filter(|l| !l.starts_with("Invocation"))
        .collect();
    assert_eq!(
        records,
        vec![
            format!("Record( name='Point', scope='', type='struct', file='{}', line='3' )", types.display()),
            format!("Field( name='x', scope='Point', type='int', file='{}', line='4' )", types.display()),
            format!("Field( name='y', scope='Point', type='int', file='{}', line='4' )", types.display()),
            format!("Namespace( name='app', scope='', type='namespace', file='{}', line='3' )", a.display()),
            format!("Function( name='origin', scope='app', type='Point ()', file='{}', line='4' )", a.display()),
        ]
    );
}

/// Warnings alone never fail a run
#[test]
fn test_warnings_do_not_fail() {
    let ws = Workspace::new(&[("a.h", "#warning heads up\nint x;\n")]);
    let invocation = Invocation {
        inputs: inputs(&["a.h"]),
        ..Default::default()
    };

    let run = ws.run(&invocation);
    assert_eq!(run.outcome, ParseOutcome::Success);
    assert_eq!(run.diagnostics.diagnostics().len(), 1);
    assert!(run.errors().is_empty());
}

/// Syntax errors in an input are errors like any other
#[test]
fn test_syntax_error_fails() {
    let ws = Workspace::new(&[("a.h", "int ok;\nstruct {\n")]);
    let invocation = Invocation {
        inputs: inputs(&["a.h"]),
        language: Language::C,
        ..Default::default()
    };

    let run = ws.run(&invocation);
    assert_eq!(run.outcome, ParseOutcome::Failure);
    assert!(!run.errors().is_empty());
    assert_eq!(run.lines().last().copied(), Some(ERROR_MARKER));
}

/// An input name resolves against the working directory before any `-I` path
#[test]
fn test_input_in_working_dir_wins_over_include_path() {
    let ws = Workspace::new(&[
        ("a.h", "int from_cwd;\n"),
        ("inc/a.h", "int from_include_path;\n"),
    ]);
    let invocation = Invocation {
        include_paths: vec![PathBuf::from("inc")],
        inputs: inputs(&["a.h"]),
        ..Default::default()
    };

    let run = ws.run(&invocation);
    assert_eq!(run.outcome, ParseOutcome::Success, "{:?}", run.errors());
    assert!(run.output.contains(&format!(
        "Variable( name='from_cwd', scope='', type='int', file='{}', line='1' )",
        ws.canonical("a.h").display()
    )));
    assert!(!run.output.contains("from_include_path"));
}

/// Long left-nested initializers parse and dump like any other variable
#[test]
fn test_long_initializer_expression() {
    let terms = vec!["1"; 20_000].join(" + ");
    let ws = Workspace::new(&[("a.h", format!("int total = {};\n", terms).as_str())]);
    let invocation = Invocation {
        inputs: inputs(&["a.h"]),
        language: Language::C,
        ..Default::default()
    };

    let run = ws.run(&invocation);
    assert_eq!(run.outcome, ParseOutcome::Success, "{:?}", run.errors());
    assert!(run.output.contains("Variable( name='total', scope='', type='int'"));
}
