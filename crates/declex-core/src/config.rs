//! Invocation configuration
//!
//! An [`Invocation`] is built once per run, from the command line and an
//! optional JSON configuration file, and is read-only afterwards.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Source language of the translation unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    C,
    #[default]
    #[serde(rename = "c++")]
    Cxx,
}

impl Language {
    pub fn name(&self) -> &'static str {
        match self {
            Language::C => "c",
            Language::Cxx => "c++",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "c" => Ok(Language::C),
            "c++" | "cxx" | "cpp" => Ok(Language::Cxx),
            _ => Err(Error::UnsupportedLanguage(s.to_string())),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// All options of a single extraction run.
///
/// List options keep their command-line order; that order is observable in
/// both the synthetic main file and the invocation echo.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Invocation {
    /// Macro definitions, `NAME` or `NAME=VALUE`
    pub defines: Vec<String>,
    /// Include directories, searched for both quoted and angled includes
    pub include_paths: Vec<PathBuf>,
    /// Pass-through attributes, `NAME` or `NAME=VALUE`, echoed only
    pub attributes: Vec<String>,
    /// Files included before any input
    pub force_includes: Vec<String>,
    /// Exact file paths whose content is replaced by an empty buffer
    pub exclude_files: Vec<PathBuf>,
    /// Base-name wildcard patterns for files to suppress when included
    pub exclude_patterns: Vec<String>,
    /// Positional input files
    pub inputs: Vec<String>,
    /// Directory holding the compiler resource headers (`<dir>/include`)
    pub resource_dir: Option<PathBuf>,
    /// Language of the translation unit
    pub language: Language,
    /// Output log path
    pub output: Option<PathBuf>,
}

impl Invocation {
    /// Load an invocation from a JSON configuration file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    /// Append `other`'s lists after ours; `other`'s scalar options win when set.
    pub fn merge(mut self, other: Invocation) -> Self {
        self.defines.extend(other.defines);
        self.include_paths.extend(other.include_paths);
        self.attributes.extend(other.attributes);
        self.force_includes.extend(other.force_includes);
        self.exclude_files.extend(other.exclude_files);
        self.exclude_patterns.extend(other.exclude_patterns);
        self.inputs.extend(other.inputs);
        if other.resource_dir.is_some() {
            self.resource_dir = other.resource_dir;
        }
        if other.output.is_some() {
            self.output = other.output;
        }
        self.language = other.language;
        self
    }

    /// The output path, which every runnable invocation must have
    pub fn output_path(&self) -> Result<&Path> {
        self.output
            .as_deref()
            .ok_or_else(|| Error::Config("an output file (-o) is required".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_language_from_str() {
        assert_eq!("c".parse::<Language>().unwrap(), Language::C);
        assert_eq!("C++".parse::<Language>().unwrap(), Language::Cxx);
        assert!("fortran".parse::<Language>().is_err());
    }

    #[test]
    fn test_merge_appends_lists_and_overrides_scalars() {
        let file = Invocation {
            defines: vec!["A=1".into()],
            inputs: vec!["first.h".into()],
            output: Some(PathBuf::from("from_file.log")),
            ..Default::default()
        };
        let cli = Invocation {
            defines: vec!["B".into()],
            inputs: vec!["second.h".into()],
            output: Some(PathBuf::from("cli.log")),
            language: Language::C,
            ..Default::default()
        };

        let merged = file.merge(cli);
        assert_eq!(merged.defines, vec!["A=1".to_string(), "B".to_string()]);
        assert_eq!(merged.inputs, vec!["first.h".to_string(), "second.h".to_string()]);
        assert_eq!(merged.output, Some(PathBuf::from("cli.log")));
        assert_eq!(merged.language, Language::C);
    }

    #[test]
    fn test_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "defines": ["FOO=1"], "exclude_patterns": ["*.inl"], "language": "c" }}"#
        )
        .unwrap();

        let invocation = Invocation::from_json_file(file.path()).unwrap();
        assert_eq!(invocation.defines, vec!["FOO=1".to_string()]);
        assert_eq!(invocation.exclude_patterns, vec!["*.inl".to_string()]);
        assert_eq!(invocation.language, Language::C);
        assert!(invocation.output.is_none());
    }

    #[test]
    fn test_missing_output_is_config_error() {
        let invocation = Invocation::default();
        assert!(matches!(invocation.output_path(), Err(Error::Config(_))));
    }
}
