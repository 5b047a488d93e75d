//! Output Log
//!
//! Line-oriented records of the form `Kind( key='value', ... )`: the
//! invocation echo, the extracted declarations and the failure marker.

use declex_core::{NameValue, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// The single line written instead of declarations when parsing failed
pub const ERROR_MARKER: &str = "## The diagnostic engine returned an error during code parsing.";

/// One output record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    kind: String,
    fields: Vec<(String, String)>,
}

impl LogRecord {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }
}

impl std::fmt::Display for LogRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}( ", self.kind)?;
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}='{}'", key, value)?;
        }
        f.write_str(" )")
    }
}

/// Invocation echo records, written verbatim before parsing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EchoRecord {
    WorkingDirectory(PathBuf),
    Define(NameValue),
    IncludePath(PathBuf),
    Attribute(NameValue),
    ForceInclude(String),
    Input(String),
}

impl EchoRecord {
    pub fn to_record(&self) -> LogRecord {
        match self {
            EchoRecord::WorkingDirectory(path) => LogRecord::new("InvocationWorkingDirectory")
                .field("path", path.to_string_lossy()),
            EchoRecord::Define(nv) => LogRecord::new("InvocationDefine")
                .field("name", nv.name.as_str())
                .field("value", nv.value.as_str()),
            EchoRecord::IncludePath(path) => {
                LogRecord::new("InvocationIncludePath").field("path", path.to_string_lossy())
            }
            EchoRecord::Attribute(nv) => LogRecord::new("InvocationAttribute")
                .field("name", nv.name.as_str())
                .field("value", nv.value.as_str()),
            EchoRecord::ForceInclude(path) => {
                LogRecord::new("InvocationForceInclude").field("path", path.as_str())
            }
            EchoRecord::Input(path) => LogRecord::new("InvocationInput").field("path", path.as_str()),
        }
    }
}

/// The output stream of a run; every write goes through here
pub struct OutputLog {
    out: Box<dyn Write>,
    records: usize,
}

impl OutputLog {
    pub fn new(out: Box<dyn Write>) -> Self {
        Self { out, records: 0 }
    }

    /// Create (or truncate) the log file at `path`
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self::new(Box::new(BufWriter::new(file))))
    }

    pub fn write_record(&mut self, record: &LogRecord) -> Result<()> {
        writeln!(self.out, "{}", record)?;
        self.records += 1;
        Ok(())
    }

    pub fn write_echo(&mut self, echo: &EchoRecord) -> Result<()> {
        self.write_record(&echo.to_record())
    }

    pub fn write_error_marker(&mut self) -> Result<()> {
        writeln!(self.out, "{}", ERROR_MARKER)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Number of records written so far, not counting the marker
    pub fn records_written(&self) -> usize {
        self.records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_record_format() {
        let record = LogRecord::new("Function")
            .field("name", "f")
            .field("line", "3");
        assert_eq!(record.to_string(), "Function( name='f', line='3' )");
    }

    #[test]
    fn test_echo_records() {
        assert_eq!(
            EchoRecord::Define(NameValue::parse("FOO=1")).to_record().to_string(),
            "InvocationDefine( name='FOO', value='1' )"
        );
        assert_eq!(
            EchoRecord::Attribute(NameValue::parse("opt")).to_record().to_string(),
            "InvocationAttribute( name='opt', value='' )"
        );
        assert_eq!(
            EchoRecord::Input("a.h".into()).to_record().to_string(),
            "InvocationInput( path='a.h' )"
        );
        assert_eq!(
            EchoRecord::IncludePath("inc".into()).to_record().kind(),
            "InvocationIncludePath"
        );
    }

    #[test]
    fn test_log_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out.txt");

        let mut log = OutputLog::create(&path).unwrap();
        log.write_echo(&EchoRecord::ForceInclude("pre.h".into())).unwrap();
        log.write_error_marker().unwrap();
        log.flush().unwrap();
        assert_eq!(log.records_written(), 1);

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            format!("InvocationForceInclude( path='pre.h' )\n{}\n", ERROR_MARKER)
        );
    }
}
