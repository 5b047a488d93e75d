//! Maps preprocessed output lines back to their source file and line

use declex_core::Location;
use std::rc::Rc;

#[derive(Debug, Clone, Default)]
pub struct LineMap {
    files: Vec<Rc<str>>,
    lines: Vec<(u32, u32)>,
}

impl LineMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a file and return its index. The first file registered is
    /// the main file.
    pub fn add_file(&mut self, name: Rc<str>) -> u32 {
        if let Some(index) = self.files.iter().position(|f| *f == name) {
            return index as u32;
        }
        self.files.push(name);
        (self.files.len() - 1) as u32
    }

    /// Record the origin of the next output line
    pub fn push(&mut self, file: u32, line: u32) {
        self.lines.push((file, line));
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Source file of a zero-based output line
    pub fn file_name(&self, output_line: usize) -> Option<&str> {
        let (file, _) = *self.lines.get(output_line)?;
        self.files.get(file as usize).map(|f| &**f)
    }

    /// Whether a zero-based output line came from the main file
    pub fn is_main_file(&self, output_line: usize) -> bool {
        self.lines.get(output_line).is_some_and(|&(file, _)| file == 0)
    }

    /// Source location of a zero-based output line and one-based column
    pub fn location(&self, output_line: usize, column: u32) -> Option<Location> {
        let (file, line) = *self.lines.get(output_line)?;
        let name = self.files.get(file as usize)?;
        Some(Location::new(name.to_string(), line, column))
    }
}
