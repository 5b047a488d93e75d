//! Target and Language Predefines
//!
//! Macro definitions the preprocessor starts with: architecture macros for
//! the target and the macros identifying the source language.

use declex_core::Language;

/// Supported target architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Architecture {
    X86_64,
    I386,
    Arm64,
    Arm,
    Riscv64,
    Riscv32,
    Mips,
    PowerPC,
}

impl Architecture {
    /// The architecture this binary was built for
    pub fn host() -> Self {
        if cfg!(target_arch = "x86_64") {
            Architecture::X86_64
        } else if cfg!(target_arch = "x86") {
            Architecture::I386
        } else if cfg!(target_arch = "aarch64") {
            Architecture::Arm64
        } else if cfg!(target_arch = "arm") {
            Architecture::Arm
        } else if cfg!(target_arch = "riscv64") {
            Architecture::Riscv64
        } else if cfg!(target_arch = "riscv32") {
            Architecture::Riscv32
        } else if cfg!(target_arch = "mips") {
            Architecture::Mips
        } else if cfg!(target_arch = "powerpc64") {
            Architecture::PowerPC
        } else {
            Architecture::X86_64
        }
    }

    /// Get the target triple for this architecture
    pub fn target_triple(&self) -> &'static str {
        match self {
            Architecture::X86_64 => "x86_64-linux-gnu",
            Architecture::I386 => "i386-linux-gnu",
            Architecture::Arm64 => "aarch64-linux-gnu",
            Architecture::Arm => "arm-linux-gnueabi",
            Architecture::Riscv64 => "riscv64-linux-gnu",
            Architecture::Riscv32 => "riscv32-linux-gnu",
            Architecture::Mips => "mips-linux-gnu",
            Architecture::PowerPC => "powerpc64-linux-gnu",
        }
    }

    /// Get architecture-specific predefined macros
    pub fn predefined_macros(&self) -> Vec<MacroDefinition> {
        match self {
            Architecture::X86_64 => vec![
                MacroDefinition::defined("__x86_64__"),
                MacroDefinition::defined("__amd64__"),
                MacroDefinition::with_value("__LP64__", "1"),
            ],
            Architecture::I386 => vec![
                MacroDefinition::defined("__i386__"),
                MacroDefinition::defined("__i686__"),
            ],
            Architecture::Arm64 => vec![
                MacroDefinition::defined("__aarch64__"),
                MacroDefinition::with_value("__LP64__", "1"),
            ],
            Architecture::Arm => vec![
                MacroDefinition::defined("__arm__"),
            ],
            Architecture::Riscv64 => vec![
                MacroDefinition::defined("__riscv"),
                MacroDefinition::with_value("__riscv_xlen", "64"),
                MacroDefinition::with_value("__LP64__", "1"),
            ],
            Architecture::Riscv32 => vec![
                MacroDefinition::defined("__riscv"),
                MacroDefinition::with_value("__riscv_xlen", "32"),
            ],
            Architecture::Mips => vec![
                MacroDefinition::defined("__mips__"),
            ],
            Architecture::PowerPC => vec![
                MacroDefinition::defined("__powerpc__"),
                MacroDefinition::defined("__powerpc64__"),
            ],
        }
    }
}

/// Macros identifying the source language
pub fn language_predefines(language: Language) -> Vec<MacroDefinition> {
    match language {
        Language::C => vec![
            MacroDefinition::with_value("__STDC__", "1"),
            MacroDefinition::with_value("__STDC_VERSION__", "201112L"),
        ],
        Language::Cxx => vec![
            MacroDefinition::with_value("__STDC__", "1"),
            MacroDefinition::with_value("__cplusplus", "199711L"),
        ],
    }
}

/// A macro definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDefinition {
    pub name: String,
    pub value: String,
}

impl MacroDefinition {
    /// Create a macro that is simply defined (value `1`)
    pub fn defined(name: &str) -> Self {
        Self::with_value(name, "1")
    }

    /// Create a macro with a specific value
    pub fn with_value(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_architecture_macros() {
        let arch = Architecture::X86_64;
        let macros = arch.predefined_macros();

        assert!(macros.iter().any(|m| m.name == "__x86_64__"));
        assert_eq!(arch.target_triple(), "x86_64-linux-gnu");
        assert!(Architecture::Arm64
            .predefined_macros()
            .iter()
            .any(|m| m.name == "__LP64__"));
    }

    #[test]
    fn test_language_predefines() {
        let cxx = language_predefines(Language::Cxx);
        assert!(cxx.iter().any(|m| m.name == "__cplusplus" && m.value == "199711L"));

        let c = language_predefines(Language::C);
        assert!(c.iter().all(|m| m.name != "__cplusplus"));
    }
}
