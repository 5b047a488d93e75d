//! declex Core
//!
//! Core types shared by the declex preprocessor, parser and CLI.

pub mod config;
pub mod error;
pub mod location;
pub mod types;

pub use config::{Invocation, Language};
pub use error::{Error, Result};
pub use location::Location;
pub use types::*;
