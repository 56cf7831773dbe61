//!
//! # Parsing Contexts
//!

// Crates.io
use serde::{Deserialize, Serialize};

/// Enumerated parsing contexts
/// Generally used for error reporting, as a stack of the blocks open at the point of failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorContext {
    // LEF
    Library(String),
    Units,
    Site(String),
    Macro(String),
    Pin(String),
    Port,
    // Verilog
    Module(String),
    Declaration(String),
    Instance(String),
    // DEF
    Design(String),
    DieArea,
    Row(String),
    Components,
    Component(String),
    Pins,
    IoPin(String),
}
impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        use ErrorContext::*;
        match self {
            Library(s) => write!(f, "library {}", s),
            Units => write!(f, "UNITS"),
            Site(s) => write!(f, "SITE {}", s),
            Macro(s) => write!(f, "MACRO {}", s),
            Pin(s) => write!(f, "PIN {}", s),
            Port => write!(f, "PORT"),
            Module(s) => write!(f, "module {}", s),
            Declaration(s) => write!(f, "{} declaration", s),
            Instance(s) => write!(f, "instance {}", s),
            Design(s) => write!(f, "DESIGN {}", s),
            DieArea => write!(f, "DIEAREA"),
            Row(s) => write!(f, "ROW {}", s),
            Components => write!(f, "COMPONENTS"),
            Component(s) => write!(f, "component {}", s),
            Pins => write!(f, "PINS"),
            IoPin(s) => write!(f, "pin {}", s),
        }
    }
}
