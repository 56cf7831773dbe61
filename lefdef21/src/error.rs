//!
//! # LefDef21 Errors
//!

// Std-Lib
use std::path::PathBuf;

// Crates.io
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Local imports
use crate::utils::ErrorContext;

/// # Load Stages
/// Each [crate::Database] load operation, in its required order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum LoadStage {
    /// LEF Library
    Library,
    /// Structural Verilog Netlist
    Netlist,
    /// DEF Placement
    Placement,
}
impl std::fmt::Display for LoadStage {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Self::Library => "LEF library",
            Self::Netlist => "Verilog netlist",
            Self::Placement => "DEF placement",
        };
        write!(f, "{}", s)
    }
}

/// # Kinds of named references, which must resolve when used
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RefKind {
    Macro,
    Site,
    Net,
    /// Top-level design pin, i.e. an [crate::Io]
    Pin,
    /// Pin of a library macro
    MacroPin,
}
impl std::fmt::Display for RefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Self::Macro => "macro",
            Self::Site => "site",
            Self::Net => "net",
            Self::Pin => "pin",
            Self::MacroPin => "macro pin",
        };
        write!(f, "{}", s)
    }
}

/// # Kinds of enumerated values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueKind {
    MacroClass,
    SiteClass,
    PinDirection,
    PinUsage,
    Orient,
}
impl std::fmt::Display for ValueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let s = match self {
            Self::MacroClass => "macro class",
            Self::SiteClass => "site class",
            Self::PinDirection => "pin direction",
            Self::PinUsage => "pin usage",
            Self::Orient => "orientation",
        };
        write!(f, "{}", s)
    }
}

///
/// # Parser State
///
/// Snapshot of a loader's position, attached to each parse error.
///
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseState {
    /// Source file, or `<string>` for in-memory content
    pub file: PathBuf,
    /// Which loader was running
    pub stage: LoadStage,
    /// Stack of blocks open at the point of failure
    pub ctx: Vec<ErrorContext>,
    /// Text of the offending token, or `EOF`
    pub token: String,
    /// Index of the offending token
    pub index: usize,
    /// Source line number, starting from one
    pub line: usize,
}
impl std::fmt::Display for ParseState {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: at token `{}` ({})",
            self.file.display(),
            self.line,
            self.token,
            self.stage
        )?;
        for ctx in self.ctx.iter().rev() {
            write!(f, "\n    in {}", ctx)?;
        }
        Ok(())
    }
}

///
/// # LefDef21 Error Enumeration
///
#[derive(Debug)]
pub enum DbError {
    /// Source file could not be opened or read
    Io { path: PathBuf, err: std::io::Error },
    /// Structurally malformed input
    Syntax { message: String, state: ParseState },
    /// A required name did not resolve
    MissingReference {
        kind: RefKind,
        name: String,
        state: ParseState,
    },
    /// Enumerated value outside its recognized set
    UnsupportedValue {
        kind: ValueKind,
        value: String,
        /// Accepted values
        expected: &'static [&'static str],
        state: ParseState,
    },
    /// Loader invoked before its required predecessor
    Precedence { stage: LoadStage, requires: LoadStage },
    /// Wrapped errors, generally from other crates
    Boxed(Box<dyn std::error::Error>),
    /// String message-valued errors
    Str(String),
}
impl DbError {
    /// Get our [ParseState], if we have one
    pub fn state(&self) -> Option<&ParseState> {
        match self {
            Self::Syntax { state, .. }
            | Self::MissingReference { state, .. }
            | Self::UnsupportedValue { state, .. } => Some(state),
            _ => None,
        }
    }
}
impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Self::Io { path, err } => write!(f, "cannot read {}: {}", path.display(), err),
            Self::Syntax { message, state } => write!(f, "syntax error: {}\n  {}", message, state),
            Self::MissingReference { kind, name, state } => {
                write!(f, "missing {} `{}`\n  {}", kind, name, state)
            }
            Self::UnsupportedValue {
                kind,
                value,
                expected,
                state,
            } => write!(
                f,
                "unsupported {} `{}`, expected one of {}\n  {}",
                kind,
                value,
                expected.join(", "),
                state
            ),
            Self::Precedence { stage, requires } => {
                write!(f, "{} must be loaded before the {}", requires, stage)
            }
            Self::Boxed(err) => write!(f, "{}", err),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}
impl std::error::Error for DbError {}
impl From<std::io::Error> for DbError {
    /// Wrap IO errors without an associated path
    fn from(e: std::io::Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}
impl From<rust_decimal::Error> for DbError {
    fn from(e: rust_decimal::Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}
impl From<crate::utils::ser::Error> for DbError {
    fn from(e: crate::utils::ser::Error) -> Self {
        Self::Boxed(Box::new(e))
    }
}
impl From<derive_builder::UninitializedFieldError> for DbError {
    fn from(e: derive_builder::UninitializedFieldError) -> Self {
        Self::Boxed(Box::new(e))
    }
}
impl From<String> for DbError {
    /// Convert string-based errors by wrapping them
    fn from(e: String) -> Self {
        Self::Str(e)
    }
}
impl From<&str> for DbError {
    /// Convert string-based errors by wrapping them
    fn from(e: &str) -> Self {
        Self::Str(e.into())
    }
}

/// LefDef21 Library-Wide Result Type
pub type DbResult<T> = Result<T, DbError>;
