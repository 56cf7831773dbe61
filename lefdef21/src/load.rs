//!
//! # Load Context
//!
//! Token cursor and error-reporting state, scoped to a single load operation.
//! Shared by the LEF, Verilog and DEF loaders.
//!

// Crates.io
#[allow(unused_imports)]
use rust_decimal::prelude::*;
use rust_decimal::RoundingStrategy;

// Local imports
use crate::data::{Int, LefDecimal};
use crate::error::{DbError, DbResult, LoadStage, ParseState, RefKind, ValueKind};
use crate::tokens::TokenStream;
use crate::utils::{EnumStr, ErrorContext, ErrorHelper, Unwrapper};

/// # Load Context
/// Position within a [TokenStream], plus the stack of blocks open at that position.
pub(crate) struct LoadContext<'t> {
    /// Token Stream
    pub toks: &'t TokenStream,
    /// Index of the next token
    pub pos: usize,
    /// Loader running
    pub stage: LoadStage,
    /// Context Stack
    pub ctx: Vec<ErrorContext>,
}
impl<'t> LoadContext<'t> {
    pub fn new(toks: &'t TokenStream, stage: LoadStage) -> Self {
        Self {
            toks,
            pos: 0,
            stage,
            ctx: Vec::new(),
        }
    }
    /// Boolean indication of having consumed every token
    pub fn done(&self) -> bool {
        self.pos >= self.toks.len()
    }
    /// Peek at the next token, without advancing
    pub fn peek(&self) -> Option<&'t str> {
        self.toks.get(self.pos)
    }
    /// Peek `n` tokens past the next one
    pub fn peek_nth(&self, n: usize) -> Option<&'t str> {
        self.toks.get(self.pos + n)
    }
    /// Boolean indication of whether the next token is `txt`
    pub fn matches(&self, txt: &str) -> bool {
        self.peek() == Some(txt)
    }
    /// Advance by a token without returning it.
    /// Usually called after matching on "peeked" results.
    pub fn advance(&mut self) {
        self.pos += 1;
    }
    /// Get the next token, or fail at end of input
    pub fn next(&mut self) -> DbResult<&'t str> {
        let txt = self.expect_some()?;
        self.pos += 1;
        Ok(txt)
    }
    /// Peek at the next token, failing at end of input
    pub fn expect_some(&self) -> DbResult<&'t str> {
        self.unwrap(self.peek(), "Unexpected end of input")
    }
    /// Consume the next token if it is `txt`. Returns whether it was.
    pub fn eat(&mut self, txt: &str) -> bool {
        if self.matches(txt) {
            self.pos += 1;
            return true;
        }
        false
    }
    /// Assert that the next token is `txt`, and consume it
    pub fn expect(&mut self, txt: &str) -> DbResult<()> {
        if self.eat(txt) {
            return Ok(());
        }
        self.fail(format!("Expected `{}`", txt))
    }
    /// Get the next token as an owned name
    pub fn get_name(&mut self) -> DbResult<String> {
        Ok(self.next()?.to_string())
    }
    /// Parse the next token into a [LefDecimal] number
    pub fn parse_number(&mut self) -> DbResult<LefDecimal> {
        let txt = self.expect_some()?;
        let num = match LefDecimal::from_str(txt) {
            Ok(num) => num,
            Err(_) => LefDecimal::from_scientific(txt).unwrapper(self, "Invalid number")?,
        };
        self.pos += 1;
        Ok(num)
    }
    /// Parse the next token into an integer
    pub fn parse_int(&mut self) -> DbResult<Int> {
        let txt = self.expect_some()?;
        let num = txt.parse::<Int>().unwrapper(self, "Invalid integer")?;
        self.pos += 1;
        Ok(num)
    }
    /// Parse a parenthesized `( x y )` point
    pub fn parse_point(&mut self) -> DbResult<(Int, Int)> {
        self.expect("(")?;
        let x = self.parse_int()?;
        let y = self.parse_int()?;
        self.expect(")")?;
        Ok((x, y))
    }
    /// Parse an enumerated string-value of type <T>
    pub fn parse_enum<T: EnumStr>(&mut self, kind: ValueKind) -> DbResult<T> {
        let txt = self.expect_some()?;
        match T::from_str(txt) {
            Some(t) => {
                self.pos += 1;
                Ok(t)
            }
            None => Err(DbError::UnsupportedValue {
                kind,
                value: txt.to_string(),
                expected: T::variants(),
                state: self.state(),
            }),
        }
    }
    /// Skip tokens up to and including the next `txt`
    pub fn skip_past(&mut self, txt: &str) -> DbResult<()> {
        while !self.done() {
            if self.eat(txt) {
                return Ok(());
            }
            self.advance();
        }
        self.fail(format!("Missing `{}`", txt))
    }
    /// Skip tokens up to and including the next `END <name>` pair
    pub fn skip_block(&mut self, name: &str) -> DbResult<()> {
        while !self.done() {
            if self.matches("END") && self.peek_nth(1) == Some(name) {
                self.pos += 2;
                return Ok(());
            }
            self.advance();
        }
        self.fail(format!("Missing `END {}`", name))
    }
    /// Fail with a [DbError::MissingReference]
    pub fn missing<T>(&self, kind: RefKind, name: impl Into<String>) -> DbResult<T> {
        Err(DbError::MissingReference {
            kind,
            name: name.into(),
            state: self.state(),
        })
    }
    /// Extract the state of the loader. Generally for error reporting.
    pub fn state(&self) -> ParseState {
        let idx = self.pos.min(self.toks.len());
        ParseState {
            file: self.toks.path().to_path_buf(),
            stage: self.stage,
            ctx: self.ctx.clone(),
            token: self.toks.get(idx).unwrap_or("EOF").to_string(),
            index: idx,
            line: self.toks.line(idx),
        }
    }
}
impl ErrorHelper for LoadContext<'_> {
    type Error = DbError;
    fn err(&self, msg: impl Into<String>) -> DbError {
        DbError::Syntax {
            message: msg.into(),
            state: self.state(),
        }
    }
}

/// Convert library length `val` into database units, rounding to the nearest unit, with halves away from zero
pub(crate) fn to_dbu(val: LefDecimal, dbu: Int) -> DbResult<Int> {
    let scaled = (val * LefDecimal::from(dbu))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    match scaled.to_i64() {
        Some(v) => Ok(v),
        None => Err(DbError::Str(format!(
            "Value {} out of range in database units",
            scaled
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_rounds_halves_away_from_zero() -> DbResult<()> {
        assert_eq!(to_dbu(LefDecimal::new(5, 4), 1000)?, 1);
        assert_eq!(to_dbu(LefDecimal::new(-5, 4), 1000)?, -1);
        assert_eq!(to_dbu(LefDecimal::new(25, 4), 1000)?, 3);
        assert_eq!(to_dbu(LefDecimal::new(4, 4), 1000)?, 0);
        assert_eq!(to_dbu(LefDecimal::new(14, 1), 2000)?, 2800);
        Ok(())
    }
}
