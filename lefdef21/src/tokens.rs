//!
//! # Tokenizer & Bracket Scanner
//!
//! Shared by all three loaders. Source text is first stripped of commentary,
//! then split into [Token]s at whitespace and at a per-format set of delimiter characters.
//!

// Std-Lib
use std::path::{Path, PathBuf};

// Crates.io
use serde::{Deserialize, Serialize};

// Local imports
use crate::error::{DbError, DbResult};

///
/// # Tokenizer Configuration
///
/// Every character in `delimiters` terminates a token.
/// Characters also in `exceptions` are then emitted as single-character tokens of their own,
/// rather than discarded. `exceptions` must be a subset of `delimiters`.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenizerConfig {
    pub delimiters: &'static str,
    pub exceptions: &'static str,
}
impl TokenizerConfig {
    /// Check that every exception is also a delimiter
    pub fn validate(&self) -> DbResult<()> {
        match self.exceptions.chars().find(|c| !self.delimiters.contains(*c)) {
            Some(c) => Err(DbError::Str(format!(
                "Tokenizer exception `{}` is not among delimiters `{}`",
                c, self.delimiters
            ))),
            None => Ok(()),
        }
    }
}

/// LEF Library Tokens. Semicolons separate, and are discarded.
pub const LEF_TOKENS: TokenizerConfig = TokenizerConfig {
    delimiters: "#;",
    exceptions: "",
};
/// Structural Verilog Tokens
pub const VERILOG_TOKENS: TokenizerConfig = TokenizerConfig {
    delimiters: "(),:;/#[]{}*\"\\",
    exceptions: "(),:;[]{}",
};
/// DEF Placement Tokens
pub const DEF_TOKENS: TokenizerConfig = TokenizerConfig {
    delimiters: "();",
    exceptions: "();",
};

/// Location of a [Token] in its source string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Starting (byte) index
    pub start: usize,
    /// Ending (byte) index
    pub stop: usize,
    /// Line number, starting from one
    pub line: usize,
}

/// # Token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub loc: SourceLocation,
}
impl Token {
    /// Return a sub-string of input-string `src` over our locations
    pub fn substr<'src>(&self, src: &'src str) -> &'src str {
        &src[self.loc.start..self.loc.stop]
    }
}

///
/// # Token Stream
///
/// Read-only once built. Owns its (comment-stripped) source text,
/// and hands out token text by index.
///
#[derive(Debug, Clone)]
pub struct TokenStream {
    /// Source file, or `<string>`
    path: PathBuf,
    /// Comment-stripped source text
    src: String,
    /// Tokens, in source order
    toks: Vec<Token>,
}
impl TokenStream {
    pub fn path(&self) -> &Path {
        &self.path
    }
    pub fn len(&self) -> usize {
        self.toks.len()
    }
    pub fn is_empty(&self) -> bool {
        self.toks.is_empty()
    }
    /// Get the text of token `idx`, if it exists
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.toks.get(idx).map(|t| t.substr(&self.src))
    }
    /// Get the text of token `idx`, or the empty string past the end of the stream
    pub fn txt(&self, idx: usize) -> &str {
        self.get(idx).unwrap_or("")
    }
    /// Source line of token `idx`. Past the end, the line of the last token.
    pub fn line(&self, idx: usize) -> usize {
        match self.toks.get(idx).or_else(|| self.toks.last()) {
            Some(t) => t.loc.line,
            None => 1,
        }
    }
    /// Iterate over all token strings
    pub fn iter(&self) -> impl Iterator<Item = &str> + '_ {
        self.toks.iter().map(move |t| t.substr(&self.src))
    }
    /// Find the first `(` at or after `start`, and its matching `)`.
    /// Returns `None` if there is no `(`, or if it is never closed.
    pub fn match_parens(&self, start: usize) -> Option<(usize, usize)> {
        let open = (start..self.len()).find(|&i| self.txt(i) == "(")?;
        let mut depth = 0usize;
        for idx in open..self.len() {
            match self.txt(idx) {
                "(" => depth += 1,
                ")" => {
                    depth -= 1;
                    if depth == 0 {
                        return Some((open, idx));
                    }
                }
                _ => (),
            }
        }
        None
    }
    ///
    /// Apply `f` to each token between the first `(` at or after `start` and its matching `)`.
    ///
    /// `f` receives each token's index and text, and returns the index at which scanning resumes,
    /// allowing it to consume several tokens at once. Tokens it consumes still count toward
    /// parenthesis nesting. Returns the index of the matching `)`,
    /// or `self.len()` if no matched pair exists.
    ///
    pub fn on_next_parens<E>(
        &self,
        start: usize,
        mut f: impl FnMut(usize, &str) -> Result<usize, E>,
    ) -> Result<usize, E> {
        let open = match (start..self.len()).find(|&i| self.txt(i) == "(") {
            Some(i) => i,
            None => return Ok(self.len()),
        };
        let mut depth = 1usize;
        let mut pos = open + 1;
        while pos < self.len() {
            if depth == 1 && self.txt(pos) == ")" {
                return Ok(pos);
            }
            let next = f(pos, self.txt(pos))?.max(pos + 1).min(self.len());
            for idx in pos..next {
                match self.txt(idx) {
                    "(" => depth += 1,
                    ")" => {
                        depth -= 1;
                        if depth == 0 {
                            return Ok(idx);
                        }
                    }
                    _ => (),
                }
            }
            pos = next;
        }
        Ok(self.len())
    }
}

/// Tokenize the contents of file `path`
pub fn tokenize_file(path: impl AsRef<Path>, cfg: &TokenizerConfig) -> DbResult<TokenStream> {
    let path = path.as_ref();
    let src = std::fs::read_to_string(path).map_err(|err| DbError::Io {
        path: path.to_path_buf(),
        err,
    })?;
    tokenize(path.to_path_buf(), src, cfg)
}
/// Tokenize string `src`
pub fn tokenize_str(src: &str, cfg: &TokenizerConfig) -> DbResult<TokenStream> {
    tokenize(PathBuf::from("<string>"), src.to_string(), cfg)
}

fn tokenize(path: PathBuf, src: String, cfg: &TokenizerConfig) -> DbResult<TokenStream> {
    cfg.validate()?;
    let src = strip_comments(src)?;
    let mut toks = Vec::new();
    let mut line = 1;
    let mut start: Option<usize> = None;
    for (idx, c) in src.char_indices() {
        let is_delim = cfg.delimiters.contains(c);
        if !is_delim && !c.is_whitespace() {
            if start.is_none() {
                start = Some(idx);
            }
            continue;
        }
        if let Some(s) = start.take() {
            toks.push(Token {
                loc: SourceLocation {
                    start: s,
                    stop: idx,
                    line,
                },
            });
        }
        if is_delim && cfg.exceptions.contains(c) {
            toks.push(Token {
                loc: SourceLocation {
                    start: idx,
                    stop: idx + c.len_utf8(),
                    line,
                },
            });
        }
        if c == '\n' {
            line += 1;
        }
    }
    if let Some(s) = start {
        toks.push(Token {
            loc: SourceLocation {
                start: s,
                stop: src.len(),
                line,
            },
        });
    }
    Ok(TokenStream { path, src, toks })
}

///
/// Blank out `/* */`, `//` and `#` comments, in place.
///
/// Purely lexical: comment openers inside quoted strings still open comments.
/// Newlines are kept, so that line numbers survive.
///
fn strip_comments(src: String) -> DbResult<String> {
    let mut buf = src.into_bytes();
    let len = buf.len();
    let mut i = 0;
    while i < len {
        match (buf[i], buf.get(i + 1).copied()) {
            (b'/', Some(b'*')) => {
                buf[i] = b' ';
                buf[i + 1] = b' ';
                i += 2;
                while i < len {
                    if buf[i] == b'*' && buf.get(i + 1) == Some(&b'/') {
                        buf[i] = b' ';
                        buf[i + 1] = b' ';
                        i += 2;
                        break;
                    }
                    if buf[i] != b'\n' {
                        buf[i] = b' ';
                    }
                    i += 1;
                }
            }
            (b'/', Some(b'/')) | (b'#', _) => {
                while i < len && buf[i] != b'\n' && buf[i] != b'\r' {
                    buf[i] = b' ';
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }
    String::from_utf8(buf).map_err(|e| DbError::Boxed(Box::new(e)))
}
