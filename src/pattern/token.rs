//! Tokenizer for pattern expressions.
//!
//! Turns text such as `(a ^ b) + 2 * (a & b)` into a flat token sequence. Whitespace
//! is skipped, parentheses become single tokens and operators are resolved
//! longest-match-first against [`symbols::SYMBOLS`](super::symbols::SYMBOLS), so
//! `a<<<b` yields `a`, `<<<`, `b`. Operands are maximal runs of ASCII alphanumerics and
//! underscores; an all-digit run is a constant, anything else a variable wildcard.
//!
//! Tokenizing never fails. Characters that start neither an operator nor an operand
//! are logged and dropped, unless the tokenizer was asked to keep them as
//! [`TokenKind::Unknown`] tokens (which the parser rejects).

use std::fmt;

use crate::{il::Opcode, pattern::symbols};

/// Lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// An operator from the symbol table.
    Operator,
    /// A variable or constant operand.
    Operand,
    /// `(`
    LParen,
    /// `)`
    RParen,
    /// A character the tokenizer does not understand.
    Unknown,
}

/// One lexical token of a pattern expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    kind: TokenKind,
    text: String,
    opcode: Option<Opcode>,
    offset: usize,
}

impl Token {
    /// Creates an operator token from its spelling. Returns `None` for unknown spellings.
    #[must_use]
    pub fn operator(text: &str, offset: usize) -> Option<Self> {
        let opcode = symbols::lookup(text)?;
        Some(Self {
            kind: TokenKind::Operator,
            text: text.to_string(),
            opcode: Some(opcode),
            offset,
        })
    }

    /// Creates an operand token.
    #[must_use]
    pub fn operand(text: &str, offset: usize) -> Self {
        Self {
            kind: TokenKind::Operand,
            text: text.to_string(),
            opcode: None,
            offset,
        }
    }

    fn punct(kind: TokenKind, text: &str, offset: usize) -> Self {
        Self {
            kind,
            text: text.to_string(),
            opcode: None,
            offset,
        }
    }

    /// Lexical class of the token.
    #[must_use]
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// Source text of the token.
    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Opcode an operator token maps to.
    #[must_use]
    pub fn opcode(&self) -> Option<Opcode> {
        self.opcode
    }

    /// Byte offset of the token in the source expression.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Returns true for operator tokens.
    #[must_use]
    pub fn is_operator(&self) -> bool {
        self.kind == TokenKind::Operator
    }

    /// Returns true for operands made of digits only.
    #[must_use]
    pub fn is_constant(&self) -> bool {
        self.kind == TokenKind::Operand && self.text.bytes().all(|b| b.is_ascii_digit())
    }

    /// Returns true for operands that act as wildcards.
    #[must_use]
    pub fn is_variable(&self) -> bool {
        self.kind == TokenKind::Operand && !self.is_constant()
    }

    /// Numeric value of a constant operand.
    ///
    /// Values are read as unsigned 64-bit integers and reinterpreted as `i64`, so
    /// `18446744073709551615` equals `-1`. Constants that do not fit yield `None`.
    #[must_use]
    pub fn constant_value(&self) -> Option<i64> {
        if !self.is_constant() {
            return None;
        }
        self.text.parse::<u64>().ok().map(|v| v as i64)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Streaming tokenizer over one expression.
///
/// # Examples
///
/// ```rust
/// use deobscope::pattern::{Tokenizer, TokenKind};
///
/// let kinds: Vec<TokenKind> = Tokenizer::new("~(a+1)").map(|t| t.kind()).collect();
/// assert_eq!(
///     kinds,
///     [
///         TokenKind::Operator,
///         TokenKind::LParen,
///         TokenKind::Operand,
///         TokenKind::Operator,
///         TokenKind::Operand,
///         TokenKind::RParen,
///     ]
/// );
/// ```
pub struct Tokenizer<'a> {
    source: &'a str,
    pos: usize,
    keep_unknown: bool,
}

impl<'a> Tokenizer<'a> {
    /// Creates a tokenizer that drops unknown characters.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            pos: 0,
            keep_unknown: false,
        }
    }

    /// Emits unknown characters as [`TokenKind::Unknown`] tokens instead of dropping them.
    #[must_use]
    pub fn keep_unknown(mut self) -> Self {
        self.keep_unknown = true;
        self
    }

    fn match_operator(&self) -> Option<Token> {
        let rest = &self.source[self.pos..];
        (1..=symbols::MAX_SYMBOL_LEN)
            .rev()
            .filter_map(|len| rest.get(..len))
            .find_map(|candidate| Token::operator(candidate, self.pos))
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let rest = &self.source[self.pos..];
            let c = rest.chars().next()?;
            let start = self.pos;

            if c.is_whitespace() {
                self.pos += c.len_utf8();
                continue;
            }
            if c == '(' || c == ')' {
                self.pos += 1;
                let kind = if c == '(' {
                    TokenKind::LParen
                } else {
                    TokenKind::RParen
                };
                return Some(Token::punct(kind, &rest[..1], start));
            }
            if let Some(token) = self.match_operator() {
                self.pos += token.text.len();
                return Some(token);
            }
            if c.is_ascii_alphanumeric() || c == '_' {
                let len = rest
                    .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_'))
                    .unwrap_or(rest.len());
                self.pos += len;
                return Some(Token::operand(&rest[..len], start));
            }

            self.pos += c.len_utf8();
            log::warn!(
                "Skipping unknown character '{}' at offset {} in '{}'",
                c,
                start,
                self.source
            );
            if self.keep_unknown {
                return Some(Token::punct(
                    TokenKind::Unknown,
                    &rest[..c.len_utf8()],
                    start,
                ));
            }
        }
    }
}

/// Tokenizes an expression, dropping characters it does not understand.
///
/// # Examples
///
/// ```rust
/// use deobscope::pattern::tokenize;
///
/// let texts: Vec<String> = tokenize("a<<<b").iter().map(|t| t.text().to_string()).collect();
/// assert_eq!(texts, ["a", "<<<", "b"]);
/// ```
#[must_use]
pub fn tokenize(expression: &str) -> Vec<Token> {
    Tokenizer::new(expression).collect()
}
