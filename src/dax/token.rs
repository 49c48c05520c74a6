//! Lexemes of generated DAX.
//!
//! Expressions and queries never build text directly. They lower to a flat
//! [`TokenStream`], and escaping and spelling are decided here once.

use std::fmt::Write as _;

/// One lexeme of query output.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Evaluate,
    Var,
    Return,
    In,
    Asc,
    Desc,
    Dense,

    Comma,
    LParen,
    RParen,
    LBrace,
    RBrace,

    Eq,
    Lte,
    Gte,
    And,

    Space,
    Newline,

    /// Variable name bound by `VAR` (`t_keys`, `rankingTable`).
    Ident(String),
    /// `[Key]`; a `]` inside the name is doubled.
    ColumnRef(String),
    LitInt(i64),
    /// `"..."`; embedded quotes are doubled.
    LitString(String),
    /// `TRUE()` / `FALSE()`
    LitBool(bool),
    /// Upper-cased on output.
    FunctionName(String),

    /// Opaque dialect text written as-is.
    ///
    /// Dimension references, drill metrics, filters and metric lists come
    /// from the caller in this form. Key values must use `LitString`.
    Raw(String),
}

impl Token {
    /// Spelling of tokens that carry no data.
    fn fixed(&self) -> Option<&'static str> {
        let text = match self {
            Token::Evaluate => "EVALUATE",
            Token::Var => "VAR",
            Token::Return => "RETURN",
            Token::In => "IN",
            Token::Asc => "ASC",
            Token::Desc => "DESC",
            Token::Dense => "DENSE",
            Token::Comma => ",",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::Eq => "=",
            Token::Lte => "<=",
            Token::Gte => ">=",
            Token::And => "&&",
            Token::Space => " ",
            Token::Newline => "\n",
            Token::LitBool(true) => "TRUE()",
            Token::LitBool(false) => "FALSE()",
            _ => return None,
        };
        Some(text)
    }

    /// Append this token's text to `out`.
    pub fn write_to(&self, out: &mut String) {
        match self {
            Token::Ident(name) | Token::Raw(name) => out.push_str(name),
            Token::ColumnRef(name) => {
                out.push('[');
                out.push_str(&name.replace(']', "]]"));
                out.push(']');
            }
            Token::LitInt(n) => {
                let _ = write!(out, "{}", n);
            }
            Token::LitString(s) => {
                out.push('"');
                out.push_str(&s.replace('"', "\"\""));
                out.push('"');
            }
            Token::FunctionName(name) => out.push_str(&name.to_uppercase()),
            other => out.push_str(other.fixed().unwrap_or_default()),
        }
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        self.write_to(&mut out);
        out
    }
}

/// Tokens in output order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TokenStream {
    tokens: Vec<Token>,
}

impl TokenStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: Token) -> &mut Self {
        self.tokens.push(token);
        self
    }

    pub fn append(&mut self, other: &TokenStream) -> &mut Self {
        self.tokens.extend_from_slice(&other.tokens);
        self
    }

    /// Render the whole stream into one string.
    pub fn serialize(&self) -> String {
        let mut out = String::with_capacity(self.tokens.len() * 4);
        for token in &self.tokens {
            token.write_to(&mut out);
        }
        out
    }

    pub fn space(&mut self) -> &mut Self {
        self.push(Token::Space)
    }

    pub fn newline(&mut self) -> &mut Self {
        self.push(Token::Newline)
    }

    pub fn comma(&mut self) -> &mut Self {
        self.push(Token::Comma)
    }

    pub fn lparen(&mut self) -> &mut Self {
        self.push(Token::LParen)
    }

    pub fn rparen(&mut self) -> &mut Self {
        self.push(Token::RParen)
    }
}
