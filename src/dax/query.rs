//! Query builder - construct `EVALUATE` queries with a fluent API.

use std::fmt;

use super::expr::Expr;
use super::token::{Token, TokenStream};

/// A `VAR name = expr` binding evaluated before the query body.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDef {
    pub name: String,
    pub expr: Expr,
}

impl VarDef {
    pub fn new(name: &str, expr: Expr) -> Self {
        Self {
            name: name.into(),
            expr,
        }
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Var)
            .space()
            .push(Token::Ident(self.name.clone()))
            .space()
            .push(Token::Eq)
            .space()
            .append(&self.expr.to_tokens());
        ts
    }
}

/// A complete analytical query: `EVALUATE [VAR ... RETURN] <table expr>`.
#[derive(Debug, Clone, PartialEq)]
#[must_use = "builders have no effect until used"]
pub struct DaxQuery {
    pub vars: Vec<VarDef>,
    pub body: Expr,
}

impl DaxQuery {
    /// Query evaluating `body` with no variables.
    pub fn new(body: Expr) -> Self {
        Self { vars: vec![], body }
    }

    /// Bind a variable. Variables render in insertion order, so later
    /// bindings may reference earlier ones.
    pub fn with_var(mut self, name: &str, expr: Expr) -> Self {
        self.vars.push(VarDef::new(name, expr));
        self
    }

    /// Look up a bound variable by name.
    pub fn var(&self, name: &str) -> Option<&Expr> {
        self.vars.iter().find(|v| v.name == name).map(|v| &v.expr)
    }

    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();
        ts.push(Token::Evaluate).newline();

        if !self.vars.is_empty() {
            for v in &self.vars {
                ts.append(&v.to_tokens()).newline();
            }
            ts.push(Token::Return).newline();
        }

        ts.append(&self.body.to_tokens());
        ts
    }

    /// Render the query text sent to the analytical service.
    pub fn to_dax(&self) -> String {
        self.to_tokens().serialize()
    }
}

impl fmt::Display for DaxQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dax())
    }
}
