//! Expression AST - the core of DAX expression building.
//!
//! Scalar and table expressions share one enum, the way DAX itself treats
//! table functions as ordinary expressions. Opaque fragments handed to us by
//! the caller (dimension references, drill metrics, filter predicates) are
//! carried as [`Expr::Raw`] and rendered verbatim.

use std::fmt;
use std::str::FromStr;

use super::token::{Token, TokenStream};

// =============================================================================
// Tree
// =============================================================================

/// A DAX expression.
///
/// Lowered to tokens by [`Expr::to_tokens`]; the match there is exhaustive.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Opaque fragment in the target dialect, passed through unchanged.
    Raw(String),

    /// Bracketed column or measure reference: `[Key]`
    Column(String),

    /// Reference to a query variable: `t_keys`
    Var(String),

    /// Literal values
    Literal(Literal),

    /// `MAX('Geo'[Region])`
    Max(Box<Expr>),

    /// `CALCULATE(expr)`, a bare context transition
    Calculate(Box<Expr>),

    /// `CONCATENATE(left, right)`
    Concatenate { left: Box<Expr>, right: Box<Expr> },

    /// `FILTER(table, predicate)`
    Filter {
        table: Box<Expr>,
        predicate: Box<Expr>,
    },

    /// `RANKX(table, expr, , order, DENSE)`
    Rank {
        table: Box<Expr>,
        expr: Box<Expr>,
        order: SortDir,
    },

    /// `IF(condition, then, otherwise)`
    If {
        condition: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },

    /// `left op right`, unparenthesized
    BinaryOp {
        left: Box<Expr>,
        op: BinaryOperator,
        right: Box<Expr>,
    },

    /// Table constructor: `{"a", "b"}`
    TableConstructor(Vec<Expr>),

    /// Any other function call: NAME(args...)
    Function { name: String, args: Vec<Expr> },
}

/// Literal values.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    String(String),
    Bool(bool),
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Eq,
    Lte,
    Gte,
    And,
    /// Membership: `expr IN table`
    In,
}

/// Sort direction for ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

impl SortDir {
    /// Keyword as it appears in query text and in the `"Direction"` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        }
    }

    fn token(self) -> Token {
        match self {
            SortDir::Asc => Token::Asc,
            SortDir::Desc => Token::Desc,
        }
    }
}

impl fmt::Display for SortDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortDir {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "ASC" | "ASCENDING" => Ok(SortDir::Asc),
            "DESC" | "DESCENDING" => Ok(SortDir::Desc),
            other => Err(format!("unknown sort direction '{}': expected ASC or DESC", other)),
        }
    }
}

// =============================================================================
// Rendering
// =============================================================================

impl Expr {
    /// Convert this expression to a token stream.
    pub fn to_tokens(&self) -> TokenStream {
        let mut ts = TokenStream::new();

        match self {
            Expr::Raw(text) => {
                ts.push(Token::Raw(text.clone()));
            }

            Expr::Column(name) => {
                ts.push(Token::ColumnRef(name.clone()));
            }

            Expr::Var(name) => {
                ts.push(Token::Ident(name.clone()));
            }

            Expr::Literal(lit) => {
                ts.push(match lit {
                    Literal::Int(n) => Token::LitInt(*n),
                    Literal::String(s) => Token::LitString(s.clone()),
                    Literal::Bool(b) => Token::LitBool(*b),
                });
            }

            Expr::Max(arg) => {
                emit_call(&mut ts, "MAX", [arg.as_ref()]);
            }

            Expr::Calculate(expr) => {
                emit_call(&mut ts, "CALCULATE", [expr.as_ref()]);
            }

            Expr::Concatenate { left, right } => {
                emit_call(&mut ts, "CONCATENATE", [left.as_ref(), right.as_ref()]);
            }

            Expr::Filter { table, predicate } => {
                emit_call(&mut ts, "FILTER", [table.as_ref(), predicate.as_ref()]);
            }

            Expr::Rank { table, expr, order } => {
                // The empty third argument lets RANKX evaluate `expr` per row.
                ts.push(Token::FunctionName("RANKX".into())).lparen();
                ts.append(&table.to_tokens()).comma().space();
                ts.append(&expr.to_tokens()).comma().space().comma().space();
                ts.push(order.token()).comma().space().push(Token::Dense);
                ts.rparen();
            }

            Expr::If {
                condition,
                then,
                otherwise,
            } => {
                emit_call(
                    &mut ts,
                    "IF",
                    [condition.as_ref(), then.as_ref(), otherwise.as_ref()],
                );
            }

            Expr::BinaryOp { left, op, right } => {
                ts.append(&left.to_tokens());
                ts.space();
                ts.push(binary_op_to_token(*op));
                ts.space();
                ts.append(&right.to_tokens());
            }

            Expr::TableConstructor(values) => {
                ts.push(Token::LBrace);
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        ts.comma().space();
                    }
                    ts.append(&value.to_tokens());
                }
                ts.push(Token::RBrace);
            }

            Expr::Function { name, args } => {
                emit_call(&mut ts, name, args.iter());
            }
        }

        ts
    }

    /// Render this expression to DAX text.
    pub fn to_dax(&self) -> String {
        self.to_tokens().serialize()
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_dax())
    }
}

fn emit_call<'a>(ts: &mut TokenStream, name: &str, args: impl IntoIterator<Item = &'a Expr>) {
    ts.push(Token::FunctionName(name.into())).lparen();
    for (i, arg) in args.into_iter().enumerate() {
        if i > 0 {
            ts.comma().space();
        }
        ts.append(&arg.to_tokens());
    }
    ts.rparen();
}

fn binary_op_to_token(op: BinaryOperator) -> Token {
    match op {
        BinaryOperator::Eq => Token::Eq,
        BinaryOperator::Lte => Token::Lte,
        BinaryOperator::Gte => Token::Gte,
        BinaryOperator::And => Token::And,
        BinaryOperator::In => Token::In,
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Opaque fragment (pass-through, no parsing).
///
/// Use for caller-supplied dimension references, measures and predicates.
/// Key values must go through [`lit_str`] instead so they are escaped.
pub fn raw(text: &str) -> Expr {
    Expr::Raw(text.into())
}

/// Bracketed column reference: `[name]`.
pub fn column(name: &str) -> Expr {
    Expr::Column(name.into())
}

/// Variable reference.
pub fn var(name: &str) -> Expr {
    Expr::Var(name.into())
}

/// Create an integer literal.
pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

/// Quoted string literal.
pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::String(s.into()))
}

pub fn lit_bool(b: bool) -> Expr {
    Expr::Literal(Literal::Bool(b))
}

/// MAX(expr)
pub fn max(expr: Expr) -> Expr {
    Expr::Max(Box::new(expr))
}

/// CALCULATE(expr) - forces context transition.
pub fn calculate(expr: Expr) -> Expr {
    Expr::Calculate(Box::new(expr))
}

/// CONCATENATE(left, right)
pub fn concatenate(left: Expr, right: Expr) -> Expr {
    Expr::Concatenate {
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// FILTER(table, predicate)
pub fn filter(table: Expr, predicate: Expr) -> Expr {
    Expr::Filter {
        table: Box::new(table),
        predicate: Box::new(predicate),
    }
}

/// RANKX(table, expr, , order, DENSE)
pub fn rank_dense(table: Expr, expr: Expr, order: SortDir) -> Expr {
    Expr::Rank {
        table: Box::new(table),
        expr: Box::new(expr),
        order,
    }
}

/// IF(condition, then, otherwise)
pub fn if_else(condition: Expr, then: Expr, otherwise: Expr) -> Expr {
    Expr::If {
        condition: Box::new(condition),
        then: Box::new(then),
        otherwise: Box::new(otherwise),
    }
}

/// `{values...}`
pub fn table_of(values: Vec<Expr>) -> Expr {
    Expr::TableConstructor(values)
}

/// Any function not modelled as its own variant.
pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args,
    }
}

/// A `"name", expr` pair as used by SUMMARIZECOLUMNS, SUMMARIZE and ADDCOLUMNS.
pub fn named(name: &str, expr: Expr) -> [Expr; 2] {
    [lit_str(name), expr]
}

// =============================================================================
// Fluent Extension
// =============================================================================

/// Method-style comparison and logic builders.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn binary(self, op: BinaryOperator, other: Expr) -> Expr {
        Expr::BinaryOp {
            left: Box::new(self.into_expr()),
            op,
            right: Box::new(other),
        }
    }

    fn equals(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Eq, other)
    }

    fn gte(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Gte, other)
    }

    fn lte(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::Lte, other)
    }

    fn and(self, other: Expr) -> Expr {
        self.binary(BinaryOperator::And, other)
    }

    fn is_in(self, table: Expr) -> Expr {
        self.binary(BinaryOperator::In, table)
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}
