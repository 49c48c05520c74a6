//! DAX generation module.
//!
//! A small, typed builder for the analytical query language spoken by the
//! hosted data cube. Query text is never assembled by string concatenation;
//! the drill builders compose [`Expr`] trees and render them through
//! [`TokenStream`].
//!
//! - [`token`] - Token types and serialization
//! - [`expr`] - Expression AST and constructor helpers
//! - [`query`] - `EVALUATE` query with `VAR ... RETURN` bindings

pub mod expr;
pub mod query;
pub mod token;

pub use expr::{
    calculate, column, concatenate, filter, func, if_else, lit_bool, lit_int, lit_str, max,
    named, rank_dense, raw, table_of, var, BinaryOperator, Expr, ExprExt, Literal, SortDir,
};
pub use query::{DaxQuery, VarDef};
pub use token::{Token, TokenStream};
