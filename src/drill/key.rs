//! Composite key composition.
//!
//! A group's key is the left fold of its dimension values:
//!
//! ```text
//! CALCULATE(MAX(d0))
//! CONCATENATE(CALCULATE(MAX(d0)), CALCULATE(MAX(d1)))
//! CONCATENATE(CONCATENATE(...), CALCULATE(MAX(d2)))
//! ```
//!
//! Values are concatenated with no separator, so `("ab", "c")` and
//! `("a", "bc")` produce the same key. Keys are only compared within one
//! level's result set; dimension values that collide this way will merge
//! their drill paths.

use crate::dax::{calculate, concatenate, max, raw, Expr};

use super::error::{DrillError, DrillResult};

/// Output of [`compose_key`].
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedKey {
    /// Dimensions joined for a grouping column list.
    pub joined_dims: String,
    /// Scalar expression evaluating to the group's composite key.
    pub key: Expr,
    depth: usize,
}

impl ComposedKey {
    /// Number of dimensions folded into the key.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Key of a child group one level below: parent key followed by the
    /// child's value along `ranked`.
    pub fn child_key(&self, ranked: &str) -> Expr {
        calculate(concatenate(self.key.clone(), max(raw(ranked))))
    }
}

/// Build the grouping list and composite-key expression for `dims`.
pub fn compose_key(dims: &[String]) -> DrillResult<ComposedKey> {
    let (first, rest) = dims.split_first().ok_or(DrillError::EmptyDimensionList)?;

    let key = rest.iter().fold(calculate(max(raw(first))), |acc, dim| {
        concatenate(acc, calculate(max(raw(dim))))
    });

    Ok(ComposedKey {
        joined_dims: dims.join(", "),
        key,
        depth: dims.len(),
    })
}
