//! Ordered dimension hierarchy.

use serde::{Deserialize, Serialize};

/// Ordered dimension references, coarsest first.
///
/// Entries are opaque references in the target dialect (`'Geo'[Region]`).
/// Order defines drill depth: `dims[0]` is the top level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DimensionList(Vec<String>);

impl DimensionList {
    pub fn new<S: Into<String>>(dims: impl IntoIterator<Item = S>) -> Self {
        Self(dims.into_iter().map(Into::into).collect())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// One transition per adjacent pair. Lists shorter than two yield none.
    pub fn transitions(&self) -> impl Iterator<Item = Transition<'_>> {
        (0..self.0.len().saturating_sub(1)).map(move |index| Transition {
            index,
            parents: &self.0[..=index],
            ranked: &self.0[index + 1],
        })
    }

    /// Human-readable listing used in logs and sink records.
    pub fn joined(&self) -> String {
        self.0.join(", ")
    }
}

impl<S: Into<String>> FromIterator<S> for DimensionList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// One drill step: group by `parents`, rank children along `ranked`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<'a> {
    pub index: usize,
    pub parents: &'a [String],
    pub ranked: &'a str,
}

impl Transition<'_> {
    /// `"<dims[i]> by <dims[i+1]>"`
    pub fn label(&self) -> String {
        format!("{} by {}", self.parents[self.index], self.ranked)
    }
}
