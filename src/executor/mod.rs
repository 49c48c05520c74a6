//! Query execution boundary.
//!
//! The drill core never talks to the network directly. It hands rendered
//! query text to a [`QueryExecutor`] and receives a [`Table`] or a
//! [`QueryFailure`]. The hosted service client in [`crate::powerbi`] is the
//! production implementation; tests substitute scripted executors.
//!
//! ```text
//! ┌──────────────┐  query text   ┌─────────────────┐   HTTPS   ┌───────────────┐
//! │ DrillIterator│ ────────────▶ │  QueryExecutor  │ ────────▶ │ analytical svc│
//! │              │ ◀──────────── │ (PowerBiClient) │ ◀──────── │               │
//! └──────────────┘ Table/Failure └─────────────────┘   JSON    └───────────────┘
//! ```

mod error;
mod table;

use async_trait::async_trait;

use crate::dax::DaxQuery;

pub use error::{QueryFailure, QueryResult};
pub use table::{Scalar, Table, KEY_COLUMN};

/// Executes analytical queries, one at a time.
///
/// Implementations must not retry or cache: every call is one round trip.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Submit query text and wait for the tabular result.
    async fn execute(&self, query: &str) -> QueryResult<Table>;

    /// Render and submit a built query.
    async fn execute_query(&self, query: &DaxQuery) -> QueryResult<Table> {
        self.execute(&query.to_dax()).await
    }
}

#[async_trait]
impl<T: QueryExecutor + ?Sized> QueryExecutor for Box<T> {
    async fn execute(&self, query: &str) -> QueryResult<Table> {
        (**self).execute(query).await
    }
}
