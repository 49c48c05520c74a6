//! Wire types for the analytical service REST API.
//!
//! Only the fields narrator reads are modelled; everything else in the
//! responses is ignored.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::executor::{QueryFailure, QueryResult, Table};

// ============================================================================
// Identity provider
// ============================================================================

/// Form body for the client-credentials grant.
#[derive(Debug, Clone, Serialize)]
pub struct TokenRequest<'a> {
    pub grant_type: &'static str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub scope: &'a str,
}

impl<'a> TokenRequest<'a> {
    pub fn client_credentials(client_id: &'a str, client_secret: &'a str, scope: &'a str) -> Self {
        Self {
            grant_type: "client_credentials",
            client_id,
            client_secret,
            scope,
        }
    }
}

/// Token endpoint answer.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds.
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

// ============================================================================
// Workspace / dataset listing
// ============================================================================

/// `{"value": [...]}` wrapper used by list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
}

/// A workspace (group) or dataset entry; both carry `id` and `name`.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedItem {
    pub id: String,
    pub name: String,
}

/// Find an item by display name.
pub fn find_by_name<'a>(items: &'a [NamedItem], name: &str) -> Option<&'a NamedItem> {
    items.iter().find(|item| item.name == name)
}

// ============================================================================
// executeQueries
// ============================================================================

/// Request body for `POST /datasets/{id}/executeQueries`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteQueriesRequest<'a> {
    pub queries: Vec<QueryText<'a>>,
    pub serializer_settings: SerializerSettings,
}

impl<'a> ExecuteQueriesRequest<'a> {
    /// A single query with nulls included in the rows.
    pub fn single(query: &'a str) -> Self {
        Self {
            queries: vec![QueryText { query }],
            serializer_settings: SerializerSettings {
                include_nulls: true,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryText<'a> {
    pub query: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SerializerSettings {
    pub include_nulls: bool,
}

/// Response body for `executeQueries`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecuteQueriesResponse {
    #[serde(default)]
    pub results: Vec<QueryResultSet>,
    #[serde(default)]
    pub error: Option<ServiceError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResultSet {
    #[serde(default)]
    pub tables: Vec<ResultTable>,
    #[serde(default)]
    pub error: Option<ServiceError>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultTable {
    #[serde(default)]
    pub rows: Vec<Map<String, Value>>,
}

/// Error object the service embeds in otherwise successful responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, rename = "pbi.error")]
    pub details: Option<Value>,
}

impl ServiceError {
    fn into_failure(self) -> QueryFailure {
        let message = if self.message.is_empty() {
            self.details
                .map(|d| d.to_string())
                .unwrap_or_else(|| "unknown error".to_string())
        } else {
            self.message
        };
        QueryFailure::service(self.code, message)
    }
}

impl ExecuteQueriesResponse {
    /// First table of the first result set.
    ///
    /// Missing results, tables or rows all mean "zero rows"; error objects
    /// at either level become [`QueryFailure::Service`].
    pub fn into_table(self) -> QueryResult<Table> {
        if let Some(err) = self.error {
            return Err(err.into_failure());
        }

        let Some(result) = self.results.into_iter().next() else {
            return Ok(Table::empty());
        };
        if let Some(err) = result.error {
            return Err(err.into_failure());
        }

        Ok(result
            .tables
            .into_iter()
            .next()
            .map(|t| Table::from_records(&t.rows))
            .unwrap_or_else(Table::empty))
    }
}
