//! HTTP client for the analytical service.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::protocol::{
    find_by_name, ExecuteQueriesRequest, ExecuteQueriesResponse, ListResponse, NamedItem,
    TokenRequest, TokenResponse,
};
use crate::config::PowerBiSettings;
use crate::executor::{QueryExecutor, QueryFailure, QueryResult, Table};

/// Refresh the token this long before it actually expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

/// Executes queries against one dataset with a service-principal token.
///
/// # Example
///
/// ```ignore
/// use narrator::config::Settings;
/// use narrator::powerbi::PowerBiClient;
///
/// let settings = Settings::load()?;
/// let client = PowerBiClient::connect(&settings.powerbi).await?;
/// let table = client.execute("EVALUATE ROW(\"x\", 1)").await?;
/// ```
pub struct PowerBiClient {
    http: Client,
    settings: PowerBiSettings,
    dataset_id: String,
    token: Mutex<Option<CachedToken>>,
}

impl PowerBiClient {
    /// Authenticate and resolve the dataset id.
    ///
    /// When `dataset_id` is configured it is used as-is; otherwise the
    /// workspace and dataset are looked up by display name.
    pub async fn connect(settings: &PowerBiSettings) -> QueryResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| QueryFailure::Transport(e.to_string()))?;

        let mut client = Self {
            http,
            settings: settings.clone(),
            dataset_id: settings.dataset_id.clone().unwrap_or_default(),
            token: Mutex::new(None),
        };

        if client.dataset_id.is_empty() {
            client.dataset_id = client.resolve_dataset().await?;
        }
        info!(dataset_id = %client.dataset_id, "connected to dataset");
        Ok(client)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.settings.api_base.trim_end_matches('/'), path)
    }

    /// Current bearer token, fetched again once it nears expiry.
    async fn access_token(&self) -> QueryResult<String> {
        let mut guard = self.token.lock().await;
        if let Some(token) = guard.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.settings.authority_host.trim_end_matches('/'),
            self.settings.tenant_id
        );
        let form = TokenRequest::client_credentials(
            &self.settings.client_id,
            &self.settings.client_secret,
            &self.settings.scope,
        );

        let response = self
            .http
            .post(&url)
            .form(&form)
            .send()
            .await
            .map_err(|e| QueryFailure::Auth(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(QueryFailure::Auth(format!("token endpoint returned {}: {}", status, body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| QueryFailure::Auth(e.to_string()))?;
        debug!(expires_in = token.expires_in, "acquired access token");

        let value = token.access_token.clone();
        *guard = Some(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(value)
    }

    async fn authorized(&self, builder: RequestBuilder) -> QueryResult<RequestBuilder> {
        let token = self.access_token().await?;
        Ok(builder.bearer_auth(token))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> QueryResult<T> {
        let request = self.authorized(self.http.get(self.api_url(path))).await?;
        let response = check_status(request.send().await?).await?;
        Ok(response.json().await?)
    }

    async fn resolve_dataset(&self) -> QueryResult<String> {
        let groups: ListResponse<NamedItem> = self.get_json("groups").await?;
        let workspace = find_by_name(&groups.value, &self.settings.workspace).ok_or_else(|| {
            QueryFailure::NotFound {
                kind: "workspace",
                name: self.settings.workspace.clone(),
            }
        })?;
        debug!(workspace_id = %workspace.id, "resolved workspace");

        let datasets: ListResponse<NamedItem> = self
            .get_json(&format!("groups/{}/datasets", workspace.id))
            .await?;
        let dataset = find_by_name(&datasets.value, &self.settings.dataset).ok_or_else(|| {
            QueryFailure::NotFound {
                kind: "dataset",
                name: self.settings.dataset.clone(),
            }
        })?;
        Ok(dataset.id.clone())
    }
}

async fn check_status(response: Response) -> QueryResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(QueryFailure::Status {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl QueryExecutor for PowerBiClient {
    async fn execute(&self, query: &str) -> QueryResult<Table> {
        let url = self.api_url(&format!("datasets/{}/executeQueries", self.dataset_id));
        let request = self
            .authorized(self.http.post(url))
            .await?
            .json(&ExecuteQueriesRequest::single(query));

        let response = check_status(request.send().await?).await?;
        let body: ExecuteQueriesResponse = response.json().await?;
        let table = body.into_table()?;
        debug!(rows = table.len(), "query returned");
        Ok(table)
    }
}
