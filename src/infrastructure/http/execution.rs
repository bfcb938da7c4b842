use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{check_status, transport_error};
use crate::domain::models::ResultSet;
use crate::domain::ports::{CollaboratorError, QueryExecutor};

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
}

/// Engine answer to an execute or explain call
#[derive(Deserialize)]
#[serde(untagged)]
enum EngineResponse {
    Failed { error: String },
    Rows(ResultSet),
}

#[derive(Deserialize)]
struct ExplainResponse {
    #[serde(default)]
    error: Option<String>,
}

/// Query engine reached over HTTP.
///
/// `POST {base}/execute` returns `{"columns": [...], "rows": [[...]]}`;
/// `POST {base}/explain` returns `{}` for a plannable query. Either may
/// return `{"error": "..."}` for a query the engine refuses.
#[derive(Debug, Clone)]
pub struct HttpQueryExecutor {
    client: Client,
    base_url: String,
}

impl HttpQueryExecutor {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post(&self, path: &str, query: &str) -> Result<reqwest::Response, CollaboratorError> {
        let response = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .json(&QueryRequest { query })
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        match check_status(response).await {
            // Engines report bad SQL as a client error
            Err(CollaboratorError::Rejected(body)) => Err(CollaboratorError::QueryFailed(body)),
            other => other,
        }
    }
}

#[async_trait]
impl QueryExecutor for HttpQueryExecutor {
    #[instrument(skip(self, query))]
    async fn execute(&self, query: &str) -> Result<ResultSet, CollaboratorError> {
        let body: EngineResponse = self
            .post("execute", query)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(&e))?;
        match body {
            EngineResponse::Rows(result) => {
                debug!(rows = result.row_count(), "query executed");
                Ok(result)
            }
            EngineResponse::Failed { error } => Err(CollaboratorError::QueryFailed(error)),
        }
    }

    #[instrument(skip(self, query))]
    async fn explain(&self, query: &str) -> Result<(), CollaboratorError> {
        let body: ExplainResponse = self
            .post("explain", query)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(&e))?;
        match body.error {
            None => Ok(()),
            Some(error) => Err(CollaboratorError::QueryFailed(error)),
        }
    }
}
