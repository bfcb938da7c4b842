use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use super::{check_status, transport_error};
use crate::domain::ports::{CollaboratorError, QueryGenerator};

#[derive(Serialize)]
struct GenerateRequest<'a> {
    question: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    query: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Query generation service reached over HTTP.
///
/// POSTs `{"question": ...}` and expects `{"query": ...}`. A response with
/// an `error` and no query counts as a rejection.
#[derive(Debug, Clone)]
pub struct HttpQueryGenerator {
    client: Client,
    url: String,
}

impl HttpQueryGenerator {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl QueryGenerator for HttpQueryGenerator {
    #[instrument(skip(self), fields(url = %self.url))]
    async fn generate(&self, question: &str) -> Result<String, CollaboratorError> {
        let response = self
            .client
            .post(&self.url)
            .json(&GenerateRequest { question })
            .send()
            .await
            .map_err(|e| transport_error(&e))?;
        let body: GenerateResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| transport_error(&e))?;

        match (body.query, body.error) {
            (Some(query), _) if !query.trim().is_empty() => {
                debug!(chars = query.len(), "query generated");
                Ok(query)
            }
            (_, Some(error)) => Err(CollaboratorError::Rejected(error)),
            _ => Err(CollaboratorError::InvalidResponse(
                "response carried no query".to_string(),
            )),
        }
    }
}
