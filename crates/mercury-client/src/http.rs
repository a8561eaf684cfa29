//! HTTP client for the annotation backend.

use async_trait::async_trait;
use mercury_core::{
    CandidateSpan, LabelNode, LabelRecord, LabelRequest, SelectionRequest, Span, Task, TaskCount,
    candidate_set, parse_taxonomy,
};
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::{Backend, ClientError};

/// Header carrying the annotator's identity token.
pub const USER_KEY_HEADER: &str = "User-Key";

/// Backend replies are either the payload or `{ "error": "..." }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Reply<T> {
    Failure { error: String },
    Success(T),
}

impl<T> Reply<T> {
    fn into_result(self) -> Result<T, ClientError> {
        match self {
            Reply::Failure { error } => Err(ClientError::Api(error)),
            Reply::Success(value) => Ok(value),
        }
    }
}

#[derive(Deserialize)]
struct Message {
    message: String,
}

#[derive(Deserialize)]
struct NewUser {
    key: String,
}

/// HTTP client for the backend's task, selection, label and record endpoints.
pub struct ApiClient {
    client: reqwest::Client,
    base_url: String,
    user_key: Option<String>,
}

impl ApiClient {
    /// Create a client for the given base URL, e.g. `http://localhost:8000`.
    pub fn new(base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            user_key: None,
        }
    }

    pub fn with_user_key(mut self, key: impl Into<String>) -> Self {
        self.user_key = Some(key.into());
        self
    }

    pub fn user_key(&self) -> Option<&str> {
        self.user_key.as_deref()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the backend to mint a fresh user key.
    pub async fn new_user_key(&self) -> Result<String, ClientError> {
        let user: NewUser = self.fetch(self.client.get(self.url("/user/new"))).await?;
        info!("obtained new user key");
        Ok(user.key)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn keyed(&self, request: RequestBuilder) -> Result<RequestBuilder, ClientError> {
        let key = self.user_key.as_deref().ok_or(ClientError::MissingUserKey)?;
        Ok(request.header(USER_KEY_HEADER, key))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ClientError> {
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ClientError> {
        let body = self.send(request).await?.text().await?;
        let reply: Reply<T> = serde_json::from_str(&body)?;
        reply.into_result()
    }
}

#[async_trait]
impl Backend for ApiClient {
    async fn task_count(&self) -> Result<usize, ClientError> {
        let count: TaskCount = self.fetch(self.client.get(self.url("/task"))).await?;
        Ok(count.all)
    }

    async fn task(&self, index: usize) -> Result<Task, ClientError> {
        let url = self.url(&format!("/task/{index}"));
        debug!(url = %url, "fetching task");
        self.fetch(self.client.get(&url)).await
    }

    async fn candidates(
        &self,
        index: usize,
        request: &SelectionRequest,
    ) -> Result<Vec<Span>, ClientError> {
        let url = self.url(&format!("/task/{index}/select"));
        debug!(url = %url, start = request.start, end = request.end, "querying candidates");
        let wire: Vec<CandidateSpan> = self.fetch(self.client.post(&url).json(request)).await?;
        Ok(candidate_set(wire))
    }

    async fn submit_label(&self, index: usize, request: &LabelRequest) -> Result<(), ClientError> {
        let url = self.url(&format!("/task/{index}/label"));
        info!(url = %url, task = index, "submitting label");
        let reply: Message = self
            .fetch(self.keyed(self.client.post(&url).json(request))?)
            .await?;
        debug!(message = %reply.message, "label stored");
        Ok(())
    }

    async fn history(&self, index: usize) -> Result<Vec<LabelRecord>, ClientError> {
        let url = self.url(&format!("/task/{index}/history"));
        let records: Vec<LabelRecord> = self.fetch(self.keyed(self.client.get(&url))?).await?;
        debug!(count = records.len(), task = index, "fetched history");
        Ok(records)
    }

    async fn export(&self) -> Result<Vec<LabelRecord>, ClientError> {
        let records: Vec<LabelRecord> = self
            .fetch(self.keyed(self.client.get(self.url("/user/export")))?)
            .await?;
        info!(count = records.len(), "exported records");
        Ok(records)
    }

    async fn delete_record(&self, record_id: &str) -> Result<(), ClientError> {
        let url = self.url(&format!("/record/{record_id}"));
        info!(url = %url, "deleting record");
        let reply: Message = self.fetch(self.keyed(self.client.delete(&url))?).await?;
        debug!(message = %reply.message, "record removed");
        Ok(())
    }

    async fn taxonomy(&self) -> Result<Vec<LabelNode>, ClientError> {
        let value: serde_json::Value = self.fetch(self.client.get(self.url("/labels"))).await?;
        Ok(parse_taxonomy(&value)?)
    }
}
