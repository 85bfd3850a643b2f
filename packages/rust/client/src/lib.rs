//! HTTP client for the remote question-answering knowledge-base service.
//!
//! Every operation maps to one HTTP call against the configured base URI and
//! carries the subscription key header. Failures of any kind (non-success
//! status, transport error, undecodable body) surface as a single
//! [`QnaSyncError::Remote`] whose message names the operation and the
//! knowledge base. The client never retries.

mod models;

use qnasync_shared::{ClientConfig, QnaSyncError, Result};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use tracing::{debug, error, info, instrument};
use url::Url;

pub use models::{
    Answer, AnswerRequest, CreateKnowledgeBaseRequest, FeedbackRecord, GeneratedAnswer,
    ItemsToAdd, ItemsToDelete, TrainRequest, UpdateRequest,
};

use models::{ApiError, CreateKnowledgeBaseResponse, ErrorBody};

/// Header carrying the subscription key.
pub const SUBSCRIPTION_KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// User-Agent string for service requests.
const USER_AGENT: &str = concat!("QnaSync/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Remote operation, used to word failure messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Create,
    GenerateAnswer,
    Delete,
    Publish,
    Update,
    Train,
}

impl Operation {
    fn describe(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::GenerateAnswer => "get an answer from",
            Self::Delete => "delete",
            Self::Publish => "publish",
            Self::Update => "add or delete qna pairs for",
            Self::Train => "add feedback for",
        }
    }

    /// "failed to publish knowledge base with id 'kb1'"
    fn failure(self, kb_id: Option<&str>) -> String {
        match kb_id {
            Some(id) => format!("failed to {} knowledge base with id '{id}'", self.describe()),
            None => format!("failed to {} knowledge base", self.describe()),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Client for the knowledge-base service.
#[derive(Debug, Clone)]
pub struct KnowledgeBaseClient {
    http: Client,
    base: Url,
}

impl KnowledgeBaseClient {
    /// Build a client from resolved configuration.
    ///
    /// Fails with a config error when the subscription key is blank or the
    /// base URI is not an absolute URL.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        if config.subscription_key.trim().is_empty() {
            return Err(QnaSyncError::config("subscription key is empty"));
        }

        let base = Url::parse(&config.base_uri).map_err(|e| {
            QnaSyncError::config(format!("invalid base URI '{}': {e}", config.base_uri))
        })?;
        if base.cannot_be_a_base() {
            return Err(QnaSyncError::config(format!(
                "base URI '{}' cannot be used as a base",
                config.base_uri
            )));
        }

        let mut key = HeaderValue::from_str(&config.subscription_key)
            .map_err(|e| QnaSyncError::config(format!("invalid subscription key: {e}")))?;
        key.set_sensitive(true);

        let name = HeaderName::from_bytes(SUBSCRIPTION_KEY_HEADER.as_bytes())
            .map_err(|e| QnaSyncError::config(format!("invalid header name: {e}")))?;
        let mut headers = HeaderMap::new();
        headers.insert(name, key);

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| QnaSyncError::config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, base })
    }

    /// Create a knowledge base and return the id assigned by the service.
    ///
    /// A success response without a body yields an empty id.
    #[instrument(skip_all, fields(name = %request.name))]
    pub async fn create(&self, request: &CreateKnowledgeBaseRequest) -> Result<String> {
        let op = Operation::Create;
        let url = self.endpoint(&["create"])?;
        let response = self.execute(op, None, self.http.post(url).json(request)).await?;

        let body = read_body(op, None, response).await?;
        if body.trim().is_empty() {
            return Ok(String::new());
        }

        let parsed: CreateKnowledgeBaseResponse =
            serde_json::from_str(&body).map_err(|e| transport_error(op, None, e))?;

        info!(kb_id = %parsed.kb_id, "knowledge base created");
        Ok(parsed.kb_id)
    }

    /// Ask the knowledge base for answers to a question.
    #[instrument(skip_all, fields(kb_id = %kb_id))]
    pub async fn generate_answer(
        &self,
        kb_id: &str,
        request: &AnswerRequest,
    ) -> Result<GeneratedAnswer> {
        if kb_id.trim().is_empty() {
            return Err(QnaSyncError::validation("knowledge base id is empty"));
        }

        let op = Operation::GenerateAnswer;
        let url = self.endpoint(&[kb_id, "generateAnswer"])?;
        let response = self
            .execute(op, Some(kb_id), self.http.post(url).json(request))
            .await?;

        let body = read_body(op, Some(kb_id), response).await?;
        serde_json::from_str(&body).map_err(|e| transport_error(op, Some(kb_id), e))
    }

    /// Delete a knowledge base. Returns `false` without calling out when the id is empty.
    #[instrument(skip_all, fields(kb_id = %kb_id))]
    pub async fn delete(&self, kb_id: &str) -> Result<bool> {
        if kb_id.trim().is_empty() {
            debug!("empty knowledge base id, nothing to delete");
            return Ok(false);
        }

        let url = self.endpoint(&[kb_id])?;
        self.execute(Operation::Delete, Some(kb_id), self.http.delete(url))
            .await?;

        info!("knowledge base deleted");
        Ok(true)
    }

    /// Commit the knowledge base's staged edits to its serving index.
    ///
    /// Returns `false` without calling out when the id is empty.
    #[instrument(skip_all, fields(kb_id = %kb_id))]
    pub async fn publish(&self, kb_id: &str) -> Result<bool> {
        if kb_id.trim().is_empty() {
            debug!("empty knowledge base id, nothing to publish");
            return Ok(false);
        }

        let url = self.endpoint(&[kb_id])?;
        self.execute(Operation::Publish, Some(kb_id), self.http.put(url))
            .await?;

        info!("knowledge base published");
        Ok(true)
    }

    /// Add and delete pairs in one call. No-op when the id is empty.
    #[instrument(skip_all, fields(
        kb_id = %kb_id,
        add = request.to_add().len(),
        delete = request.to_delete().len(),
    ))]
    pub async fn update(&self, kb_id: &str, request: &UpdateRequest) -> Result<()> {
        if kb_id.trim().is_empty() {
            debug!("empty knowledge base id, skipping update");
            return Ok(());
        }

        let url = self.endpoint(&[kb_id])?;
        self.execute(
            Operation::Update,
            Some(kb_id),
            self.http.patch(url).json(request),
        )
        .await?;

        info!("knowledge base updated");
        Ok(())
    }

    /// Send user feedback used to retrain ranking. No-op when the id is empty.
    #[instrument(skip_all, fields(kb_id = %kb_id, records = request.feedback_records.len()))]
    pub async fn train(&self, kb_id: &str, request: &TrainRequest) -> Result<()> {
        if kb_id.trim().is_empty() {
            debug!("empty knowledge base id, skipping training");
            return Ok(());
        }

        let url = self.endpoint(&[kb_id, "train"])?;
        self.execute(
            Operation::Train,
            Some(kb_id),
            self.http.patch(url).json(request),
        )
        .await?;

        info!("feedback submitted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Append path segments to the base URI.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| QnaSyncError::config(format!("base URI '{}' cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Send a request and turn any non-success status into a remote error.
    async fn execute(
        &self,
        op: Operation,
        kb_id: Option<&str>,
        request: RequestBuilder,
    ) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| transport_error(op, kb_id, e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        // An unreadable body is treated like an empty one.
        let body = response.text().await.unwrap_or_default();
        let api_error = decode_error(status, &body);
        let message = format!(
            "Error {}: {}, reason {}",
            api_error.code,
            op.failure(kb_id),
            api_error.message
        );

        error!(status = status.as_u16(), %message, "knowledge base call failed");
        Err(QnaSyncError::remote(message))
    }
}

/// Read a success body, wrapping read failures as remote errors.
async fn read_body(op: Operation, kb_id: Option<&str>, response: Response) -> Result<String> {
    response
        .text()
        .await
        .map_err(|e| transport_error(op, kb_id, e))
}

/// Wrap a transport or deserialization failure, keeping it as the source.
fn transport_error(
    op: Operation,
    kb_id: Option<&str>,
    source: impl std::error::Error + Send + Sync + 'static,
) -> QnaSyncError {
    let message = format!("{}, reason {source}", op.failure(kb_id));
    error!(%message, "knowledge base call failed");
    QnaSyncError::remote_with_source(message, source)
}

/// Decode the service error body, falling back to the HTTP reason phrase.
fn decode_error(status: StatusCode, body: &str) -> ApiError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !(parsed.error.code.is_empty() && parsed.error.message.is_empty()) => {
            parsed.error
        }
        _ => ApiError {
            code: status.as_u16().to_string(),
            message: status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string(),
        },
    }
}
