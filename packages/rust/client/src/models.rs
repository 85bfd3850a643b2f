//! Wire types of the knowledge-base service.

use qnasync_shared::QnaPair;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// Body of `POST {base}/create`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateKnowledgeBaseRequest {
    /// Knowledge-base display name.
    pub name: String,
    /// Initial pairs. Always empty when created from an overview page.
    #[serde(default)]
    pub qna_pairs: Vec<QnaPair>,
    /// Source URLs the service may extract additional pairs from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
}

impl CreateKnowledgeBaseRequest {
    /// An empty knowledge base with the given name.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            qna_pairs: Vec::new(),
            urls: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateKnowledgeBaseResponse {
    #[serde(default)]
    pub kb_id: String,
}

// ---------------------------------------------------------------------------
// Update
// ---------------------------------------------------------------------------

/// Pairs (and URLs) to add in an update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsToAdd {
    #[serde(default)]
    pub qna_pairs: Vec<QnaPair>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub urls: Vec<String>,
}

/// Pairs to delete in an update. The service matches them by question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemsToDelete {
    #[serde(default)]
    pub qna_pairs: Vec<QnaPair>,
}

/// Body of `PATCH {base}/{id}`: one batch of additions and deletions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub add: ItemsToAdd,
    #[serde(default)]
    pub delete: ItemsToDelete,
}

impl UpdateRequest {
    /// Build a request from the pairs to add and to delete.
    pub fn new(to_add: Vec<QnaPair>, to_delete: Vec<QnaPair>) -> Self {
        Self {
            add: ItemsToAdd {
                qna_pairs: to_add,
                urls: Vec::new(),
            },
            delete: ItemsToDelete {
                qna_pairs: to_delete,
            },
        }
    }

    /// A request that only deletes.
    pub fn delete_only(to_delete: Vec<QnaPair>) -> Self {
        Self::new(Vec::new(), to_delete)
    }

    /// Attach source URLs to the additions.
    pub fn with_urls(mut self, urls: Vec<String>) -> Self {
        self.add.urls = urls;
        self
    }

    /// Pairs to add.
    pub fn to_add(&self) -> &[QnaPair] {
        &self.add.qna_pairs
    }

    /// Pairs to delete.
    pub fn to_delete(&self) -> &[QnaPair] {
        &self.delete.qna_pairs
    }

    /// `true` when the request neither adds nor deletes a pair.
    pub fn is_empty(&self) -> bool {
        self.add.qna_pairs.is_empty() && self.delete.qna_pairs.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Generate answer
// ---------------------------------------------------------------------------

/// Body of `POST {base}/{id}/generateAnswer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerRequest {
    pub question: String,
    /// Maximum number of answers to return.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top: Option<u32>,
}

/// A single answer candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    /// Knowledge-base questions this answer is stored under.
    #[serde(default)]
    pub questions: Vec<String>,
    /// Confidence score, 0-100.
    #[serde(default)]
    pub score: f64,
}

/// Response of `generateAnswer`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeneratedAnswer {
    #[serde(default)]
    pub answers: Vec<Answer>,
}

impl GeneratedAnswer {
    /// The highest-scoring answer, if any.
    pub fn best(&self) -> Option<&Answer> {
        self.answers
            .iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
    }
}

// ---------------------------------------------------------------------------
// Train
// ---------------------------------------------------------------------------

/// One piece of user feedback: which stored pair answered a user question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    pub user_id: String,
    pub user_question: String,
    pub kb_question: String,
    pub kb_answer: String,
}

/// Body of `PATCH {base}/{id}/train`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainRequest {
    pub feedback_records: Vec<FeedbackRecord>,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Error body returned with non-success statuses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub error: ApiError,
}

/// Structured service error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub(crate) struct ApiError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(q: &str, a: &str) -> QnaPair {
        QnaPair::new(q, a).expect("valid pair")
    }

    #[test]
    fn update_request_wire_shape() {
        let request = UpdateRequest::new(vec![pair("Q2", "A2")], vec![pair("Q3", "A3")])
            .with_urls(vec!["https://example.com/faq".into()]);

        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "add": {
                    "qnaPairs": [{"question": "Q2", "answer": "A2"}],
                    "urls": ["https://example.com/faq"]
                },
                "delete": {"qnaPairs": [{"question": "Q3", "answer": "A3"}]}
            })
        );
    }

    #[test]
    fn update_request_omits_empty_urls() {
        let request = UpdateRequest::delete_only(vec![pair("Q1", "A1")]);
        let json = serde_json::to_value(&request).expect("serialize");
        assert!(json["add"].get("urls").is_none());
        assert!(!request.is_empty());
        assert!(UpdateRequest::default().is_empty());
    }

    #[test]
    fn create_request_always_sends_pairs_array() {
        let json = serde_json::to_value(CreateKnowledgeBaseRequest::empty("FAQ")).expect("serialize");
        assert_eq!(json, serde_json::json!({"name": "FAQ", "qnaPairs": []}));
    }

    #[test]
    fn generated_answer_best_picks_highest_score() {
        let json = r#"{"answers": [
            {"answer": "Low", "questions": ["q"], "score": 12.5},
            {"answer": "High", "questions": ["q"], "score": 87.0}
        ]}"#;
        let generated: GeneratedAnswer = serde_json::from_str(json).expect("deserialize");
        assert_eq!(generated.best().map(|a| a.answer.as_str()), Some("High"));
        assert!(GeneratedAnswer::default().best().is_none());
    }

    #[test]
    fn train_request_wire_shape() {
        let request = TrainRequest {
            feedback_records: vec![FeedbackRecord {
                user_id: "u1".into(),
                user_question: "opening times?".into(),
                kb_question: "When are you open?".into(),
                kb_answer: "Daily 9-17".into(),
            }],
        };
        let json = serde_json::to_value(&request).expect("serialize");
        assert_eq!(json["feedbackRecords"][0]["kbQuestion"], "When are you open?");
        assert_eq!(json["feedbackRecords"][0]["userId"], "u1");
    }
}
