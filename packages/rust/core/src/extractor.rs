//! Pair and snapshot extraction from content items.

use qnasync_shared::{ContentItem, ContentRepository, FieldValue, QnaPair, Result};
use tracing::{debug, instrument};

use crate::diff::Snapshot;
use crate::schema::{ContentKind, QnaItemSchema, SchemaRegistry};

/// Reads QnA pairs out of content items using the schema registry.
#[derive(Debug, Clone, Copy)]
pub struct QnaPairExtractor<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> QnaPairExtractor<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    pub fn classify(&self, content: &ContentItem) -> ContentKind {
        self.registry.classify(content)
    }

    /// The pair held by a QnA item.
    ///
    /// `None` for other content, a blank question, or an answer that is
    /// blank in both its plain and its flattened rich form.
    pub fn extract_pair(&self, content: &ContentItem) -> Option<QnaPair> {
        let schema = self.registry.qna_item(content)?;

        let question = content
            .text(&schema.question_field)
            .map(str::trim)
            .filter(|q| !q.is_empty());
        let Some(question) = question else {
            debug!(content_id = %content.id, "blank question, skipping item");
            return None;
        };

        let Some(answer) = answer_text(content, schema) else {
            debug!(content_id = %content.id, "blank answer, skipping item");
            return None;
        };

        QnaPair::new(question, answer)
    }

    /// Pairs referenced by an overview page's container, in container order.
    ///
    /// Unresolvable references and items without a valid pair are skipped.
    /// A page without a container value yields an empty snapshot.
    #[instrument(skip_all, fields(content_id = %page.id))]
    pub async fn extract_snapshot<R: ContentRepository>(
        &self,
        repo: &R,
        page: &ContentItem,
    ) -> Result<Snapshot> {
        let references = self
            .registry
            .overview(page)
            .and_then(|schema| schema.container_field.as_deref())
            .and_then(|field| page.field(field))
            .and_then(FieldValue::as_references);

        let Some(references) = references else {
            debug!("no container value, empty snapshot");
            return Ok(Snapshot::default());
        };

        let mut pairs = Vec::with_capacity(references.len());
        for &id in references {
            match repo.get(id).await? {
                Some(item) => {
                    if let Some(pair) = self.extract_pair(&item) {
                        pairs.push(pair);
                    }
                }
                None => debug!(reference = %id, "unresolved container reference"),
            }
        }

        let snapshot = Snapshot::from_pairs(pairs);
        debug!(pairs = snapshot.len(), "snapshot extracted");
        Ok(snapshot)
    }
}

/// Plain answer first, then the flattened rich-text answer.
fn answer_text(content: &ContentItem, schema: &QnaItemSchema) -> Option<String> {
    let answer_value = schema
        .answer_field
        .as_deref()
        .and_then(|field| content.field(field));

    if let Some(FieldValue::Text(text)) = answer_value {
        let text = text.trim();
        if !text.is_empty() {
            return Some(text.to_string());
        }
    }

    let rich = schema
        .rich_answer_field
        .as_deref()
        .and_then(|field| content.field(field))
        .or(answer_value);

    let markup = match rich {
        Some(FieldValue::Html(html)) => html.as_str(),
        Some(FieldValue::Text(text)) => text.as_str(),
        _ => return None,
    };

    let flattened = qnasync_plaintext::flatten_html(markup);
    (!flattened.is_empty()).then_some(flattened)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryRepository;
    use qnasync_shared::{AppConfig, ContentId, ContentRole, ContentTypeConfig};

    fn registry() -> SchemaRegistry {
        let mut types = AppConfig::default().content_types;
        types.push(ContentTypeConfig {
            content_type: "RichQnaBlock".into(),
            role: ContentRole::QnaItem,
            question_field: Some("Question".into()),
            answer_field: Some("ShortAnswer".into()),
            rich_answer_field: Some("Body".into()),
            container_field: None,
            id_field: None,
            name_field: None,
        });
        SchemaRegistry::from_config(&types).expect("registry")
    }

    fn block(id: i64, question: &str, answer: FieldValue) -> ContentItem {
        ContentItem::new(ContentId(id), "QnaItemBlock", format!("Block {id}"))
            .with_field("Question", FieldValue::Text(question.into()))
            .with_field("Answer", answer)
    }

    #[test]
    fn extract_pair_reads_plain_answer() {
        let registry = registry();
        let extractor = QnaPairExtractor::new(&registry);

        let item = block(1, " When are you open? ", FieldValue::Text("Daily 9-17".into()));
        let pair = extractor.extract_pair(&item).expect("pair");
        assert_eq!(pair.question, "When are you open?");
        assert_eq!(pair.answer, "Daily 9-17");
    }

    #[test]
    fn extract_pair_none_for_blank_question() {
        let registry = registry();
        let extractor = QnaPairExtractor::new(&registry);

        let item = block(1, "   ", FieldValue::Text("Daily 9-17".into()));
        assert!(extractor.extract_pair(&item).is_none());

        let missing = ContentItem::new(ContentId(2), "QnaItemBlock", "No question")
            .with_field("Answer", FieldValue::Text("A".into()));
        assert!(extractor.extract_pair(&missing).is_none());
    }

    #[test]
    fn extract_pair_flattens_html_answer() {
        let registry = registry();
        let extractor = QnaPairExtractor::new(&registry);

        let item = block(
            1,
            "Where?",
            FieldValue::Html("<p>Main <strong>street</strong> 1</p>".into()),
        );
        let pair = extractor.extract_pair(&item).expect("pair");
        assert_eq!(pair.answer, "Main street 1");
    }

    #[test]
    fn extract_pair_prefers_plain_over_rich() {
        let registry = registry();
        let extractor = QnaPairExtractor::new(&registry);

        let base = ContentItem::new(ContentId(1), "RichQnaBlock", "Rich")
            .with_field("Question", FieldValue::Text("Q".into()))
            .with_field("Body", FieldValue::Html("<p>From rich</p>".into()));

        let with_plain = base
            .clone()
            .with_field("ShortAnswer", FieldValue::Text("From plain".into()));
        assert_eq!(extractor.extract_pair(&with_plain).unwrap().answer, "From plain");

        let blank_plain = base
            .clone()
            .with_field("ShortAnswer", FieldValue::Text("  ".into()));
        assert_eq!(extractor.extract_pair(&blank_plain).unwrap().answer, "From rich");

        assert_eq!(extractor.extract_pair(&base).unwrap().answer, "From rich");
    }

    #[test]
    fn extract_pair_none_when_all_answers_blank() {
        let registry = registry();
        let extractor = QnaPairExtractor::new(&registry);

        let item = block(1, "Q", FieldValue::Html("<p> </p><br>".into()));
        assert!(extractor.extract_pair(&item).is_none());
    }

    #[test]
    fn extract_pair_none_for_other_content() {
        let registry = registry();
        let extractor = QnaPairExtractor::new(&registry);

        let page = ContentItem::new(ContentId(1), "ArticlePage", "News")
            .with_field("Question", FieldValue::Text("Q".into()))
            .with_field("Answer", FieldValue::Text("A".into()));
        assert!(extractor.extract_pair(&page).is_none());
        assert_eq!(extractor.classify(&page), ContentKind::Other);
    }

    #[tokio::test]
    async fn extract_snapshot_follows_container_order() {
        let registry = registry();
        let extractor = QnaPairExtractor::new(&registry);

        let repo = InMemoryRepository::new();
        repo.insert(block(11, "Q1", FieldValue::Text("A1".into())));
        repo.insert(block(12, "", FieldValue::Text("ignored".into())));
        repo.insert(block(13, "Q3", FieldValue::Text("A3".into())));
        repo.insert(block(14, "Q1", FieldValue::Text("duplicate".into())));
        repo.insert(ContentItem::new(ContentId(15), "ArticlePage", "Not a block"));

        let page = ContentItem::new(ContentId(10), "QnaOverviewPage", "FAQ").with_field(
            "QnaItems",
            FieldValue::References(vec![
                ContentId(13),
                ContentId(99),
                ContentId(11),
                ContentId(12),
                ContentId(15),
                ContentId(14),
            ]),
        );

        let snapshot = extractor.extract_snapshot(&repo, &page).await.unwrap();
        let questions: Vec<_> = snapshot.pairs().iter().map(|p| p.question.as_str()).collect();
        assert_eq!(questions, vec!["Q3", "Q1"]);
        assert_eq!(snapshot.pairs()[1].answer, "A1");
    }

    #[tokio::test]
    async fn extract_snapshot_empty_without_container() {
        let registry = registry();
        let extractor = QnaPairExtractor::new(&registry);
        let repo = InMemoryRepository::new();

        let page = ContentItem::new(ContentId(10), "QnaOverviewPage", "FAQ");
        let snapshot = extractor.extract_snapshot(&repo, &page).await.unwrap();
        assert!(snapshot.is_empty());
    }
}
