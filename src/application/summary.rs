use crate::application::fallback::FallbackChain;
use crate::domain::models::{DailySummary, DiaryEntry, Recommendation};
use crate::domain::trigger::{TriggerGate, TriggerState};
use crate::infrastructure::diary_backend::{DiaryBackend, SummaryEndpoint};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::token_store::TokenStore;
use futures::FutureExt;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedSummary {
    /// Which endpoint produced the summary.
    pub endpoint: &'static str,
    pub summary: DailySummary,
}

/// Last generated summary and that day's entries.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SummaryPage {
    pub summary: Option<DailySummary>,
    pub entries: Vec<DiaryEntry>,
}

pub struct SummaryService<B>
where
    B: DiaryBackend,
{
    backend: Arc<B>,
    tokens: TokenStore,
    gate: TriggerGate,
}

impl<B> SummaryService<B>
where
    B: DiaryBackend,
{
    pub fn new(backend: Arc<B>, tokens: TokenStore) -> Self {
        Self {
            backend,
            tokens,
            gate: TriggerGate::default(),
        }
    }

    pub fn state(&self) -> TriggerState {
        self.gate.state()
    }

    /// Asks the server to summarize `date`, then re-reads the stored summary.
    pub async fn generate(&self, date: &str) -> Result<GeneratedSummary, InfraError> {
        let Some(_guard) = self.gate.try_begin() else {
            return Err(InfraError::AlreadyGenerating);
        };

        let (endpoint, ()) = FallbackChain::new()
            .then(
                "finalize-summary",
                self.backend
                    .request_summary(SummaryEndpoint::Finalize, date)
                    .boxed(),
            )
            .then(
                "generate",
                self.backend
                    .request_summary(SummaryEndpoint::Generate, date)
                    .boxed(),
            )
            .run()
            .await
            .map_err(|failure| {
                failure.last_error().unwrap_or_else(|| {
                    InfraError::InvalidResponse("summary generation failed".to_string())
                })
            })?;

        let summary = self.backend.get_summary(date).await?.ok_or_else(|| {
            InfraError::InvalidResponse(format!("no summary stored for {date} after generation"))
        })?;
        self.tokens.save_last_summary(&summary)?;
        Ok(GeneratedSummary { endpoint, summary })
    }

    /// Entries that fail to load show as an empty list.
    pub async fn summary_page(&self) -> Result<SummaryPage, InfraError> {
        let Some(summary) = self.tokens.last_summary()? else {
            return Ok(SummaryPage::default());
        };
        let entries = self
            .backend
            .list_entries(&summary.date)
            .await
            .unwrap_or_default();
        Ok(SummaryPage {
            summary: Some(summary),
            entries,
        })
    }

    /// No summary, no request.
    pub async fn recommendations(
        &self,
        summary: Option<&DailySummary>,
    ) -> Result<Vec<Recommendation>, InfraError> {
        let Some(summary) = summary else {
            return Ok(Vec::new());
        };
        self.backend.request_recommendations(&summary.date).await?;
        self.backend.recommendation_detail(&summary.date).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Emotion;
    use crate::infrastructure::client_storage::InMemoryClientStorage;
    use crate::infrastructure::diary_backend::fake::FakeDiaryBackend;

    fn service(backend: FakeDiaryBackend) -> (Arc<FakeDiaryBackend>, TokenStore, SummaryService<FakeDiaryBackend>) {
        let backend = Arc::new(backend);
        let tokens = TokenStore::new(Arc::new(InMemoryClientStorage::default()));
        let service = SummaryService::new(Arc::clone(&backend), tokens.clone());
        (backend, tokens, service)
    }

    fn stored(date: &str) -> DailySummary {
        DailySummary {
            date: date.to_string(),
            summary_text: "산책을 했다".to_string(),
            emotion: Some(Emotion::Happy),
        }
    }

    #[tokio::test]
    async fn generate_refetches_and_persists_summary() {
        let (backend, tokens, service) = service(FakeDiaryBackend::default());
        let generated = service.generate("2024-05-03").await.expect("generate");
        assert_eq!(generated.endpoint, "finalize-summary");
        assert_eq!(generated.summary.summary_text, "generated by finalize");
        assert_eq!(backend.calls(), ["finalize", "summary:2024-05-03"]);
        assert_eq!(tokens.last_summary().expect("blob"), Some(generated.summary));
        assert_eq!(service.state(), TriggerState::Idle);
    }

    #[tokio::test]
    async fn generate_falls_back_to_generate_endpoint() {
        let (_, _, service) = service(FakeDiaryBackend::default().with(|state| {
            state.failing.insert("finalize".to_string());
        }));
        let generated = service.generate("2024-05-03").await.expect("generate");
        assert_eq!(generated.endpoint, "generate");
        assert_eq!(generated.summary.summary_text, "generated by generate");
    }

    #[tokio::test]
    async fn failed_generation_returns_gate_to_idle() {
        let (_, tokens, service) = service(FakeDiaryBackend::default().with(|state| {
            state.failing.insert("finalize".to_string());
            state.failing.insert("generate".to_string());
        }));
        assert!(service.generate("2024-05-03").await.is_err());
        assert_eq!(service.state(), TriggerState::Idle);
        assert_eq!(tokens.last_summary().expect("blob"), None);
    }

    #[tokio::test]
    async fn trigger_while_generating_sends_nothing() {
        let (backend, _, service) = service(FakeDiaryBackend::default());
        let _busy = service.gate.try_begin().expect("occupy gate");
        let result = service.generate("2024-05-03").await;
        assert!(matches!(result, Err(InfraError::AlreadyGenerating)));
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn summary_page_without_blob_is_empty() {
        let (backend, _, service) = service(FakeDiaryBackend::default());
        assert_eq!(service.summary_page().await.expect("page"), SummaryPage::default());
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn summary_page_tolerates_entry_failure() {
        let (_, tokens, service) = service(FakeDiaryBackend::default().with(|state| {
            state.failing.insert("entries:2024-05-03".to_string());
        }));
        tokens.save_last_summary(&stored("2024-05-03")).expect("save");
        let page = service.summary_page().await.expect("page");
        assert_eq!(page.summary, Some(stored("2024-05-03")));
        assert!(page.entries.is_empty());
    }

    #[tokio::test]
    async fn recommendations_need_a_summary() {
        let (backend, _, service) = service(FakeDiaryBackend::default().with(|state| {
            state.recommendations = vec![Recommendation {
                title: "우산".to_string(),
                link: "https://example.com/u".to_string(),
                keyword: None,
            }];
        }));
        assert!(service.recommendations(None).await.expect("none").is_empty());
        assert!(backend.calls().is_empty());

        let items = service
            .recommendations(Some(&stored("2024-05-03")))
            .await
            .expect("items");
        assert_eq!(items.len(), 1);
        assert_eq!(
            backend.calls(),
            ["recommend:2024-05-03", "recommend-detail:2024-05-03"]
        );
    }
}
