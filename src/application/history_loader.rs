use crate::domain::day_key::{normalize_days, to_iso};
use crate::domain::history::sort_summaries;
use crate::domain::models::{DailySummary, SortOrder};
use crate::infrastructure::diary_backend::DiaryBackend;
use crate::infrastructure::error::InfraError;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

type SummaryTask = JoinSet<(usize, Result<Option<DailySummary>, InfraError>)>;

/// Loads every day that has entries and fetches its summary in parallel.
pub struct HistoryLoader<B>
where
    B: DiaryBackend + 'static,
{
    backend: Arc<B>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryLoad {
    pub summaries: Vec<DailySummary>,
    /// Days whose summary was missing or failed to load.
    pub skipped: Vec<String>,
}

impl<B> HistoryLoader<B>
where
    B: DiaryBackend + 'static,
{
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    /// A failed day listing fails the whole load; a failed summary only drops that day.
    /// Cancelling `cancel` aborts the in-flight fetches and yields [`InfraError::Cancelled`].
    pub async fn load(
        &self,
        order: SortOrder,
        cancel: &CancellationToken,
    ) -> Result<HistoryLoad, InfraError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(InfraError::Cancelled),
            result = self.load_uncancelled(order) => result,
        }
    }

    async fn load_uncancelled(&self, order: SortOrder) -> Result<HistoryLoad, InfraError> {
        let raw_days = self.backend.list_days().await?;
        let days = normalize_days(&raw_days)
            .into_iter()
            .map(to_iso)
            .collect::<Vec<_>>();
        if days.is_empty() {
            return Ok(HistoryLoad::default());
        }

        let mut tasks: SummaryTask = JoinSet::new();
        let mut fetched = vec![None; days.len()];
        let mut skipped = Vec::new();

        for (index, day) in days.iter().enumerate() {
            let backend = Arc::clone(&self.backend);
            let day = day.clone();
            tasks.spawn(async move { (index, backend.get_summary(&day).await) });
        }
        // Every day is in flight before the first result is read.
        while let Some(join_result) = tasks.join_next().await {
            // A panicked or failed fetch leaves its slot empty.
            if let Ok((index, Ok(Some(summary)))) = join_result {
                if let Some(slot) = fetched.get_mut(index) {
                    *slot = Some(summary);
                }
            }
        }

        let mut summaries = Vec::with_capacity(days.len());
        for (day, summary) in days.into_iter().zip(fetched) {
            match summary {
                Some(summary) => summaries.push(summary),
                None => skipped.push(day),
            }
        }
        sort_summaries(&mut summaries, order);
        Ok(HistoryLoad { summaries, skipped })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::day_key::RawDay;
    use crate::domain::models::Emotion;
    use crate::infrastructure::diary_backend::fake::FakeDiaryBackend;
    use std::time::Duration;

    fn summary(date: &str, emotion: Emotion) -> DailySummary {
        DailySummary {
            date: date.to_string(),
            summary_text: format!("{date} 요약"),
            emotion: Some(emotion),
        }
    }

    fn backend_with_three_days() -> FakeDiaryBackend {
        FakeDiaryBackend::default().with(|state| {
            state.days = vec![
                RawDay::Plain("2024-05-01".to_string()),
                RawDay::Plain("2024-05-03T09:00:00".to_string()),
                RawDay::Plain("2024-05-02".to_string()),
                RawDay::Plain("2024-05-01".to_string()),
            ];
            for (date, emotion) in [
                ("2024-05-01", Emotion::Happy),
                ("2024-05-02", Emotion::Sad),
                ("2024-05-03", Emotion::Angry),
            ] {
                state.summaries.insert(date.to_string(), summary(date, emotion));
            }
        })
    }

    fn dates(load: &HistoryLoad) -> Vec<&str> {
        load.summaries.iter().map(|summary| summary.date.as_str()).collect()
    }

    #[tokio::test]
    async fn loads_deduplicated_days_in_requested_order() {
        let backend = Arc::new(backend_with_three_days());
        let loader = HistoryLoader::new(Arc::clone(&backend));
        let cancel = CancellationToken::new();

        let desc = loader.load(SortOrder::Desc, &cancel).await.expect("load");
        assert_eq!(dates(&desc), ["2024-05-03", "2024-05-02", "2024-05-01"]);
        assert!(desc.skipped.is_empty());
        assert_eq!(backend.called("summary:"), 3);

        let asc = loader.load(SortOrder::Asc, &cancel).await.expect("load");
        assert_eq!(dates(&asc), ["2024-05-01", "2024-05-02", "2024-05-03"]);
    }

    #[tokio::test]
    async fn failed_and_missing_summaries_are_dropped() {
        let backend = Arc::new(backend_with_three_days().with(|state| {
            state.failing.insert("summary:2024-05-02".to_string());
            state.summaries.remove("2024-05-03");
        }));
        let loader = HistoryLoader::new(backend);
        let load = loader
            .load(SortOrder::Desc, &CancellationToken::new())
            .await
            .expect("partial load");
        assert_eq!(dates(&load), ["2024-05-01"]);
        let mut skipped = load.skipped.clone();
        skipped.sort();
        assert_eq!(skipped, ["2024-05-02", "2024-05-03"]);
    }

    #[tokio::test]
    async fn one_rejected_day_of_three_leaves_two() {
        let backend = Arc::new(backend_with_three_days().with(|state| {
            state.failing.insert("summary:2024-05-02".to_string());
        }));
        let load = HistoryLoader::new(backend)
            .load(SortOrder::Asc, &CancellationToken::new())
            .await
            .expect("partial load");
        assert_eq!(dates(&load), ["2024-05-01", "2024-05-03"]);
        assert_eq!(load.skipped, ["2024-05-02"]);
    }

    #[tokio::test]
    async fn stalled_days_do_not_hold_back_later_requests() {
        let backend = Arc::new(FakeDiaryBackend::default().with(|state| {
            state.days = (1..=12)
                .map(|day| RawDay::Plain(format!("2024-05-{day:02}")))
                .collect();
            state.stall_summaries = true;
        }));
        let loader = HistoryLoader::new(Arc::clone(&backend));
        let cancel = CancellationToken::new();
        let result = tokio::time::timeout(
            Duration::from_millis(200),
            loader.load(SortOrder::Desc, &cancel),
        )
        .await;
        assert!(result.is_err(), "stalled load should not finish");
        assert_eq!(backend.called("summary:"), 12);
    }

    #[tokio::test]
    async fn day_listing_failure_fails_the_load() {
        let backend = Arc::new(backend_with_three_days().with(|state| {
            state.failing.insert("days".to_string());
        }));
        let result = HistoryLoader::new(Arc::clone(&backend))
            .load(SortOrder::Desc, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(InfraError::Http { .. })));
        assert_eq!(backend.called("summary:"), 0);
    }

    #[tokio::test]
    async fn no_days_means_no_summary_requests() {
        let backend = Arc::new(FakeDiaryBackend::default());
        let load = HistoryLoader::new(Arc::clone(&backend))
            .load(SortOrder::Desc, &CancellationToken::new())
            .await
            .expect("empty load");
        assert_eq!(load, HistoryLoad::default());
        assert_eq!(backend.calls(), ["days"]);
    }

    #[tokio::test]
    async fn cancellation_interrupts_stalled_fetches() {
        let backend = Arc::new(backend_with_three_days().with(|state| {
            state.stall_summaries = true;
        }));
        let loader = HistoryLoader::new(backend);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let result = tokio::time::timeout(
            Duration::from_secs(5),
            loader.load(SortOrder::Desc, &cancel),
        )
        .await
        .expect("load returns after cancel");
        assert!(matches!(result, Err(InfraError::Cancelled)));
    }

    #[tokio::test]
    async fn already_cancelled_load_does_not_touch_the_backend() {
        let backend = Arc::new(backend_with_three_days());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = HistoryLoader::new(Arc::clone(&backend))
            .load(SortOrder::Desc, &cancel)
            .await;
        assert!(matches!(result, Err(InfraError::Cancelled)));
        assert!(backend.calls().is_empty());
    }
}
