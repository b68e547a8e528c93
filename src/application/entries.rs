use crate::application::fallback::FallbackChain;
use crate::domain::models::{DiaryEntry, Emotion};
use crate::infrastructure::diary_backend::{DiaryBackend, EntryDraft, UpdateMethod};
use crate::infrastructure::error::InfraError;
use futures::FutureExt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Created,
    /// Blank content; nothing was sent.
    Ignored,
}

/// One day's entries plus the locally cached list shown to the user.
pub struct DayEntries<B>
where
    B: DiaryBackend,
{
    backend: Arc<B>,
    date: String,
    entries: Vec<DiaryEntry>,
}

impl<B> DayEntries<B>
where
    B: DiaryBackend,
{
    pub fn new(backend: Arc<B>, date: impl Into<String>) -> Self {
        Self {
            backend,
            date: date.into(),
            entries: Vec::new(),
        }
    }

    pub fn date(&self) -> &str {
        &self.date
    }

    pub fn entries(&self) -> &[DiaryEntry] {
        &self.entries
    }

    pub async fn load(&mut self) -> Result<&[DiaryEntry], InfraError> {
        self.entries = self.backend.list_entries(&self.date).await?;
        Ok(&self.entries)
    }

    /// Emotion defaults to the first choice when not given.
    pub async fn add(&mut self, content: &str, emotion: Option<Emotion>) -> Result<AddOutcome, InfraError> {
        let content = content.trim();
        if content.is_empty() {
            return Ok(AddOutcome::Ignored);
        }
        let draft = EntryDraft {
            content: content.to_string(),
            emotion: Some(emotion.unwrap_or_default()),
        };
        self.backend.create_entry(&draft).await?;
        self.load().await?;
        Ok(AddOutcome::Created)
    }

    /// PUT, then PATCH. The cached list is untouched when both fail.
    pub async fn update(
        &mut self,
        id: i64,
        content: &str,
        emotion: Option<Emotion>,
    ) -> Result<&'static str, InfraError> {
        let content = content.trim();
        if content.is_empty() {
            return Err(InfraError::InvalidConfig(
                "entry content must not be empty".to_string(),
            ));
        }
        let draft = EntryDraft {
            content: content.to_string(),
            emotion,
        };
        let (method, ()) = FallbackChain::new()
            .then("put", self.backend.update_entry(id, UpdateMethod::Put, &draft).boxed())
            .then("patch", self.backend.update_entry(id, UpdateMethod::Patch, &draft).boxed())
            .run()
            .await
            .map_err(|failure| {
                failure
                    .last_error()
                    .unwrap_or_else(|| InfraError::InvalidResponse("update failed".to_string()))
            })?;
        self.load().await?;
        Ok(method)
    }

    /// Removes the entry locally first; a failed request puts it back where it was.
    pub async fn delete(&mut self, id: i64) -> Result<(), InfraError> {
        let removed = self
            .entries
            .iter()
            .position(|entry| entry.id == id)
            .map(|index| (index, self.entries.remove(index)));

        if let Err(error) = self.backend.delete_entry(id).await {
            if let Some((index, entry)) = removed {
                let index = index.min(self.entries.len());
                self.entries.insert(index, entry);
            }
            return Err(error);
        }
        Ok(())
    }
}
