use crate::domain::models::{DailySummary, Emotion, SortOrder};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmotionFilter {
    #[default]
    All,
    Only(Emotion),
}

impl EmotionFilter {
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.is_empty() || value == "전체" || value.eq_ignore_ascii_case("all") {
            return Some(Self::All);
        }
        Emotion::parse(value).map(Self::Only)
    }

    pub fn matches(&self, emotion: Option<Emotion>) -> bool {
        match self {
            Self::All => true,
            Self::Only(wanted) => emotion == Some(*wanted),
        }
    }
}

pub fn sort_summaries(summaries: &mut [DailySummary], order: SortOrder) {
    match order {
        SortOrder::Asc => summaries.sort_by(|a, b| a.date.cmp(&b.date)),
        SortOrder::Desc => summaries.sort_by(|a, b| b.date.cmp(&a.date)),
    }
}

/// Cached aggregate plus view filters. Changing a filter never touches `summaries`.
#[derive(Debug, Clone, Default)]
pub struct HistoryView {
    summaries: Vec<DailySummary>,
    emotion_filter: EmotionFilter,
    selected_date: Option<String>,
}

impl HistoryView {
    pub fn new(summaries: Vec<DailySummary>) -> Self {
        Self {
            summaries,
            ..Self::default()
        }
    }

    pub fn summaries(&self) -> &[DailySummary] {
        &self.summaries
    }

    pub fn entry_dates(&self) -> HashSet<String> {
        self.summaries.iter().map(|summary| summary.date.clone()).collect()
    }

    pub fn set_emotion_filter(&mut self, filter: EmotionFilter) {
        self.emotion_filter = filter;
    }

    pub fn selected_date(&self) -> Option<&str> {
        self.selected_date.as_deref()
    }

    /// Selecting the already-selected date clears the selection.
    pub fn toggle_date(&mut self, date: &str) {
        if self.selected_date.as_deref() == Some(date) {
            self.selected_date = None;
        } else {
            self.selected_date = Some(date.to_string());
        }
    }

    pub fn visible(&self) -> Vec<&DailySummary> {
        self.summaries
            .iter()
            .filter(|summary| self.emotion_filter.matches(summary.emotion))
            .filter(|summary| match self.selected_date.as_deref() {
                Some(selected) => summary.date == selected,
                None => true,
            })
            .collect()
    }
}
