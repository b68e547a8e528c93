use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Emotion {
    #[default]
    #[serde(rename = "행복")]
    Happy,
    #[serde(rename = "좋음")]
    Good,
    #[serde(rename = "아쉬움")]
    Regretful,
    #[serde(rename = "슬픔")]
    Sad,
    #[serde(rename = "분노")]
    Angry,
    #[serde(rename = "불안")]
    Anxious,
}

impl Emotion {
    pub const ALL: [Emotion; 6] = [
        Emotion::Happy,
        Emotion::Good,
        Emotion::Regretful,
        Emotion::Sad,
        Emotion::Angry,
        Emotion::Anxious,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Happy => "행복",
            Self::Good => "좋음",
            Self::Regretful => "아쉬움",
            Self::Sad => "슬픔",
            Self::Angry => "분노",
            Self::Anxious => "불안",
        }
    }

    /// Accepts the backend label or the English variant name.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        Self::ALL.into_iter().find(|emotion| {
            emotion.label() == value || format!("{emotion:?}").eq_ignore_ascii_case(value)
        })
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Unknown or blank labels decode to `None` instead of failing the payload.
fn deserialize_emotion<'de, D>(deserializer: D) -> Result<Option<Emotion>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(Emotion::parse))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub id: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Session {
    pub fn display_name(&self) -> Option<&str> {
        [self.username.as_deref(), self.email.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|value| !value.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthToken {
    pub access_token: String,
    pub refresh_token: String,
    pub uid: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiaryEntry {
    pub id: i64,
    pub content: String,
    #[serde(default, deserialize_with = "deserialize_emotion")]
    pub emotion: Option<Emotion>,
    #[serde(default)]
    pub date: String,
}

impl DiaryEntry {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.content, "entry.content")?;
        if !self.date.is_empty() {
            validate_date(&self.date, "entry.date")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailySummary {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub summary_text: String,
    #[serde(default, deserialize_with = "deserialize_emotion")]
    pub emotion: Option<Emotion>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub has_entry: bool,
}

impl CalendarDay {
    pub fn iso(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Recommendation {
    pub title: String,
    pub link: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asc" | "oldest" => Some(Self::Asc),
            "desc" | "latest" | "newest" => Some(Self::Desc),
            _ => None,
        }
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_date(value: &str, field_name: &str) -> Result<(), String> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("{field_name} must be YYYY-MM-DD"))?;
    Ok(())
}
