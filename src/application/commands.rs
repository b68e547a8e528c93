use crate::application::bootstrap::bootstrap_workspace;
use crate::application::entries::{AddOutcome, DayEntries};
use crate::application::history_loader::HistoryLoader;
use crate::application::session::{LogoutOutcome, SessionManager};
use crate::application::summary::{GeneratedSummary, SummaryPage, SummaryService};
use crate::domain::calendar::{build_month_grid, pretty_date, today_iso, today_local, MonthGrid};
use crate::domain::day_key::{normalize_days, to_iso};
use crate::domain::history::{EmotionFilter, HistoryView};
use crate::domain::models::{DailySummary, DiaryEntry, Emotion, Recommendation, Session, SortOrder};
use crate::infrastructure::client_storage::{
    ClientStorage, KeyringClientStorage, SqliteClientStorage,
};
use crate::infrastructure::config::StorageBackend;
use crate::infrastructure::diary_backend::{DiaryBackend, ReqwestDiaryBackend};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::http_client::ApiClient;
use crate::infrastructure::token_store::{mask_name, TokenStore};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

pub struct AppState<B = ReqwestDiaryBackend>
where
    B: DiaryBackend + 'static,
{
    workspace_root: PathBuf,
    logs_dir: PathBuf,
    tokens: TokenStore,
    backend: Arc<B>,
    summary: SummaryService<B>,
    log_guard: Mutex<()>,
}

impl AppState<ReqwestDiaryBackend> {
    /// Bootstraps `workspace_root` and connects to the configured backend.
    pub fn new(workspace_root: PathBuf) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let storage: Arc<dyn ClientStorage> = match bootstrap.config.storage {
            StorageBackend::Sqlite => Arc::new(SqliteClientStorage::new(&bootstrap.database_path)),
            StorageBackend::Keyring => Arc::new(KeyringClientStorage::default()),
        };
        let tokens = TokenStore::new(storage);
        let api = ApiClient::new(&bootstrap.config, tokens.clone())?;
        let backend = ReqwestDiaryBackend::new(api, bootstrap.config.oauth_start_path.clone());
        Ok(Self::assemble(
            bootstrap.workspace_root,
            bootstrap.logs_dir,
            tokens,
            Arc::new(backend),
        ))
    }
}

impl<B> AppState<B>
where
    B: DiaryBackend + 'static,
{
    /// Bootstraps `workspace_root` but talks to `backend` with the given token store.
    pub fn with_backend(
        workspace_root: PathBuf,
        backend: Arc<B>,
        tokens: TokenStore,
    ) -> Result<Self, InfraError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        Ok(Self::assemble(
            bootstrap.workspace_root,
            bootstrap.logs_dir,
            tokens,
            backend,
        ))
    }

    fn assemble(
        workspace_root: PathBuf,
        logs_dir: PathBuf,
        tokens: TokenStore,
        backend: Arc<B>,
    ) -> Self {
        let summary = SummaryService::new(Arc::clone(&backend), tokens.clone());
        Self {
            workspace_root,
            logs_dir,
            tokens,
            backend,
            summary,
            log_guard: Mutex::new(()),
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn command_error(&self, command: &str, error: &InfraError) -> String {
        self.log_error(command, &error.to_string());
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        self.append_log("info", command, message);
    }

    pub fn log_error(&self, command: &str, message: &str) {
        self.append_log("error", command, message);
    }

    fn append_log(&self, level: &str, command: &str, message: &str) {
        let Ok(_guard) = self.log_guard.lock() else {
            return;
        };
        let path = self.logs_dir.join("commands.log");
        let payload = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "level": level,
            "command": command,
            "message": message,
        });

        if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
            let _ = writeln!(file, "{}", payload);
        }
    }

    /// Writes without a signed-in token go out under a persistent guest uid.
    fn ensure_writer_identity(&self) -> Result<(), InfraError> {
        if self.tokens.access_token()?.is_none() {
            self.tokens.get_or_create_uid()?;
        }
        Ok(())
    }

    fn sessions(&self) -> SessionManager<B> {
        SessionManager::new(Arc::clone(&self.backend), self.tokens.clone())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub signed_in: bool,
    pub uid: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthCallbackResponse {
    pub access_stored: bool,
    pub refresh_stored: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthStartResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutResponse {
    /// Endpoint that acknowledged the logout, if any.
    pub acknowledged_by: Option<String>,
    pub tokens_cleared: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhoAmIResponse {
    pub session: Option<Session>,
    pub authenticated: bool,
    pub display_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntriesResponse {
    pub date: String,
    pub pretty_date: String,
    pub entries: Vec<DiaryEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddEntryResponse {
    pub created: bool,
    #[serde(flatten)]
    pub day: EntriesResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditEntryResponse {
    pub method: String,
    #[serde(flatten)]
    pub day: EntriesResponse,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    pub order: SortOrder,
    pub total: usize,
    pub summaries: Vec<DailySummary>,
    pub skipped: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendResponse {
    pub date: Option<String>,
    pub items: Vec<Recommendation>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NicknameResponse {
    pub nickname: String,
    pub masked: String,
}

pub async fn login_impl<B: DiaryBackend + 'static>(
    state: &AppState<B>,
    username: String,
    password: String,
) -> Result<LoginResponse, InfraError> {
    let signed_in = state.sessions().login(&username, &password).await?;
    state.log_info("login", "signed in with password");
    Ok(LoginResponse {
        signed_in: true,
        uid: signed_in.uid,
    })
}

pub fn oauth_callback_impl<B: DiaryBackend + 'static>(
    state: &AppState<B>,
    fragment: String,
) -> Result<OAuthCallbackResponse, InfraError> {
    let parsed = state.sessions().complete_oauth_callback(&fragment)?;
    let response = OAuthCallbackResponse {
        access_stored: parsed.access.is_some(),
        refresh_stored: parsed.refresh.is_some(),
    };
    state.log_info(
        "oauth_callback",
        &format!(
            "access stored: {}, refresh stored: {}",
            response.access_stored, response.refresh_stored
        ),
    );
    Ok(response)
}

pub fn oauth_start_impl(state: &AppState<ReqwestDiaryBackend>) -> Result<OAuthStartResponse, InfraError> {
    let url = state.backend.oauth_start_url()?;
    Ok(OAuthStartResponse {
        url: url.to_string(),
    })
}

pub async fn logout_impl<B: DiaryBackend + 'static>(
    state: &AppState<B>,
) -> Result<LogoutResponse, InfraError> {
    let outcome = state.sessions().logout().await?;
    let acknowledged_by = match outcome {
        LogoutOutcome::Acknowledged(endpoint) => Some(endpoint.to_string()),
        LogoutOutcome::LocalOnly => {
            state.log_error("logout", "server logout failed; local tokens cleared");
            None
        }
    };
    Ok(LogoutResponse {
        acknowledged_by,
        tokens_cleared: true,
    })
}

pub async fn whoami_impl<B: DiaryBackend + 'static>(
    state: &AppState<B>,
) -> Result<WhoAmIResponse, InfraError> {
    let session = state.sessions().resolve().await;
    let nickname = state.tokens.nickname()?;
    let name = if nickname.is_empty() {
        session
            .as_ref()
            .and_then(Session::display_name)
            .unwrap_or_default()
            .to_string()
    } else {
        nickname
    };
    Ok(WhoAmIResponse {
        authenticated: session.is_some(),
        display_name: mask_name(&name),
        session,
    })
}

pub async fn list_entries_impl<B: DiaryBackend + 'static>(
    state: &AppState<B>,
    date: Option<String>,
) -> Result<EntriesResponse, InfraError> {
    let date = resolve_date(date.as_deref(), "date")?;
    let mut day = DayEntries::new(Arc::clone(&state.backend), date);
    day.load().await?;
    Ok(entries_response(&day))
}

/// New entries always land on today's date.
pub async fn add_entry_impl<B: DiaryBackend + 'static>(
    state: &AppState<B>,
    content: String,
    emotion: Option<String>,
) -> Result<AddEntryResponse, InfraError> {
    let emotion = parse_emotion(emotion.as_deref())?;
    state.ensure_writer_identity()?;
    let mut day = DayEntries::new(Arc::clone(&state.backend), today_iso());
    let outcome = day.add(&content, emotion).await?;
    let created = outcome == AddOutcome::Created;
    if created {
        state.log_info("add_entry", &format!("created entry for {}", day.date()));
    } else {
        day.load().await?;
    }
    Ok(AddEntryResponse {
        created,
        day: entries_response(&day),
    })
}

pub async fn edit_entry_impl<B: DiaryBackend + 'static>(
    state: &AppState<B>,
    id: i64,
    content: String,
    emotion: Option<String>,
    date: Option<String>,
) -> Result<EditEntryResponse, InfraError> {
    let emotion = parse_emotion(emotion.as_deref())?;
    let date = resolve_date(date.as_deref(), "date")?;
    state.ensure_writer_identity()?;
    let mut day = DayEntries::new(Arc::clone(&state.backend), date);
    let method = day.update(id, &content, emotion).await?;
    state.log_info("edit_entry", &format!("updated entry {id} via {method}"));
    Ok(EditEntryResponse {
        method: method.to_string(),
        day: entries_response(&day),
    })
}

pub async fn delete_entry_impl<B: DiaryBackend + 'static>(
    state: &AppState<B>,
    id: i64,
    date: Option<String>,
) -> Result<EntriesResponse, InfraError> {
    let date = resolve_date(date.as_deref(), "date")?;
    state.ensure_writer_identity()?;
    let mut day = DayEntries::new(Arc::clone(&state.backend), date);
    day.load().await?;
    day.delete(id).await?;
    state.log_info("delete_entry", &format!("deleted entry {id}"));
    Ok(entries_response(&day))
}

pub async fn history_impl<B: DiaryBackend + 'static>(
    state: &AppState<B>,
    order: Option<String>,
    emotion: Option<String>,
    date: Option<String>,
    cancel: &CancellationToken,
) -> Result<HistoryResponse, InfraError> {
    let order = match order.as_deref() {
        Some(raw) => SortOrder::parse(raw)
            .ok_or_else(|| InfraError::InvalidConfig(format!("unknown sort order: {raw}")))?,
        None => SortOrder::default(),
    };
    let filter = match emotion.as_deref() {
        Some(raw) => EmotionFilter::parse(raw)
            .ok_or_else(|| InfraError::InvalidConfig(format!("unknown emotion: {raw}")))?,
        None => EmotionFilter::All,
    };
    let selected = date
        .as_deref()
        .map(|raw| resolve_date(Some(raw), "date"))
        .transpose()?;

    let load = HistoryLoader::new(Arc::clone(&state.backend))
        .load(order, cancel)
        .await?;
    let total = load.summaries.len();
    let mut view = HistoryView::new(load.summaries);
    view.set_emotion_filter(filter);
    if let Some(selected) = selected.as_deref() {
        view.toggle_date(selected);
    }
    let summaries = view.visible().into_iter().cloned().collect();
    state.log_info(
        "history",
        &format!("loaded {total} summaries, skipped {}", load.skipped.len()),
    );
    Ok(HistoryResponse {
        order,
        total,
        summaries,
        skipped: load.skipped,
    })
}

/// `month` is `YYYY-MM` or any `YYYY-MM-DD` inside the month; defaults to today.
pub async fn calendar_impl<B: DiaryBackend + 'static>(
    state: &AppState<B>,
    month: Option<String>,
) -> Result<MonthGrid, InfraError> {
    let reference = match month.as_deref() {
        Some(raw) => parse_month(raw)?,
        None => today_local(),
    };
    let raw_days = state.backend.list_days().await?;
    let entry_dates = normalize_days(&raw_days)
        .into_iter()
        .map(to_iso)
        .collect::<HashSet<_>>();
    Ok(build_month_grid(reference, &entry_dates))
}

pub async fn generate_summary_impl<B: DiaryBackend + 'static>(
    state: &AppState<B>,
    date: Option<String>,
) -> Result<GeneratedSummary, InfraError> {
    let date = resolve_date(date.as_deref(), "date")?;
    state.ensure_writer_identity()?;
    let generated = state.summary.generate(&date).await?;
    state.log_info(
        "generate_summary",
        &format!("summary for {date} generated via {}", generated.endpoint),
    );
    Ok(generated)
}

pub async fn summary_page_impl<B: DiaryBackend + 'static>(
    state: &AppState<B>,
) -> Result<SummaryPage, InfraError> {
    state.summary.summary_page().await
}

/// Uses the given day's stored summary, or the last generated one.
pub async fn recommend_impl<B: DiaryBackend + 'static>(
    state: &AppState<B>,
    date: Option<String>,
) -> Result<RecommendResponse, InfraError> {
    let summary = match date.as_deref() {
        Some(raw) => {
            let date = resolve_date(Some(raw), "date")?;
            state.backend.get_summary(&date).await?
        }
        None => state.tokens.last_summary()?,
    };
    let items = state.summary.recommendations(summary.as_ref()).await?;
    Ok(RecommendResponse {
        date: summary.map(|summary| summary.date),
        items,
    })
}

pub fn nickname_impl<B: DiaryBackend + 'static>(
    state: &AppState<B>,
    name: Option<String>,
) -> Result<NicknameResponse, InfraError> {
    if let Some(name) = name {
        state.tokens.set_nickname(&name)?;
    }
    let nickname = state.tokens.nickname()?;
    Ok(NicknameResponse {
        masked: mask_name(&nickname),
        nickname,
    })
}

fn entries_response<B: DiaryBackend>(day: &DayEntries<B>) -> EntriesResponse {
    EntriesResponse {
        date: day.date().to_string(),
        pretty_date: pretty_date(day.date()),
        entries: day.entries().to_vec(),
    }
}

fn resolve_date(value: Option<&str>, field_name: &str) -> Result<String, InfraError> {
    match value.map(str::trim) {
        None | Some("") => Ok(today_iso()),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map(to_iso)
            .map_err(|_| InfraError::InvalidConfig(format!("{field_name} must be YYYY-MM-DD"))),
    }
}

fn parse_month(raw: &str) -> Result<NaiveDate, InfraError> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{raw}-01"), "%Y-%m-%d"))
        .map_err(|_| InfraError::InvalidConfig("month must be YYYY-MM or YYYY-MM-DD".to_string()))
}

fn parse_emotion(raw: Option<&str>) -> Result<Option<Emotion>, InfraError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => Emotion::parse(raw)
            .map(Some)
            .ok_or_else(|| InfraError::InvalidConfig(format!("unknown emotion: {raw}"))),
    }
}
