use crate::domain::day_key::{raw_days_from_payload, RawDay};
use crate::domain::models::{DailySummary, DiaryEntry, Emotion, Recommendation, Session};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::http_client::ApiClient;
use async_trait::async_trait;
use reqwest::Method;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityEndpoint {
    Me,
    WhoAmI,
}

impl IdentityEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Me => "me/",
            Self::WhoAmI => "diary/whoami/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutEndpoint {
    User,
    Auth,
}

impl LogoutEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::User => "user/logout/",
            Self::Auth => "auth/logout/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryEndpoint {
    Finalize,
    Generate,
}

impl SummaryEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Finalize => "diary/finalize-summary/",
            Self::Generate => "diary/generate/",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMethod {
    Put,
    Patch,
}

impl UpdateMethod {
    fn method(self) -> Method {
        match self {
            Self::Put => Method::PUT,
            Self::Patch => Method::PATCH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryDraft {
    pub content: String,
    pub emotion: Option<Emotion>,
}

impl EntryDraft {
    fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({ "content": self.content });
        if let Some(emotion) = self.emotion {
            body["emotion"] = serde_json::Value::String(emotion.label().to_string());
        }
        body
    }
}

/// Login response of `POST token/`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
pub struct TokenGrant {
    pub access: Option<String>,
    pub refresh: Option<String>,
    pub user_id: Option<serde_json::Value>,
}

impl TokenGrant {
    /// `user_id` may arrive as a number or a string.
    pub fn user_id_string(&self) -> Option<String> {
        match self.user_id.as_ref()? {
            serde_json::Value::String(value) => Some(value.clone()),
            serde_json::Value::Number(value) => Some(value.to_string()),
            _ => None,
        }
    }
}

#[async_trait]
pub trait DiaryBackend: Send + Sync {
    async fn list_days(&self) -> Result<Vec<RawDay>, InfraError>;

    async fn list_entries(&self, date: &str) -> Result<Vec<DiaryEntry>, InfraError>;

    async fn create_entry(&self, draft: &EntryDraft) -> Result<(), InfraError>;

    async fn update_entry(
        &self,
        id: i64,
        method: UpdateMethod,
        draft: &EntryDraft,
    ) -> Result<(), InfraError>;

    async fn delete_entry(&self, id: i64) -> Result<(), InfraError>;

    /// `Ok(None)` when the day has no summary yet.
    async fn get_summary(&self, date: &str) -> Result<Option<DailySummary>, InfraError>;

    async fn request_summary(&self, endpoint: SummaryEndpoint, date: &str) -> Result<(), InfraError>;

    async fn identify(&self, endpoint: IdentityEndpoint) -> Result<Session, InfraError>;

    async fn logout(&self, endpoint: LogoutEndpoint) -> Result<(), InfraError>;

    async fn obtain_token(&self, username: &str, password: &str) -> Result<TokenGrant, InfraError>;

    async fn request_recommendations(&self, date: &str) -> Result<(), InfraError>;

    async fn recommendation_detail(&self, date: &str) -> Result<Vec<Recommendation>, InfraError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestDiaryBackend {
    api: ApiClient,
    oauth_start_path: String,
}

impl ReqwestDiaryBackend {
    pub fn new(api: ApiClient, oauth_start_path: impl Into<String>) -> Self {
        Self {
            api,
            oauth_start_path: oauth_start_path.into(),
        }
    }

    /// Where the browser goes to start the provider login.
    pub fn oauth_start_url(&self) -> Result<Url, InfraError> {
        self.api.root_endpoint(&self.oauth_start_path)
    }

    fn date_body(date: &str) -> serde_json::Value {
        serde_json::json!({ "date": date })
    }
}

#[derive(Debug, Default, serde::Deserialize)]
struct RecommendationDetail {
    #[serde(default)]
    items: Vec<Recommendation>,
}

#[async_trait]
impl DiaryBackend for ReqwestDiaryBackend {
    async fn list_days(&self) -> Result<Vec<RawDay>, InfraError> {
        let payload: serde_json::Value = self.api.get_json("diary/days/", &[]).await?;
        Ok(raw_days_from_payload(payload))
    }

    async fn list_entries(&self, date: &str) -> Result<Vec<DiaryEntry>, InfraError> {
        let payload: serde_json::Value =
            self.api.get_json("diary/entries/", &[("date", date)]).await?;
        let serde_json::Value::Array(items) = payload else {
            return Ok(Vec::new());
        };
        Ok(items
            .into_iter()
            .filter_map(|item| serde_json::from_value::<DiaryEntry>(item).ok())
            .map(|mut entry| {
                if entry.date.is_empty() {
                    entry.date = date.to_string();
                }
                entry
            })
            .filter(|entry| entry.validate().is_ok())
            .collect())
    }

    async fn create_entry(&self, draft: &EntryDraft) -> Result<(), InfraError> {
        self.api
            .send(Method::POST, "diary/entries/create/", &[], Some(&draft.to_json()))
            .await?;
        Ok(())
    }

    async fn update_entry(
        &self,
        id: i64,
        method: UpdateMethod,
        draft: &EntryDraft,
    ) -> Result<(), InfraError> {
        let path = format!("diary/entries/{id}/update/");
        self.api
            .send(method.method(), &path, &[], Some(&draft.to_json()))
            .await?;
        Ok(())
    }

    async fn delete_entry(&self, id: i64) -> Result<(), InfraError> {
        let path = format!("diary/entries/{id}/delete/");
        self.api.send(Method::DELETE, &path, &[], None).await?;
        Ok(())
    }

    async fn get_summary(&self, date: &str) -> Result<Option<DailySummary>, InfraError> {
        let payload = match self
            .api
            .get_json::<serde_json::Value>("diary/summaries/", &[("date", date)])
            .await
        {
            Ok(payload) => payload,
            Err(error) if error.is_not_found() => return Ok(None),
            Err(error) => return Err(error),
        };
        if !payload.is_object() {
            return Ok(None);
        }
        let mut summary: DailySummary = serde_json::from_value(payload).map_err(|error| {
            InfraError::InvalidResponse(format!("invalid summary payload for {date}: {error}"))
        })?;
        summary.date = date.to_string();
        Ok(Some(summary))
    }

    async fn request_summary(&self, endpoint: SummaryEndpoint, date: &str) -> Result<(), InfraError> {
        self.api
            .send(Method::POST, endpoint.path(), &[], Some(&Self::date_body(date)))
            .await?;
        Ok(())
    }

    async fn identify(&self, endpoint: IdentityEndpoint) -> Result<Session, InfraError> {
        self.api.get_json(endpoint.path(), &[]).await
    }

    async fn logout(&self, endpoint: LogoutEndpoint) -> Result<(), InfraError> {
        self.api
            .send(Method::POST, endpoint.path(), &[], Some(&serde_json::json!({})))
            .await?;
        Ok(())
    }

    async fn obtain_token(&self, username: &str, password: &str) -> Result<TokenGrant, InfraError> {
        let body = serde_json::json!({ "username": username, "password": password });
        let grant: Option<TokenGrant> = self.api.post_json("token/", &body).await?;
        Ok(grant.unwrap_or_default())
    }

    async fn request_recommendations(&self, date: &str) -> Result<(), InfraError> {
        self.api
            .send(
                Method::POST,
                "coupang/recommendations/",
                &[],
                Some(&Self::date_body(date)),
            )
            .await?;
        Ok(())
    }

    async fn recommendation_detail(&self, date: &str) -> Result<Vec<Recommendation>, InfraError> {
        let detail: Option<RecommendationDetail> = self
            .api
            .get_json("coupang/recommendations/detail/", &[("date", date)])
            .await?;
        Ok(detail.unwrap_or_default().items)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::client_storage::InMemoryClientStorage;
    use crate::infrastructure::config::ClientConfig;
    use crate::infrastructure::token_store::TokenStore;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(base: &str) -> ReqwestDiaryBackend {
        let config = ClientConfig {
            api_base: Url::parse(base).expect("base url"),
            ..ClientConfig::default()
        };
        let tokens = TokenStore::new(Arc::new(InMemoryClientStorage::default()));
        let api = ApiClient::new(&config, tokens).expect("api client");
        ReqwestDiaryBackend::new(api, config.oauth_start_path)
    }

    async fn backend_with_server() -> (MockServer, ReqwestDiaryBackend) {
        let server = MockServer::start().await;
        let backend = backend_for(&format!("{}/", server.uri()));
        (server, backend)
    }

    #[tokio::test]
    async fn missing_summary_is_absence_not_error() {
        let (server, backend) = backend_with_server().await;
        Mock::given(method("GET"))
            .and(path("/diary/summaries/"))
            .and(query_param("date", "2024-05-03"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({"detail": "Not found."})))
            .expect(1)
            .mount(&server)
            .await;
        let summary = backend.get_summary("2024-05-03").await.expect("404 is ok");
        assert_eq!(summary, None);
    }

    #[tokio::test]
    async fn summary_takes_requested_date() {
        let (server, backend) = backend_with_server().await;
        Mock::given(method("GET"))
            .and(path("/diary/summaries/"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"summary_text": "맑음", "emotion": "행복"})),
            )
            .mount(&server)
            .await;
        let summary = backend
            .get_summary("2024-05-03")
            .await
            .expect("summary")
            .expect("present");
        assert_eq!(summary.date, "2024-05-03");
        assert_eq!(summary.emotion, Some(Emotion::Happy));
    }

    #[tokio::test]
    async fn entries_listing_tolerates_odd_payloads() {
        let (server, backend) = backend_with_server().await;
        Mock::given(method("GET"))
            .and(path("/diary/entries/"))
            .and(query_param("date", "2024-05-02"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": []})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/diary/entries/"))
            .and(query_param("date", "2024-05-03"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 1, "content": "a", "emotion": "슬픔"},
                {"id": 2, "content": "   ", "emotion": "행복"},
                {"bogus": true}
            ])))
            .mount(&server)
            .await;

        assert!(backend.list_entries("2024-05-02").await.expect("entries").is_empty());
        let entries = backend.list_entries("2024-05-03").await.expect("entries");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].date, "2024-05-03");
        assert_eq!(entries[0].emotion, Some(Emotion::Sad));
    }

    #[tokio::test]
    async fn create_sends_content_and_emotion_label() {
        let (server, backend) = backend_with_server().await;
        Mock::given(method("POST"))
            .and(path("/diary/entries/create/"))
            .and(body_json(json!({"content": "첫 줄", "emotion": "불안"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 3})))
            .expect(1)
            .mount(&server)
            .await;
        backend
            .create_entry(&EntryDraft {
                content: "첫 줄".to_string(),
                emotion: Some(Emotion::Anxious),
            })
            .await
            .expect("create");
    }

    #[tokio::test]
    async fn recommendation_detail_reads_items() {
        let (server, backend) = backend_with_server().await;
        Mock::given(method("GET"))
            .and(path("/coupang/recommendations/detail/"))
            .and(query_param("date", "2024-05-03"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"title": "우산", "link": "https://example.com/u", "keyword": "비"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/coupang/recommendations/detail/"))
            .and(query_param("date", "2024-05-04"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let items = backend.recommendation_detail("2024-05-03").await.expect("items");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].keyword.as_deref(), Some("비"));
        assert!(backend
            .recommendation_detail("2024-05-04")
            .await
            .expect("no items")
            .is_empty());
    }

    #[test]
    fn oauth_start_url_uses_api_root() {
        let backend = backend_for("http://127.0.0.1:8000/");
        assert_eq!(
            backend.oauth_start_url().expect("url").as_str(),
            "http://127.0.0.1:8000/auth/kakao/login/"
        );
    }

    #[test]
    fn token_grant_user_id_accepts_numbers() {
        let grant: TokenGrant =
            serde_json::from_str(r#"{"access": "a", "refresh": "r", "user_id": 12}"#).expect("grant");
        assert_eq!(grant.user_id_string(), Some("12".to_string()));
    }
}
