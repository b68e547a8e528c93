use crate::infrastructure::config::{ClientConfig, RefreshPolicy};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::token_store::TokenStore;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, Request, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use url::Url;

pub const USER_ID_HEADER: &str = "X-User-Id";
const TOKEN_REFRESH_PATH: &str = "token/refresh/";

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    /// An empty body decodes as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, InfraError> {
        let body = if self.body.trim().is_empty() {
            "null"
        } else {
            self.body.as_str()
        };
        serde_json::from_str(body).map_err(|error| {
            InfraError::InvalidResponse(format!("{error}; body={}", self.body))
        })
    }
}

#[derive(Debug, serde::Deserialize)]
struct RefreshResponse {
    access: Option<String>,
    refresh: Option<String>,
}

/// Shared request dispatcher. Every request is decorated with the stored
/// uid and bearer token right before it is sent.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    root: Url,
    base: Url,
    tokens: TokenStore,
    refresh_policy: RefreshPolicy,
}

impl ApiClient {
    pub fn new(config: &ClientConfig, tokens: TokenStore) -> Result<Self, InfraError> {
        let client = Client::builder()
            .cookie_store(config.with_credentials)
            .build()
            .map_err(|error| InfraError::Network(format!("failed to build http client: {error}")))?;
        let base = config
            .api_base
            .join(&config.api_prefix)
            .map_err(|error| InfraError::InvalidConfig(format!("invalid api prefix: {error}")))?;
        Ok(Self {
            client,
            root: config.api_base.clone(),
            base,
            tokens,
            refresh_policy: config.refresh_policy,
        })
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    /// `path` relative to the api base, prefix included.
    pub fn endpoint(&self, path: &str) -> Result<Url, InfraError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|error| InfraError::InvalidConfig(format!("invalid endpoint '{path}': {error}")))
    }

    /// `path` relative to the api base, ignoring the prefix.
    pub fn root_endpoint(&self, path: &str) -> Result<Url, InfraError> {
        self.root
            .join(path.trim_start_matches('/'))
            .map_err(|error| InfraError::InvalidConfig(format!("invalid endpoint '{path}': {error}")))
    }

    pub fn decorate(&self, mut request: RequestBuilder) -> Result<RequestBuilder, InfraError> {
        if let Some(uid) = self.tokens.uid()? {
            request = request.header(USER_ID_HEADER, header_value(&uid)?);
        }
        if let Some(access_token) = self.tokens.access_token()? {
            request = request.header(AUTHORIZATION, header_value(&format!("Bearer {access_token}"))?);
        }
        Ok(request)
    }

    pub fn build_request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Result<Request, InfraError> {
        let mut request = self.client.request(method, self.endpoint(path)?);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        self.decorate(request)?
            .build()
            .map_err(|error| InfraError::Network(format!("failed to build request: {error}")))
    }

    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&serde_json::Value>,
    ) -> Result<ApiResponse, InfraError> {
        let request = self.build_request(method.clone(), path, query, body)?;
        match self.dispatch(request).await {
            Err(error)
                if error.is_unauthorized()
                    && self.refresh_policy == RefreshPolicy::RefreshOnce
                    && path.trim_start_matches('/') != TOKEN_REFRESH_PATH =>
            {
                if self.refresh_access_token().await? {
                    let replay = self.build_request(method, path, query, body)?;
                    self.dispatch(replay).await
                } else {
                    Err(error)
                }
            }
            other => other,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, InfraError> {
        self.send(Method::GET, path, query, None).await?.json()
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, InfraError> {
        self.send(Method::POST, path, &[], Some(body)).await?.json()
    }

    async fn dispatch(&self, request: Request) -> Result<ApiResponse, InfraError> {
        let method = request.method().clone();
        let url = request.url().path().to_string();
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|error| InfraError::Network(format!("{method} {url} failed: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| InfraError::Network(format!("failed reading {method} {url} response: {error}")))?;

        if !status.is_success() {
            return Err(InfraError::http(status, body));
        }
        Ok(ApiResponse { status, body })
    }

    /// Exchanges the stored refresh token. `Ok(false)` when there is nothing
    /// to exchange or the exchange fails in any way.
    async fn refresh_access_token(&self) -> Result<bool, InfraError> {
        let Some(refresh_token) = self.tokens.refresh_token()? else {
            return Ok(false);
        };
        let body = serde_json::json!({ "refresh": refresh_token });
        let request = self.build_request(Method::POST, TOKEN_REFRESH_PATH, &[], Some(&body))?;
        let Ok(response) = self.dispatch(request).await else {
            return Ok(false);
        };
        let Ok(parsed) = response.json::<RefreshResponse>() else {
            return Ok(false);
        };
        let Some(access) = parsed.access.filter(|value| !value.trim().is_empty()) else {
            return Ok(false);
        };
        self.tokens
            .set_partial(Some(&access), parsed.refresh.as_deref(), None)?;
        Ok(true)
    }
}

fn header_value(value: &str) -> Result<HeaderValue, InfraError> {
    HeaderValue::from_str(value)
        .map_err(|_| InfraError::Credential("stored token is not a valid header value".to_string()))
}
