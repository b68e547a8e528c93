use crate::application::fallback::FallbackChain;
use crate::domain::models::Session;
use crate::infrastructure::diary_backend::{DiaryBackend, IdentityEndpoint, LogoutEndpoint};
use crate::infrastructure::error::InfraError;
use crate::infrastructure::token_store::TokenStore;
use futures::FutureExt;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OAuthFragment {
    pub access: Option<String>,
    pub refresh: Option<String>,
}

/// Parses `#access=...&refresh=...`; the leading `#` is optional.
pub fn parse_oauth_fragment(fragment: &str) -> OAuthFragment {
    let fragment = fragment.trim();
    let fragment = fragment.split_once('#').map_or(fragment, |(_, rest)| rest);
    let mut parsed = OAuthFragment::default();
    for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
        let value = value.trim().to_string();
        if value.is_empty() {
            continue;
        }
        match key.as_ref() {
            "access" => parsed.access = Some(value),
            "refresh" => parsed.refresh = Some(value),
            _ => {}
        }
    }
    parsed
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    pub uid: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// The named endpoint acknowledged the logout.
    Acknowledged(&'static str),
    /// Every endpoint failed; local tokens were cleared anyway.
    LocalOnly,
}

pub struct SessionManager<B>
where
    B: DiaryBackend,
{
    backend: Arc<B>,
    tokens: TokenStore,
}

impl<B> SessionManager<B>
where
    B: DiaryBackend,
{
    pub fn new(backend: Arc<B>, tokens: TokenStore) -> Self {
        Self { backend, tokens }
    }

    /// `me/` then `diary/whoami/`; anonymous when both fail.
    pub async fn resolve(&self) -> Option<Session> {
        FallbackChain::new()
            .then("me", self.backend.identify(IdentityEndpoint::Me).boxed())
            .then("whoami", self.backend.identify(IdentityEndpoint::WhoAmI).boxed())
            .run_or_none()
            .await
    }

    /// Best-effort server logout. Local tokens are always cleared.
    pub async fn logout(&self) -> Result<LogoutOutcome, InfraError> {
        let outcome = FallbackChain::new()
            .then("user/logout", self.backend.logout(LogoutEndpoint::User).boxed())
            .then("auth/logout", self.backend.logout(LogoutEndpoint::Auth).boxed())
            .run()
            .await;
        self.tokens.clear()?;
        Ok(match outcome {
            Ok((name, ())) => LogoutOutcome::Acknowledged(name),
            Err(_) => LogoutOutcome::LocalOnly,
        })
    }

    /// Password login. Previous tokens are replaced as a whole.
    pub async fn login(&self, username: &str, password: &str) -> Result<SignedIn, InfraError> {
        if username.trim().is_empty() || password.is_empty() {
            return Err(InfraError::InvalidConfig(
                "username and password must not be empty".to_string(),
            ));
        }
        let grant = self.backend.obtain_token(username.trim(), password).await?;
        let Some(access) = grant.access.as_deref().filter(|value| !value.trim().is_empty()) else {
            return Err(InfraError::InvalidResponse(
                "token response did not include an access token".to_string(),
            ));
        };
        let uid = grant.user_id_string();
        self.tokens.clear()?;
        self.tokens
            .set_partial(Some(access), grant.refresh.as_deref(), uid.as_deref())?;
        Ok(SignedIn { uid })
    }

    /// Stores tokens delivered in the callback fragment after clearing old ones.
    pub fn complete_oauth_callback(&self, fragment: &str) -> Result<OAuthFragment, InfraError> {
        let parsed = parse_oauth_fragment(fragment);
        self.tokens.clear()?;
        self.tokens
            .set_partial(parsed.access.as_deref(), parsed.refresh.as_deref(), None)?;
        Ok(parsed)
    }
}
