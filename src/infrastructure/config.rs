use crate::infrastructure::error::InfraError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use url::Url;

const APP_JSON: &str = "app.json";
const SUPPORTED_SCHEMA: u64 = 1;
pub const DEFAULT_API_BASE: &str = "http://127.0.0.1:8000/";
pub const DEFAULT_OAUTH_START_PATH: &str = "auth/kakao/login/";

const ENV_API_BASE: [&str; 2] = ["LINEDIARY_API_BASE", "NEXT_PUBLIC_API_BASE"];
const ENV_API_PREFIX: [&str; 1] = ["LINEDIARY_API_PREFIX"];
const ENV_WITH_CREDENTIALS: [&str; 1] = ["LINEDIARY_WITH_CREDENTIALS"];
const ENV_STORAGE: [&str; 1] = ["LINEDIARY_STORAGE"];
const ENV_REFRESH_POLICY: [&str; 1] = ["LINEDIARY_REFRESH_POLICY"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Keyring,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RefreshPolicy {
    /// A rejected token surfaces as the request's error.
    #[default]
    Never,
    /// On 401 exchange the refresh token once and replay the request.
    RefreshOnce,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub api_base: Url,
    pub api_prefix: String,
    pub with_credentials: bool,
    pub storage: StorageBackend,
    pub refresh_policy: RefreshPolicy,
    pub oauth_start_path: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: Url::parse(DEFAULT_API_BASE).expect("default api base is a valid url"),
            api_prefix: String::new(),
            with_credentials: false,
            storage: StorageBackend::default(),
            refresh_policy: RefreshPolicy::default(),
            oauth_start_path: DEFAULT_OAUTH_START_PATH.to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AppFile {
    api_base: Option<String>,
    api_prefix: Option<String>,
    with_credentials: Option<bool>,
    storage: Option<StorageBackend>,
    refresh_policy: Option<RefreshPolicy>,
    oauth_start_path: Option<String>,
}

fn default_app_json() -> serde_json::Value {
    serde_json::json!({
        "schema": SUPPORTED_SCHEMA,
        "appName": "linediary",
        "apiBase": DEFAULT_API_BASE,
        "apiPrefix": "",
        "withCredentials": false,
        "storage": "sqlite",
        "refreshPolicy": "never",
        "oauthStartPath": DEFAULT_OAUTH_START_PATH
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_app_json())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != SUPPORTED_SCHEMA {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

/// Loads `app.json` from `config_dir`, then applies environment overrides.
pub fn load_client_config(config_dir: &Path) -> Result<ClientConfig, InfraError> {
    load_client_config_with_lookup(config_dir, |key| std::env::var(key).ok())
}

pub fn load_client_config_with_lookup<F>(
    config_dir: &Path,
    lookup: F,
) -> Result<ClientConfig, InfraError>
where
    F: Fn(&str) -> Option<String>,
{
    let path = config_dir.join(APP_JSON);
    let file: AppFile = if path.exists() {
        serde_json::from_value(read_config(&path)?)?
    } else {
        AppFile::default()
    };
    let defaults = ClientConfig::default();

    let api_base_raw = optional_lookup_value(&lookup, &ENV_API_BASE)
        .or(file.api_base)
        .unwrap_or_else(|| DEFAULT_API_BASE.to_string());
    let api_prefix = optional_lookup_value(&lookup, &ENV_API_PREFIX)
        .or(file.api_prefix)
        .unwrap_or_default();
    let with_credentials = match optional_lookup_value(&lookup, &ENV_WITH_CREDENTIALS) {
        Some(raw) => parse_bool(&raw, ENV_WITH_CREDENTIALS[0])?,
        None => file.with_credentials.unwrap_or(defaults.with_credentials),
    };
    let storage = match optional_lookup_value(&lookup, &ENV_STORAGE) {
        Some(raw) => parse_enum::<StorageBackend>(&raw, ENV_STORAGE[0])?,
        None => file.storage.unwrap_or(defaults.storage),
    };
    let refresh_policy = match optional_lookup_value(&lookup, &ENV_REFRESH_POLICY) {
        Some(raw) => parse_enum::<RefreshPolicy>(&raw, ENV_REFRESH_POLICY[0])?,
        None => file.refresh_policy.unwrap_or(defaults.refresh_policy),
    };
    let oauth_start_path = file
        .oauth_start_path
        .map(|value| value.trim().trim_start_matches('/').to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or(defaults.oauth_start_path);

    Ok(ClientConfig {
        api_base: parse_api_base(&api_base_raw)?,
        api_prefix: normalize_prefix(&api_prefix),
        with_credentials,
        storage,
        refresh_policy,
        oauth_start_path,
    })
}

/// Base URLs always end with `/` so relative joins keep every path segment.
fn parse_api_base(raw: &str) -> Result<Url, InfraError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{trimmed}/")
    };
    let url = Url::parse(&with_slash)
        .map_err(|error| InfraError::InvalidConfig(format!("invalid api base '{trimmed}': {error}")))?;
    if url.cannot_be_a_base() {
        return Err(InfraError::InvalidConfig(format!(
            "api base '{trimmed}' cannot be a base url"
        )));
    }
    Ok(url)
}

fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

fn parse_bool(raw: &str, key: &str) -> Result<bool, InfraError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(InfraError::InvalidConfig(format!(
            "{key} must be a boolean, got '{raw}'"
        ))),
    }
}

fn parse_enum<T>(raw: &str, key: &str) -> Result<T, InfraError>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(serde_json::Value::String(raw.to_ascii_lowercase()))
        .map_err(|_| InfraError::InvalidConfig(format!("unsupported value '{raw}' for {key}")))
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    for key in keys {
        if let Some(value) = lookup(key) {
            let normalized = value.trim();
            if !normalized.is_empty() {
                return Some(normalized.to_string());
            }
        }
    }
    None
}
