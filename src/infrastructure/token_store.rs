use crate::domain::models::{AuthToken, DailySummary};
use crate::infrastructure::client_storage::ClientStorage;
use crate::infrastructure::error::InfraError;
use std::sync::Arc;

pub const ACCESS_TOKEN_KEY: &str = "accessToken";
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const UID_KEY: &str = "uid";
pub const NICKNAME_KEY: &str = "nickname";
pub const LAST_SUMMARY_KEY: &str = "summary";
pub const GUEST_LABEL: &str = "게스트";

const TOKEN_KEYS: [&str; 3] = [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, UID_KEY];

/// Auth tokens and small client state kept in a [`ClientStorage`].
/// Cheap to clone; every clone shares the same storage.
#[derive(Clone)]
pub struct TokenStore {
    storage: Arc<dyn ClientStorage>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

impl TokenStore {
    pub fn new(storage: Arc<dyn ClientStorage>) -> Self {
        Self { storage }
    }

    /// Overwrites all three token keys.
    pub fn set(&self, token: &AuthToken) -> Result<(), InfraError> {
        self.storage.set_item(ACCESS_TOKEN_KEY, &token.access_token)?;
        self.storage.set_item(REFRESH_TOKEN_KEY, &token.refresh_token)?;
        self.storage.set_item(UID_KEY, &token.uid)?;
        Ok(())
    }

    /// Stores whichever parts are present, leaving the others untouched.
    pub fn set_partial(
        &self,
        access_token: Option<&str>,
        refresh_token: Option<&str>,
        uid: Option<&str>,
    ) -> Result<(), InfraError> {
        for (key, value) in [
            (ACCESS_TOKEN_KEY, access_token),
            (REFRESH_TOKEN_KEY, refresh_token),
            (UID_KEY, uid),
        ] {
            if let Some(value) = value.map(str::trim).filter(|value| !value.is_empty()) {
                self.storage.set_item(key, value)?;
            }
        }
        Ok(())
    }

    pub fn clear(&self) -> Result<(), InfraError> {
        for key in TOKEN_KEYS {
            self.storage.remove_item(key)?;
        }
        Ok(())
    }

    /// Stored value for `key`; blank values read as absent.
    pub fn get(&self, key: &str) -> Result<Option<String>, InfraError> {
        Ok(self
            .storage
            .get_item(key)?
            .filter(|value| !value.trim().is_empty()))
    }

    pub fn access_token(&self) -> Result<Option<String>, InfraError> {
        self.get(ACCESS_TOKEN_KEY)
    }

    pub fn refresh_token(&self) -> Result<Option<String>, InfraError> {
        self.get(REFRESH_TOKEN_KEY)
    }

    pub fn uid(&self) -> Result<Option<String>, InfraError> {
        self.get(UID_KEY)
    }

    pub fn get_or_create_uid(&self) -> Result<String, InfraError> {
        if let Some(uid) = self.uid()? {
            return Ok(uid);
        }
        let uid = uuid::Uuid::new_v4().to_string();
        self.storage.set_item(UID_KEY, &uid)?;
        Ok(uid)
    }

    pub fn nickname(&self) -> Result<String, InfraError> {
        Ok(self.get(NICKNAME_KEY)?.unwrap_or_default())
    }

    pub fn set_nickname(&self, name: &str) -> Result<(), InfraError> {
        self.storage.set_item(NICKNAME_KEY, name.trim())
    }

    pub fn save_last_summary(&self, summary: &DailySummary) -> Result<(), InfraError> {
        let payload = serde_json::to_string(summary)?;
        self.storage.set_item(LAST_SUMMARY_KEY, &payload)
    }

    /// An unparsable blob reads as absent.
    pub fn last_summary(&self) -> Result<Option<DailySummary>, InfraError> {
        Ok(self
            .get(LAST_SUMMARY_KEY)?
            .and_then(|raw| serde_json::from_str(&raw).ok()))
    }
}

/// First character kept, the rest starred (at least one star).
pub fn mask_name(name: &str) -> String {
    let mut chars = name.trim().chars();
    match chars.next() {
        None => GUEST_LABEL.to_string(),
        Some(first) => {
            let stars = chars.count().max(1);
            format!("{first}{}", "*".repeat(stars))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Emotion;
    use crate::infrastructure::client_storage::InMemoryClientStorage;

    fn store() -> (Arc<InMemoryClientStorage>, TokenStore) {
        let storage = Arc::new(InMemoryClientStorage::default());
        let store = TokenStore::new(storage.clone());
        (storage, store)
    }

    fn sample_token() -> AuthToken {
        AuthToken {
            access_token: "access-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            uid: "42".to_string(),
        }
    }

    #[test]
    fn set_then_clear_removes_every_token_key() {
        let (storage, store) = store();
        store.set(&sample_token()).expect("set");
        assert_eq!(store.access_token().expect("get"), Some("access-1".to_string()));
        assert_eq!(store.refresh_token().expect("get"), Some("refresh-1".to_string()));
        assert_eq!(store.uid().expect("get"), Some("42".to_string()));

        store.set_nickname("하루").expect("nickname");
        store.clear().expect("clear");
        for key in TOKEN_KEYS {
            assert_eq!(storage.get_item(key).expect("get"), None);
        }
        assert_eq!(store.nickname().expect("nickname"), "하루");
    }

    #[test]
    fn partial_set_skips_missing_parts() {
        let (_, store) = store();
        store.set(&sample_token()).expect("set");
        store
            .set_partial(Some("access-2"), None, Some("  "))
            .expect("partial");
        assert_eq!(store.access_token().expect("get"), Some("access-2".to_string()));
        assert_eq!(store.refresh_token().expect("get"), Some("refresh-1".to_string()));
        assert_eq!(store.uid().expect("get"), Some("42".to_string()));
    }

    #[test]
    fn uid_is_created_once() {
        let (_, store) = store();
        let first = store.get_or_create_uid().expect("uid");
        let second = store.get_or_create_uid().expect("uid");
        assert_eq!(first, second);
        assert!(uuid::Uuid::parse_str(&first).is_ok());
    }

    #[test]
    fn last_summary_blob_round_trips_and_tolerates_garbage() {
        let (storage, store) = store();
        assert_eq!(store.last_summary().expect("read"), None);

        let summary = DailySummary {
            date: "2024-05-03".to_string(),
            summary_text: "조용한 하루".to_string(),
            emotion: Some(Emotion::Good),
        };
        store.save_last_summary(&summary).expect("save");
        assert_eq!(store.last_summary().expect("read"), Some(summary));

        storage.set_item(LAST_SUMMARY_KEY, "{not json").expect("corrupt");
        assert_eq!(store.last_summary().expect("read"), None);
    }

    #[test]
    fn mask_name_keeps_first_character() {
        assert_eq!(mask_name(""), GUEST_LABEL);
        assert_eq!(mask_name("김"), "김*");
        assert_eq!(mask_name("김하루"), "김**");
        assert_eq!(mask_name("alice"), "a****");
    }
}
