use std::sync::Arc;

use async_trait::async_trait;
use browser_ai_core::{Credential, Error, Result};
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::{CredentialSource, CredentialStore, ModelAuth, TokenEndpoint};

/// Refresh when the token expires within this window.
const REFRESH_MARGIN_MS: i64 = 60_000;
const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

type RefreshFuture = Shared<BoxFuture<'static, std::result::Result<Credential, String>>>;

/// Resolves the credential for each model call.
///
/// Order: stored OAuth token (refreshed when close to expiry), then the
/// `ANTHROPIC_API_KEY` environment variable, then the configured static key.
/// Concurrent callers that find the token expiring share one refresh.
pub struct TokenManager {
    store: CredentialStore,
    endpoint: Arc<dyn TokenEndpoint>,
    env_key: Option<String>,
    static_key: Option<String>,
    refreshing: Mutex<Option<RefreshFuture>>,
}

impl TokenManager {
    pub fn new(store: CredentialStore, endpoint: Arc<dyn TokenEndpoint>) -> Self {
        let env_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.trim().is_empty());
        Self {
            store,
            endpoint,
            env_key,
            static_key: None,
            refreshing: Mutex::new(None),
        }
    }

    pub fn with_static_key(mut self, key: Option<String>) -> Self {
        self.static_key = key;
        self
    }

    /// Ignore the environment key (the stored credential and static key still apply).
    pub fn without_env_key(mut self) -> Self {
        self.env_key = None;
        self
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub async fn is_authenticated(&self) -> bool {
        self.get_valid_credential().await.is_ok()
    }

    pub fn logout(&self) -> Result<()> {
        self.store.clear()?;
        info!("Stored credential removed");
        Ok(())
    }

    async fn oauth_token(&self) -> std::result::Result<String, String> {
        let Some(cred) = self.store.load() else {
            return Err("No token found. Please authenticate first.".to_string());
        };

        let now = chrono::Utc::now().timestamp_millis();
        if !cred.expires_within(now, REFRESH_MARGIN_MS) {
            return Ok(cred.access_token);
        }

        match cred.refresh_token {
            Some(refresh_token) => {
                debug!("Access token expiring, refreshing");
                self.refresh_shared(refresh_token)
                    .await
                    .map(|c| c.access_token)
            }
            None => Err("Token expired and no refresh token available.".to_string()),
        }
    }

    /// Join the in-flight refresh if there is one, otherwise start it.
    async fn refresh_shared(&self, refresh_token: String) -> std::result::Result<Credential, String> {
        let refresh = {
            let mut slot = self.refreshing.lock().await;
            match slot.as_ref() {
                Some(inflight) => inflight.clone(),
                None => {
                    let endpoint = self.endpoint.clone();
                    let store = self.store.clone();
                    let fut = async move {
                        let cred = endpoint
                            .refresh(&refresh_token)
                            .await
                            .map_err(|e| e.to_string())?;
                        store.save(&cred).map_err(|e| e.to_string())?;
                        Ok(cred)
                    }
                    .boxed()
                    .shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };

        let result = refresh.clone().await;

        let mut slot = self.refreshing.lock().await;
        if slot.as_ref().is_some_and(|f| f.ptr_eq(&refresh)) {
            *slot = None;
        }
        result
    }
}

#[async_trait]
impl CredentialSource for TokenManager {
    async fn get_valid_credential(&self) -> Result<ModelAuth> {
        let reason = match self.oauth_token().await {
            Ok(token) => return Ok(ModelAuth::Bearer(token)),
            Err(reason) => reason,
        };

        if let Some(key) = self.env_key.as_ref().or(self.static_key.as_ref()) {
            debug!(reason = %reason, "Falling back to API key");
            return Ok(ModelAuth::ApiKey(key.clone()));
        }

        warn!(reason = %reason, "No usable credential");
        Err(Error::Auth(reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct CountingEndpoint {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl TokenEndpoint for CountingEndpoint {
        async fn refresh(&self, refresh_token: &str) -> Result<Credential> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            if self.fail {
                return Err(Error::Auth("refresh rejected".to_string()));
            }
            Ok(Credential {
                access_token: format!("fresh-{}", refresh_token),
                refresh_token: Some(refresh_token.to_string()),
                expires_at: chrono::Utc::now().timestamp_millis() + 3_600_000,
                token_type: "Bearer".to_string(),
            })
        }
    }

    fn endpoint(fail: bool) -> Arc<CountingEndpoint> {
        Arc::new(CountingEndpoint {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    fn stored(dir: &tempfile::TempDir, expires_in_ms: i64, refresh: Option<&str>) -> CredentialStore {
        let store = CredentialStore::new(dir.path().join("auth.json"));
        store
            .save(&Credential {
                access_token: "stored".to_string(),
                refresh_token: refresh.map(str::to_string),
                expires_at: chrono::Utc::now().timestamp_millis() + expires_in_ms,
                token_type: "Bearer".to_string(),
            })
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_valid_token_used_as_is() {
        let dir = tempfile::tempdir().unwrap();
        let ep = endpoint(false);
        let manager = TokenManager::new(stored(&dir, 3_600_000, Some("r")), ep.clone()).without_env_key();
        assert_eq!(
            manager.get_valid_credential().await.unwrap(),
            ModelAuth::Bearer("stored".to_string())
        );
        assert_eq!(ep.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expiring_token_refreshed_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let ep = endpoint(false);
        let manager = TokenManager::new(stored(&dir, 30_000, Some("r1")), ep.clone()).without_env_key();
        assert_eq!(
            manager.get_valid_credential().await.unwrap(),
            ModelAuth::Bearer("fresh-r1".to_string())
        );
        assert_eq!(manager.store().load().unwrap().access_token, "fresh-r1");
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let ep = endpoint(false);
        let manager = TokenManager::new(stored(&dir, -1_000, Some("r")), ep.clone()).without_env_key();

        let (a, b, c) = tokio::join!(
            manager.get_valid_credential(),
            manager.get_valid_credential(),
            manager.get_valid_credential()
        );
        assert_eq!(a.unwrap(), ModelAuth::Bearer("fresh-r".to_string()));
        assert_eq!(b.unwrap(), ModelAuth::Bearer("fresh-r".to_string()));
        assert_eq!(c.unwrap(), ModelAuth::Bearer("fresh-r".to_string()));
        assert_eq!(ep.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_refresh_falls_back_to_static_key() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TokenManager::new(stored(&dir, -1_000, Some("r")), endpoint(true))
            .without_env_key()
            .with_static_key(Some("sk-config".to_string()));
        assert_eq!(
            manager.get_valid_credential().await.unwrap(),
            ModelAuth::ApiKey("sk-config".to_string())
        );
    }

    #[tokio::test]
    async fn test_no_credential_is_auth_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("auth.json"));
        let manager = TokenManager::new(store, endpoint(false)).without_env_key();
        let err = manager.get_valid_credential().await.unwrap_err();
        assert!(err.is_auth());
        assert!(err.to_string().starts_with(browser_ai_core::AUTH_REQUIRED_MARKER));
        assert!(!manager.is_authenticated().await);
    }

    #[tokio::test]
    async fn test_expired_without_refresh_token() {
        let dir = tempfile::tempdir().unwrap();
        let ep = endpoint(false);
        let manager = TokenManager::new(stored(&dir, -1_000, None), ep.clone()).without_env_key();
        let err = manager.get_valid_credential().await.unwrap_err();
        assert!(err.to_string().contains("no refresh token"));
        assert_eq!(ep.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_logout_clears_store() {
        let dir = tempfile::tempdir().unwrap();
        let manager = TokenManager::new(stored(&dir, 3_600_000, None), endpoint(false)).without_env_key();
        assert!(manager.is_authenticated().await);
        manager.logout().unwrap();
        assert!(!manager.is_authenticated().await);
    }
}
