use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use browser_ai_core::{Credential, Error, Result};
use rand::RngCore;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tracing::{error, info};

pub const CLIENT_ID: &str = "9d1c250a-e61b-44d9-88ed-5944d1962f5e";
pub const REDIRECT_URI: &str = "https://console.anthropic.com/oauth/code/callback";
const CONSOLE_BASE_URL: &str = "https://console.anthropic.com";
const CLAUDE_BASE_URL: &str = "https://claude.ai";
const SCOPES: &str = "org:create_api_key user:profile user:inference";
/// Used when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Which site hosts the authorization page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// Claude Pro/Max subscription (claude.ai).
    #[default]
    Max,
    /// Anthropic Console account.
    Console,
}

impl AuthMode {
    fn base_url(self) -> &'static str {
        match self {
            AuthMode::Max => CLAUDE_BASE_URL,
            AuthMode::Console => CONSOLE_BASE_URL,
        }
    }
}

impl std::str::FromStr for AuthMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "max" => Ok(AuthMode::Max),
            "console" => Ok(AuthMode::Console),
            other => Err(Error::Config(format!("unknown auth mode '{}'", other))),
        }
    }
}

/// PKCE verifier/challenge pair (S256).
#[derive(Debug, Clone)]
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_verifier(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self { verifier, challenge }
    }
}

/// Anything that can trade a refresh token for a new credential.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<Credential>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
}

impl TokenResponse {
    fn into_credential(self, now_ms: i64) -> Credential {
        Credential {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: now_ms.saturating_add(
                self.expires_in
                    .unwrap_or(DEFAULT_EXPIRES_IN_SECS)
                    .saturating_mul(1000),
            ),
            token_type: self.token_type.unwrap_or_else(|| "Bearer".to_string()),
        }
    }
}

/// OAuth authorization-code flow with PKCE against the Anthropic console.
pub struct OAuthClient {
    http: Client,
    token_url: String,
}

impl OAuthClient {
    pub fn new() -> Self {
        Self {
            http: Client::new(),
            token_url: format!("{}/v1/oauth/token", CONSOLE_BASE_URL),
        }
    }

    pub fn with_token_url(mut self, token_url: &str) -> Self {
        self.token_url = token_url.to_string();
        self
    }

    /// URL the user opens to authorize. The verifier doubles as `state`.
    pub fn authorization_url(&self, mode: AuthMode, pkce: &Pkce) -> Result<String> {
        let base = format!("{}/oauth/authorize", mode.base_url());
        let url = url::Url::parse_with_params(
            &base,
            &[
                ("code", "true"),
                ("client_id", CLIENT_ID),
                ("response_type", "code"),
                ("redirect_uri", REDIRECT_URI),
                ("scope", SCOPES),
                ("code_challenge", pkce.challenge.as_str()),
                ("code_challenge_method", "S256"),
                ("state", pkce.verifier.as_str()),
            ],
        )
        .map_err(|e| Error::Config(format!("invalid authorization URL: {}", e)))?;
        Ok(url.into())
    }

    /// Exchange a pasted `code#state` string for a credential.
    pub async fn exchange_code(&self, code_with_state: &str, pkce: &Pkce) -> Result<Credential> {
        let (code, verifier) = split_code(code_with_state, &pkce.verifier);
        if code.is_empty() {
            return Err(Error::Auth("empty authorization code".to_string()));
        }
        let body = json!({
            "code": code,
            "state": verifier,
            "grant_type": "authorization_code",
            "client_id": CLIENT_ID,
            "redirect_uri": REDIRECT_URI,
            "code_verifier": verifier,
        });
        self.post_token(body, "Token exchange").await
    }

    async fn post_token(&self, body: Value, what: &str) -> Result<Credential> {
        let response = self
            .http
            .post(&self.token_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Auth(format!("{} failed: {}", what, e)))?;

        let status = response.status();
        let raw = response.text().await.unwrap_or_default();
        if !status.is_success() {
            error!(status = %status, "{} rejected", what);
            return Err(Error::Auth(format!("{} failed ({}): {}", what, status, raw)));
        }

        let token: TokenResponse = serde_json::from_str(&raw)
            .map_err(|e| Error::Auth(format!("{} returned an unexpected body: {}", what, e)))?;
        info!("{} succeeded", what);
        Ok(token.into_credential(chrono::Utc::now().timestamp_millis()))
    }
}

impl Default for OAuthClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenEndpoint for OAuthClient {
    async fn refresh(&self, refresh_token: &str) -> Result<Credential> {
        let body = json!({
            "grant_type": "refresh_token",
            "client_id": CLIENT_ID,
            "refresh_token": refresh_token,
        });
        self.post_token(body, "Token refresh").await
    }
}

/// Split `code#state`; the state, when present, is the verifier to send back.
fn split_code<'a>(input: &'a str, fallback_verifier: &'a str) -> (&'a str, &'a str) {
    let input = input.trim();
    match input.split_once('#') {
        Some((code, state)) if !state.is_empty() => (code, state),
        Some((code, _)) => (code, fallback_verifier),
        None => (input, fallback_verifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pkce_challenge_is_s256_of_verifier() {
        // RFC 7636 appendix B
        let pkce = Pkce::from_verifier("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk".to_string());
        assert_eq!(pkce.challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_pkce_generate_shape() {
        let pkce = Pkce::generate();
        assert_eq!(pkce.verifier.len(), 43);
        assert!(!pkce.verifier.contains('='));
        assert_ne!(pkce.verifier, Pkce::generate().verifier);
    }

    #[test]
    fn test_authorization_url() {
        let pkce = Pkce::from_verifier("verifier".to_string());
        let client = OAuthClient::new();

        let max = client.authorization_url(AuthMode::Max, &pkce).unwrap();
        assert!(max.starts_with("https://claude.ai/oauth/authorize?code=true&client_id="));
        let parsed = url::Url::parse(&max).unwrap();
        let params: std::collections::HashMap<_, _> = parsed.query_pairs().into_owned().collect();
        assert_eq!(params["scope"], SCOPES);
        assert_eq!(params["state"], "verifier");
        assert_eq!(params["code_challenge"], pkce.challenge);
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["redirect_uri"], REDIRECT_URI);

        let console = client.authorization_url(AuthMode::Console, &pkce).unwrap();
        assert!(console.starts_with("https://console.anthropic.com/oauth/authorize?"));
    }

    #[test]
    fn test_split_code() {
        assert_eq!(split_code("abc#xyz", "v"), ("abc", "xyz"));
        assert_eq!(split_code("  abc \n", "v"), ("abc", "v"));
        assert_eq!(split_code("abc#", "v"), ("abc", "v"));
    }

    #[test]
    fn test_auth_mode_from_str() {
        assert_eq!("MAX".parse::<AuthMode>().unwrap(), AuthMode::Max);
        assert_eq!("console".parse::<AuthMode>().unwrap(), AuthMode::Console);
        assert!("team".parse::<AuthMode>().is_err());
    }

    #[test]
    fn test_token_response_into_credential() {
        let token: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","refresh_token":"r","expires_in":60}"#).unwrap();
        let cred = token.into_credential(1_000);
        assert_eq!(cred.expires_at, 61_000);
        assert_eq!(cred.token_type, "Bearer");
        assert_eq!(cred.refresh_token.as_deref(), Some("r"));
    }

    #[test]
    fn test_huge_expires_in_saturates() {
        let token: TokenResponse = serde_json::from_value(serde_json::json!({
            "access_token": "a",
            "expires_in": i64::MAX
        }))
        .unwrap();
        let cred = token.into_credential(1_700_000_000_000);
        assert_eq!(cred.expires_at, i64::MAX);
        assert!(!cred.expires_within(1_700_000_000_000, 60_000));
    }
}
