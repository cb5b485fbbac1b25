use browser_ai_core::Paths;
use browser_ai_providers::{AuthMode, CredentialStore, OAuthClient, Pkce};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Interactive OAuth login: print the URL, read the pasted code, store the credential.
pub async fn login(mode: AuthMode) -> anyhow::Result<()> {
    let paths = Paths::new();
    let store = CredentialStore::from_paths(&paths);
    let oauth = OAuthClient::new();
    let pkce = Pkce::generate();
    let url = oauth.authorization_url(mode, &pkce)?;

    println!();
    println!("🔐 Open this URL in your browser to authorize browser-ai:");
    println!();
    println!("  {}", url);
    println!();
    println!("Paste the authorization code here:");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let code = lines
        .next_line()
        .await?
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty())
        .ok_or_else(|| anyhow::anyhow!("No authorization code entered"))?;

    let credential = oauth.exchange_code(&code, &pkce).await?;
    store.save(&credential)?;

    println!("✅ Authenticated. Credential saved to {}", store.path().display());
    Ok(())
}

pub fn logout() -> anyhow::Result<()> {
    let store = CredentialStore::from_paths(&Paths::new());
    store.clear()?;
    println!("Logged out. Removed {}", store.path().display());
    Ok(())
}
