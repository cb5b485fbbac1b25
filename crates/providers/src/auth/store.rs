use std::path::{Path, PathBuf};

use browser_ai_core::{Credential, Paths, Result};
use tracing::{debug, warn};

/// JSON file holding the OAuth credential.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn from_paths(paths: &Paths) -> Self {
        Self::new(paths.auth_file())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` when the file is missing or unreadable; a corrupt file is
    /// treated as "not authenticated" rather than an error.
    pub fn load(&self) -> Option<Credential> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) => {
                debug!(path = %self.path.display(), error = %e, "No stored credential");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(cred) => Some(cred),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring malformed credential file");
                None
            }
        }
    }

    pub fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(credential)?;
        std::fs::write(&self.path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600))?;
        }

        debug!(path = %self.path.display(), "Credential saved");
        Ok(())
    }

    /// Remove the stored credential. Missing file is not an error.
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
