use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Paths {
    pub base: PathBuf,
}

impl Paths {
    pub fn new() -> Self {
        let base = dirs::home_dir()
            .map(|h| h.join(".local").join("browser-ai"))
            .unwrap_or_else(|| PathBuf::from(".browser-ai"));
        Self { base }
    }

    pub fn with_base(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn config_file(&self) -> PathBuf {
        self.base.join("config.json")
    }

    /// Stored OAuth credential.
    pub fn auth_file(&self) -> PathBuf {
        self.base.join("auth.json")
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_under_base() {
        let paths = Paths::with_base(PathBuf::from("/tmp/browser-ai-test"));
        assert_eq!(paths.config_file(), PathBuf::from("/tmp/browser-ai-test/config.json"));
        assert_eq!(paths.auth_file(), PathBuf::from("/tmp/browser-ai-test/auth.json"));
    }
}
