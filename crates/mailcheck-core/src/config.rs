//! Verifier configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use mailcheck_probe::ProbeConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::Result;

/// Settings for verification runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    /// Upper bound in seconds for each server check.
    pub timeout_secs: u64,
    /// Name announced in SMTP EHLO.
    pub client_hostname: String,
    /// Certificate-trust restarts allowed in one run.
    pub max_certificate_restarts: u32,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            client_hostname: "localhost".to_string(),
            max_certificate_restarts: 3,
        }
    }
}

impl VerifierConfig {
    /// Default location: `<config dir>/mailcheck/verifier.json`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("mailcheck")
            .join("verifier.json")
    }

    /// Loads configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path).await?;
        let config = serde_json::from_str(&contents)?;
        debug!("Loaded verifier config from {:?}", path);
        Ok(config)
    }

    /// Loads from [`default_path`](Self::default_path), or returns the
    /// defaults if there is no file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_default() -> Result<Self> {
        let path = Self::default_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load(&path).await
    }

    /// Writes configuration as pretty JSON, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, contents).await?;
        info!("Verifier config saved to {:?}", path);
        Ok(())
    }

    /// Probe settings derived from this configuration.
    #[must_use]
    pub fn probe_config(&self) -> ProbeConfig {
        ProbeConfig {
            timeout: Duration::from_secs(self.timeout_secs),
            client_hostname: self.client_hostname.clone(),
        }
    }
}
