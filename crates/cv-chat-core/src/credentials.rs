//! Persistent storage for the OpenAI API key.
//!
//! The key lives in the `openai_api_key` field of the config file so it
//! survives restarts. Other config fields are preserved on save.

use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::config::Config;

pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Store backed by the default config file location
    pub fn open_default() -> Result<Self> {
        Ok(Self::at(Config::get_config_path()?))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The stored key, if any. An unreadable config file counts as no key.
    pub fn get(&self) -> Option<String> {
        match Config::load_from(&self.path) {
            Ok(config) => config.openai_api_key.filter(|k| !k.trim().is_empty()),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read stored credential");
                None
            }
        }
    }

    /// Persist the trimmed key. Blank input leaves the stored key untouched
    /// and returns `Ok(None)`; otherwise the saved value is returned.
    /// A config file that exists but cannot be parsed is left alone and
    /// reported as an error.
    pub fn set(&self, raw: &str) -> Result<Option<String>> {
        let key = raw.trim();
        if key.is_empty() {
            debug!("ignoring blank credential");
            return Ok(None);
        }

        let mut config = Config::load_from(&self.path)
            .with_context(|| format!("Failed to read config at {}", self.path.display()))?;
        config.openai_api_key = Some(key.to_string());
        config.save_to(&self.path)?;
        debug!(path = %self.path.display(), "credential saved");

        Ok(Some(key.to_string()))
    }
}
