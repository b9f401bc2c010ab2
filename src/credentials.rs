//! Credential bundle loaded from the operator's JSON file.
//!
//! ```json
//! {
//!   "open_ai_key": "sk-...",
//!   "shotgun": {
//!     "website": "https://studio.shotgrid.autodesk.com",
//!     "script_name": "render_critic",
//!     "api_key": "..."
//!   }
//! }
//! ```

use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub type CredentialResult<T> = Result<T, CredentialError>;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("cannot read credentials file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed credentials file {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("credentials file has no value for `{0}`")]
    Missing(&'static str),
}

/// Shotgrid script credentials
#[derive(Clone, Deserialize)]
pub struct ShotgridCredentials {
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub script_name: String,
    #[serde(default)]
    pub api_key: String,
}

impl fmt::Debug for ShotgridCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShotgridCredentials")
            .field("website", &self.website)
            .field("script_name", &self.script_name)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

/// Credentials for both services. Read once per invocation, never mutated.
#[derive(Clone, Deserialize)]
pub struct CredentialBundle {
    #[serde(default)]
    open_ai_key: Option<String>,
    #[serde(default)]
    shotgun: Option<ShotgridCredentials>,
}

impl fmt::Debug for CredentialBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialBundle")
            .field("open_ai_key", &self.open_ai_key.as_ref().map(|_| "<redacted>"))
            .field("shotgun", &self.shotgun)
            .finish()
    }
}

impl CredentialBundle {
    /// Load and parse the credentials file. There are no fallback credentials.
    pub fn load(path: impl AsRef<Path>) -> CredentialResult<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| CredentialError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw).map_err(|source| CredentialError::Malformed {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// API key for the completion service
    pub fn completion_key(&self) -> CredentialResult<&str> {
        self.open_ai_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(CredentialError::Missing("open_ai_key"))
    }

    /// Shotgrid credentials, with every member present
    pub fn tracking(&self) -> CredentialResult<&ShotgridCredentials> {
        let sg = self
            .shotgun
            .as_ref()
            .ok_or(CredentialError::Missing("shotgun"))?;
        if sg.website.trim().is_empty() {
            return Err(CredentialError::Missing("shotgun.website"));
        }
        if sg.script_name.trim().is_empty() {
            return Err(CredentialError::Missing("shotgun.script_name"));
        }
        if sg.api_key.trim().is_empty() {
            return Err(CredentialError::Missing("shotgun.api_key"));
        }
        Ok(sg)
    }
}
