//! Review sessions: the explicit context a critique and publish run against.
//!
//! A session is a directory holding:
//! - `.session.json`: id, creation time and host
//! - `fields.json`: the operator's inputs and the stored critique
//! - `.lock`: advisory lock held while a critique or publish is in flight
//!
//! Sessions are removed on drop unless marked `keep`.

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::artifact::RenderArtifact;
use crate::critique::PromptPair;
use crate::selection::TrackingSelection;

const METADATA_FILE: &str = ".session.json";
const FIELDS_FILE: &str = "fields.json";
const LOCK_FILE: &str = ".lock";

pub type SessionResult<T> = Result<T, SessionError>;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt session fields at {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{0} is not a session directory")]
    NotASession(PathBuf),

    #[error("session {0} is busy with another critique or publish")]
    Busy(String),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SessionError + '_ {
    move |source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Operator inputs and stage outputs for one render
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionFields {
    pub credentials_path: Option<PathBuf>,
    pub render: Option<RenderArtifact>,
    pub prompts: PromptPair,
    /// Last successful critique; overwritten by each new run
    pub critique: Option<String>,
    pub description: String,
    pub tracking_enabled: bool,
    pub selection: TrackingSelection,
}

/// A review session with organized file management
#[derive(Debug)]
pub struct Session {
    /// Unique session ID
    pub id: String,
    /// Root directory for this session
    pub dir: PathBuf,
    /// Whether to keep files after session ends
    pub keep: bool,
}

/// Held for the duration of a critique or publish; released on drop
#[derive(Debug)]
pub struct SessionLock {
    file: File,
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl Session {
    /// Create a session with a name prefix under the base directory
    pub fn with_name(base: impl AsRef<Path>, name: &str) -> Self {
        let id = format!("{}_{}", sanitize_name(name), generate_timestamp_suffix());
        let dir = base.as_ref().join(&id);
        Self {
            id,
            dir,
            keep: false,
        }
    }

    /// Create a session in a specific directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        let id = dir
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(generate_session_id);
        Self {
            id,
            dir,
            keep: true,
        }
    }

    /// Open an existing, initialized session. Opened sessions are kept.
    pub fn open(dir: impl Into<PathBuf>) -> SessionResult<Self> {
        let session = Self::in_dir(dir);
        if !session.dir.join(METADATA_FILE).is_file() {
            return Err(SessionError::NotASession(session.dir.clone()));
        }
        Ok(session)
    }

    /// Set whether to keep files after session ends
    pub fn keep(mut self, keep: bool) -> Self {
        self.keep = keep;
        self
    }

    /// Create the directory, metadata and the initial fields
    pub fn init(&self, fields: &SessionFields) -> SessionResult<()> {
        fs::create_dir_all(&self.dir).map_err(io_err(&self.dir))?;

        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_default();
        let metadata = serde_json::json!({
            "id": self.id,
            "created": chrono::Utc::now().to_rfc3339(),
            "host": host,
        });
        let metadata_path = self.dir.join(METADATA_FILE);
        let raw = serde_json::to_string_pretty(&metadata).map_err(|source| SessionError::Corrupt {
            path: metadata_path.clone(),
            source,
        })?;
        fs::write(&metadata_path, raw).map_err(io_err(&metadata_path))?;

        self.save_fields(fields)
    }

    pub fn fields_path(&self) -> PathBuf {
        self.dir.join(FIELDS_FILE)
    }

    pub fn load_fields(&self) -> SessionResult<SessionFields> {
        let path = self.fields_path();
        let raw = fs::read_to_string(&path).map_err(io_err(&path))?;
        serde_json::from_str(&raw).map_err(|source| SessionError::Corrupt { path, source })
    }

    /// Write via a temporary file so readers never see a partial document
    pub fn save_fields(&self, fields: &SessionFields) -> SessionResult<()> {
        let path = self.fields_path();
        let tmp = self.dir.join(format!("{}.tmp", FIELDS_FILE));
        let raw = serde_json::to_string_pretty(fields).map_err(|source| SessionError::Corrupt {
            path: path.clone(),
            source,
        })?;
        fs::write(&tmp, raw).map_err(io_err(&tmp))?;
        fs::rename(&tmp, &path).map_err(io_err(&path))?;
        Ok(())
    }

    /// Take the session's exclusive lock without waiting
    pub fn lock(&self) -> SessionResult<SessionLock> {
        let path = self.dir.join(LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(io_err(&path))?;
        file.try_lock_exclusive()
            .map_err(|_| SessionError::Busy(self.id.clone()))?;
        Ok(SessionLock { file })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.keep {
            let _ = fs::remove_dir_all(&self.dir);
        }
    }
}

/// Generate a unique session ID
fn generate_session_id() -> String {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    let pid = std::process::id();
    format!("session_{}_{}", timestamp, pid)
}

/// Generate a timestamp suffix
fn generate_timestamp_suffix() -> String {
    chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string()
}

/// Sanitize a name for use in filenames
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' => c,
            _ => '_',
        })
        .collect()
}

/// Clean up sessions older than the specified duration
pub fn cleanup_old_sessions(base: impl AsRef<Path>, max_age: Duration) -> std::io::Result<usize> {
    let base = base.as_ref();
    if !base.exists() {
        return Ok(0);
    }

    let now = SystemTime::now();
    let mut cleaned = 0;

    for entry in fs::read_dir(base)? {
        let entry = entry?;
        let path = entry.path();
        if !path.join(METADATA_FILE).is_file() {
            continue;
        }

        let age = entry
            .metadata()
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| now.duration_since(modified).ok());
        if age.is_some_and(|age| age > max_age) && fs::remove_dir_all(&path).is_ok() {
            cleaned += 1;
        }
    }

    Ok(cleaned)
}

/// List all existing sessions
pub fn list_sessions(base: impl AsRef<Path>) -> std::io::Result<Vec<PathBuf>> {
    let base = base.as_ref();
    if !base.exists() {
        return Ok(Vec::new());
    }

    let mut sessions = Vec::new();
    for entry in fs::read_dir(base)? {
        let path = entry?.path();
        if path.join(METADATA_FILE).is_file() {
            sessions.push(path);
        }
    }
    sessions.sort();
    Ok(sessions)
}
