//! Persisted client state
//!
//! A small JSON document with the last dialed destination under `lastTo`.
//! Writes go to a sibling temp file first and are renamed into place.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClientError, ClientResult};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientState {
    #[serde(rename = "lastTo", default, skip_serializing_if = "Option::is_none")]
    pub last_to: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClientStateStore {
    path: PathBuf,
}

impl ClientStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `<data_dir>/voicehub/state.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join("voicehub").join("state.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current state; a missing file is an empty state
    pub fn load(&self) -> ClientResult<ClientState> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ClientState::default()),
            Err(e) => return Err(ClientError::storage(format!("read {}: {}", self.path.display(), e))),
        };
        serde_json::from_str(&raw).map_err(|e| ClientError::storage(format!("parse {}: {}", self.path.display(), e)))
    }

    pub fn save(&self, state: &ClientState) -> ClientResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ClientError::storage(format!("create {}: {}", parent.display(), e)))?;
        }
        let raw = serde_json::to_string_pretty(state).map_err(|e| ClientError::storage(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, raw).map_err(|e| ClientError::storage(format!("write {}: {}", tmp.display(), e)))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| ClientError::storage(format!("rename into {}: {}", self.path.display(), e)))?;
        debug!(path = %self.path.display(), "client state saved");
        Ok(())
    }

    pub fn last_destination(&self) -> ClientResult<Option<String>> {
        Ok(self.load()?.last_to.filter(|to| !to.is_empty()))
    }

    pub fn set_last_destination(&self, to: &str) -> ClientResult<()> {
        let mut state = self.load().unwrap_or_default();
        state.last_to = Some(to.to_string());
        self.save(&state)
    }
}
