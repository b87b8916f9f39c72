use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_derive::{Deserialize, Serialize};
use tracing::warn;

use crate::detect::UpdateDelta;

/// The last successfully applied addresses. This is the only durable entity
/// in the program; it lives in a small JSON cache file and is overwritten
/// as a whole after a run that dispatched at least one update.
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    pub ipv4: Option<Box<str>>,

    pub ipv6_prefix: Option<Box<str>>,

    /// Unix timestamp (seconds) of the run that last changed an address.
    pub last_set_at: Option<u64>,
}

impl PersistedState {
    /// The state after applying `delta` on top of `self`. Fields the delta
    /// does not carry keep their stored value.
    pub fn applied(&self, delta: &UpdateDelta, now: u64) -> Self {
        Self {
            ipv4: delta.ipv4.clone().or_else(|| self.ipv4.clone()),
            ipv6_prefix: delta
                .ipv6_prefix
                .clone()
                .or_else(|| self.ipv6_prefix.clone()),
            last_set_at: Some(now),
        }
    }
}

pub fn unix_now() -> u64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs(),
        Err(_) => 0,
    }
}

pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the cached state. A missing cache file is the normal first-run
    /// situation and yields the zero-valued state; an unreadable or corrupt
    /// file is logged and treated the same way.
    pub fn load(&self) -> PersistedState {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return PersistedState::default(),
            Err(e) => {
                warn!("unable to open cache file {}: {}", self.path.display(), e);
                return PersistedState::default();
            }
        };

        match serde_json::from_reader(BufReader::new(file)) {
            Ok(state) => state,
            Err(e) => {
                warn!(
                    "discarding unreadable cache file {}: {}",
                    self.path.display(),
                    e
                );
                PersistedState::default()
            }
        }
    }

    /// Full overwrite via write-temp-then-rename, so a concurrent reader
    /// never observes a half-written file.
    pub fn save(&self, state: &PersistedState) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let json = serde_json::to_string_pretty(state)?;
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)
    }
}
