//! Opportunistic state persistence.
//!
//! When `PERSISTENT_DIR` is configured, the full exchange state is written
//! to `state.json` after every mutation and loaded back at startup. Writes
//! are best-effort: failures are logged and never fail the originating
//! request.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::identity::IdentityService;
use crate::ledger::LedgerSnapshot;
use crate::legacy::LegacyBoard;
use crate::orderbook::BookSnapshot;

/// Schema version of the persisted state file.
const STATE_FORMAT_VERSION: u32 = 1;

const STATE_FILE: &str = "state.json";

/// Everything the server needs to resume where it left off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    /// Schema version for forward compatibility.
    pub version: u32,
    /// Users, tokens and collateral limits.
    pub identity: IdentityService,
    /// Trade log and balances.
    pub ledger: LedgerSnapshot,
    /// All orders, terminal included.
    pub book: BookSnapshot,
    /// Legacy listing board.
    pub legacy: LegacyBoard,
}

impl PersistedState {
    /// Wrap current component state under the current schema version.
    pub fn new(
        identity: IdentityService,
        ledger: LedgerSnapshot,
        book: BookSnapshot,
        legacy: LegacyBoard,
    ) -> Self {
        PersistedState {
            version: STATE_FORMAT_VERSION,
            identity,
            ledger,
            book,
            legacy,
        }
    }
}

/// File-backed store for [`PersistedState`].
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// A store writing to `<dir>/state.json`.
    pub fn new(dir: &Path) -> Self {
        StateStore {
            path: dir.join(STATE_FILE),
        }
    }

    /// Load the persisted state, if a readable snapshot exists.
    ///
    /// Unreadable or incompatible files are logged and ignored; the server
    /// then starts empty.
    pub fn load(&self) -> Option<PersistedState> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!(path = %self.path.display(), %err, "could not read state file");
                return None;
            }
        };
        match serde_json::from_slice::<PersistedState>(&raw) {
            Ok(state) if state.version == STATE_FORMAT_VERSION => {
                info!(path = %self.path.display(), "restored persisted state");
                Some(state)
            }
            Ok(state) => {
                warn!(
                    found = state.version,
                    expected = STATE_FORMAT_VERSION,
                    "state file version mismatch, starting empty"
                );
                None
            }
            Err(err) => {
                warn!(path = %self.path.display(), %err, "could not parse state file");
                None
            }
        }
    }

    /// Write the state snapshot, logging failures instead of surfacing them.
    pub fn save(&self, state: &PersistedState) {
        let serialized = match serde_json::to_vec(state) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!(%err, "could not serialize state");
                return;
            }
        };
        if let Some(parent) = self.path.parent()
            && let Err(err) = fs::create_dir_all(parent)
        {
            warn!(path = %parent.display(), %err, "could not create state dir");
            return;
        }
        if let Err(err) = fs::write(&self.path, serialized) {
            warn!(path = %self.path.display(), %err, "could not write state file");
        }
    }
}
