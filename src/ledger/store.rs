use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{MarketError, Result};

use super::LedgerState;

/// Persistence seam for the marketplace ledger.
///
/// The only contract is logical round-trip equality: `write_snapshot(S)`
/// followed by `read_snapshot()` yields a state equal to S, and a missing
/// or reset snapshot reads back as empty queues for every catalog product.
/// Each operation runs whole; interleaving is prevented by the caller's
/// dispatch loop plus the store's own critical section.
pub trait SnapshotStore: Send + Sync {
    fn read_snapshot(&self) -> Result<LedgerState>;
    fn write_snapshot(&self, state: &LedgerState) -> Result<()>;
    fn reset_snapshot(&self) -> Result<()>;
}

/// Whole-file JSON snapshot, overwritten on every mutation.
pub struct JsonFileStore {
    path: PathBuf,
    // Per-process critical section around the read-modify-write cycle.
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, ()>> {
        self.lock
            .lock()
            .map_err(|e| MarketError::Concurrency(format!("Snapshot lock poisoned: {}", e)))
    }
}

impl SnapshotStore for JsonFileStore {
    fn read_snapshot(&self) -> Result<LedgerState> {
        let _guard = self.guard()?;
        if !self.path.exists() {
            return Ok(LedgerState::empty());
        }
        let text = std::fs::read_to_string(&self.path)?;
        if text.trim().is_empty() {
            return Ok(LedgerState::empty());
        }
        let state = serde_json::from_str(&text)?;
        Ok(state)
    }

    fn write_snapshot(&self, state: &LedgerState) -> Result<()> {
        let _guard = self.guard()?;
        let text = serde_json::to_string_pretty(state)?;
        std::fs::write(&self.path, text)?;
        Ok(())
    }

    fn reset_snapshot(&self) -> Result<()> {
        let _guard = self.guard()?;
        std::fs::write(&self.path, "")?;
        Ok(())
    }
}

/// In-memory snapshot store for bootstrap checks and tests.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<Option<LedgerState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SnapshotStore for MemoryStore {
    fn read_snapshot(&self) -> Result<LedgerState> {
        let guard = self
            .state
            .lock()
            .map_err(|e| MarketError::Concurrency(format!("Snapshot lock poisoned: {}", e)))?;
        Ok(guard.clone().unwrap_or_else(LedgerState::empty))
    }

    fn write_snapshot(&self, state: &LedgerState) -> Result<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| MarketError::Concurrency(format!("Snapshot lock poisoned: {}", e)))?;
        *guard = Some(state.clone());
        Ok(())
    }

    fn reset_snapshot(&self) -> Result<()> {
        let mut guard = self
            .state
            .lock()
            .map_err(|e| MarketError::Concurrency(format!("Snapshot lock poisoned: {}", e)))?;
        *guard = None;
        Ok(())
    }
}
