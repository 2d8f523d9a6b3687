//! Per-user daily targets persistence with file locking.
//!
//! Targets are stored as one JSON document keyed by user id. Users without
//! saved targets get the defaults.

use crate::fsutil::{read_shared, write_atomic};
use crate::{Result, TargetSet, UserId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::Path;

/// All users' saved targets
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TargetStore {
    #[serde(default)]
    pub users: BTreeMap<UserId, TargetSet>,
}

impl TargetStore {
    /// Targets for `user`, falling back to defaults when unset
    pub fn targets_for(&self, user: &UserId) -> TargetSet {
        self.users.get(user).cloned().unwrap_or_default()
    }

    pub fn set(&mut self, user: UserId, targets: TargetSet) {
        self.users.insert(user, targets);
    }

    /// Load all targets. A missing, unreadable or corrupted file yields
    /// an empty store, so every user sees the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let parsed = match read_shared(path) {
            Ok(contents) => {
                serde_json::from_str::<TargetStore>(&contents).map_err(|e| e.to_string())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No targets file at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(e) => Err(e.to_string()),
        };

        Ok(parsed.unwrap_or_else(|e| {
            tracing::warn!("Ignoring targets file {:?}: {}", path, e);
            Self::default()
        }))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        write_atomic(path, contents.as_bytes())?;
        tracing::debug!("Saved targets for {} users to {:?}", self.users.len(), path);
        Ok(())
    }

    /// Load, modify one user's targets, and save back
    pub fn update<F>(path: &Path, user: &UserId, f: F) -> Result<TargetSet>
    where
        F: FnOnce(&mut TargetSet),
    {
        let mut store = Self::load(path)?;
        let mut targets = store.targets_for(user);
        f(&mut targets);
        store.set(user.clone(), targets.clone());
        store.save(path)?;
        tracing::info!("Updated targets for {}", user);
        Ok(targets)
    }
}
