/*
 * ufa
 * Copyright (C) 2020 Henrique Teofilo
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <http://www.gnu.org/licenses/>.
 */

use crate::error::UfaResult;
use crate::repo::store::Store;
use log::debug;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const CACHE_TAG: &str = "repo-cache";

/// Process-wide mapping from absolute repository path to an open `Store`.
/// Entries are never evicted; the cache lives for the process lifetime.
#[derive(Default)]
pub struct RepoCache {
    stores: Mutex<HashMap<PathBuf, Arc<Store>>>,
}

impl RepoCache {
    pub fn new() -> Self {
        Self {
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the cached store for `repo_dir`, opening (and initializing) it
    /// if this is the first time it's been seen.
    pub fn get(&self, repo_dir: &Path) -> UfaResult<Arc<Store>> {
        let key = repo_dir
            .canonicalize()
            .unwrap_or_else(|_| repo_dir.to_path_buf());

        let mut guard = self.stores.lock();
        if let Some(store) = guard.get(&key) {
            return Ok(store.clone());
        }

        debug!(target: CACHE_TAG, "Opening repository {:?}", key);
        let store = Arc::new(Store::open(&key)?);
        guard.insert(key, store.clone());
        Ok(store)
    }

    /// Returns the cached store only if it has already been opened, without
    /// touching disk. Used by the reactor, which must never create a
    /// repository that a rename/delete event merely mentions in passing.
    pub fn get_if_open(&self, repo_dir: &Path) -> Option<Arc<Store>> {
        let key = repo_dir
            .canonicalize()
            .unwrap_or_else(|_| repo_dir.to_path_buf());
        self.stores.lock().get(&key).cloned()
    }

    pub fn len(&self) -> usize {
        self.stores.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn lazily_opens_and_reuses() {
        let dir = tempdir().unwrap();
        let cache = RepoCache::new();
        assert!(cache.is_empty());

        let a = cache.get(dir.path()).unwrap();
        let b = cache.get(dir.path()).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(cache.len(), 1);
    }
}
