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

//! Reads and writes the list of watched repository directories from the
//! dirs-file under the user config directory.

use crate::constants::{DIRS_FILE_HEADER, DIRS_FILE_NAME};
use crate::error::{UfaError, UfaResult};
use log::{debug, warn};
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::io::Write;
use std::path::{Path, PathBuf};

const CONFIG_TAG: &str = "config-registry";

/// Process-wide owner of the dirs-file's in-memory list. Guarded by a single
/// recursive mutex per the concurrency model: every read and mutate operation
/// takes it, and reload rewrites the list under the lock while readers keep a
/// deep copy taken before unlocking.
pub struct ConfigRegistry {
    config_dir: PathBuf,
    // `None` means "not loaded yet"; reload() populates it.
    cache: ReentrantMutex<RefCell<Option<Vec<PathBuf>>>>,
}

impl ConfigRegistry {
    pub fn new(config_dir: PathBuf) -> Self {
        Self {
            config_dir,
            cache: ReentrantMutex::new(RefCell::new(None)),
        }
    }

    pub fn dirs_file(&self) -> PathBuf {
        self.config_dir.join(DIRS_FILE_NAME)
    }

    fn ensure_config_dir(&self) -> UfaResult<()> {
        if self.config_dir.exists() {
            return Ok(());
        }
        let parent = self
            .config_dir
            .parent()
            .ok_or_else(|| UfaError::NotDir(self.config_dir.display().to_string()))?;
        if !parent.exists() {
            return Err(UfaError::NotDir(format!(
                "base config directory {} does not exist",
                parent.display()
            )));
        }
        std::fs::create_dir_all(&self.config_dir)?;
        Ok(())
    }

    fn seed_if_missing(&self) -> UfaResult<()> {
        self.ensure_config_dir()?;
        let path = self.dirs_file();
        if !path.exists() {
            debug!(target: CONFIG_TAG, "Seeding dirs-file at {:?}", path);
            std::fs::write(&path, DIRS_FILE_HEADER)?;
        }
        Ok(())
    }

    fn read_raw(&self) -> UfaResult<Vec<PathBuf>> {
        self.seed_if_missing()?;
        let contents = std::fs::read_to_string(self.dirs_file())?;
        Ok(contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(PathBuf::from)
            .collect())
    }

    fn write_raw(&self, entries: &[PathBuf]) -> UfaResult<()> {
        self.seed_if_missing()?;
        let mut out = String::from(DIRS_FILE_HEADER);
        for entry in entries {
            out.push_str(&entry.display().to_string());
            out.push('\n');
        }
        let mut f = std::fs::File::create(self.dirs_file())?;
        f.write_all(out.as_bytes())?;
        Ok(())
    }

    /// Forces a re-read of the dirs-file, replacing the cache. Returns the
    /// directories that currently exist on disk, same as `list()`.
    pub fn reload(&self) -> UfaResult<Vec<PathBuf>> {
        let guard = self.cache.lock();
        let raw = self.read_raw()?;
        *guard.borrow_mut() = Some(raw.clone());
        Ok(Self::existing_only(&raw))
    }

    /// Returns the watched directories in file order, filtered to those that
    /// currently exist. Uses the cached list unless nothing has been loaded yet.
    pub fn list(&self) -> UfaResult<Vec<PathBuf>> {
        let guard = self.cache.lock();
        if let Some(cached) = guard.borrow().as_ref() {
            return Ok(Self::existing_only(cached));
        }
        drop(guard);
        self.reload()
    }

    fn existing_only(entries: &[PathBuf]) -> Vec<PathBuf> {
        entries.iter().filter(|p| p.is_dir()).cloned().collect()
    }

    /// Appends `dir` if not already present; idempotent.
    pub fn add(&self, dir: &Path) -> UfaResult<()> {
        let normalized = normalize(dir);
        let guard = self.cache.lock();
        let mut raw = self.read_raw()?;
        if !raw.iter().any(|p| p == &normalized) {
            raw.push(normalized);
            self.write_raw(&raw)?;
        }
        *guard.borrow_mut() = Some(raw);
        Ok(())
    }

    /// Drops the first entry equal to `dir`; idempotent when absent.
    pub fn remove(&self, dir: &Path) -> UfaResult<()> {
        let normalized = normalize(dir);
        let guard = self.cache.lock();
        let mut raw = self.read_raw()?;
        if let Some(pos) = raw.iter().position(|p| p == &normalized) {
            raw.remove(pos);
            self.write_raw(&raw)?;
        } else {
            warn!(target: CONFIG_TAG, "Remove of absent directory {:?}, ignoring", normalized);
        }
        *guard.borrow_mut() = Some(raw);
        Ok(())
    }
}

fn normalize(dir: &Path) -> PathBuf {
    dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn add_remove_are_idempotent() {
        let base = tempdir().unwrap();
        let config_dir = base.path().join("config");
        let watched = tempdir().unwrap();

        let registry = ConfigRegistry::new(config_dir);
        registry.add(watched.path()).unwrap();
        registry.add(watched.path()).unwrap();
        assert_eq!(registry.list().unwrap().len(), 1);

        registry.remove(watched.path()).unwrap();
        registry.remove(watched.path()).unwrap();
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn list_filters_missing_directories() {
        let base = tempdir().unwrap();
        let config_dir = base.path().join("config");
        let gone = base.path().join("gone");
        std::fs::create_dir(&gone).unwrap();

        let registry = ConfigRegistry::new(config_dir);
        registry.add(&gone).unwrap();
        assert_eq!(registry.list().unwrap(), vec![gone.canonicalize().unwrap()]);

        std::fs::remove_dir(&gone).unwrap();
        registry.reload().unwrap();
        assert!(registry.list().unwrap().is_empty());
    }

    #[test]
    fn fails_without_base_config_dir() {
        let config_dir = PathBuf::from("/nonexistent-parent-dir-for-ufa-tests/config");
        let registry = ConfigRegistry::new(config_dir);
        match registry.list() {
            Err(UfaError::NotDir(_)) => {}
            other => panic!("expected NotDir, got {:?}", other.map(|_| ())),
        }
    }
}
