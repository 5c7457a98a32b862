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

//! Watches the config directory and every registered repository directory,
//! reconciling the Repository Store as files are renamed or deleted and as
//! the dirs-file itself changes.
//!
//! The kernel's own rename-cookie pairing (what the original implementation
//! buffers and joins by hand) is handled for us here by the `notify` crate,
//! whose `RenameMode::Both/From/To` already distinguishes a matched rename
//! from an orphaned half.

use crate::config::ConfigRegistry;
use crate::constants::DIRS_FILE_NAME;
use crate::error::{UfaError, UfaResult};
use crate::repo::RepoCache;
use crossbeam::channel::{bounded, select, Receiver, Sender};
use log::{debug, error, warn};
use notify::event::{ModifyKind, RemoveKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::JoinHandle;

const REACTOR_TAG: &str = "watch-reactor";

struct RunningState {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// The kernel file-events reactor. `start`/`stop` form a strictly one-shot
/// lifecycle: a reactor that has been stopped must be reconstructed to run
/// again.
pub struct Reactor {
    config_dir: PathBuf,
    cache: Arc<RepoCache>,
    registry: Arc<ConfigRegistry>,
    current_dirs: Arc<Mutex<HashSet<PathBuf>>>,
    state: Mutex<Option<RunningState>>,
}

impl Reactor {
    pub fn new(config_dir: PathBuf, cache: Arc<RepoCache>, registry: Arc<ConfigRegistry>) -> Self {
        Self {
            config_dir,
            cache,
            registry,
            current_dirs: Arc::new(Mutex::new(HashSet::new())),
            state: Mutex::new(None),
        }
    }

    /// The repository directories currently under watch.
    pub fn current_dirs(&self) -> Vec<PathBuf> {
        self.current_dirs.lock().iter().cloned().collect()
    }

    pub fn start(&self) -> UfaResult<()> {
        let mut guard = self.state.lock();
        if guard.is_some() {
            return Ok(());
        }

        let (event_tx, event_rx): (Sender<Event>, Receiver<Event>) = bounded(1024);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res
        {
            Ok(event) => {
                let _ = event_tx.send(event);
            }
            Err(e) => error!(target: REACTOR_TAG, "Watcher error: {:?}", e),
        })?;

        watcher.watch(&self.config_dir, RecursiveMode::NonRecursive)?;

        let initial: HashSet<PathBuf> = self.registry.list()?.into_iter().collect();
        for dir in &initial {
            if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
                warn!(target: REACTOR_TAG, "Couldn't watch {:?}: {:?}", dir, e);
            }
        }
        *self.current_dirs.lock() = initial;

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let config_dir = self.config_dir.clone();
        let cache = self.cache.clone();
        let registry = self.registry.clone();
        let current_dirs = self.current_dirs.clone();

        let handle = std::thread::spawn(move || {
            // `watcher` is moved in here so its watches are released the moment this
            // thread (and therefore the reactor) exits.
            let _watcher_owner = &mut watcher;
            debug!(target: REACTOR_TAG, "Reader thread starting");
            loop {
                select! {
                    recv(event_rx) -> msg => {
                        match msg {
                            Ok(event) => handle_event(event, &config_dir, &cache, &registry, &current_dirs, &mut watcher),
                            Err(_) => break,
                        }
                    }
                    recv(stop_rx) -> _ => break,
                }
            }
            debug!(target: REACTOR_TAG, "Reader thread exiting");
        });

        *guard = Some(RunningState { stop_tx, handle });
        Ok(())
    }

    pub fn stop(&self) {
        let state = self.state.lock().take();
        if let Some(state) = state {
            let _ = state.stop_tx.send(());
            let _ = state.handle.join();
        }
        self.current_dirs.lock().clear();
    }
}

fn handle_event(
    event: Event,
    config_dir: &Path,
    cache: &RepoCache,
    registry: &ConfigRegistry,
    current_dirs: &Mutex<HashSet<PathBuf>>,
    watcher: &mut RecommendedWatcher,
) {
    match event.kind {
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => {
            reconcile_rename(&event.paths[0], Some(&event.paths[1]), cache);
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            if let Some(from) = event.paths.first() {
                reconcile_rename(from, None, cache);
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            // Rename(null, to): no prior metadata, nothing to reconcile.
        }
        EventKind::Remove(RemoveKind::File) | EventKind::Remove(RemoveKind::Any) => {
            for path in &event.paths {
                reconcile_delete(path, cache);
            }
        }
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            for path in &event.paths {
                if path.parent() == Some(config_dir)
                    && path.file_name().map(|n| n == DIRS_FILE_NAME).unwrap_or(false)
                {
                    reconcile_config(registry, current_dirs, watcher);
                }
            }
        }
        _ => {}
    }
}

fn reconcile_rename(from: &Path, to: Option<&Path>, cache: &RepoCache) {
    let from_dir = match from.parent() {
        Some(d) => d,
        None => return,
    };
    let from_name = match from.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return,
    };

    match to {
        Some(to) => {
            let to_dir = match to.parent() {
                Some(d) => d,
                None => return,
            };
            let to_name = match to.file_name().and_then(|n| n.to_str()) {
                Some(n) => n,
                None => return,
            };

            if from_dir == to_dir {
                if let Some(store) = cache.get_if_open(from_dir) {
                    report(store.rename_file(from_name, to_name));
                }
            } else {
                // cross-repository rename: delete from source, no-op on destination
                // (see the Design Notes quirk on non-atomic cross-repo rename).
                if let Some(store) = cache.get_if_open(from_dir) {
                    report(store.remove_file(from_name));
                }
            }
        }
        None => {
            if let Some(store) = cache.get_if_open(from_dir) {
                report(store.remove_file(from_name));
            }
        }
    }
}

fn reconcile_delete(path: &Path, cache: &RepoCache) {
    let dir = match path.parent() {
        Some(d) => d,
        None => return,
    };
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return,
    };
    if let Some(store) = cache.get_if_open(dir) {
        report(store.remove_file(name));
    }
}

fn reconcile_config(registry: &ConfigRegistry, current_dirs: &Mutex<HashSet<PathBuf>>, watcher: &mut RecommendedWatcher) {
    let new_set: HashSet<PathBuf> = match registry.reload() {
        Ok(dirs) => dirs.into_iter().collect(),
        Err(e) => {
            error!(target: REACTOR_TAG, "Couldn't reload config: {:?}", e);
            return;
        }
    };

    let mut cur = current_dirs.lock();
    let adds: Vec<PathBuf> = new_set.difference(&cur).cloned().collect();
    let removes: Vec<PathBuf> = cur.difference(&new_set).cloned().collect();

    for dir in &adds {
        debug!(target: REACTOR_TAG, "Adding watcher for {:?}", dir);
        if let Err(e) = watcher.watch(dir, RecursiveMode::NonRecursive) {
            warn!(target: REACTOR_TAG, "Couldn't watch {:?}: {:?}", dir, e);
        }
    }
    for dir in &removes {
        debug!(target: REACTOR_TAG, "Removing watcher for {:?}", dir);
        if let Err(e) = watcher.unwatch(dir) {
            warn!(target: REACTOR_TAG, "Couldn't unwatch {:?}: {:?}", dir, e);
        }
    }

    *cur = new_set;
}

fn report(result: UfaResult<()>) {
    match result {
        Ok(()) => {}
        // a delete/rename of an untracked file is normal, not an error worth surfacing
        Err(UfaError::FileNotInDb(path)) => {
            debug!(target: REACTOR_TAG, "Ignoring event for untracked file {}", path);
        }
        Err(e) => error!(target: REACTOR_TAG, "Reconciliation failed: {:?}", e),
    }
}
