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

//! End-to-end Watcher Reactor scenarios (spec §8 scenarios 4 and 6): a real
//! `Reactor` watching real tempdir repositories and a real dirs-file.

use crate::common::TestRepo;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use ufa::config::ConfigRegistry;
use ufa::error::UfaError;
use ufa::repo::{RepoCache, Store};
use ufa::watch::Reactor;

/// Polls `check` until it returns `true` or `timeout` elapses, sleeping
/// briefly between attempts to give the `notify` event stream time to
/// deliver and the reactor thread time to react.
fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}

fn config_dir(base: &Path) -> PathBuf {
    base.join("config")
}

#[test]
fn rename_on_disk_is_reconciled_into_the_store() {
    let base = tempfile::tempdir().unwrap();
    let repo = TestRepo::new();
    let old_path = repo.touch("a.txt");

    let store = Store::open(repo.path()).unwrap();
    store.set_tag(&old_path, "math").unwrap();
    drop(store);

    let registry = Arc::new(ConfigRegistry::new(config_dir(base.path())));
    registry.add(repo.path()).unwrap();

    let cache = Arc::new(RepoCache::new());
    // pre-open the store so the reactor's `get_if_open` can find it, the way
    // the daemon would have via an earlier RPC call.
    cache.get(repo.path()).unwrap();

    let reactor = Reactor::new(config_dir(base.path()), cache.clone(), registry.clone());
    reactor.start().unwrap();

    let new_path = repo.path().join("b.txt");
    std::fs::rename(&old_path, &new_path).unwrap();

    let store = cache.get(repo.path()).unwrap();
    let reconciled = wait_until(Duration::from_secs(5), || {
        store.get_tags(&new_path).map(|t| !t.is_empty()).unwrap_or(false)
    });
    assert!(reconciled, "rename was never reconciled into the store");
    assert_eq!(store.get_tags(&new_path).unwrap(), vec!["math".to_owned()]);

    match store.get_tags(&old_path) {
        Err(UfaError::FileNotInDb(_)) => {}
        other => panic!("expected the old name to be gone, got {:?}", other.map(|_| ())),
    }

    reactor.stop();
}

#[test]
fn delete_on_disk_clears_tags_and_attrs() {
    let base = tempfile::tempdir().unwrap();
    let repo = TestRepo::new();
    let path = repo.touch("a.txt");

    let store = Store::open(repo.path()).unwrap();
    store.set_tag(&path, "math").unwrap();
    drop(store);

    let registry = Arc::new(ConfigRegistry::new(config_dir(base.path())));
    registry.add(repo.path()).unwrap();

    let cache = Arc::new(RepoCache::new());
    let store = cache.get(repo.path()).unwrap();

    let reactor = Reactor::new(config_dir(base.path()), cache.clone(), registry.clone());
    reactor.start().unwrap();

    std::fs::remove_file(&path).unwrap();

    let reconciled = wait_until(Duration::from_secs(5), || {
        matches!(store.get_tags(&path), Err(UfaError::FileNotInDb(_)))
    });
    assert!(reconciled, "delete was never reconciled into the store");

    reactor.stop();
}

#[test]
fn appending_to_the_dirs_file_adds_a_live_watch() {
    let base = tempfile::tempdir().unwrap();
    let registry = Arc::new(ConfigRegistry::new(config_dir(base.path())));
    let cache = Arc::new(RepoCache::new());

    let reactor = Reactor::new(config_dir(base.path()), cache.clone(), registry.clone());
    reactor.start().unwrap();
    assert!(reactor.current_dirs().is_empty());

    let repo = TestRepo::new();
    registry.add(repo.path()).unwrap();

    let expected = repo.path().canonicalize().unwrap();
    let picked_up = wait_until(Duration::from_secs(5), || reactor.current_dirs().contains(&expected));
    assert!(picked_up, "dirs-file addition was never picked up by the reactor");

    reactor.stop();
    assert!(reactor.current_dirs().is_empty());
}
