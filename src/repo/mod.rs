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

pub mod cache;
pub mod schema;
pub mod store;

pub use cache::RepoCache;
pub use store::{find_repo_for, is_repo, AttributeFilter, Leaf, MatchMode, Store};

use crate::config::ConfigRegistry;
use crate::error::UfaResult;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Implements §4.1 Search across however many repositories the caller names:
/// the scan set is the caller-provided directories that are already
/// repositories, unioned (when `include_config` is set) with every directory
/// the Config Registry lists, deduplicated by absolute path. Each repository
/// contributes its matches in its own database order; repositories are
/// scanned in the order they end up in the (deduplicated) set.
pub fn search_across(
    cache: &RepoCache,
    registry: &ConfigRegistry,
    repo_dirs: &[PathBuf],
    tags: &[String],
    attrs: &[AttributeFilter],
    include_config: bool,
) -> UfaResult<Vec<String>> {
    if tags.is_empty() && attrs.is_empty() {
        return Err(crate::error::UfaError::InvalidArgs(
            "search requires at least one tag or attribute filter".to_owned(),
        ));
    }

    let mut seen = HashSet::new();
    let mut scan = Vec::new();

    for dir in repo_dirs {
        if !is_repo(dir) {
            continue;
        }
        let abs = dir.canonicalize().unwrap_or_else(|_| dir.clone());
        if seen.insert(abs.clone()) {
            scan.push(abs);
        }
    }

    if include_config {
        for dir in registry.list()? {
            let abs = dir.canonicalize().unwrap_or(dir);
            if seen.insert(abs.clone()) {
                scan.push(abs);
            }
        }
    }

    let mut out = Vec::new();
    for repo_dir in scan {
        let store = cache.get(&repo_dir)?;
        for basename in store.search(tags, attrs)? {
            out.push(repo_dir.join(basename).display().to_string());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod search_tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn scans_caller_repos_and_dedups_against_config() {
        let r1 = tempdir().unwrap();
        let r2 = tempdir().unwrap();
        let config_base = tempdir().unwrap();

        let cache = RepoCache::new();
        let f1 = r1.path().join("a.txt");
        std::fs::write(&f1, b"hi").unwrap();
        cache.get(r1.path()).unwrap().set_tag(&f1, "math").unwrap();

        let f2 = r2.path().join("b.txt");
        std::fs::write(&f2, b"hi").unwrap();
        cache.get(r2.path()).unwrap().set_tag(&f2, "math").unwrap();

        let registry = ConfigRegistry::new(config_base.path().join("cfg"));
        registry.add(r2.path()).unwrap();

        let r1_abs = r1.path().canonicalize().unwrap();
        let r2_abs = r2.path().canonicalize().unwrap();

        let results = search_across(
            &cache,
            &registry,
            &[r1.path().to_path_buf()],
            &["math".to_owned()],
            &[],
            true,
        )
        .unwrap();

        assert_eq!(
            results,
            vec![
                r1_abs.join("a.txt").display().to_string(),
                r2_abs.join("b.txt").display().to_string(),
            ]
        );
    }

    #[test]
    fn non_repo_caller_dirs_are_skipped() {
        let plain = tempdir().unwrap();
        let config_base = tempdir().unwrap();
        let cache = RepoCache::new();
        let registry = ConfigRegistry::new(config_base.path().join("cfg"));

        let results = search_across(
            &cache,
            &registry,
            &[plain.path().to_path_buf()],
            &["math".to_owned()],
            &[],
            false,
        )
        .unwrap();
        assert!(results.is_empty());
        assert!(cache.is_empty());
    }
}
