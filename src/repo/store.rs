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

use crate::constants::{DB_VERSION_ATTR, DB_VERSION_VALUE, REPOSITORY_FILENAME, REPOSITORY_INDICATOR_FILE_NAME};
use crate::error::{UfaError, UfaResult};
use crate::repo::schema;
use log::{debug, trace};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, ToSql, NO_PARAMS};
use std::path::{Path, PathBuf};

pub const STORE_TAG: &str = "repo-store";
const MAX_BUSY_RETRIES: i32 = 50;

/// Comparison discipline for an attribute filter (§4.1 Search).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    Equal,
    Wildcard,
}

/// One attribute filter clause: `value: None` matches any file that has the
/// attribute set at all, regardless of its value.
#[derive(Debug, Clone)]
pub struct AttributeFilter {
    pub name: String,
    pub value: Option<String>,
    pub mode: MatchMode,
}

/// What a tag-path leaf resolves to: a real file, a tag (navigable further), or
/// neither.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leaf {
    File(PathBuf),
    Tag(String),
    NotFound,
}

/// A single repository: an open database connection plus the directory it manages.
/// The connection is wrapped in a mutex because sqlite is used here in its
/// serialized mode — one handle, arbitrarily many calling threads.
pub struct Store {
    conn: Mutex<Connection>,
    repo_dir: PathBuf,
}

fn open_conn(db_path: &Path) -> rusqlite::Result<Connection> {
    trace!(target: STORE_TAG, "Opening {:?}", db_path);
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = 1", NO_PARAMS)?;
    conn.busy_handler(Some(|retries| -> bool {
        if retries >= MAX_BUSY_RETRIES {
            false
        } else {
            std::thread::sleep(std::time::Duration::from_millis(50));
            true
        }
    }))?;
    Ok(conn)
}

impl Store {
    /// Opens the repository rooted at `repo_dir`, initializing it (database,
    /// marker file) on first use. `repo_dir` must already exist as a directory.
    pub fn open(repo_dir: &Path) -> UfaResult<Self> {
        if !repo_dir.is_dir() {
            return Err(UfaError::NotDir(repo_dir.display().to_string()));
        }
        let abs = repo_dir
            .canonicalize()
            .map_err(|e| UfaError::File(e.to_string()))?;

        let db_path = abs.join(REPOSITORY_FILENAME);
        let is_new = !db_path.exists();
        let conn = open_conn(&db_path)?;

        if is_new {
            debug!(target: STORE_TAG, "Initializing new repository at {:?}", abs);
            let tx = conn.unchecked_transaction()?;
            tx.execute_batch(schema::CREATE_TABLES)?;
            tx.execute(
                "INSERT OR IGNORE INTO meta (attr, value) VALUES (?1, ?2)",
                &[&DB_VERSION_ATTR as &dyn ToSql, &DB_VERSION_VALUE],
            )?;
            tx.commit()?;
        } else {
            conn.execute_batch(schema::CREATE_TABLES)?;
        }

        let marker = abs.join(REPOSITORY_INDICATOR_FILE_NAME);
        if !marker.exists() {
            std::fs::write(&marker, format!("{}\n", abs.display()))?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
            repo_dir: abs,
        })
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_dir
    }

    /// Resolves `filepath` to a basename inside this repository's directory,
    /// failing with `NotInRepo` if it isn't.
    fn basename_of(&self, filepath: &Path) -> UfaResult<String> {
        let abs = if filepath.is_absolute() {
            filepath.to_path_buf()
        } else {
            self.repo_dir.join(filepath)
        };
        let rel = abs
            .strip_prefix(&self.repo_dir)
            .map_err(|_| UfaError::NotInRepo(filepath.display().to_string()))?;
        if rel.components().count() != 1 {
            return Err(UfaError::NotInRepo(filepath.display().to_string()));
        }
        Ok(rel.display().to_string())
    }

    fn get_or_create_file(conn: &Connection, basename: &str, real_path: &Path) -> UfaResult<i64> {
        if let Some(id) = Self::find_file_id(conn, basename)? {
            return Ok(id);
        }
        if !real_path.is_file() {
            return Err(UfaError::FileNotInDb(basename.to_owned()));
        }
        conn.execute(
            "INSERT INTO file (name) VALUES (?1)",
            &[&basename as &dyn ToSql],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn find_file_id(conn: &Connection, basename: &str) -> UfaResult<Option<i64>> {
        Ok(conn
            .query_row(
                "SELECT id FROM file WHERE name = ?1",
                &[&basename as &dyn ToSql],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn find_tag_id(conn: &Connection, name: &str) -> UfaResult<Option<i64>> {
        Ok(conn
            .query_row(
                "SELECT id FROM tag WHERE name = ?1",
                &[&name as &dyn ToSql],
                |row| row.get(0),
            )
            .optional()?)
    }

    fn get_or_create_tag(conn: &Connection, name: &str) -> UfaResult<i64> {
        if let Some(id) = Self::find_tag_id(conn, name)? {
            return Ok(id);
        }
        conn.execute("INSERT INTO tag (name) VALUES (?1)", &[&name as &dyn ToSql])?;
        Ok(conn.last_insert_rowid())
    }

    // -- Tag operations -----------------------------------------------------

    pub fn list_tags(&self) -> UfaResult<Vec<String>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT name FROM tag ORDER BY name ASC")?;
        let rows = stmt.query_map(NO_PARAMS, |row| row.get(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    pub fn insert_tag(&self, name: &str) -> UfaResult<i64> {
        let conn = self.conn.lock();
        Self::get_or_create_tag(&conn, name)
    }

    pub fn set_tag(&self, filepath: &Path, tag: &str) -> UfaResult<()> {
        let basename = self.basename_of(filepath)?;
        let real_path = self.repo_dir.join(&basename);
        let conn = self.conn.lock();
        let file_id = Self::get_or_create_file(&conn, &basename, &real_path)?;
        let tag_id = Self::get_or_create_tag(&conn, tag)?;
        conn.execute(
            "INSERT OR IGNORE INTO file_tag (id_file, id_tag) VALUES (?1, ?2)",
            &[&file_id as &dyn ToSql, &tag_id],
        )?;
        Ok(())
    }

    pub fn unset_tag(&self, filepath: &Path, tag: &str) -> UfaResult<()> {
        let basename = self.basename_of(filepath)?;
        let conn = self.conn.lock();
        let file_id = match Self::find_file_id(&conn, &basename)? {
            Some(id) => id,
            None => return Ok(()),
        };
        let tag_id = match Self::find_tag_id(&conn, tag)? {
            Some(id) => id,
            None => return Ok(()),
        };
        conn.execute(
            "DELETE FROM file_tag WHERE id_file = ?1 AND id_tag = ?2",
            &[&file_id as &dyn ToSql, &tag_id],
        )?;
        Ok(())
    }

    pub fn clear_tags(&self, filepath: &Path) -> UfaResult<()> {
        let basename = self.basename_of(filepath)?;
        let conn = self.conn.lock();
        let file_id = match Self::find_file_id(&conn, &basename)? {
            Some(id) => id,
            None => return Ok(()),
        };
        conn.execute(
            "DELETE FROM file_tag WHERE id_file = ?1",
            &[&file_id as &dyn ToSql],
        )?;
        Ok(())
    }

    pub fn get_tags(&self, filepath: &Path) -> UfaResult<Vec<String>> {
        let basename = self.basename_of(filepath)?;
        let conn = self.conn.lock();
        let file_id = Self::find_file_id(&conn, &basename)?
            .ok_or_else(|| UfaError::FileNotInDb(basename.clone()))?;
        let mut stmt = conn.prepare(
            "SELECT t.name FROM tag t
             JOIN file_tag ft ON ft.id_tag = t.id
             WHERE ft.id_file = ?1
             ORDER BY t.name ASC",
        )?;
        let rows = stmt.query_map(&[&file_id as &dyn ToSql], |row| row.get(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    // -- Attribute operations ------------------------------------------------

    pub fn set_attr(&self, filepath: &Path, name: &str, value: &str) -> UfaResult<()> {
        let basename = self.basename_of(filepath)?;
        let real_path = self.repo_dir.join(&basename);
        let conn = self.conn.lock();
        let file_id = Self::get_or_create_file(&conn, &basename, &real_path)?;

        // libsqlite3 as old as 3.8.x (predating UPSERT, added in 3.24.0) is still common on
        // LTS distros, so we avoid ON CONFLICT and upsert by hand instead.
        let existing: Option<i64> = conn
            .query_row(
                "SELECT id FROM attribute WHERE id_file = ?1 AND name = ?2",
                &[&file_id as &dyn ToSql, &name],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(attr_id) => {
                conn.execute(
                    "UPDATE attribute SET value = ?1 WHERE id = ?2",
                    &[&value as &dyn ToSql, &attr_id],
                )?;
            }
            None => {
                conn.execute(
                    "INSERT INTO attribute (id_file, name, value) VALUES (?1, ?2, ?3)",
                    &[&file_id as &dyn ToSql, &name, &value],
                )?;
            }
        }
        Ok(())
    }

    pub fn unset_attr(&self, filepath: &Path, name: &str) -> UfaResult<()> {
        let basename = self.basename_of(filepath)?;
        let conn = self.conn.lock();
        let file_id = match Self::find_file_id(&conn, &basename)? {
            Some(id) => id,
            None => return Ok(()),
        };
        conn.execute(
            "DELETE FROM attribute WHERE id_file = ?1 AND name = ?2",
            &[&file_id as &dyn ToSql, &name],
        )?;
        Ok(())
    }

    pub fn get_attrs(&self, filepath: &Path) -> UfaResult<Vec<(String, String)>> {
        let basename = self.basename_of(filepath)?;
        let conn = self.conn.lock();
        let file_id = Self::find_file_id(&conn, &basename)?
            .ok_or_else(|| UfaError::FileNotInDb(basename.clone()))?;
        let mut stmt = conn.prepare(
            "SELECT name, value FROM attribute WHERE id_file = ?1 ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(&[&file_id as &dyn ToSql], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    // -- Tag-path listing -----------------------------------------------------

    /// Lists the contents of a tag path as described in §4.1: files that carry
    /// every tag in the path, the other tags those files carry, and the marker
    /// file basename.
    pub fn list_files(&self, tag_path: &[String]) -> UfaResult<Vec<String>> {
        let conn = self.conn.lock();

        if tag_path.is_empty() {
            let mut stmt = conn.prepare("SELECT name FROM tag ORDER BY name ASC")?;
            let rows = stmt.query_map(NO_PARAMS, |row| row.get::<_, String>(0))?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            out.push(REPOSITORY_INDICATOR_FILE_NAME.to_owned());
            return Ok(out);
        }

        let mut tag_ids = Vec::with_capacity(tag_path.len());
        for t in tag_path {
            match Self::find_tag_id(&conn, t)? {
                Some(id) => tag_ids.push(id),
                // a tag path segment naming a nonexistent tag can never match
                // any file; an empty join condition, not an error.
                None => return Ok(Vec::new()),
            }
        }

        let placeholders = std::iter::repeat("?").take(tag_ids.len()).collect::<Vec<_>>().join(",");
        let file_sql = format!(
            "SELECT f.id, f.name FROM file f
             JOIN file_tag ft ON ft.id_file = f.id
             WHERE ft.id_tag IN ({})
             GROUP BY f.id
             HAVING COUNT(DISTINCT ft.id_tag) = ?
             ORDER BY f.id ASC",
            placeholders
        );
        let mut params: Vec<&dyn ToSql> = tag_ids.iter().map(|i| i as &dyn ToSql).collect();
        let n = tag_ids.len() as i64;
        params.push(&n);

        let mut files = Vec::new();
        let mut file_ids = Vec::new();
        {
            let mut stmt = conn.prepare(&file_sql)?;
            let rows = stmt.query_map(params.as_slice(), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?;
            for r in rows {
                let (id, name) = r?;
                file_ids.push(id);
                files.push(name);
            }
        }

        let mut other_tags = Vec::new();
        if !file_ids.is_empty() {
            let file_placeholders = std::iter::repeat("?").take(file_ids.len()).collect::<Vec<_>>().join(",");
            let tag_placeholders = std::iter::repeat("?").take(tag_ids.len()).collect::<Vec<_>>().join(",");
            let other_sql = format!(
                "SELECT DISTINCT t.name FROM tag t
                 JOIN file_tag ft ON ft.id_tag = t.id
                 WHERE ft.id_file IN ({}) AND t.id NOT IN ({})
                 ORDER BY t.name ASC",
                file_placeholders, tag_placeholders
            );
            let mut other_params: Vec<&dyn ToSql> =
                file_ids.iter().map(|i| i as &dyn ToSql).collect();
            other_params.extend(tag_ids.iter().map(|i| i as &dyn ToSql));

            let mut stmt = conn.prepare(&other_sql)?;
            let rows = stmt.query_map(other_params.as_slice(), |row| row.get::<_, String>(0))?;
            for r in rows {
                other_tags.push(r?);
            }
        }

        let mut out = files;
        out.extend(other_tags);
        out.push(REPOSITORY_INDICATOR_FILE_NAME.to_owned());
        Ok(out)
    }

    /// Disambiguates the final component of a tag path: a real file wins over a
    /// tag of the same name.
    pub fn resolve_leaf(&self, name: &str) -> UfaResult<Leaf> {
        let real_path = self.repo_dir.join(name);
        if real_path.is_file() {
            return Ok(Leaf::File(real_path));
        }
        let conn = self.conn.lock();
        if Self::find_tag_id(&conn, name)?.is_some() {
            return Ok(Leaf::Tag(name.to_owned()));
        }
        Ok(Leaf::NotFound)
    }

    pub fn is_tag(&self, name: &str) -> UfaResult<bool> {
        let conn = self.conn.lock();
        Ok(Self::find_tag_id(&conn, name)?.is_some())
    }

    // -- Search ---------------------------------------------------------------

    /// Returns the basenames (within this repository) matching every tag and
    /// every attribute filter. Fails with `InvalidArgs` if both lists are empty.
    pub fn search(&self, tags: &[String], attrs: &[AttributeFilter]) -> UfaResult<Vec<String>> {
        if tags.is_empty() && attrs.is_empty() {
            return Err(UfaError::InvalidArgs(
                "search requires at least one tag or attribute filter".to_owned(),
            ));
        }

        let conn = self.conn.lock();
        let mut clauses = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();

        if !tags.is_empty() {
            let mut tag_ids = Vec::with_capacity(tags.len());
            for t in tags {
                match Self::find_tag_id(&conn, t)? {
                    Some(id) => tag_ids.push(id),
                    // an unknown tag can match no file
                    None => return Ok(Vec::new()),
                }
            }
            let placeholders = std::iter::repeat("?").take(tag_ids.len()).collect::<Vec<_>>().join(",");
            clauses.push(format!(
                "f.id IN (SELECT id_file FROM file_tag WHERE id_tag IN ({}) GROUP BY id_file HAVING COUNT(DISTINCT id_tag) = {})",
                placeholders,
                tag_ids.len()
            ));
            for id in tag_ids {
                params.push(Box::new(id));
            }
        }

        for filter in attrs {
            match (&filter.value, filter.mode) {
                (None, _) => {
                    clauses.push("f.id IN (SELECT id_file FROM attribute WHERE name = ?)".to_owned());
                    params.push(Box::new(filter.name.clone()));
                }
                (Some(v), MatchMode::Equal) => {
                    clauses.push(
                        "f.id IN (SELECT id_file FROM attribute WHERE name = ? AND value = ?)"
                            .to_owned(),
                    );
                    params.push(Box::new(filter.name.clone()));
                    params.push(Box::new(v.clone()));
                }
                (Some(v), MatchMode::Wildcard) => {
                    clauses.push(
                        "f.id IN (SELECT id_file FROM attribute WHERE name = ? AND value LIKE ?)"
                            .to_owned(),
                    );
                    params.push(Box::new(filter.name.clone()));
                    params.push(Box::new(v.replace('*', "%")));
                }
            }
        }

        let sql = format!(
            "SELECT f.name FROM file f WHERE {} ORDER BY f.id ASC",
            clauses.join(" AND ")
        );
        let param_refs: Vec<&dyn ToSql> = params.iter().map(|b| b.as_ref()).collect();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(param_refs.as_slice(), |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    }

    // -- Rename / delete reconciliation ---------------------------------------

    /// Renames a tracked file within this repository. A no-op if the old
    /// basename isn't tracked (nothing to reconcile).
    pub fn rename_file(&self, old_basename: &str, new_basename: &str) -> UfaResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE file SET name = ?1 WHERE name = ?2",
            &[&new_basename as &dyn ToSql, &old_basename],
        )?;
        if changed == 0 {
            return Err(UfaError::FileNotInDb(old_basename.to_owned()));
        }
        Ok(())
    }

    /// Deletes the file record for `basename`, cascading through its tag
    /// assignments and attributes. Fails with `FileNotInDb` if the basename
    /// isn't tracked (callers that consider this benign, like the reactor,
    /// suppress it).
    pub fn remove_file(&self, basename: &str) -> UfaResult<()> {
        let conn = self.conn.lock();
        let changed = conn.execute("DELETE FROM file WHERE name = ?1", &[&basename as &dyn ToSql])?;
        if changed == 0 {
            return Err(UfaError::FileNotInDb(basename.to_owned()));
        }
        Ok(())
    }
}

/// Whether `dir` is already an initialized repository, identified by the
/// presence of its database file, without opening or creating anything.
pub fn is_repo(dir: &Path) -> bool {
    dir.join(REPOSITORY_FILENAME).is_file()
}

/// Walks up from `start` looking for the repository that owns it: a directory
/// containing the fixed database basename.
pub fn find_repo_for(start: &Path) -> Option<PathBuf> {
    let mut cur = if start.is_dir() {
        Some(start.to_path_buf())
    } else {
        start.parent().map(Path::to_path_buf)
    };
    while let Some(dir) = cur {
        if dir.join(REPOSITORY_FILENAME).is_file() {
            return dir.canonicalize().ok();
        }
        cur = dir.parent().map(Path::to_path_buf);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn tag_round_trip() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"hi").unwrap();

        store.set_tag(&file, "math").unwrap();
        store.set_tag(&file, "calculus").unwrap();
        assert_eq!(store.get_tags(&file).unwrap(), vec!["calculus", "math"]);

        store.clear_tags(&file).unwrap();
        assert_eq!(store.get_tags(&file).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn set_tag_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"hi").unwrap();

        store.set_tag(&file, "math").unwrap();
        store.set_tag(&file, "math").unwrap();
        assert_eq!(store.get_tags(&file).unwrap(), vec!["math"]);
    }

    #[test]
    fn tag_path_listing() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"hi").unwrap();
        store.set_tag(&file, "math").unwrap();
        store.set_tag(&file, "calculus").unwrap();

        let root = store.list_files(&[]).unwrap();
        assert_eq!(root, vec!["calculus", "math", ".ufarepo"]);

        let under_math = store.list_files(&["math".to_string()]).unwrap();
        assert_eq!(under_math, vec!["a.txt", "calculus", ".ufarepo"]);
    }

    #[test]
    fn search_requires_a_filter() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        match store.search(&[], &[]) {
            Err(UfaError::InvalidArgs(_)) => {}
            other => panic!("expected InvalidArgs, got {:?}", other),
        }
    }

    #[test]
    fn search_by_tags_and_attribute() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        for name in ["f1.txt", "f2.txt", "f3.txt"] {
            std::fs::write(dir.path().join(name), b"hi").unwrap();
        }
        let f1 = dir.path().join("f1.txt");
        let f2 = dir.path().join("f2.txt");
        let f3 = dir.path().join("f3.txt");

        store.set_tag(&f1, "math").unwrap();
        store.set_tag(&f1, "calculus").unwrap();
        store.set_attr(&f1, "author", "me").unwrap();

        store.set_tag(&f2, "math").unwrap();
        store.set_attr(&f2, "author", "me").unwrap();

        store.set_tag(&f3, "math").unwrap();
        store.set_tag(&f3, "calculus").unwrap();
        store.set_attr(&f3, "author", "me").unwrap();

        let filters = vec![AttributeFilter {
            name: "author".to_owned(),
            value: Some("me".to_owned()),
            mode: MatchMode::Equal,
        }];
        let matches = store
            .search(&["math".to_owned(), "calculus".to_owned()], &filters)
            .unwrap();
        assert_eq!(matches, vec!["f3.txt"]);
    }

    #[test]
    fn rename_and_remove() {
        let dir = tempdir().unwrap();
        let store = Store::open(dir.path()).unwrap();
        let f1 = dir.path().join("f1.txt");
        std::fs::write(&f1, b"hi").unwrap();
        store.set_tag(&f1, "t1").unwrap();

        store.rename_file("f1.txt", "f1b.txt").unwrap();
        let f1b = dir.path().join("f1b.txt");
        assert_eq!(store.get_tags(&f1b).unwrap(), vec!["t1"]);

        store.remove_file("f1b.txt").unwrap();
        match store.get_tags(&f1b) {
            Err(UfaError::FileNotInDb(_)) => {}
            other => panic!("expected FileNotInDb, got {:?}", other),
        }
    }
}
