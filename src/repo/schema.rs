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

/// DDL for a fresh repository database. Mirrors the schema fixed by the external
/// interfaces contract: `tag`, `file`, `file_tag`, `attribute`, `meta`.
pub const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS tag (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS file (
    id   INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS file_tag (
    id      INTEGER PRIMARY KEY,
    id_file INTEGER NOT NULL REFERENCES file(id) ON DELETE CASCADE,
    id_tag  INTEGER NOT NULL REFERENCES tag(id),
    UNIQUE(id_file, id_tag)
);

CREATE TABLE IF NOT EXISTS attribute (
    id      INTEGER PRIMARY KEY,
    id_file INTEGER NOT NULL REFERENCES file(id) ON DELETE CASCADE,
    name    TEXT NOT NULL,
    value   TEXT NOT NULL,
    UNIQUE(id_file, name)
);

CREATE TABLE IF NOT EXISTS meta (
    attr  TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";
