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

use std::error::Error;
use std::fmt;

pub type UfaResult<T> = Result<T, UfaError>;

/// The error kinds from the error handling design: each carries a message and, where
/// it makes sense, the path or name that triggered it.
pub enum UfaError {
    Database(rusqlite::Error),
    NotDir(String),
    File(String),
    FileNotInDb(String),
    NotInRepo(String),
    InvalidArgs(String),
    Internal(String),
}

impl UfaError {
    /// Numeric kind, stable across the life of the crate; used by the RPC layer to
    /// round-trip an error across the wire without losing its kind.
    pub fn kind(&self) -> &'static str {
        match self {
            UfaError::Database(_) => "database",
            UfaError::NotDir(_) => "not_dir",
            UfaError::File(_) => "file",
            UfaError::FileNotInDb(_) => "file_not_in_db",
            UfaError::NotInRepo(_) => "not_in_repo",
            UfaError::InvalidArgs(_) => "invalid_args",
            UfaError::Internal(_) => "internal",
        }
    }
}

impl From<rusqlite::Error> for UfaError {
    fn from(e: rusqlite::Error) -> Self {
        UfaError::Database(e)
    }
}

impl From<std::io::Error> for UfaError {
    fn from(e: std::io::Error) -> Self {
        UfaError::File(e.to_string())
    }
}

impl From<notify::Error> for UfaError {
    fn from(e: notify::Error) -> Self {
        UfaError::Internal(e.to_string())
    }
}

impl Error for UfaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            UfaError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl fmt::Display for UfaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UfaError::Database(e) => write!(f, "database error: {}", e),
            UfaError::NotDir(path) => write!(f, "not a directory: {}", path),
            UfaError::File(msg) => write!(f, "file error: {}", msg),
            UfaError::FileNotInDb(path) => write!(f, "file not tracked in repository: {}", path),
            UfaError::NotInRepo(path) => write!(f, "path not inside repository: {}", path),
            UfaError::InvalidArgs(msg) => write!(f, "invalid arguments: {}", msg),
            UfaError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl fmt::Debug for UfaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
