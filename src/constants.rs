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

pub const VERSION: (&str, &str, &str) = (
    env!("CARGO_PKG_VERSION_MAJOR"),
    env!("CARGO_PKG_VERSION_MINOR"),
    env!("CARGO_PKG_VERSION_PATCH"),
);
pub const ENV_PREFIX: &str = "UFA";
pub const APP_NAME: &str = "ufa";
pub const QUALIFIER: &str = "";
pub const ORG: &str = "ufa";

/// Basename of a repository's embedded database, inside the repository directory.
pub const REPOSITORY_FILENAME: &str = "repo.sqlite";
/// Basename of the marker file that makes a directory self-identifying as a repository.
pub const REPOSITORY_INDICATOR_FILE_NAME: &str = ".ufarepo";

pub const DB_VERSION_ATTR: &str = "db_version";
pub const DB_VERSION_VALUE: &str = "1";

/// Basename of the dirs-file under the user config directory.
pub const DIRS_FILE_NAME: &str = "dirs";
pub const DIRS_FILE_HEADER: &str =
    "# One absolute repository path per line. Lines starting with '#' are ignored.\n";

pub const SOCKET_FILE_NAME: &str = "ufarpc.sock";

pub const JSONRPC_PARSE_ERROR: i64 = -32700;
pub const JSONRPC_INVALID_REQUEST: i64 = -32600;
pub const JSONRPC_METHOD_NOT_FOUND: i64 = -32601;
pub const JSONRPC_INVALID_PARAMS: i64 = -32602;
pub const JSONRPC_INTERNAL_ERROR: i64 = -32603;

// sysexits.h-style exit codes, used by the CLI tools.
pub const EX_OK: i32 = 0;
pub const EX_USAGE: i32 = 64;
pub const EX_UNAVAILABLE: i32 = 69;

pub fn version_str() -> String {
    format!("{}.{}.{}", VERSION.0, VERSION.1, VERSION.2)
}
