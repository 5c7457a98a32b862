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

//! A tag-based virtual filesystem: real files inside repository directories
//! carry tags and key/value attributes in an embedded database, addressable
//! by tag path and queryable over a local JSON-RPC socket.

#![warn(
    clippy::all,
    clippy::restriction,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo
)]
#![allow(
    clippy::option_expect_used,
    clippy::multiple_crate_versions,
    clippy::implicit_return,
    clippy::result_expect_used,
    clippy::missing_docs_in_private_items,
    clippy::missing_inline_in_public_items,
    clippy::shadow_reuse,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::wildcard_enum_match_arm
)]

pub mod config;
pub mod constants;
pub mod error;
pub mod log;
pub mod repo;
pub mod rpc;
pub mod watch;

pub use config::ConfigRegistry;
pub use error::{UfaError, UfaResult};
pub use repo::{RepoCache, Store};
pub use watch::Reactor;
