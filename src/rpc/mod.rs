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

//! The JSON-RPC dialect spoken between `ufad` and the CLI tools: a value
//! tree (`value`), a hand-rolled wire parser (`codec`), a UNIX-socket
//! server (`server`), and a blocking client façade (`client`).

pub mod client;
pub mod codec;
pub mod server;
pub mod value;

pub use client::RpcClient;
pub use codec::{JsonRpc, ParseOutcome};
pub use server::RpcServer;
pub use value::JsonValue;
