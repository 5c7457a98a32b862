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

//! The RPC Server: a UNIX domain socket accepting one thread per connection,
//! reading zero-byte-terminated JSON-RPC requests and dispatching them
//! against the Repository Cache.
//!
//! Grounded in the same accept-loop-plus-thread-per-connection shape the
//! daemon's UDS notifier uses, but framed with a trailing NUL instead of
//! newlines, and carrying a JSON-RPC payload instead of an event string.

use crate::config::ConfigRegistry;
use crate::constants::{JSONRPC_INTERNAL_ERROR, JSONRPC_INVALID_PARAMS, JSONRPC_METHOD_NOT_FOUND};
use crate::error::UfaError;
use crate::repo::{self, AttributeFilter, MatchMode, RepoCache, Store};
use crate::rpc::codec::{self, JsonRpc, ParseOutcome};
use crate::rpc::value::JsonValue;
use log::{debug, error, warn};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const SERVER_TAG: &str = "rpc-server";
const READ_CHUNK: usize = 8192;

/// Everything a connection handler needs to dispatch a request: the
/// Repository Cache and the Config Registry (the latter only consulted by
/// `search`'s `include_repo_from_config`).
struct Dispatcher {
    cache: Arc<RepoCache>,
    registry: Arc<ConfigRegistry>,
}

/// Listens on `socket_path`, dispatching requests against `cache` until
/// `stop()` is called (or the process exits, since accept is interrupted by
/// closing the listener).
pub struct RpcServer {
    socket_path: PathBuf,
    running: Arc<AtomicBool>,
}

impl RpcServer {
    /// Binds the socket, removing a stale one left behind by a prior run.
    pub fn bind(
        socket_path: PathBuf,
        cache: Arc<RepoCache>,
        registry: Arc<ConfigRegistry>,
    ) -> std::io::Result<Self> {
        if socket_path.exists() {
            std::fs::remove_file(&socket_path)?;
        }
        let listener = UnixListener::bind(&socket_path)?;
        let running = Arc::new(AtomicBool::new(true));
        let running_thread = running.clone();
        let path_for_thread = socket_path.clone();
        let dispatcher = Arc::new(Dispatcher { cache, registry });

        std::thread::spawn(move || {
            debug!(target: SERVER_TAG, "Listening on {:?}", path_for_thread);
            for incoming in listener.incoming() {
                if !running_thread.load(Ordering::SeqCst) {
                    break;
                }
                match incoming {
                    Ok(stream) => {
                        let dispatcher = dispatcher.clone();
                        std::thread::spawn(move || handle_connection(stream, &dispatcher));
                    }
                    Err(e) => {
                        warn!(target: SERVER_TAG, "Accept failed: {:?}", e);
                    }
                }
            }
            debug!(target: SERVER_TAG, "Listener thread exiting");
        });

        Ok(Self { socket_path, running })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        // nudge the accept loop out of its blocking call
        let _ = UnixStream::connect(&self.socket_path);
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

fn handle_connection(mut stream: UnixStream, dispatcher: &Dispatcher) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        match stream.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            Err(e) => {
                warn!(target: SERVER_TAG, "Read failed: {:?}", e);
                break;
            }
        }

        loop {
            match codec::parse(&buf) {
                ParseOutcome::Ok { value, consumed } => {
                    let response = dispatch(&value, dispatcher);
                    if stream.write_all(&codec::frame(&response)).is_err() {
                        return;
                    }
                    let mut drop_n = consumed;
                    if buf.get(drop_n) == Some(&0) {
                        drop_n += 1;
                    }
                    buf.drain(0..drop_n);
                }
                ParseOutcome::Partial => break,
                ParseOutcome::Invalid => {
                    debug!(target: SERVER_TAG, "Discarding malformed request fragment");
                    buf.clear();
                    break;
                }
                ParseOutcome::NoMem => {
                    warn!(target: SERVER_TAG, "Discarding oversized request fragment");
                    buf.clear();
                    break;
                }
            }
        }
    }
}

fn dispatch(request: &JsonRpc, dispatcher: &Dispatcher) -> JsonValue {
    let id = request.id.as_deref().unwrap_or("");
    let method = match &request.method {
        Some(m) => m.as_str(),
        None => return JsonRpc::error(id, JSONRPC_INVALID_PARAMS, "missing method"),
    };

    match run(method, &request.params, dispatcher) {
        Ok(value) => JsonRpc::success(id, value),
        Err(DispatchError::UnknownMethod) => JsonRpc::error(
            id,
            JSONRPC_METHOD_NOT_FOUND,
            &format!("unknown method: {}", method),
        ),
        Err(DispatchError::Ufa(e)) => JsonRpc::error(id, code_for(&e), &e.to_string()),
    }
}

enum DispatchError {
    UnknownMethod,
    Ufa(UfaError),
}

impl From<UfaError> for DispatchError {
    fn from(e: UfaError) -> Self {
        DispatchError::Ufa(e)
    }
}

fn code_for(e: &UfaError) -> i64 {
    match e {
        UfaError::InvalidArgs(_) | UfaError::NotDir(_) | UfaError::NotInRepo(_) | UfaError::FileNotInDb(_) => {
            JSONRPC_INVALID_PARAMS
        }
        UfaError::Database(_) | UfaError::File(_) | UfaError::Internal(_) => JSONRPC_INTERNAL_ERROR,
    }
}

fn run(method: &str, params: &BTreeMap<String, JsonValue>, dispatcher: &Dispatcher) -> Result<JsonValue, DispatchError> {
    let store = || -> Result<Arc<Store>, DispatchError> {
        let repodir = param_str(params, "repodir")?;
        Ok(dispatcher.cache.get(Path::new(repodir))?)
    };

    match method {
        "listtags" => {
            let tags = store()?.list_tags()?;
            Ok(tags.into())
        }
        "inserttag" => {
            let tag = param_str(params, "tag")?;
            let id = store()?.insert_tag(tag)?;
            Ok(JsonValue::Long(id))
        }
        "settag" => {
            let file = param_str(params, "filepath")?;
            let tag = param_str(params, "tag")?;
            store()?.set_tag(Path::new(file), tag)?;
            Ok(JsonValue::Bool(true))
        }
        "unsettag" => {
            let file = param_str(params, "filepath")?;
            let tag = param_str(params, "tag")?;
            store()?.unset_tag(Path::new(file), tag)?;
            Ok(JsonValue::Bool(true))
        }
        "cleartags" => {
            let file = param_str(params, "filepath")?;
            store()?.clear_tags(Path::new(file))?;
            Ok(JsonValue::Bool(true))
        }
        "gettags" => {
            let file = param_str(params, "filepath")?;
            let tags = store()?.get_tags(Path::new(file))?;
            Ok(tags.into())
        }
        "setattr" => {
            let file = param_str(params, "filepath")?;
            let name = param_str(params, "attribute")?;
            let value = param_str(params, "value")?;
            store()?.set_attr(Path::new(file), name, value)?;
            Ok(JsonValue::Bool(true))
        }
        "unsetattr" => {
            let file = param_str(params, "filepath")?;
            let name = param_str(params, "attribute")?;
            store()?.unset_attr(Path::new(file), name)?;
            Ok(JsonValue::Bool(true))
        }
        "getattr" => {
            let file = param_str(params, "filepath")?;
            let attrs = store()?.get_attrs(Path::new(file))?;
            let mut map = BTreeMap::new();
            for (name, value) in attrs {
                map.insert(name, JsonValue::String(value));
            }
            Ok(JsonValue::Map(map))
        }
        "search" => {
            let repo_dirs: Vec<PathBuf> = match params.get("repo_dirs") {
                Some(v) => v
                    .as_list()
                    .map_err(|_| DispatchError::Ufa(UfaError::InvalidArgs("repo_dirs must be a list".to_owned())))?
                    .iter()
                    .map(|v| v.as_str().map(PathBuf::from))
                    .collect::<Result<_, _>>()
                    .map_err(|_| DispatchError::Ufa(UfaError::InvalidArgs("repo_dirs must be strings".to_owned())))?,
                None => Vec::new(),
            };
            let tags: Vec<String> = match params.get("tags") {
                Some(v) => v
                    .as_list()
                    .map_err(|_| DispatchError::Ufa(UfaError::InvalidArgs("tags must be a list".to_owned())))?
                    .iter()
                    .map(|v| v.as_str().map(str::to_owned))
                    .collect::<Result<_, _>>()
                    .map_err(|_| DispatchError::Ufa(UfaError::InvalidArgs("tags must be strings".to_owned())))?,
                None => Vec::new(),
            };
            let attrs = parse_attr_filters(params.get("filter_attrs"))?;
            let include_config = match params.get("include_repo_from_config") {
                Some(v) => v
                    .as_bool()
                    .map_err(|_| DispatchError::Ufa(UfaError::InvalidArgs("include_repo_from_config must be a bool".to_owned())))?,
                None => false,
            };
            let matches = repo::search_across(
                &dispatcher.cache,
                &dispatcher.registry,
                &repo_dirs,
                &tags,
                &attrs,
                include_config,
            )?;
            Ok(matches.into())
        }
        _ => Err(DispatchError::UnknownMethod),
    }
}

fn parse_attr_filters(value: Option<&JsonValue>) -> Result<Vec<AttributeFilter>, DispatchError> {
    let list = match value {
        None => return Ok(Vec::new()),
        Some(v) => v
            .as_list()
            .map_err(|_| DispatchError::Ufa(UfaError::InvalidArgs("filter_attrs must be a list".to_owned())))?,
    };
    let mut out = Vec::with_capacity(list.len());
    for item in list {
        let map = item
            .as_map()
            .map_err(|_| DispatchError::Ufa(UfaError::InvalidArgs("each attr filter must be a map".to_owned())))?;
        let name = param_str(map, "name")?.to_owned();
        let value = match map.get("value") {
            Some(JsonValue::Null) | None => None,
            Some(v) => Some(
                v.as_str()
                    .map_err(|_| DispatchError::Ufa(UfaError::InvalidArgs("attr value must be a string".to_owned())))?
                    .to_owned(),
            ),
        };
        let wildcard = match map.get("wildcard") {
            Some(v) => v
                .as_bool()
                .map_err(|_| DispatchError::Ufa(UfaError::InvalidArgs("wildcard must be a bool".to_owned())))?,
            None => false,
        };
        out.push(AttributeFilter {
            name,
            value,
            mode: if wildcard { MatchMode::Wildcard } else { MatchMode::Equal },
        });
    }
    Ok(out)
}

fn param_str<'a>(params: &'a BTreeMap<String, JsonValue>, key: &str) -> Result<&'a str, DispatchError> {
    params
        .get(key)
        .ok_or_else(|| DispatchError::Ufa(UfaError::InvalidArgs(format!("missing param: {}", key))))?
        .as_str()
        .map_err(|_| DispatchError::Ufa(UfaError::InvalidArgs(format!("param {} must be a string", key))))
}
