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

//! Blocking client façade for the CLI tools: one UNIX socket connection per
//! call, since the tools are short-lived processes, not long-running
//! daemons that would benefit from a kept-alive connection.

use crate::error::{UfaError, UfaResult};
use crate::rpc::codec::{self, JsonRpc, ParseOutcome};
use crate::rpc::value::JsonValue;
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};

pub struct RpcClient {
    socket_path: PathBuf,
}

impl RpcClient {
    pub fn new(socket_path: PathBuf) -> Self {
        Self { socket_path }
    }

    fn call(&self, method: &str, params: BTreeMap<String, JsonValue>) -> UfaResult<JsonValue> {
        let mut stream = UnixStream::connect(&self.socket_path)
            .map_err(|e| UfaError::Internal(format!("ufad unavailable at {:?}: {}", self.socket_path, e)))?;

        let id = uuid::Uuid::new_v4().to_string();
        let request = JsonRpc::request(method, &id, params);
        stream.write_all(&codec::frame(&request))?;

        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            match codec::parse(&buf) {
                ParseOutcome::Ok { value, .. } => return to_result(value),
                ParseOutcome::Invalid | ParseOutcome::NoMem => {
                    return Err(UfaError::Internal("malformed response from ufad".to_owned()))
                }
                ParseOutcome::Partial => {}
            }
            let n = stream.read(&mut chunk)?;
            if n == 0 {
                return Err(UfaError::Internal("ufad closed the connection".to_owned()));
            }
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    pub fn list_tags(&self, repodir: &Path) -> UfaResult<Vec<String>> {
        let value = self.call("listtags", params(&[("repodir", repodir.into())]))?;
        as_string_list(value)
    }

    pub fn insert_tag(&self, repodir: &Path, tag: &str) -> UfaResult<i64> {
        let value = self.call("inserttag", params(&[("repodir", repodir.into()), ("tag", tag.into())]))?;
        value.as_long().map_err(|e| UfaError::Internal(e.to_string()))
    }

    pub fn set_tag(&self, repodir: &Path, file: &str, tag: &str) -> UfaResult<()> {
        self.call(
            "settag",
            params(&[("repodir", repodir.into()), ("filepath", file.into()), ("tag", tag.into())]),
        )?;
        Ok(())
    }

    pub fn unset_tag(&self, repodir: &Path, file: &str, tag: &str) -> UfaResult<()> {
        self.call(
            "unsettag",
            params(&[("repodir", repodir.into()), ("filepath", file.into()), ("tag", tag.into())]),
        )?;
        Ok(())
    }

    pub fn clear_tags(&self, repodir: &Path, file: &str) -> UfaResult<()> {
        self.call("cleartags", params(&[("repodir", repodir.into()), ("filepath", file.into())]))?;
        Ok(())
    }

    pub fn get_tags(&self, repodir: &Path, file: &str) -> UfaResult<Vec<String>> {
        let value = self.call("gettags", params(&[("repodir", repodir.into()), ("filepath", file.into())]))?;
        as_string_list(value)
    }

    pub fn set_attr(&self, repodir: &Path, file: &str, name: &str, value: &str) -> UfaResult<()> {
        self.call(
            "setattr",
            params(&[
                ("repodir", repodir.into()),
                ("filepath", file.into()),
                ("attribute", name.into()),
                ("value", value.into()),
            ]),
        )?;
        Ok(())
    }

    pub fn unset_attr(&self, repodir: &Path, file: &str, name: &str) -> UfaResult<()> {
        self.call(
            "unsetattr",
            params(&[("repodir", repodir.into()), ("filepath", file.into()), ("attribute", name.into())]),
        )?;
        Ok(())
    }

    pub fn get_attrs(&self, repodir: &Path, file: &str) -> UfaResult<BTreeMap<String, String>> {
        let value = self.call("getattr", params(&[("repodir", repodir.into()), ("filepath", file.into())]))?;
        let map = value.as_map().map_err(|e| UfaError::Internal(e.to_string()))?;
        let mut out = BTreeMap::new();
        for (k, v) in map {
            out.insert(k.clone(), v.as_str().map_err(|e| UfaError::Internal(e.to_string()))?.to_owned());
        }
        Ok(out)
    }

    /// Searches across `repo_dirs` (and, when `include_config` is set, every
    /// directory the daemon's Config Registry lists) for files matching every
    /// tag in `tags` and every attribute filter in `attrs`. Returns absolute
    /// file paths.
    pub fn search(
        &self,
        repo_dirs: &[PathBuf],
        tags: &[String],
        attrs: Vec<JsonValue>,
        include_config: bool,
    ) -> UfaResult<Vec<String>> {
        let mut p = BTreeMap::new();
        p.insert(
            "repo_dirs".to_owned(),
            JsonValue::List(repo_dirs.iter().map(|d| d.as_path().into()).collect()),
        );
        p.insert("tags".to_owned(), tags.to_vec().into());
        p.insert("filter_attrs".to_owned(), JsonValue::List(attrs));
        p.insert("include_repo_from_config".to_owned(), JsonValue::Bool(include_config));
        let value = self.call("search", p)?;
        as_string_list(value)
    }
}

fn params(pairs: &[(&str, JsonValue)]) -> BTreeMap<String, JsonValue> {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

impl From<&Path> for JsonValue {
    fn from(p: &Path) -> Self {
        JsonValue::String(p.display().to_string())
    }
}

fn as_string_list(value: JsonValue) -> UfaResult<Vec<String>> {
    match value {
        JsonValue::List(items) => items
            .into_iter()
            .map(|v| v.as_str().map(str::to_owned).map_err(|e| UfaError::Internal(e.to_string())))
            .collect(),
        other => Err(UfaError::Internal(format!("expected list, got {}", other.type_name()))),
    }
}

fn to_result(response: JsonRpc) -> UfaResult<JsonValue> {
    if !response.error.is_empty() {
        let message = response
            .error
            .get("message")
            .and_then(|v| v.as_str().ok())
            .unwrap_or("unknown error");
        return Err(UfaError::Internal(message.to_owned()));
    }
    Ok(response
        .result
        .get("value")
        .cloned()
        .unwrap_or(JsonValue::Null))
}
