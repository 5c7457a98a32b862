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

//! End-to-end RPC Server/Client scenarios (spec §8 scenario 5): a real
//! `RpcServer` bound to a UNIX socket in a tempdir, driven by `RpcClient`.

use crate::common::TestRepo;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use ufa::config::ConfigRegistry;
use ufa::repo::RepoCache;
use ufa::rpc::{RpcClient, RpcServer};

struct Harness {
    server: RpcServer,
    client: RpcClient,
    config_dir: PathBuf,
    socket_path: PathBuf,
    _socket_dir: tempfile::TempDir,
    _config_base: tempfile::TempDir,
}

impl Harness {
    fn new() -> Self {
        let socket_dir = tempfile::Builder::new().prefix("ufa-sock-").tempdir().unwrap();
        let socket_path = socket_dir.path().join("ufad.sock");
        let config_base = tempfile::Builder::new().prefix("ufa-cfg-").tempdir().unwrap();
        let config_dir = config_base.path().join("cfg");

        let registry = Arc::new(ConfigRegistry::new(config_dir.clone()));
        let cache = Arc::new(RepoCache::new());
        let server = RpcServer::bind(socket_path.clone(), cache, registry).unwrap();
        // give the accept loop a moment to start listening before the first connect
        std::thread::sleep(Duration::from_millis(50));
        let client = RpcClient::new(socket_path.clone());

        Self {
            server,
            client,
            config_dir,
            socket_path,
            _socket_dir: socket_dir,
            _config_base: config_base,
        }
    }
}

impl Drop for Harness {
    fn drop(&mut self) {
        self.server.stop();
    }
}

#[test]
fn inserttag_returns_a_positive_id_and_listtags_sees_it() {
    let h = Harness::new();
    let repo = TestRepo::new();
    let id = h.client.insert_tag(repo.path(), "t").unwrap();
    assert!(id > 0);
    let tags = h.client.list_tags(repo.path()).unwrap();
    assert!(tags.contains(&"t".to_owned()));
}

#[test]
fn tag_round_trip_over_the_wire() {
    let h = Harness::new();
    let repo = TestRepo::new();
    let file = repo.touch("a.txt");
    let name = file.file_name().unwrap().to_str().unwrap();

    h.client.set_tag(repo.path(), name, "math").unwrap();
    h.client.set_tag(repo.path(), name, "calculus").unwrap();
    assert_eq!(
        h.client.get_tags(repo.path(), name).unwrap(),
        vec!["calculus".to_owned(), "math".to_owned()]
    );

    h.client.clear_tags(repo.path(), name).unwrap();
    assert!(h.client.get_tags(repo.path(), name).unwrap().is_empty());
}

#[test]
fn attribute_round_trip_over_the_wire() {
    let h = Harness::new();
    let repo = TestRepo::new();
    let file = repo.touch("a.txt");
    let name = file.file_name().unwrap().to_str().unwrap();

    h.client.set_attr(repo.path(), name, "author", "me").unwrap();
    let attrs = h.client.get_attrs(repo.path(), name).unwrap();
    assert_eq!(attrs.get("author").map(String::as_str), Some("me"));

    h.client.unset_attr(repo.path(), name, "author").unwrap();
    assert!(h.client.get_attrs(repo.path(), name).unwrap().is_empty());
}

#[test]
fn search_honors_include_repo_from_config() {
    let h = Harness::new();
    let r1 = TestRepo::new();
    let r2 = TestRepo::new();

    let f1 = r1.touch("f1.txt");
    let n1 = f1.file_name().unwrap().to_str().unwrap();
    h.client.set_tag(r1.path(), n1, "math").unwrap();

    let f2 = r2.touch("f2.txt");
    let n2 = f2.file_name().unwrap().to_str().unwrap();
    h.client.set_tag(r2.path(), n2, "math").unwrap();

    // r2 is never passed explicitly; it's only reachable through the config registry.
    let registry = ConfigRegistry::new(h.config_dir.clone());
    registry.add(r2.path()).unwrap();

    let without_config = h
        .client
        .search(&[r1.path().to_path_buf()], &["math".to_owned()], vec![], false)
        .unwrap();
    assert_eq!(
        without_config,
        vec![r1.path().canonicalize().unwrap().join("f1.txt").display().to_string()]
    );

    let with_config = h
        .client
        .search(&[r1.path().to_path_buf()], &["math".to_owned()], vec![], true)
        .unwrap();
    assert_eq!(with_config.len(), 2);
}

#[test]
fn search_rejects_empty_filters() {
    let h = Harness::new();
    let repo = TestRepo::new();
    let err = h
        .client
        .search(&[repo.path().to_path_buf()], &[], vec![], false)
        .unwrap_err();
    assert!(err.to_string().contains("invalid arguments"));
}

#[test]
fn unknown_method_is_reported_as_method_not_found() {
    // `RpcClient` only ever sends known methods, so the documented
    // "unknown method" quirk (§9 Open Questions) is exercised over a raw
    // socket instead: this implementation chose to answer with
    // MethodNotFound rather than silently dropping the request.
    use std::io::{Read, Write};
    use std::os::unix::net::UnixStream;

    let h = Harness::new();
    let mut stream = UnixStream::connect(&h.socket_path).unwrap();
    let mut framed = br#"{"jsonrpc":"2.0","id":"x","method":"bogus","params":{}}"#.to_vec();
    framed.push(0);
    stream.write_all(&framed).unwrap();

    let mut buf = Vec::new();
    let mut chunk = [0u8; 256];
    loop {
        let n = stream.read(&mut chunk).unwrap();
        assert!(n > 0, "server closed the connection without responding");
        buf.extend_from_slice(&chunk[..n]);
        if buf.contains(&0) {
            break;
        }
    }
    let text = String::from_utf8_lossy(&buf);
    assert!(text.contains("-32601"), "expected a MethodNotFound error, got {}", text);
}
