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

//! `ufafind`: searches one or more repositories by tag and attribute
//! filters, through the RPC Client Façade.

use clap::{App, Arg};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::exit;
use ufa::constants::{self, EX_UNAVAILABLE};
use ufa::rpc::{JsonValue, RpcClient};

fn main() {
    let version_str = constants::version_str();
    let matches = App::new("ufafind")
        .version(&*version_str)
        .about("Searches repositories by tag and attribute filters")
        .arg(
            Arg::with_name("repo")
                .short("r")
                .long("repo")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("A repository directory to search (repeatable)"),
        )
        .arg(
            Arg::with_name("tag")
                .short("t")
                .long("tag")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("A tag the file must carry (repeatable)"),
        )
        .arg(
            Arg::with_name("attr")
                .short("a")
                .long("attr")
                .takes_value(true)
                .multiple(true)
                .number_of_values(1)
                .help("An attribute filter: name, name=value, or name=value* (repeatable)"),
        )
        .arg(
            Arg::with_name("config-repos")
                .short("c")
                .long("config-repos")
                .help("Also search every repository registered with ufactl"),
        )
        .get_matches();

    let repos: Vec<PathBuf> = matches
        .values_of("repo")
        .map(|vs| vs.map(PathBuf::from).collect())
        .unwrap_or_default();
    let tags: Vec<String> = matches
        .values_of("tag")
        .map(|vs| vs.map(str::to_owned).collect())
        .unwrap_or_default();
    let attrs: Vec<JsonValue> = matches
        .values_of("attr")
        .map(|vs| vs.map(parse_attr_filter).collect())
        .unwrap_or_default();
    let include_config = matches.is_present("config-repos");

    if repos.is_empty() && !include_config {
        eprintln!("ufafind: no repositories to search (pass -r or -c)");
        exit(EX_UNAVAILABLE);
    }

    // the daemon builds the scan set itself (caller repos ∪ config repos,
    // deduplicated), so a single request covers every repository.
    let client = RpcClient::new(socket_path());
    match client.search(&repos, &tags, attrs, include_config) {
        Ok(matches) => {
            for path in matches {
                println!("{}", path);
            }
        }
        Err(e) => {
            eprintln!("ufafind: {}", e);
            exit(EX_UNAVAILABLE);
        }
    }
}

fn parse_attr_filter(raw: &str) -> JsonValue {
    let mut map = BTreeMap::new();
    match raw.find('=') {
        Some(idx) => {
            let (name, rest) = raw.split_at(idx);
            let value = &rest[1..];
            map.insert("name".to_owned(), JsonValue::String(name.to_owned()));
            map.insert("value".to_owned(), JsonValue::String(value.to_owned()));
            map.insert("wildcard".to_owned(), JsonValue::Bool(value.contains('*')));
        }
        None => {
            map.insert("name".to_owned(), JsonValue::String(raw.to_owned()));
            map.insert("value".to_owned(), JsonValue::Null);
        }
    }
    JsonValue::Map(map)
}

fn socket_path() -> PathBuf {
    let project_dirs = directories::ProjectDirs::from("", constants::ORG, constants::APP_NAME)
        .expect("couldn't determine a config directory for this platform");
    project_dirs.config_dir().join(constants::SOCKET_FILE_NAME)
}
