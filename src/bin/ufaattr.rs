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

//! `ufaattr`: assigns and queries key/value attributes on files, through the
//! RPC Client Façade.

use clap::{App, Arg, SubCommand};
use std::path::{Path, PathBuf};
use std::process::exit;
use ufa::constants::{self, EX_UNAVAILABLE, EX_USAGE};
use ufa::repo::find_repo_for;
use ufa::rpc::RpcClient;
use ufa::UfaError;

fn main() {
    let version_str = constants::version_str();
    let matches = App::new("ufaattr")
        .version(&*version_str)
        .about("Assigns and queries key/value attributes on files")
        .arg(Arg::with_name("repo").short("r").long("repo").takes_value(true))
        .subcommand(
            SubCommand::with_name("set")
                .arg(Arg::with_name("file").required(true).takes_value(true))
                .arg(Arg::with_name("name").required(true).takes_value(true))
                .arg(Arg::with_name("value").required(true).takes_value(true)),
        )
        .subcommand(
            SubCommand::with_name("unset")
                .arg(Arg::with_name("file").required(true).takes_value(true))
                .arg(Arg::with_name("name").required(true).takes_value(true)),
        )
        .subcommand(
            SubCommand::with_name("get")
                .arg(Arg::with_name("file").required(true).takes_value(true))
                .arg(Arg::with_name("name").required(true).takes_value(true)),
        )
        .subcommand(SubCommand::with_name("list").arg(Arg::with_name("file").required(true).takes_value(true)))
        .subcommand(SubCommand::with_name("describe").arg(Arg::with_name("file").required(true).takes_value(true)))
        .get_matches();

    let repo_opt = matches.value_of("repo").map(PathBuf::from);

    let result = match matches.subcommand() {
        ("set", Some(sub)) => {
            let file = sub.value_of("file").unwrap();
            let name = sub.value_of("name").unwrap();
            let value = sub.value_of("value").unwrap();
            with_client(&repo_opt, Path::new(file), |c, repo| c.set_attr(repo, file, name, value))
        }
        ("unset", Some(sub)) => {
            let file = sub.value_of("file").unwrap();
            let name = sub.value_of("name").unwrap();
            with_client(&repo_opt, Path::new(file), |c, repo| c.unset_attr(repo, file, name))
        }
        ("get", Some(sub)) => {
            let file = sub.value_of("file").unwrap();
            let name = sub.value_of("name").unwrap();
            with_client(&repo_opt, Path::new(file), |c, repo| {
                let attrs = c.get_attrs(repo, file)?;
                match attrs.get(name) {
                    Some(value) => println!("{}", value),
                    None => eprintln!("{} has no attribute {}", file, name),
                }
                Ok(())
            })
        }
        ("list", Some(sub)) => {
            let file = sub.value_of("file").unwrap();
            with_client(&repo_opt, Path::new(file), |c, repo| {
                for name in c.get_attrs(repo, file)?.keys() {
                    println!("{}", name);
                }
                Ok(())
            })
        }
        ("describe", Some(sub)) => {
            let file = sub.value_of("file").unwrap();
            with_client(&repo_opt, Path::new(file), |c, repo| {
                for (name, value) in c.get_attrs(repo, file)? {
                    println!("{}: {}", name, value);
                }
                Ok(())
            })
        }
        _ => {
            eprintln!("a subcommand is required (set, unset, get, list, describe)");
            exit(EX_USAGE);
        }
    };

    if let Err(e) = result {
        eprintln!("ufaattr: {}", e);
        exit(EX_UNAVAILABLE);
    }
}

fn with_client(
    repo_opt: &Option<PathBuf>,
    file: &Path,
    body: impl FnOnce(&RpcClient, &Path) -> ufa::UfaResult<()>,
) -> ufa::UfaResult<()> {
    let repo = match repo_opt {
        Some(repo) => repo.clone(),
        None => {
            let start = file.parent().unwrap_or(Path::new(".")).to_path_buf();
            find_repo_for(&start).ok_or_else(|| UfaError::NotInRepo(start.display().to_string()))?
        }
    };
    let client = RpcClient::new(socket_path());
    body(&client, &repo)
}

fn socket_path() -> PathBuf {
    let project_dirs = directories::ProjectDirs::from("", constants::ORG, constants::APP_NAME)
        .expect("couldn't determine a config directory for this platform");
    project_dirs.config_dir().join(constants::SOCKET_FILE_NAME)
}
