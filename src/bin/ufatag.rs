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

//! `ufatag`: assigns and queries tags on files, through the RPC Client
//! Façade (the daemon owns the Repository Cache, so the CLI never opens a
//! database directly).

use clap::{App, Arg, SubCommand};
use std::path::{Path, PathBuf};
use std::process::exit;
use ufa::constants::{self, EX_UNAVAILABLE, EX_USAGE};
use ufa::repo::find_repo_for;
use ufa::rpc::RpcClient;
use ufa::UfaError;

fn main() {
    let version_str = constants::version_str();
    let matches = App::new("ufatag")
        .version(&*version_str)
        .about("Assigns and queries tags on files")
        .arg(
            Arg::with_name("repo")
                .short("r")
                .long("repo")
                .takes_value(true)
                .help("Repository directory (defaults to the owning repository of the given file, or the current directory)"),
        )
        .subcommand(
            SubCommand::with_name("set")
                .arg(Arg::with_name("file").required(true).takes_value(true))
                .arg(Arg::with_name("tag").required(true).takes_value(true)),
        )
        .subcommand(
            SubCommand::with_name("unset")
                .arg(Arg::with_name("file").required(true).takes_value(true))
                .arg(Arg::with_name("tag").required(true).takes_value(true)),
        )
        .subcommand(SubCommand::with_name("list").arg(Arg::with_name("file").required(true).takes_value(true)))
        .subcommand(SubCommand::with_name("clear").arg(Arg::with_name("file").required(true).takes_value(true)))
        .subcommand(SubCommand::with_name("list-all"))
        .subcommand(SubCommand::with_name("create").arg(Arg::with_name("tag").required(true).takes_value(true)))
        .get_matches();

    let repo_opt = matches.value_of("repo").map(PathBuf::from);

    let result = match matches.subcommand() {
        ("set", Some(sub)) => {
            let file = sub.value_of("file").unwrap();
            let tag = sub.value_of("tag").unwrap();
            with_client(&repo_opt, Some(Path::new(file)), |c, repo| c.set_tag(repo, file, tag))
        }
        ("unset", Some(sub)) => {
            let file = sub.value_of("file").unwrap();
            let tag = sub.value_of("tag").unwrap();
            with_client(&repo_opt, Some(Path::new(file)), |c, repo| c.unset_tag(repo, file, tag))
        }
        ("list", Some(sub)) => {
            let file = sub.value_of("file").unwrap();
            with_client(&repo_opt, Some(Path::new(file)), |c, repo| {
                for tag in c.get_tags(repo, file)? {
                    println!("{}", tag);
                }
                Ok(())
            })
        }
        ("clear", Some(sub)) => {
            let file = sub.value_of("file").unwrap();
            with_client(&repo_opt, Some(Path::new(file)), |c, repo| c.clear_tags(repo, file))
        }
        ("list-all", _) => with_client(&repo_opt, None, |c, repo| {
            for tag in c.list_tags(repo)? {
                println!("{}", tag);
            }
            Ok(())
        }),
        ("create", Some(sub)) => {
            let tag = sub.value_of("tag").unwrap();
            with_client(&repo_opt, None, |c, repo| {
                let id = c.insert_tag(repo, tag)?;
                println!("{}", id);
                Ok(())
            })
        }
        _ => {
            eprintln!("a subcommand is required (set, unset, list, clear, list-all, create)");
            exit(EX_USAGE);
        }
    };

    if let Err(e) = result {
        eprintln!("ufatag: {}", e);
        exit(EX_UNAVAILABLE);
    }
}

fn with_client(
    repo_opt: &Option<PathBuf>,
    file_hint: Option<&Path>,
    body: impl FnOnce(&RpcClient, &Path) -> ufa::UfaResult<()>,
) -> ufa::UfaResult<()> {
    let repo = resolve_repo(repo_opt, file_hint)?;
    let socket_path = socket_path();
    let client = RpcClient::new(socket_path);
    body(&client, &repo)
}

fn resolve_repo(repo_opt: &Option<PathBuf>, file_hint: Option<&Path>) -> ufa::UfaResult<PathBuf> {
    if let Some(repo) = repo_opt {
        return Ok(repo.clone());
    }
    let start = match file_hint {
        Some(f) => f.parent().unwrap_or(Path::new(".")).to_path_buf(),
        None => std::env::current_dir()?,
    };
    find_repo_for(&start).ok_or_else(|| UfaError::NotInRepo(start.display().to_string()))
}

fn socket_path() -> PathBuf {
    let project_dirs = directories::ProjectDirs::from("", constants::ORG, constants::APP_NAME)
        .expect("couldn't determine a config directory for this platform");
    project_dirs.config_dir().join(constants::SOCKET_FILE_NAME)
}
