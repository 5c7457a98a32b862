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

//! `ufactl`: manages the set of repository directories the daemon watches.
//! Talks to the Config Registry directly rather than through the daemon,
//! since add/remove/list/init are plain local filesystem operations.

use clap::{App, Arg, SubCommand};
use std::path::Path;
use std::process::exit;
use ufa::constants::{self, EX_UNAVAILABLE, EX_USAGE};
use ufa::{ConfigRegistry, Store, UfaError};

fn main() {
    let version_str = constants::version_str();
    let matches = App::new("ufactl")
        .version(&*version_str)
        .about("Manages the set of directories ufad watches")
        .arg(Arg::with_name("verbose").short("v").help("Verbose logging"))
        .subcommand(
            SubCommand::with_name("add")
                .about("Registers a directory for ufad to watch")
                .arg(Arg::with_name("dir").required(true).takes_value(true)),
        )
        .subcommand(
            SubCommand::with_name("remove")
                .about("Stops watching a directory")
                .arg(Arg::with_name("dir").required(true).takes_value(true)),
        )
        .subcommand(SubCommand::with_name("list").about("Lists the watched directories"))
        .subcommand(
            SubCommand::with_name("init")
                .about("Initializes a directory as a repository")
                .arg(Arg::with_name("dir").required(true).takes_value(true)),
        )
        .get_matches();

    let level = if matches.is_present("verbose") { "debug" } else { "warn" };
    let _ = ufa::log::setup(level.parse().unwrap(), true, None);

    let project_dirs = match directories::ProjectDirs::from("", constants::ORG, constants::APP_NAME) {
        Some(d) => d,
        None => {
            eprintln!("couldn't determine a config directory for this platform");
            exit(EX_UNAVAILABLE);
        }
    };
    let registry = ConfigRegistry::new(project_dirs.config_dir().to_path_buf());

    let result = match matches.subcommand() {
        ("add", Some(sub)) => registry.add(Path::new(sub.value_of("dir").unwrap())),
        ("remove", Some(sub)) => registry.remove(Path::new(sub.value_of("dir").unwrap())),
        ("list", _) => registry.list().map(|dirs| {
            for dir in dirs {
                println!("{}", dir.display());
            }
        }),
        ("init", Some(sub)) => init_repo(Path::new(sub.value_of("dir").unwrap())),
        _ => {
            eprintln!("a subcommand is required (add, remove, list, init)");
            exit(EX_USAGE);
        }
    };

    if let Err(e) = result {
        eprintln!("ufactl: {}", e);
        exit(exit_code_for(&e));
    }
}

fn init_repo(dir: &Path) -> ufa::UfaResult<()> {
    Store::open(dir)?;
    println!("initialized repository at {}", dir.display());
    Ok(())
}

fn exit_code_for(e: &UfaError) -> i32 {
    match e {
        UfaError::InvalidArgs(_) | UfaError::NotDir(_) => EX_USAGE,
        _ => EX_UNAVAILABLE,
    }
}
