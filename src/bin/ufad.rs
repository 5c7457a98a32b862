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

//! The ufa daemon: owns the Repository Cache, runs the Watcher Reactor, and
//! serves the RPC Server over a well-known UNIX socket.

use clap::{App, Arg};
use log::{info, warn};
use nix::unistd::{fork, ForkResult};
use std::process::exit;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use ufa::constants::{self, EX_OK, EX_UNAVAILABLE, EX_USAGE};
use ufa::repo::RepoCache;
use ufa::rpc::RpcServer;
use ufa::watch::Reactor;
use ufa::ConfigRegistry;

fn main() {
    let version_str = ufa::constants::version_str();
    let matches = App::new("ufad")
        .version(&*version_str)
        .about("Tag-based virtual file system daemon")
        .arg(Arg::with_name("verbose").short("v").help("Shorthand for -l debug"))
        .arg(
            Arg::with_name("foreground")
                .short("F")
                .help("Run in the foreground instead of forking into the background"),
        )
        .arg(
            Arg::with_name("detailed-log")
                .short("L")
                .help("Log with file/line detail"),
        )
        .arg(
            Arg::with_name("level")
                .short("l")
                .takes_value(true)
                .possible_values(&["off", "debug", "info", "warn", "error", "fatal"])
                .help("Log level"),
        )
        .get_matches();

    let foreground = matches.is_present("foreground");
    let level = matches.value_of("level").map(str::to_owned).unwrap_or_else(|| {
        if matches.is_present("verbose") || matches.is_present("detailed-log") {
            "debug".to_owned()
        } else {
            "warn".to_owned()
        }
    });
    let level: ufa::log::Level = match level.parse() {
        Ok(l) => l,
        Err(e) => {
            eprintln!("invalid log level: {}", e);
            exit(EX_USAGE);
        }
    };

    let project_dirs = match directories::ProjectDirs::from("", constants::ORG, constants::APP_NAME) {
        Some(d) => d,
        None => {
            eprintln!("couldn't determine a config directory for this platform");
            exit(EX_UNAVAILABLE);
        }
    };
    let config_dir = project_dirs.config_dir().to_path_buf();

    if !foreground {
        match fork() {
            Ok(ForkResult::Parent { child }) => {
                println!("ufad forked, pid {}", child);
                exit(EX_OK);
            }
            Ok(ForkResult::Child) => {}
            Err(e) => {
                eprintln!("fork failed: {}", e);
                exit(EX_UNAVAILABLE);
            }
        }
    }

    ufa::log::setup(level, foreground, Some(config_dir.clone()))
        .unwrap_or_else(|e| eprintln!("couldn't set up logging: {}", e));

    if let Err(e) = run(config_dir) {
        warn!("ufad exiting with error: {}", e);
        exit(EX_UNAVAILABLE);
    }
}

fn run(config_dir: std::path::PathBuf) -> ufa::UfaResult<()> {
    let registry = Arc::new(ConfigRegistry::new(config_dir.clone()));
    let cache = Arc::new(RepoCache::new());
    let reactor = Reactor::new(config_dir.clone(), cache.clone(), registry.clone());
    reactor.start()?;

    let socket_path = config_dir.join(constants::SOCKET_FILE_NAME);
    let server = RpcServer::bind(socket_path.clone(), cache, registry.clone())?;
    info!("ufad ready, socket at {:?}", socket_path);

    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::SIGINT, Arc::clone(&stop))?;
    signal_hook::flag::register(signal_hook::SIGTERM, Arc::clone(&stop))?;
    while !stop.load(Ordering::Relaxed) {
        std::thread::sleep(std::time::Duration::from_millis(200));
    }

    info!("ufad shutting down");
    server.stop();
    reactor.stop();
    Ok(())
}
