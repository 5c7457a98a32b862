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

//! Logging setup shared by the daemon and the CLI tools.
//!
//! The daemon logs to a file under its collection's log directory unless run with
//! `-F` (foreground), in which case it logs to stderr. CLI tools always log to stderr.

use std::path::PathBuf;
use std::str::FromStr;

/// The `-l <level>` argument domain from the daemon CLI surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Off,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "off" => Ok(Level::Off),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

impl From<Level> for log::LevelFilter {
    fn from(level: Level) -> Self {
        match level {
            Level::Off => log::LevelFilter::Off,
            Level::Debug => log::LevelFilter::Debug,
            Level::Info => log::LevelFilter::Info,
            Level::Warn => log::LevelFilter::Warn,
            // `log` has no fatal tier; fatal conditions are still just logged at error level.
            Level::Error | Level::Fatal => log::LevelFilter::Error,
        }
    }
}

pub fn setup(level: Level, foreground: bool, log_dir: Option<PathBuf>) -> Result<(), fern::InitError> {
    let filter: log::LevelFilter = level.into();

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[Thread: {:?}][{}][{}] {}",
                chrono::Local::now().format("[%Y-%m-%d][%H:%M:%S]"),
                std::thread::current().id(),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(filter);

    if foreground || log_dir.is_none() {
        dispatch = dispatch.chain(std::io::stderr());
    } else if let Some(dir) = log_dir {
        std::fs::create_dir_all(&dir)?;
        let log_file = dir.join(format!("{}.log", crate::constants::APP_NAME));
        dispatch = dispatch.chain(fern::log_file(log_file)?);
    }

    dispatch.apply()?;
    Ok(())
}
