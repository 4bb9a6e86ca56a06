/* This file is part of DarkFi (https://dark.fi)
 *
 * Copyright (C) 2020-2026 Dyne.org foundation
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as
 * published by the Free Software Foundation, either version 3 of the
 * License, or (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program.  If not, see <https://www.gnu.org/licenses/>.
 */

use std::path::{Path, PathBuf};

use async_std::sync::Arc;
use easy_parallel::Parallel;
use log::{error, info};
use simplelog::{ColorChoice, CombinedLogger, Config as LogConfig, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use smol::Executor;
use structopt::StructOpt;
use structopt_toml::StructOptToml;

use dispatcherd::config::ConfigStore;
use dispatcherd::daemon::Daemon;
use dispatcherd::error::Result;
use dispatcherd::settings::{Args, CONFIG_FILE, CONFIG_FILE_CONTENTS};
use dispatcherd::signals::SignalHandler;

/// Finds `args.config`, falling back to `<current dir>/CONFIG_FILE`,
/// writing out the embedded default contents the first time the
/// daemon runs in a fresh directory.
fn get_config_path(config: Option<String>, default_name: &str) -> Result<PathBuf> {
    if let Some(path) = config {
        return Ok(PathBuf::from(path))
    }
    let path = PathBuf::from(default_name);
    if !path.exists() {
        std::fs::write(&path, CONFIG_FILE_CONTENTS)?;
    }
    Ok(path)
}

fn init_logger(verbose: u8, log_path: &Option<String>) -> Result<()> {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let term_logger =
        TermLogger::new(level, LogConfig::default(), TerminalMode::Mixed, ColorChoice::Auto);

    match log_path {
        Some(path) => {
            let file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
            CombinedLogger::init(vec![term_logger, WriteLogger::new(level, LogConfig::default(), file)])
                .ok();
        }
        None => {
            CombinedLogger::init(vec![term_logger]).ok();
        }
    }

    Ok(())
}

async fn realmain(args: Args, executor: Arc<Executor<'static>>) -> Result<()> {
    if let Some(dir) = &args.chdir {
        std::env::set_current_dir(dir)?;
    }

    info!(target: "dispatcherd::main", "scanning service configs in {}", args.config_dir);
    let config = ConfigStore::scan(Path::new(&args.config_dir))?;
    info!(target: "dispatcherd::main", "loaded {} service(s)", config.services().len());

    let daemon = Daemon::new(PathBuf::from(&args.socket_dir), config);
    let tasks = daemon.run(executor).await?;

    let (signals_handler, signals_task) = SignalHandler::new()?;
    signals_handler.wait_termination(signals_task).await?;

    info!(target: "dispatcherd::main", "shutting down");
    daemon.shutdown(tasks).await;

    Ok(())
}

fn main() -> Result<()> {
    let args = Args::from_args();
    let cfg_path = get_config_path(args.config.clone(), CONFIG_FILE)?;
    let toml_contents = std::fs::read_to_string(&cfg_path)?;
    let args = Args::from_args_with_toml(&toml_contents).unwrap_or(args);

    init_logger(args.verbose, &args.log)?;

    // Every socket/xfer task is its own sole mutator, with no lock
    // guarding state shared between tasks; that invariant only holds
    // if exactly one thread ever polls the executor, so this runs
    // single-threaded cooperative rather than work-stealing across
    // available_parallelism() threads.
    let nthreads: usize = 1;
    let executor = Arc::new(Executor::new());
    let (signal, shutdown) = smol::channel::unbounded::<()>();

    let (_, result) = Parallel::new()
        .each(0..nthreads, |_| smol::future::block_on(executor.run(shutdown.recv())))
        .finish(|| {
            smol::future::block_on(async {
                let result = realmain(args, executor.clone()).await;
                drop(signal);
                result
            })
        });

    if let Err(ref e) = result {
        error!(target: "dispatcherd::main", "fatal error: {}", e);
    }

    result
}
