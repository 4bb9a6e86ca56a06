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

use serde::Deserialize;
use structopt::StructOpt;
use structopt_toml::StructOptToml;

pub const CONFIG_FILE: &str = "dispatcherd_config.toml";
pub const CONFIG_FILE_CONTENTS: &str = include_str!("../dispatcherd_config.toml");

/// dispatcherd cli
#[derive(Clone, Debug, Deserialize, StructOpt, StructOptToml)]
#[serde(default)]
#[structopt(name = "dispatcherd")]
pub struct Args {
    /// Sets a custom config file
    #[structopt(long)]
    pub config: Option<String>,

    /// Directory holding one TOML file per service
    #[structopt(long = "config-dir", default_value = "/etc/dispatcherd/services")]
    pub config_dir: String,

    /// Directory the daemon creates its per-service UDS pair under
    #[structopt(long = "socket-dir", default_value = "/tmp/jf_dispatcher")]
    pub socket_dir: String,

    /// chdir into this directory before resolving relative paths
    #[structopt(long)]
    pub chdir: Option<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[structopt(short, parse(from_occurrences))]
    pub verbose: u8,

    /// Tee logs to this file in addition to stderr
    #[structopt(long)]
    pub log: Option<String>,
}
