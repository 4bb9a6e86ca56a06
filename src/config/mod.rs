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

//! Service/message config store (C11). One TOML file per service
//! under the config directory, parsed the way the teacher parses its
//! own TOML sub-tables (`bin/lilith/src/config.rs`,
//! `bin/darkirc/src/settings.rs`), except each file here maps
//! directly onto one `ServiceConfig` via `serde::Deserialize` since
//! there's exactly one service per file. Immutable after `scan`
//! returns, aside from the one field the daemon flips at runtime.

use std::{
    path::{Path, PathBuf},
    sync::{atomic::{AtomicU32, Ordering}, Arc},
};

use log::{info, warn};
use serde::Deserialize;

use crate::error::{Error, Result};

pub const MAX_SERVICE_NAME_LEN: usize = 24;

/// Sentinel for `ServiceConfig::runtime_service_id` before the
/// service's first valid `SERV_ACTIVE`.
pub const INVALID_SERVICE_ID: u32 = u32::MAX;

#[derive(Debug, Clone, Deserialize)]
pub struct MsgConfig {
    pub msg_id: u32,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct ServiceConfigToml {
    name: String,
    #[serde(default = "default_version")]
    version: String,
    user_id: u32,
    group_id: u32,
    messaging_in: String,
    messaging_out: String,
    #[serde(default = "default_max_queued_msgs")]
    max_queued_msgs: usize,
    #[serde(default = "default_max_msg_size")]
    max_msg_size: usize,
    #[serde(default)]
    published: Vec<MsgConfig>,
    #[serde(default)]
    subscribed: Vec<MsgConfig>,
}

fn default_version() -> String {
    "0.1".to_string()
}
fn default_max_queued_msgs() -> usize {
    64
}
fn default_max_msg_size() -> usize {
    64 * 1024
}

#[derive(Debug, Deserialize)]
struct ServiceFile {
    service: ServiceConfigToml,
}

/// Identifies one local service. Immutable apart from
/// `runtime_service_id`, which the ingress path flips from
/// [`INVALID_SERVICE_ID`] to the peer's pid on its first valid
/// `SERV_ACTIVE`, and which routing reads for the unicast filter.
pub struct ServiceConfig {
    pub config_id: u16,
    pub name: String,
    pub version: String,
    pub user_id: u32,
    pub group_id: u32,
    pub messaging_in_path: PathBuf,
    pub messaging_out_path: PathBuf,
    pub max_queued_msgs: usize,
    pub max_msg_size: usize,
    pub published: Vec<MsgConfig>,
    pub subscribed: Vec<MsgConfig>,
    runtime_service_id: AtomicU32,
}

pub type ServiceConfigPtr = Arc<ServiceConfig>;

impl ServiceConfig {
    #[cfg(test)]
    pub(crate) fn for_test(config_id: u16, subscribed: Vec<MsgConfig>) -> ServiceConfigPtr {
        Arc::new(Self {
            config_id,
            name: format!("svc{config_id}"),
            version: "0.1".into(),
            user_id: 0,
            group_id: 0,
            messaging_in_path: PathBuf::from(format!("svc{config_id}.in")),
            messaging_out_path: PathBuf::from(format!("svc{config_id}.out")),
            max_queued_msgs: 4,
            max_msg_size: 4096,
            published: vec![],
            subscribed,
            runtime_service_id: AtomicU32::new(INVALID_SERVICE_ID),
        })
    }

    pub fn runtime_service_id(&self) -> u32 {
        self.runtime_service_id.load(Ordering::Acquire)
    }

    pub fn set_runtime_service_id(&self, service_id: u32) {
        self.runtime_service_id.store(service_id, Ordering::Release)
    }

    pub fn is_active(&self) -> bool {
        self.runtime_service_id() != INVALID_SERVICE_ID
    }

    pub fn is_published(&self, msg_id: u32) -> bool {
        self.published.iter().any(|m| m.msg_id == msg_id)
    }

    pub fn is_subscribed(&self, msg_id: u32) -> bool {
        self.subscribed.iter().any(|m| m.msg_id == msg_id)
    }
}

/// Immutable after `scan` returns; every other component holds
/// read-only `Arc` references into it.
pub struct ConfigStore {
    services: Vec<ServiceConfigPtr>,
}

impl ConfigStore {
    pub fn services(&self) -> &[ServiceConfigPtr] {
        &self.services
    }

    /// Reads every `*.toml` file directly under `dir` and builds one
    /// `ServiceConfig` per file. `config_id` is assigned in scan
    /// order; a duplicate `name` is rejected rather than silently
    /// shadowing the earlier entry (the original source is silent on
    /// this failure mode — decision recorded in DESIGN.md).
    pub fn scan(dir: &Path) -> Result<Self> {
        let mut services = Vec::new();
        let mut entries: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().map(|ext| ext == "toml").unwrap_or(false))
            .collect();
        entries.sort();

        for (idx, path) in entries.into_iter().enumerate() {
            let data = std::fs::read_to_string(&path)?;
            let file: ServiceFile = toml::from_str(&data)?;
            let toml_cfg = file.service;

            if toml_cfg.name.len() > MAX_SERVICE_NAME_LEN {
                warn!(target: "dispatcherd::config", "skipping {}: {}", path.display(),
                    Error::Config(format!(
                        "service name '{}' exceeds {} chars", toml_cfg.name, MAX_SERVICE_NAME_LEN
                    )));
                continue
            }

            if services.iter().any(|s: &ServiceConfigPtr| s.name == toml_cfg.name) {
                return Err(Error::DuplicateService(toml_cfg.name))
            }

            info!(target: "dispatcherd::config", "loaded service config '{}' from {}",
                toml_cfg.name, path.display());

            services.push(Arc::new(ServiceConfig {
                config_id: idx as u16,
                name: toml_cfg.name,
                version: toml_cfg.version,
                user_id: toml_cfg.user_id,
                group_id: toml_cfg.group_id,
                messaging_in_path: PathBuf::from(toml_cfg.messaging_in),
                messaging_out_path: PathBuf::from(toml_cfg.messaging_out),
                max_queued_msgs: toml_cfg.max_queued_msgs,
                max_msg_size: toml_cfg.max_msg_size,
                published: toml_cfg.published,
                subscribed: toml_cfg.subscribed,
                runtime_service_id: AtomicU32::new(INVALID_SERVICE_ID),
            }));
        }

        Ok(Self { services })
    }
}
