//! Collector input for the local search node.
//!
//! Unlike the cluster bootstrap this runs on every render: the file follows
//! the databases key, and the collector is restarted only when the file
//! actually changed. A failed restart puts the previous file back, so the
//! next render sees a difference and tries the restart again.

use std::fs;
use std::path::Path;

use crate::error::{BootstrapError, Result};
use crate::fsutil::{backup_path, write_atomic, Ownership, WriteOptions};
use crate::infrastructure::ServiceManager;
use crate::kv::KvSource;
use crate::render::metrics_inputs;
use crate::types::config::NodeConfig;
use crate::types::outcome::ResourceStatus;

const INPUTS_MODE: u32 = 0o550;

pub struct MetricsRender<'a> {
    config: &'a NodeConfig,
    kv: &'a dyn KvSource,
    services: &'a dyn ServiceManager,
    ownership: Ownership,
}

impl<'a> MetricsRender<'a> {
    pub fn new(config: &'a NodeConfig, kv: &'a dyn KvSource, services: &'a dyn ServiceManager) -> Self {
        let telegraf = &config.telegraf;
        MetricsRender {
            config,
            kv,
            services,
            ownership: Ownership::new(&telegraf.service_user, &telegraf.service_group),
        }
    }

    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    /// Database tag for the input. Absent or blank falls back to the
    /// configured default.
    pub fn database(&self) -> Result<String> {
        let telegraf = &self.config.telegraf;
        let database = self
            .kv
            .get(&telegraf.databases_key)?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| telegraf.default_database.clone());
        Ok(database)
    }

    pub fn apply(&self) -> Result<ResourceStatus> {
        let telegraf = &self.config.telegraf;
        let database = self.database()?;
        let path = telegraf.inputs_file();
        let content = metrics_inputs(&self.config.elasticsearch, &database);
        let options = WriteOptions::mode(INPUTS_MODE)
            .owned_by(self.ownership.clone())
            .with_backup();

        let existed = path.exists();
        let status = write_atomic(&path, content.as_bytes(), &options).map_err(|source| {
            BootstrapError::RenderWriteFailure {
                path: path.clone(),
                source,
            }
        })?;
        tracing::info!(path = %path.display(), %status, database = %database, "metrics inputs rendered");

        if status.changed() {
            if let Err(e) = self.services.restart(&telegraf.service_name) {
                roll_back(&path, existed);
                return Err(e);
            }
        }
        Ok(status)
    }
}

fn roll_back(path: &Path, existed: bool) {
    let result = if existed {
        fs::rename(backup_path(path), path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => tracing::warn!(path = %path.display(), "collector restart failed, previous inputs restored"),
        Err(e) => tracing::error!(path = %path.display(), error = %e, "collector restart failed and inputs could not be restored"),
    }
}
