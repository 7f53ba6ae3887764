//! Leaf provisioning for a search node.
//!
//! Lays down everything that does not depend on the coordination store:
//! directories, static JVM and unit files (the heap sized from the host's
//! memory), the service registration, the node configuration and the
//! templating daemon's templates and stanzas, the completion flag, and the
//! firewall rules. Every step is idempotent and reports whether it changed
//! anything. The first failing step aborts the run.
//!
//! The completion flag is only ever created here, never reset: re-running
//! provisioning on an initialized node must not re-arm the bootstrap.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::data::{settings, FlagFile};
use crate::error::{BootstrapError, Result};
use crate::fsutil::{ensure_directory, write_atomic, Ownership, WriteOptions};
use crate::infrastructure::firewall::{FirewallRule, Ufw};
use crate::infrastructure::memory::{total_memory_mb, MEMINFO};
use crate::infrastructure::runner::CommandRunner;
use crate::render::static_files::{
    consul_service_path, java_security_path, jvm_options_path, systemd_unit_path,
};
use crate::render::templates::template_artifacts;
use crate::render::{consul_service, java_security, jvm_options, systemd_unit};
use crate::types::config::NodeConfig;
use crate::types::outcome::ResourceStatus;

const DATA_MODE: u32 = 0o770;
const SERVICE_FILE_MODE: u32 = 0o550;
const SYSTEM_FILE_MODE: u32 = 0o644;

/// One provisioned resource and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisionStep {
    pub resource: String,
    pub status: ResourceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    pub steps: Vec<ProvisionStep>,
}

impl ProvisionReport {
    fn record(&mut self, resource: impl Into<String>, status: ResourceStatus) {
        let resource = resource.into();
        tracing::info!(resource = %resource, %status, "provisioned");
        self.steps.push(ProvisionStep { resource, status });
    }

    /// Changed if any step changed.
    pub fn status(&self) -> ResourceStatus {
        self.steps
            .iter()
            .fold(ResourceStatus::Unchanged, |acc, s| acc.merge(s.status))
    }

    pub fn changed_resources(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.status.changed())
            .map(|s| s.resource.as_str())
            .collect()
    }
}

pub fn firewall_rules(config: &NodeConfig) -> Vec<FirewallRule> {
    let ports = &config.elasticsearch.ports;
    vec![
        FirewallRule::allow_in("elasticsearch-http", "Allow ElasticSearch HTTP traffic", ports.http),
        FirewallRule::allow_in(
            "elasticsearch-discovery",
            "Allow ElasticSearch discovery traffic",
            ports.discovery,
        ),
    ]
}

pub struct Provisioner<'a> {
    config: &'a NodeConfig,
    runner: &'a dyn CommandRunner,
    root: PathBuf,
    service_owner: Ownership,
    system_owner: Ownership,
}

impl<'a> Provisioner<'a> {
    pub fn new(config: &'a NodeConfig, runner: &'a dyn CommandRunner) -> Self {
        let es = &config.elasticsearch;
        Provisioner {
            config,
            runner,
            root: PathBuf::from("/"),
            service_owner: Ownership::new(&es.service_user, &es.service_group),
            system_owner: Ownership::new("root", "root"),
        }
    }

    /// Place every file under `root` instead of `/`.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Leave owners as created.
    pub fn without_ownership(mut self) -> Self {
        self.service_owner = Ownership::unchanged();
        self.system_owner = Ownership::unchanged();
        self
    }

    fn rooted(&self, path: &Path) -> PathBuf {
        self.root.join(path.strip_prefix("/").unwrap_or(path))
    }

    pub fn run(&self) -> Result<ProvisionReport> {
        let mut report = ProvisionReport::default();
        self.directories(&mut report)?;
        self.static_files(&mut report)?;
        self.templates(&mut report)?;

        let flag = FlagFile::new(self.rooted(&self.config.bootstrap.flag_path));
        report.record("completion flag", flag.ensure_present()?);

        let ufw = Ufw::new(self.runner);
        for rule in firewall_rules(self.config) {
            report.record(format!("firewall {}", rule.name), ufw.ensure(&rule)?);
        }
        Ok(report)
    }

    fn directories(&self, report: &mut ProvisionReport) -> Result<()> {
        let es = &self.config.elasticsearch;
        let ct = &self.config.consul_template;
        let mut dirs: Vec<(&Path, Option<u32>, &Ownership)> = vec![
            (es.paths.data_base.as_path(), None, &self.system_owner),
            (es.paths.data.as_path(), Some(DATA_MODE), &self.service_owner),
            (es.paths.config.as_path(), None, &self.service_owner),
            (es.paths.pid.as_path(), None, &self.service_owner),
            (self.config.consul.config_dir.as_path(), None, &self.system_owner),
            (ct.config_path.as_path(), None, &self.system_owner),
            (ct.template_path.as_path(), None, &self.system_owner),
        ];
        let unit = systemd_unit_path(es);
        let parents = [
            unit.parent(),
            self.config.bootstrap.flag_path.parent(),
            ct.config_file.parent(),
        ];
        for parent in parents.into_iter().flatten() {
            dirs.push((parent, None, &self.system_owner));
        }

        for (dir, mode, owner) in dirs {
            let path = self.rooted(dir);
            let status = ensure_directory(&path, mode, owner).map_err(|e| BootstrapError::Resource {
                name: path.display().to_string(),
                detail: e.to_string(),
            })?;
            report.record(dir.display().to_string(), status);
        }
        Ok(())
    }

    fn static_files(&self, report: &mut ProvisionReport) -> Result<()> {
        let es = &self.config.elasticsearch;
        let service = WriteOptions::mode(SERVICE_FILE_MODE).owned_by(self.service_owner.clone());
        let system = WriteOptions::mode(SYSTEM_FILE_MODE).owned_by(self.system_owner.clone());

        let meminfo = self.rooted(Path::new(MEMINFO));
        let memory = total_memory_mb(&meminfo).map_err(|e| BootstrapError::Resource {
            name: meminfo.display().to_string(),
            detail: e.to_string(),
        })?;
        if memory.is_none() {
            tracing::warn!(path = %meminfo.display(), "host memory unknown, leaving the JVM heap at its default");
        }

        self.file(report, &jvm_options_path(es), &jvm_options(es, memory), &service)?;
        self.file(report, &java_security_path(es), &java_security(), &service)?;
        self.file(report, &systemd_unit_path(es), &systemd_unit(es), &system)?;
        self.file(
            report,
            &consul_service_path(&self.config.consul),
            &consul_service(self.config)?,
            &system,
        )?;
        self.file(
            report,
            &self.config.consul_template.config_file,
            &settings::to_yaml(self.config)?,
            &system,
        )
    }

    fn templates(&self, report: &mut ProvisionReport) -> Result<()> {
        let options = WriteOptions::mode(SERVICE_FILE_MODE).owned_by(self.system_owner.clone());
        for artifact in template_artifacts(self.config) {
            self.file(report, &artifact.template_path, &artifact.template, &options)?;
            self.file(report, &artifact.stanza_path, &artifact.stanza.render(), &options)?;
        }
        Ok(())
    }

    fn file(
        &self,
        report: &mut ProvisionReport,
        path: &Path,
        content: &str,
        options: &WriteOptions,
    ) -> Result<()> {
        let target = self.rooted(path);
        let status = write_atomic(&target, content.as_bytes(), options).map_err(|source| {
            BootstrapError::RenderWriteFailure {
                path: target.clone(),
                source,
            }
        })?;
        report.record(path.display().to_string(), status);
        Ok(())
    }
}
