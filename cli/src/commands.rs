//! Subcommand bodies. Each returns the text to print on success.

use std::path::{Path, PathBuf};

use serde::Serialize;

use searchnode_core::convergence::{BootstrapController, Sleeper};
use searchnode_core::data::FlagFile;
use searchnode_core::infrastructure::runner::CommandRunner;
use searchnode_core::infrastructure::ServiceManager;
use searchnode_core::kv::{ClusterPrerequisites, ConsulCliKv, KvSource, PrerequisiteSet, SnapshotFileKv};
use searchnode_core::metrics::MetricsRender;
use searchnode_core::provision::Provisioner;
use searchnode_core::render::cluster_config;
use searchnode_core::{BootstrapError, CompletionFlag, ConvergeOutcome, NodeConfig, Result};

use crate::SourceArgs;

/// The host the commands act on. `main` passes systemctl and real processes.
#[derive(Clone, Copy)]
pub struct Host<'a> {
    pub services: &'a dyn ServiceManager,
    pub sleeper: &'a dyn Sleeper,
    pub runner: &'a dyn CommandRunner,
}

fn kv_source<'a>(
    source: &SourceArgs,
    default_snapshot: &Path,
    runner: &'a dyn CommandRunner,
) -> Result<Box<dyn KvSource + 'a>> {
    if source.consul {
        return Ok(Box::new(ConsulCliKv::new(runner)));
    }
    let path = source
        .snapshot
        .clone()
        .unwrap_or_else(|| default_snapshot.to_path_buf());
    Ok(Box::new(SnapshotFileKv::load(&path)?))
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| BootstrapError::Encode {
        what: "output",
        detail: e.to_string(),
    })
}

/// Print a command's result and pick the exit status. Missing prerequisites
/// are a normal state for a post-render hook and exit 0.
pub fn finish(result: Result<String>) -> i32 {
    match result {
        Ok(output) => {
            if !output.is_empty() {
                println!("{}", output);
            }
            0
        }
        Err(e) if e.is_deferral() => {
            tracing::info!(reason = %e, "deferred");
            println!("deferred: {}", e);
            0
        }
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("searchnode error: {}", e);
            1
        }
    }
}

pub fn converge(config: &NodeConfig, host: Host, source: &SourceArgs, json: bool) -> Result<String> {
    let kv = kv_source(source, &config.bootstrap.snapshot_path, host.runner)?;
    let outcome = BootstrapController::new(config, kv.as_ref(), host.services, host.sleeper)
        .attempt_converge()?;
    if json {
        return to_json(&outcome);
    }
    Ok(match &outcome {
        ConvergeOutcome::Deferred { missing } => format!("deferred: waiting for {}", missing.join(", ")),
        other => other.label().to_string(),
    })
}

pub fn metrics(config: &NodeConfig, host: Host, source: &SourceArgs, json: bool) -> Result<String> {
    let kv = kv_source(source, &config.telegraf.snapshot_path, host.runner)?;
    let status = MetricsRender::new(config, kv.as_ref(), host.services).apply()?;
    if json {
        return to_json(&status);
    }
    Ok(status.to_string())
}

pub fn provision(config: &NodeConfig, host: Host, json: bool) -> Result<String> {
    let report = Provisioner::new(config, host.runner).run()?;
    if json {
        return to_json(&report);
    }
    let lines: Vec<String> = report
        .steps
        .iter()
        .map(|s| format!("{:<10} {}", s.status.to_string(), s.resource))
        .collect();
    Ok(lines.join("\n"))
}

pub fn render(config: &NodeConfig, snapshot: Option<&Path>) -> Result<String> {
    let path = snapshot.unwrap_or(config.bootstrap.snapshot_path.as_path());
    let kv = SnapshotFileKv::load(path)?;
    let prereqs = ClusterPrerequisites::resolve(&config.cluster, &kv)?;
    let mut out = cluster_config(&config.elasticsearch, &prereqs);
    // println adds the final newline back.
    out.pop();
    Ok(out)
}

#[derive(Debug, Serialize)]
struct NodeStatus {
    flag_path: PathBuf,
    flag: CompletionFlag,
    service: String,
    enabled: bool,
    active: bool,
    prerequisites: Vec<Prerequisite>,
}

#[derive(Debug, Serialize)]
struct Prerequisite {
    key: String,
    present: bool,
}

pub fn status(config: &NodeConfig, host: Host, source: &SourceArgs, json: bool) -> Result<String> {
    let flag = FlagFile::new(&config.bootstrap.flag_path);
    let service = config.elasticsearch.service_name.clone();
    let kv = kv_source(source, &config.bootstrap.snapshot_path, host.runner)?;
    let prerequisites = PrerequisiteSet::for_cluster(&config.cluster)
        .presence(kv.as_ref())?
        .into_iter()
        .map(|(key, present)| Prerequisite { key, present })
        .collect();

    let status = NodeStatus {
        flag_path: flag.path().to_path_buf(),
        flag: flag.read()?,
        enabled: host.services.is_enabled(&service)?,
        active: host.services.is_active(&service)?,
        service,
        prerequisites,
    };
    if json {
        return to_json(&status);
    }

    let mut lines = vec![
        format!("flag:    {} ({})", status.flag, status.flag_path.display()),
        format!(
            "service: {} enabled={} active={}",
            status.service, status.enabled, status.active
        ),
    ];
    for p in &status.prerequisites {
        let mark = if p.present { "present" } else { "missing" };
        lines.push(format!("key:     {} {}", p.key, mark));
    }
    Ok(lines.join("\n"))
}

pub fn reset_flag(config: &NodeConfig) -> Result<String> {
    let flag = FlagFile::new(&config.bootstrap.flag_path);
    let previous = flag.read().unwrap_or(CompletionFlag::NotInitialized);
    flag.write(CompletionFlag::NotInitialized)?;
    tracing::warn!(flag = %flag.path().display(), %previous, "completion flag reset");
    Ok(format!("{} -> {}", previous, CompletionFlag::NotInitialized))
}
