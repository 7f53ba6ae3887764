//! Artifacts for the templating daemon: Go-template sources and the HCL
//! `template { ... }` stanzas that wire them to post-render commands.
//!
//! The templates only materialize key-value snapshots; every decision is
//! made by the `searchnode` entry point named in the stanza's command.

use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::types::config::NodeConfig;

use super::basic_quote;

/// Budget the templating daemon gives the cluster bootstrap command.
pub const CLUSTER_COMMAND_TIMEOUT: Duration = Duration::from_secs(45);
/// Budget for the metrics leaf command.
pub const METRICS_COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// One `template { ... }` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateStanza {
    pub source: PathBuf,
    pub destination: PathBuf,
    /// Post-render command; empty for none.
    pub command: String,
    pub command_timeout: Duration,
    pub perms: u32,
    pub backup: bool,
    pub wait_min: Duration,
    pub wait_max: Duration,
}

impl TemplateStanza {
    pub fn new(source: PathBuf, destination: PathBuf, command: String, command_timeout: Duration) -> Self {
        TemplateStanza {
            source,
            destination,
            command,
            command_timeout,
            perms: 0o550,
            backup: true,
            wait_min: Duration::from_secs(2),
            wait_max: Duration::from_secs(10),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = self.write_hcl(&mut out);
        out
    }

    fn write_hcl(&self, out: &mut String) -> std::fmt::Result {
        writeln!(out, "template {{")?;
        writeln!(out, "  source = {}", quote_path(&self.source))?;
        writeln!(out, "  destination = {}", quote_path(&self.destination))?;
        writeln!(out, "  create_dest_dirs = false")?;
        writeln!(out, "  command = {}", basic_quote(&self.command))?;
        writeln!(out, "  command_timeout = \"{}s\"", self.command_timeout.as_secs())?;
        writeln!(out, "  error_on_missing_key = false")?;
        writeln!(out, "  perms = 0{:o}", self.perms)?;
        writeln!(out, "  backup = {}", self.backup)?;
        writeln!(out, "  left_delimiter  = \"{{{{\"")?;
        writeln!(out, "  right_delimiter = \"}}}}\"")?;
        writeln!(out, "  wait {{")?;
        writeln!(out, "    min = \"{}s\"", self.wait_min.as_secs())?;
        writeln!(out, "    max = \"{}s\"", self.wait_max.as_secs())?;
        writeln!(out, "  }}")?;
        writeln!(out, "}}")
    }
}

fn quote_path(path: &Path) -> String {
    basic_quote(&path.to_string_lossy())
}

/// Template rendering a YAML snapshot with one entry per key that exists.
/// Absent keys produce no line, so the reader can tell absent from empty.
pub fn snapshot_template(keys: &[String]) -> String {
    let mut out = String::new();
    for key in keys {
        let k = basic_quote(key);
        let _ = writeln!(
            out,
            "{{{{ if keyExists {k} }}}}{yaml_key}: {{{{ key {k} | toJSON }}}}{{{{ end }}}}",
            k = k,
            yaml_key = k,
        );
    }
    out
}

/// Template listing the transport address of every registered node, one
/// per line, for the file-based hosts provider.
pub fn unicast_hosts_template(config: &NodeConfig) -> String {
    format!(
        "{{{{ range service {} }}}}{{{{ .Address }}}}:{}\n{{{{ end }}}}",
        basic_quote(&format!(
            "{}.{}",
            config.consul.service_tag, config.consul.service_name
        )),
        config.elasticsearch.ports.discovery,
    )
}

pub fn unicast_hosts_path(config: &NodeConfig) -> PathBuf {
    config.elasticsearch.paths.config.join("unicast_hosts.txt")
}

/// A named template source plus its stanza.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateArtifact {
    pub name: &'static str,
    pub template_path: PathBuf,
    pub template: String,
    pub stanza_path: PathBuf,
    pub stanza: TemplateStanza,
}

fn entry_command(config: &NodeConfig, subcommand: &str, snapshot: &Path) -> String {
    format!(
        "{} --config {} {} --snapshot {}",
        config.consul_template.binary.display(),
        config.consul_template.config_file.display(),
        subcommand,
        snapshot.display()
    )
}

fn artifact(
    config: &NodeConfig,
    name: &'static str,
    template: String,
    destination: PathBuf,
    command: String,
    command_timeout: Duration,
) -> TemplateArtifact {
    let ct = &config.consul_template;
    let template_path = ct.template_path.join(format!("{}.ctmpl", name));
    let stanza = TemplateStanza::new(
        template_path.clone(),
        destination,
        command,
        command_timeout,
    );
    TemplateArtifact {
        name,
        template_path,
        template,
        stanza_path: ct.config_path.join(format!("{}.hcl", name)),
        stanza,
    }
}

/// Everything the templating daemon needs for this node: the cluster
/// prerequisite snapshot (45s command budget), the unicast hosts list, and
/// the metrics prerequisite snapshot (15s command budget).
pub fn template_artifacts(config: &NodeConfig) -> Vec<TemplateArtifact> {
    let cluster_keys = vec![
        config.cluster.datacenter_key.clone(),
        config.cluster.masters_key.clone(),
    ];
    let bootstrap_snapshot = config.bootstrap.snapshot_path.clone();
    let metrics_snapshot = config.telegraf.snapshot_path.clone();

    vec![
        artifact(
            config,
            "elasticsearch_prerequisites",
            snapshot_template(&cluster_keys),
            bootstrap_snapshot.clone(),
            entry_command(config, "converge", &bootstrap_snapshot),
            CLUSTER_COMMAND_TIMEOUT,
        ),
        artifact(
            config,
            "elasticsearch_hosts",
            unicast_hosts_template(config),
            unicast_hosts_path(config),
            String::new(),
            CLUSTER_COMMAND_TIMEOUT,
        ),
        artifact(
            config,
            "telegraf_elasticsearch_inputs",
            snapshot_template(&[config.telegraf.databases_key.clone()]),
            metrics_snapshot.clone(),
            entry_command(config, "metrics", &metrics_snapshot),
            METRICS_COMMAND_TIMEOUT,
        ),
    ]
}
