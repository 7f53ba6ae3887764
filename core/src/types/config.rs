use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Exponential,
    Linear,
    Fixed,
}

/// Static description of one search node. Built once at startup and passed
/// by reference; nothing in the crate looks configuration up globally.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct NodeConfig {
    pub elasticsearch: ElasticsearchConfig,
    pub cluster: ClusterKeys,
    pub bootstrap: BootstrapConfig,
    pub consul: ConsulConfig,
    pub consul_template: ConsulTemplateConfig,
    pub telegraf: TelegrafConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ElasticsearchConfig {
    pub service_name: String,
    pub service_user: String,
    pub service_group: String,
    pub paths: ElasticsearchPaths,
    pub ports: Ports,
    /// Mode bits of the rendered `elasticsearch.yml`.
    pub config_mode: u32,
    pub bind_hosts: Vec<String>,
    pub publish_hosts: Vec<String>,
    pub monitoring: bool,
    /// Share of physical memory, in percent, given to the JVM heap.
    pub heap_ratio: u32,
}

impl Default for ElasticsearchConfig {
    fn default() -> Self {
        ElasticsearchConfig {
            service_name: "elasticsearch".into(),
            service_user: "elasticsearch".into(),
            service_group: "elasticsearch".into(),
            paths: ElasticsearchPaths::default(),
            ports: Ports::default(),
            config_mode: 0o550,
            bind_hosts: vec!["_eth0:ipv4_".into(), "_local:ipv4_".into()],
            publish_hosts: vec!["_eth0:ipv4_".into()],
            monitoring: false,
            heap_ratio: 70,
        }
    }
}

impl ElasticsearchConfig {
    pub fn config_file(&self) -> PathBuf {
        self.paths.config.join("elasticsearch.yml")
    }

    pub fn pid_file(&self) -> PathBuf {
        self.paths.pid.join("elasticsearch.pid")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ElasticsearchPaths {
    pub data_base: PathBuf,
    pub data: PathBuf,
    pub home: PathBuf,
    pub config: PathBuf,
    pub logs: PathBuf,
    pub pid: PathBuf,
    pub plugins: PathBuf,
    pub bin: PathBuf,
}

impl Default for ElasticsearchPaths {
    fn default() -> Self {
        ElasticsearchPaths {
            data_base: "/srv/elasticsearch".into(),
            data: "/srv/elasticsearch/data".into(),
            home: "/usr/share/elasticsearch".into(),
            config: "/etc/elasticsearch".into(),
            logs: "/var/log/elasticsearch".into(),
            pid: "/var/run/elasticsearch".into(),
            plugins: "/usr/share/elasticsearch/plugins".into(),
            bin: "/usr/share/elasticsearch/bin".into(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Ports {
    /// Client/API port; also carries the health-check endpoint.
    pub http: u16,
    /// Inter-node transport and discovery port.
    pub discovery: u16,
}

impl Default for Ports {
    fn default() -> Self {
        Ports {
            http: 9200,
            discovery: 9300,
        }
    }
}

/// Key paths in the coordination store that must exist before the cluster
/// configuration may be rendered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterKeys {
    pub datacenter_key: String,
    pub masters_key: String,
}

impl Default for ClusterKeys {
    fn default() -> Self {
        ClusterKeys {
            datacenter_key: "config/services/consul/datacenter".into(),
            masters_key: "config/services/documents/masters".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapConfig {
    pub flag_path: PathBuf,
    /// Where the templating daemon renders the prerequisite snapshot.
    pub snapshot_path: PathBuf,
    pub poll: PollConfig,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        BootstrapConfig {
            flag_path: "/var/log/elasticsearch_config.log".into(),
            snapshot_path: "/tmp/elasticsearch_prerequisites.yml".into(),
            poll: PollConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub strategy: BackoffStrategy,
    pub interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        PollConfig {
            max_attempts: 20,
            strategy: BackoffStrategy::Fixed,
            interval_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConsulConfig {
    pub config_dir: PathBuf,
    pub service_name: String,
    pub service_tag: String,
    pub health_path: String,
    pub check_interval: String,
    pub check_timeout: String,
}

impl Default for ConsulConfig {
    fn default() -> Self {
        ConsulConfig {
            config_dir: "/etc/consul/conf.d".into(),
            service_name: "documents".into(),
            service_tag: "http".into(),
            health_path: "/_cluster/health".into(),
            check_interval: "30s".into(),
            check_timeout: "5s".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ConsulTemplateConfig {
    pub config_path: PathBuf,
    pub template_path: PathBuf,
    /// Installed location of this program, used in post-render commands.
    pub binary: PathBuf,
    /// Node config file handed to the post-render commands.
    pub config_file: PathBuf,
}

impl Default for ConsulTemplateConfig {
    fn default() -> Self {
        ConsulTemplateConfig {
            config_path: "/etc/consul-template.d/conf".into(),
            template_path: "/etc/consul-template.d/templates".into(),
            binary: "/usr/local/bin/searchnode".into(),
            config_file: "/etc/searchnode/node.yml".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TelegrafConfig {
    pub config_directory: PathBuf,
    pub service_name: String,
    pub service_user: String,
    pub service_group: String,
    pub databases_key: String,
    pub default_database: String,
    pub snapshot_path: PathBuf,
}

impl Default for TelegrafConfig {
    fn default() -> Self {
        TelegrafConfig {
            config_directory: "/etc/telegraf/telegraf.d".into(),
            service_name: "telegraf".into(),
            service_user: "telegraf".into(),
            service_group: "telegraf".into(),
            databases_key: "config/services/metrics/databases/services".into(),
            default_database: "services".into(),
            snapshot_path: "/tmp/telegraf_elasticsearch_prerequisites.yml".into(),
        }
    }
}

impl TelegrafConfig {
    pub fn inputs_file(&self) -> PathBuf {
        self.config_directory.join("inputs_elasticsearch.conf")
    }
}
