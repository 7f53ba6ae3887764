use std::collections::HashSet;
use std::path::Path;

use crate::convergence::retry::PollPolicy;
use crate::error::{BootstrapError, Result};
use crate::render::templates::CLUSTER_COMMAND_TIMEOUT;
use crate::types::config::NodeConfig;


/// Load and validate a `NodeConfig` from a YAML file. Missing sections and
/// fields take their defaults.
pub fn load(path: &Path) -> Result<NodeConfig> {
    let content = std::fs::read_to_string(path).map_err(|source| BootstrapError::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse(&content).map_err(|detail| BootstrapError::ConfigParse {
        path: path.to_path_buf(),
        detail,
    })?;
    validate(&config)?;
    Ok(config)
}


/// Load `path` if given; otherwise load `default_path` when it exists and
/// fall back to built-in defaults when it does not.
pub fn load_or_default(path: Option<&Path>, default_path: &Path) -> Result<NodeConfig> {
    match path {
        Some(p) => load(p),
        None if default_path.exists() => load(default_path),
        None => {
            tracing::debug!(path = %default_path.display(), "no node config found, using defaults");
            Ok(NodeConfig::default())
        }
    }
}


pub fn parse(content: &str) -> Result<NodeConfig, String> {
    if content.trim().is_empty() {
        return Ok(NodeConfig::default());
    }
    serde_yaml::from_str(content).map_err(|e| e.to_string())
}


/// Serialized form, as written next to the templating daemon's stanzas so
/// that post-render commands read the same configuration.
pub fn to_yaml(config: &NodeConfig) -> Result<String> {
    serde_yaml::to_string(config).map_err(|e| BootstrapError::Encode {
        what: "node config",
        detail: e.to_string(),
    })
}


/// Reject configurations the node could not run with.
pub fn validate(config: &NodeConfig) -> Result<()> {
    let es = &config.elasticsearch;
    if es.ports.http == 0 || es.ports.discovery == 0 {
        return Err(invalid("ports must be non-zero"));
    }
    if es.ports.http == es.ports.discovery {
        return Err(invalid("http and discovery ports must differ"));
    }
    if es.service_name.trim().is_empty() {
        return Err(invalid("elasticsearch.service_name is empty"));
    }
    if es.config_mode > 0o7777 {
        return Err(invalid("elasticsearch.config_mode is not a mode"));
    }
    if !(1..=100).contains(&es.heap_ratio) {
        return Err(invalid("elasticsearch.heap_ratio must be a percentage between 1 and 100"));
    }
    if config.bootstrap.poll.max_attempts == 0 {
        return Err(invalid("bootstrap.poll.max_attempts must be at least 1"));
    }
    // The enable wait and the active wait both run inside one post-render
    // command.
    let worst_case = PollPolicy::from(&config.bootstrap.poll).worst_case();
    if worst_case.saturating_mul(2) > CLUSTER_COMMAND_TIMEOUT {
        return Err(invalid(&format!(
            "bootstrap.poll may wait {}s per state, more than half the {}s command timeout",
            worst_case.as_secs(),
            CLUSTER_COMMAND_TIMEOUT.as_secs()
        )));
    }

    let keys = [
        ("cluster.datacenter_key", &config.cluster.datacenter_key),
        ("cluster.masters_key", &config.cluster.masters_key),
        ("telegraf.databases_key", &config.telegraf.databases_key),
    ];
    for (name, key) in keys {
        if key.trim().is_empty() {
            return Err(invalid(&format!("{} is empty", name)));
        }
    }
    let mut seen = HashSet::new();
    for key in [&config.cluster.datacenter_key, &config.cluster.masters_key] {
        if !seen.insert(key) {
            return Err(invalid("cluster keys must be distinct"));
        }
    }
    Ok(())
}


fn invalid(msg: &str) -> BootstrapError {
    BootstrapError::ConfigInvalid(msg.to_string())
}
