use std::collections::BTreeMap;

use crate::error::{BootstrapError, Result};
use crate::types::config::ClusterKeys;

use super::KvSource;

/// The keys that must all exist before the cluster configuration may be
/// rendered, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrerequisiteSet {
    keys: Vec<String>,
}

impl PrerequisiteSet {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PrerequisiteSet {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn for_cluster(keys: &ClusterKeys) -> Self {
        PrerequisiteSet::new([keys.datacenter_key.as_str(), keys.masters_key.as_str()])
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// Look every key up. All present yields the snapshot; otherwise
    /// `PreconditionsUnavailable` lists every absent key.
    pub fn resolve(&self, kv: &dyn KvSource) -> Result<Prerequisites> {
        let mut values = BTreeMap::new();
        let mut missing = Vec::new();
        for key in &self.keys {
            match kv.get(key)? {
                Some(value) => {
                    values.insert(key.clone(), value);
                }
                None => missing.push(key.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(BootstrapError::PreconditionsUnavailable { missing });
        }
        Ok(Prerequisites { values })
    }

    /// Presence of each key, for reporting.
    pub fn presence(&self, kv: &dyn KvSource) -> Result<Vec<(String, bool)>> {
        self.keys
            .iter()
            .map(|key| Ok((key.clone(), kv.get(key)?.is_some())))
            .collect()
    }
}

/// Values of a fully present `PrerequisiteSet`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prerequisites {
    values: BTreeMap<String, String>,
}

impl Prerequisites {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    fn require(&self, key: &str) -> Result<&str> {
        self.get(key).ok_or_else(|| BootstrapError::PreconditionsUnavailable {
            missing: vec![key.to_string()],
        })
    }
}

/// Validated cluster inputs of the rendered configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterPrerequisites {
    pub datacenter: String,
    pub minimum_master_nodes: u32,
}

impl ClusterPrerequisites {
    pub fn from_prerequisites(keys: &ClusterKeys, values: &Prerequisites) -> Result<Self> {
        let datacenter = values.require(&keys.datacenter_key)?.trim();
        if datacenter.is_empty() {
            return Err(BootstrapError::InvalidPrecondition {
                key: keys.datacenter_key.clone(),
                value: datacenter.to_string(),
                reason: "cluster name must not be empty",
            });
        }

        let masters_raw = values.require(&keys.masters_key)?;
        let minimum_master_nodes = match masters_raw.trim().parse::<u32>() {
            Ok(n) if n > 0 => n,
            _ => {
                return Err(BootstrapError::InvalidPrecondition {
                    key: keys.masters_key.clone(),
                    value: masters_raw.to_string(),
                    reason: "minimum master count must be a positive integer",
                })
            }
        };

        Ok(ClusterPrerequisites {
            datacenter: datacenter.to_string(),
            minimum_master_nodes,
        })
    }

    /// Resolve and validate in one step.
    pub fn resolve(keys: &ClusterKeys, kv: &dyn KvSource) -> Result<Self> {
        let values = PrerequisiteSet::for_cluster(keys).resolve(kv)?;
        Self::from_prerequisites(keys, &values)
    }
}
