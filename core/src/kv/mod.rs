//! Read-only access to the coordination store's key-value entries.
//!
//! Absence is `Ok(None)`; an empty value is `Ok(Some(""))`. Lookup failures
//! (store unreachable, unreadable snapshot) are errors, never absence.

pub mod prerequisites;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{BootstrapError, Result};
use crate::infrastructure::runner::{CommandFailure, CommandRunner};

pub use prerequisites::{ClusterPrerequisites, PrerequisiteSet, Prerequisites};

pub trait KvSource {
    fn get(&self, key: &str) -> Result<Option<String>>;
}

impl<K: KvSource + ?Sized> KvSource for &K {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }
}

/// An in-memory snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticKv {
    entries: BTreeMap<String, String>,
}

impl StaticKv {
    pub fn new() -> Self {
        StaticKv::default()
    }

    pub fn with(mut self, key: &str, value: &str) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }
}

impl KvSource for StaticKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }
}

/// A YAML mapping of key path to value, rendered by the templating daemon
/// with one entry per key that exists. A missing file means no key exists.
#[derive(Debug, Clone)]
pub struct SnapshotFileKv {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl SnapshotFileKv {
    pub fn load(path: &Path) -> Result<Self> {
        let entries = match std::fs::read_to_string(path) {
            Ok(content) => parse_snapshot(&content).map_err(|detail| BootstrapError::KeyValue {
                key: path.display().to_string(),
                detail,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no prerequisite snapshot yet");
                BTreeMap::new()
            }
            Err(e) => {
                return Err(BootstrapError::KeyValue {
                    key: path.display().to_string(),
                    detail: e.to_string(),
                })
            }
        };
        Ok(SnapshotFileKv {
            path: path.to_path_buf(),
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KvSource for SnapshotFileKv {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }
}

/// Parse a snapshot body. Blank documents are empty snapshots; scalar values
/// of any YAML type are taken as their string form.
fn parse_snapshot(content: &str) -> Result<BTreeMap<String, String>, String> {
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let raw: BTreeMap<String, serde_yaml::Value> =
        serde_yaml::from_str(content).map_err(|e| e.to_string())?;
    let mut entries = BTreeMap::new();
    for (key, value) in raw {
        let text = match value {
            serde_yaml::Value::String(s) => s,
            serde_yaml::Value::Number(n) => n.to_string(),
            serde_yaml::Value::Bool(b) => b.to_string(),
            serde_yaml::Value::Null => String::new(),
            _ => return Err(format!("value of '{}' is not a scalar", key)),
        };
        entries.insert(key, text);
    }
    Ok(entries)
}

/// Live lookups through the `consul kv get` CLI.
pub struct ConsulCliKv<R> {
    runner: R,
    program: String,
}

impl<R: CommandRunner> ConsulCliKv<R> {
    pub fn new(runner: R) -> Self {
        ConsulCliKv {
            runner,
            program: "consul".into(),
        }
    }

    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }
}

impl<R: CommandRunner> KvSource for ConsulCliKv<R> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.runner.run(&self.program, &["kv", "get", key]) {
            // The CLI terminates the value with a newline.
            Ok(out) => Ok(Some(out.strip_suffix('\n').unwrap_or(&out).to_string())),
            Err(CommandFailure::Exit { stderr, .. }) if stderr.contains("No key exists") => Ok(None),
            Err(e) => Err(BootstrapError::KeyValue {
                key: key.to_string(),
                detail: e.to_string(),
            }),
        }
    }
}
