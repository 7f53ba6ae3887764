use std::fmt;

use serde::{Deserialize, Serialize};

/// Result of an idempotent operation that did not fail.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceStatus {
    Unchanged,
    Changed,
}

impl ResourceStatus {
    pub fn changed(&self) -> bool {
        matches!(self, ResourceStatus::Changed)
    }

    /// Fold two statuses: changed if either changed.
    pub fn merge(self, other: ResourceStatus) -> ResourceStatus {
        if self.changed() || other.changed() {
            ResourceStatus::Changed
        } else {
            ResourceStatus::Unchanged
        }
    }
}

impl fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceStatus::Unchanged => f.write_str("unchanged"),
            ResourceStatus::Changed => f.write_str("changed"),
        }
    }
}

/// How the managed service was brought to its running state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ServiceAction {
    Started,
    Restarted,
}

/// Result of one bootstrap pass that did not fail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ConvergeOutcome {
    /// Some prerequisites are absent; nothing was touched.
    Deferred { missing: Vec<String> },
    /// The flag already says `Initialized`; nothing was touched.
    AlreadyInitialized,
    /// The one-time render and (re)start completed and the flag was set.
    Initialized {
        enabled_service: bool,
        service_action: ServiceAction,
    },
}

impl ConvergeOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ConvergeOutcome::Deferred { .. } => "deferred",
            ConvergeOutcome::AlreadyInitialized => "already initialized",
            ConvergeOutcome::Initialized { .. } => "initialized",
        }
    }
}
