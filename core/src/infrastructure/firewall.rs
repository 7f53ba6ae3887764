//! Inbound firewall rules through `ufw`.

use crate::error::{BootstrapError, Result};
use crate::types::outcome::ResourceStatus;

use super::runner::CommandRunner;

const UFW: &str = "ufw";

/// One inbound TCP allow rule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirewallRule {
    pub name: String,
    pub description: String,
    pub port: u16,
}

impl FirewallRule {
    pub fn allow_in(name: &str, description: &str, port: u16) -> Self {
        FirewallRule {
            name: name.to_string(),
            description: description.to_string(),
            port,
        }
    }
}

pub struct Ufw<R> {
    runner: R,
}

impl<R: CommandRunner> Ufw<R> {
    pub fn new(runner: R) -> Self {
        Ufw { runner }
    }

    /// Add the rule unless `ufw status` already lists the port as allowed.
    pub fn ensure(&self, rule: &FirewallRule) -> Result<ResourceStatus> {
        let status = self
            .runner
            .run(UFW, &["status"])
            .map_err(|e| resource_error(rule, format!("ufw status: {}", e)))?;
        if port_allowed(&status, rule.port) {
            tracing::debug!(rule = %rule.name, port = rule.port, "firewall rule present");
            return Ok(ResourceStatus::Unchanged);
        }

        let port = rule.port.to_string();
        self.runner
            .run(
                UFW,
                &[
                    "allow",
                    "in",
                    "proto",
                    "tcp",
                    "to",
                    "any",
                    "port",
                    port.as_str(),
                    "comment",
                    rule.description.as_str(),
                ],
            )
            .map_err(|e| resource_error(rule, format!("ufw allow: {}", e)))?;
        tracing::info!(rule = %rule.name, port = rule.port, "firewall rule added");
        Ok(ResourceStatus::Changed)
    }
}

/// Whether a `ufw status` listing has an ALLOW line for `<port>/tcp` or a
/// bare `<port>`.
fn port_allowed(status: &str, port: u16) -> bool {
    let tcp = format!("{}/tcp", port);
    let bare = port.to_string();
    status.lines().any(|line| {
        let mut fields = line.split_whitespace();
        let target = fields.next();
        let allowed = line.contains("ALLOW");
        allowed && (target == Some(tcp.as_str()) || target == Some(bare.as_str()))
    })
}

fn resource_error(rule: &FirewallRule, detail: String) -> BootstrapError {
    BootstrapError::Resource {
        name: rule.name.clone(),
        detail,
    }
}
