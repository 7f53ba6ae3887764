//! `systemctl` implementation of `ServiceManager`.

use crate::error::{BootstrapError, Result};

use super::runner::{CommandFailure, CommandRunner};
use super::ServiceManager;

const SYSTEMCTL: &str = "systemctl";

/// Drives systemd through a `CommandRunner`.
pub struct Systemctl<R> {
    runner: R,
}

impl<R: CommandRunner> Systemctl<R> {
    pub fn new(runner: R) -> Self {
        Systemctl { runner }
    }

    /// `systemctl <query> --quiet <service>`: exit status is the answer.
    fn query(&self, query: &'static str, service: &str) -> Result<bool> {
        match self.runner.run(SYSTEMCTL, &[query, "--quiet", service]) {
            Ok(_) => Ok(true),
            Err(e) if e.is_exit() => Ok(false),
            Err(e) => Err(command_error(service, query, e)),
        }
    }

    fn act(&self, operation: &'static str, service: &str) -> Result<()> {
        tracing::info!(service, operation, "systemctl");
        self.runner
            .run(SYSTEMCTL, &[operation, service])
            .map(|_| ())
            .map_err(|e| command_error(service, operation, e))
    }
}

impl<R: CommandRunner> ServiceManager for Systemctl<R> {
    fn is_enabled(&self, service: &str) -> Result<bool> {
        self.query("is-enabled", service)
    }

    fn is_active(&self, service: &str) -> Result<bool> {
        self.query("is-active", service)
    }

    fn enable(&self, service: &str) -> Result<()> {
        self.act("enable", service)
    }

    fn start(&self, service: &str) -> Result<()> {
        self.act("start", service)
    }

    fn restart(&self, service: &str) -> Result<()> {
        self.act("restart", service)
    }
}

fn command_error(service: &str, operation: &'static str, failure: CommandFailure) -> BootstrapError {
    BootstrapError::ServiceCommand {
        service: service.to_string(),
        operation,
        detail: failure.to_string(),
    }
}
