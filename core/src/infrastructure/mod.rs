//! Host adapters: process execution, the service manager, the firewall and
//! the host's physical memory.
//!
//! Process and service access are traits, each with a production
//! implementation that drives the host's tools and a recording test double,
//! so the controller can be tested without touching systemd.

pub mod firewall;
pub mod memory;
pub mod mock;
pub mod runner;
pub mod systemd;

use crate::error::Result;

/// Synchronous, fallible view of the host's service manager. Each call
/// blocks until the service manager answers.
pub trait ServiceManager {
    fn is_enabled(&self, service: &str) -> Result<bool>;

    fn is_active(&self, service: &str) -> Result<bool>;

    fn enable(&self, service: &str) -> Result<()>;

    fn start(&self, service: &str) -> Result<()>;

    fn restart(&self, service: &str) -> Result<()>;
}

impl<S: ServiceManager + ?Sized> ServiceManager for &S {
    fn is_enabled(&self, service: &str) -> Result<bool> {
        (**self).is_enabled(service)
    }

    fn is_active(&self, service: &str) -> Result<bool> {
        (**self).is_active(service)
    }

    fn enable(&self, service: &str) -> Result<()> {
        (**self).enable(service)
    }

    fn start(&self, service: &str) -> Result<()> {
        (**self).start(service)
    }

    fn restart(&self, service: &str) -> Result<()> {
        (**self).restart(service)
    }
}
