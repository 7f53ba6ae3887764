//! Mock service manager for testing.
//!
//! Simulates enabled/active state, records every call, and can be told to
//! lag behind (report the old state for a number of checks) or never reach
//! a state at all.

use std::cell::{Cell, RefCell};

use crate::error::{BootstrapError, Result};

use super::ServiceManager;

/// A test-double that tracks one service's state and records calls in order.
pub struct MockServiceManager {
    enabled: Cell<bool>,
    active: Cell<bool>,
    /// Checks that still report "not enabled" after `enable`.
    enable_lag: Cell<u32>,
    /// Checks that still report "not active" after `start`/`restart`.
    start_lag: Cell<u32>,
    never_enables: bool,
    never_activates: bool,
    failing_operation: Option<&'static str>,
    calls: RefCell<Vec<String>>,
}

impl MockServiceManager {
    /// A service that is neither enabled nor active.
    pub fn new() -> Self {
        MockServiceManager {
            enabled: Cell::new(false),
            active: Cell::new(false),
            enable_lag: Cell::new(0),
            start_lag: Cell::new(0),
            never_enables: false,
            never_activates: false,
            failing_operation: None,
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn with_state(enabled: bool, active: bool) -> Self {
        let mock = Self::new();
        mock.enabled.set(enabled);
        mock.active.set(active);
        mock
    }

    /// Report the old state for `checks` calls after enable/start.
    pub fn lagging(self, enable_checks: u32, start_checks: u32) -> Self {
        self.enable_lag.set(enable_checks);
        self.start_lag.set(start_checks);
        self
    }

    pub fn never_enabling(mut self) -> Self {
        self.never_enables = true;
        self
    }

    pub fn never_activating(mut self) -> Self {
        self.never_activates = true;
        self
    }

    /// Make the named operation (`"enable"`, `"start"`, ...) fail.
    pub fn failing_on(mut self, operation: &'static str) -> Self {
        self.failing_operation = Some(operation);
        self
    }

    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }

    pub fn active(&self) -> bool {
        self.active.get()
    }

    /// Every call as `"<operation> <service>"`, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    /// Calls that change state (everything except the two queries).
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| !c.starts_with("is-"))
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    fn record(&self, operation: &'static str, service: &str) -> Result<()> {
        self.calls
            .borrow_mut()
            .push(format!("{} {}", operation, service));
        if self.failing_operation == Some(operation) {
            return Err(BootstrapError::ServiceCommand {
                service: service.to_string(),
                operation,
                detail: "mock failure".into(),
            });
        }
        Ok(())
    }

    fn observe(lag: &Cell<u32>, state: &Cell<bool>) -> bool {
        if lag.get() > 0 && state.get() {
            lag.set(lag.get() - 1);
            return false;
        }
        state.get()
    }
}

impl Default for MockServiceManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ServiceManager for MockServiceManager {
    fn is_enabled(&self, service: &str) -> Result<bool> {
        self.record("is-enabled", service)?;
        Ok(Self::observe(&self.enable_lag, &self.enabled))
    }

    fn is_active(&self, service: &str) -> Result<bool> {
        self.record("is-active", service)?;
        Ok(Self::observe(&self.start_lag, &self.active))
    }

    fn enable(&self, service: &str) -> Result<()> {
        self.record("enable", service)?;
        if !self.never_enables {
            self.enabled.set(true);
        }
        Ok(())
    }

    fn start(&self, service: &str) -> Result<()> {
        self.record("start", service)?;
        if !self.never_activates {
            self.active.set(true);
        }
        Ok(())
    }

    fn restart(&self, service: &str) -> Result<()> {
        self.record("restart", service)?;
        if !self.never_activates {
            self.active.set(true);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_state() {
        let mock = MockServiceManager::new();
        assert!(!mock.is_enabled("es").unwrap());
        mock.enable("es").unwrap();
        assert!(mock.is_enabled("es").unwrap());
        mock.start("es").unwrap();
        assert!(mock.is_active("es").unwrap());
    }

    #[test]
    fn records_calls_in_order() {
        let mock = MockServiceManager::with_state(true, true);
        mock.is_active("es").unwrap();
        mock.restart("es").unwrap();
        assert_eq!(mock.calls(), vec!["is-active es", "restart es"]);
        assert_eq!(mock.mutating_calls(), vec!["restart es"]);
        mock.clear_calls();
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn lag_delays_observed_state() {
        let mock = MockServiceManager::new().lagging(2, 0);
        mock.enable("es").unwrap();
        assert!(!mock.is_enabled("es").unwrap());
        assert!(!mock.is_enabled("es").unwrap());
        assert!(mock.is_enabled("es").unwrap());
    }

    #[test]
    fn never_activating_stays_inactive() {
        let mock = MockServiceManager::new().never_activating();
        mock.start("es").unwrap();
        assert!(!mock.is_active("es").unwrap());
        assert!(!mock.active());
    }

    #[test]
    fn failing_operation_errors() {
        let mock = MockServiceManager::new().failing_on("enable");
        assert!(mock.enable("es").is_err());
        assert!(!mock.enabled());
        assert!(mock.start("es").is_ok());
    }
}
