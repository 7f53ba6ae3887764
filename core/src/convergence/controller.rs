//! One-shot cluster bootstrap.
//!
//! `BootstrapController::attempt_converge` is called on every change to the
//! watched keys, but acts at most once per node lifetime:
//!
//! 1. Resolve the prerequisites. Any absent key defers the pass; nothing is
//!    touched.
//! 2. Read the completion flag. `Initialized` ends the pass; nothing is
//!    touched.
//! 3. Render `elasticsearch.yml` and replace it atomically.
//! 4. Enable the service if needed and wait (bounded) until it reports
//!    enabled.
//! 5. Start it if inactive, restart it otherwise, and wait (bounded) until
//!    it reports active.
//! 6. Write `Initialized`.
//!
//! Any failure aborts before step 6, so the flag only ever moves forward
//! after the service is running the new configuration. A crash between 5
//! and 6 is repaired by running the whole pass again.

use crate::data::FlagFile;
use crate::error::{BootstrapError, Result};
use crate::fsutil::{write_atomic, Ownership, WriteOptions};
use crate::infrastructure::ServiceManager;
use crate::kv::{ClusterPrerequisites, KvSource, PrerequisiteSet};
use crate::render::cluster_config;
use crate::types::config::NodeConfig;
use crate::types::flag::CompletionFlag;
use crate::types::outcome::{ConvergeOutcome, ServiceAction};

use super::retry::{wait_until, PollPolicy, Sleeper, WaitOutcome};

pub struct BootstrapController<'a> {
    config: &'a NodeConfig,
    kv: &'a dyn KvSource,
    services: &'a dyn ServiceManager,
    sleeper: &'a dyn Sleeper,
    flag: FlagFile,
    policy: PollPolicy,
    ownership: Ownership,
}

impl<'a> BootstrapController<'a> {
    pub fn new(
        config: &'a NodeConfig,
        kv: &'a dyn KvSource,
        services: &'a dyn ServiceManager,
        sleeper: &'a dyn Sleeper,
    ) -> Self {
        let es = &config.elasticsearch;
        BootstrapController {
            config,
            kv,
            services,
            sleeper,
            flag: FlagFile::new(&config.bootstrap.flag_path),
            policy: PollPolicy::from(&config.bootstrap.poll),
            ownership: Ownership::new(&es.service_user, &es.service_group),
        }
    }

    /// Override the owner applied to the rendered file.
    pub fn with_ownership(mut self, ownership: Ownership) -> Self {
        self.ownership = ownership;
        self
    }

    pub fn flag(&self) -> &FlagFile {
        &self.flag
    }

    pub fn attempt_converge(&self) -> Result<ConvergeOutcome> {
        let service = self.config.elasticsearch.service_name.as_str();

        let values = match PrerequisiteSet::for_cluster(&self.config.cluster).resolve(self.kv) {
            Ok(values) => values,
            Err(BootstrapError::PreconditionsUnavailable { missing }) => {
                tracing::warn!(
                    service,
                    missing = %missing.join(", "),
                    "not all prerequisites available, will not configure the service yet"
                );
                return Ok(ConvergeOutcome::Deferred { missing });
            }
            Err(e) => return Err(e),
        };

        if self.flag.read()?.is_initialized() {
            tracing::debug!(flag = %self.flag.path().display(), "already initialized, nothing to do");
            return Ok(ConvergeOutcome::AlreadyInitialized);
        }

        let prereqs = ClusterPrerequisites::from_prerequisites(&self.config.cluster, &values)?;
        self.write_config(&prereqs)?;

        let enabled_service = self.ensure_enabled(service)?;
        let service_action = self.ensure_running(service)?;

        self.flag.write(CompletionFlag::Initialized)?;
        tracing::info!(
            service,
            cluster = %prereqs.datacenter,
            minimum_master_nodes = prereqs.minimum_master_nodes,
            flag = %self.flag.path().display(),
            "node initialized"
        );
        Ok(ConvergeOutcome::Initialized {
            enabled_service,
            service_action,
        })
    }

    fn write_config(&self, prereqs: &ClusterPrerequisites) -> Result<()> {
        let es = &self.config.elasticsearch;
        let path = es.config_file();
        let content = cluster_config(es, prereqs);
        let options = WriteOptions::mode(es.config_mode).owned_by(self.ownership.clone());
        let status = write_atomic(&path, content.as_bytes(), &options).map_err(|source| {
            tracing::error!(path = %path.display(), error = %source, "writing cluster configuration failed");
            BootstrapError::RenderWriteFailure {
                path: path.clone(),
                source,
            }
        })?;
        tracing::info!(path = %path.display(), %status, cluster = %prereqs.datacenter, "cluster configuration written");
        Ok(())
    }

    /// Returns whether `enable` had to be issued.
    fn ensure_enabled(&self, service: &str) -> Result<bool> {
        if self.services.is_enabled(service)? {
            return Ok(false);
        }
        self.services.enable(service)?;
        self.await_state(service, "enabled", || self.services.is_enabled(service))?;
        Ok(true)
    }

    fn ensure_running(&self, service: &str) -> Result<ServiceAction> {
        let action = if self.services.is_active(service)? {
            self.services.restart(service)?;
            ServiceAction::Restarted
        } else {
            self.services.start(service)?;
            ServiceAction::Started
        };
        self.await_state(service, "active", || self.services.is_active(service))?;
        Ok(action)
    }

    fn await_state<F>(&self, service: &str, state: &'static str, check: F) -> Result<()>
    where
        F: FnMut() -> Result<bool>,
    {
        match wait_until(&self.policy, self.sleeper, check)? {
            WaitOutcome::Reached { attempts } => {
                tracing::debug!(service, state, attempts, "service state reached");
                Ok(())
            }
            WaitOutcome::Exhausted { attempts } => {
                tracing::error!(service, state, attempts, "service never reached state");
                Err(BootstrapError::ServiceConvergenceTimeout {
                    service: service.to_string(),
                    state,
                    attempts,
                })
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convergence::retry::RecordingSleeper;
    use crate::infrastructure::mock::MockServiceManager;
    use crate::kv::StaticKv;
    use crate::types::config::BackoffStrategy;
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    static TEST_SEQ: AtomicU32 = AtomicU32::new(0);

    fn test_dir() -> PathBuf {
        let seq = TEST_SEQ.fetch_add(1, Ordering::SeqCst);
        let dir = std::env::temp_dir().join(format!("snctl{}-{}", std::process::id(), seq));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn cleanup(dir: &Path) {
        let _ = std::fs::remove_dir_all(dir);
    }

    fn node_config(dir: &Path) -> NodeConfig {
        let mut config = NodeConfig::default();
        config.elasticsearch.paths.config = dir.join("etc");
        config.elasticsearch.config_mode = 0o640;
        config.bootstrap.flag_path = dir.join("elasticsearch_config.log");
        config.bootstrap.poll.max_attempts = 5;
        std::fs::create_dir_all(&config.elasticsearch.paths.config).unwrap();
        FlagFile::new(&config.bootstrap.flag_path)
            .write(CompletionFlag::NotInitialized)
            .unwrap();
        config
    }

    fn cluster_kv() -> StaticKv {
        StaticKv::new()
            .with("config/services/consul/datacenter", "dc1")
            .with("config/services/documents/masters", "2")
    }

    fn controller<'a>(
        config: &'a NodeConfig,
        kv: &'a StaticKv,
        services: &'a MockServiceManager,
        sleeper: &'a RecordingSleeper,
    ) -> BootstrapController<'a> {
        BootstrapController::new(config, kv, services, sleeper).with_ownership(Ownership::unchanged())
    }

    fn flag_state(config: &NodeConfig) -> CompletionFlag {
        FlagFile::new(&config.bootstrap.flag_path).read().unwrap()
    }

    #[test]
    fn first_run_writes_config_and_starts_service() {
        let dir = test_dir();
        let config = node_config(&dir);
        let kv = cluster_kv();
        let services = MockServiceManager::new();
        let sleeper = RecordingSleeper::new();

        let outcome = controller(&config, &kv, &services, &sleeper).attempt_converge().unwrap();

        assert_eq!(
            outcome,
            ConvergeOutcome::Initialized {
                enabled_service: true,
                service_action: ServiceAction::Started,
            }
        );
        let written = std::fs::read_to_string(config.elasticsearch.config_file()).unwrap();
        assert!(written.contains("cluster.name: \"dc1\""));
        assert!(written.contains("minimum_master_nodes: 2"));
        assert!(services.enabled());
        assert!(services.active());
        assert_eq!(
            services.mutating_calls(),
            vec!["enable elasticsearch", "start elasticsearch"]
        );
        assert_eq!(flag_state(&config), CompletionFlag::Initialized);
        assert_eq!(
            std::fs::read_to_string(&config.bootstrap.flag_path).unwrap(),
            "Initialized\n"
        );
        cleanup(&dir);
    }

    #[test]
    fn initialized_flag_means_no_side_effects() {
        let dir = test_dir();
        let config = node_config(&dir);
        FlagFile::new(&config.bootstrap.flag_path)
            .write(CompletionFlag::Initialized)
            .unwrap();
        let kv = cluster_kv();
        let services = MockServiceManager::new();
        let sleeper = RecordingSleeper::new();

        let outcome = controller(&config, &kv, &services, &sleeper).attempt_converge().unwrap();

        assert_eq!(outcome, ConvergeOutcome::AlreadyInitialized);
        assert!(services.calls().is_empty());
        assert!(!config.elasticsearch.config_file().exists());
        assert_eq!(flag_state(&config), CompletionFlag::Initialized);
        cleanup(&dir);
    }

    #[test]
    fn second_call_is_a_no_op() {
        let dir = test_dir();
        let config = node_config(&dir);
        let kv = cluster_kv();
        let services = MockServiceManager::new();
        let sleeper = RecordingSleeper::new();
        let ctl = controller(&config, &kv, &services, &sleeper);

        ctl.attempt_converge().unwrap();
        let config_file = config.elasticsearch.config_file();
        let before = std::fs::metadata(&config_file).unwrap().modified().unwrap();
        services.clear_calls();

        assert_eq!(ctl.attempt_converge().unwrap(), ConvergeOutcome::AlreadyInitialized);
        assert!(services.calls().is_empty());
        assert_eq!(std::fs::metadata(&config_file).unwrap().modified().unwrap(), before);
        cleanup(&dir);
    }

    #[test]
    fn missing_prerequisite_defers_without_side_effects() {
        let dir = test_dir();
        let config = node_config(&dir);
        let mut kv = cluster_kv();
        kv.remove("config/services/documents/masters");
        let services = MockServiceManager::new();
        let sleeper = RecordingSleeper::new();

        let outcome = controller(&config, &kv, &services, &sleeper).attempt_converge().unwrap();

        assert_eq!(
            outcome,
            ConvergeOutcome::Deferred {
                missing: vec!["config/services/documents/masters".into()],
            }
        );
        assert!(services.calls().is_empty());
        assert!(!config.elasticsearch.config_file().exists());
        assert_eq!(flag_state(&config), CompletionFlag::NotInitialized);
        cleanup(&dir);
    }

    #[test]
    fn churn_transitions_at_most_once() {
        let dir = test_dir();
        let config = node_config(&dir);
        let services = MockServiceManager::new();
        let sleeper = RecordingSleeper::new();

        let snapshots = vec![
            StaticKv::new(),
            StaticKv::new().with("config/services/consul/datacenter", "dc1"),
            cluster_kv(),
            StaticKv::new().with("config/services/consul/datacenter", "dc1"),
            cluster_kv().with("config/services/documents/masters", "3"),
            cluster_kv().with("config/services/consul/datacenter", "dc2"),
        ];
        let mut initialized = 0;
        for kv in &snapshots {
            let outcome = controller(&config, kv, &services, &sleeper).attempt_converge().unwrap();
            if matches!(outcome, ConvergeOutcome::Initialized { .. }) {
                initialized += 1;
            }
        }

        assert_eq!(initialized, 1);
        assert_eq!(
            services.mutating_calls(),
            vec!["enable elasticsearch", "start elasticsearch"]
        );
        let written = std::fs::read_to_string(config.elasticsearch.config_file()).unwrap();
        assert!(written.contains("cluster.name: \"dc1\""));
        assert!(written.contains("minimum_master_nodes: 2"));
        cleanup(&dir);
    }

    #[test]
    fn active_service_is_restarted() {
        let dir = test_dir();
        let config = node_config(&dir);
        let kv = cluster_kv();
        let services = MockServiceManager::with_state(true, true);
        let sleeper = RecordingSleeper::new();

        let outcome = controller(&config, &kv, &services, &sleeper).attempt_converge().unwrap();

        assert_eq!(
            outcome,
            ConvergeOutcome::Initialized {
                enabled_service: false,
                service_action: ServiceAction::Restarted,
            }
        );
        assert_eq!(services.mutating_calls(), vec!["restart elasticsearch"]);
        cleanup(&dir);
    }

    #[test]
    fn waits_for_lagging_service() {
        let dir = test_dir();
        let config = node_config(&dir);
        let kv = cluster_kv();
        let services = MockServiceManager::new().lagging(2, 3);
        let sleeper = RecordingSleeper::new();

        controller(&config, &kv, &services, &sleeper).attempt_converge().unwrap();

        assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(1); 5]);
        assert_eq!(flag_state(&config), CompletionFlag::Initialized);
        cleanup(&dir);
    }

    #[test]
    fn never_enabled_times_out_and_keeps_flag() {
        let dir = test_dir();
        let config = node_config(&dir);
        let kv = cluster_kv();
        let services = MockServiceManager::new().never_enabling();
        let sleeper = RecordingSleeper::new();

        let err = controller(&config, &kv, &services, &sleeper)
            .attempt_converge()
            .unwrap_err();

        match err {
            BootstrapError::ServiceConvergenceTimeout { service, state, attempts } => {
                assert_eq!(service, "elasticsearch");
                assert_eq!(state, "enabled");
                assert_eq!(attempts, 5);
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(sleeper.sleeps().len(), 4);
        assert!(!services.mutating_calls().contains(&"start elasticsearch".to_string()));
        assert_eq!(flag_state(&config), CompletionFlag::NotInitialized);
        cleanup(&dir);
    }

    #[test]
    fn never_active_times_out_then_retry_succeeds() {
        let dir = test_dir();
        let config = node_config(&dir);
        let kv = cluster_kv();
        let sleeper = RecordingSleeper::new();

        let stuck = MockServiceManager::new().never_activating();
        let err = controller(&config, &kv, &stuck, &sleeper)
            .attempt_converge()
            .unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::ServiceConvergenceTimeout { state: "active", .. }
        ));
        assert_eq!(flag_state(&config), CompletionFlag::NotInitialized);

        let healthy = MockServiceManager::with_state(true, false);
        let outcome = controller(&config, &kv, &healthy, &sleeper).attempt_converge().unwrap();
        assert!(matches!(outcome, ConvergeOutcome::Initialized { .. }));
        assert_eq!(flag_state(&config), CompletionFlag::Initialized);
        cleanup(&dir);
    }

    #[test]
    fn write_failure_touches_no_service() {
        let dir = test_dir();
        let mut config = node_config(&dir);
        config.elasticsearch.paths.config = dir.join("does-not-exist");
        let kv = cluster_kv();
        let services = MockServiceManager::new();
        let sleeper = RecordingSleeper::new();

        let err = controller(&config, &kv, &services, &sleeper)
            .attempt_converge()
            .unwrap_err();

        assert!(matches!(err, BootstrapError::RenderWriteFailure { .. }));
        assert!(services.calls().is_empty());
        assert_eq!(flag_state(&config), CompletionFlag::NotInitialized);
        cleanup(&dir);
    }

    #[test]
    fn service_command_failure_keeps_flag() {
        let dir = test_dir();
        let config = node_config(&dir);
        let kv = cluster_kv();
        let services = MockServiceManager::new().failing_on("start");
        let sleeper = RecordingSleeper::new();

        let err = controller(&config, &kv, &services, &sleeper)
            .attempt_converge()
            .unwrap_err();

        assert!(matches!(err, BootstrapError::ServiceCommand { operation: "start", .. }));
        assert_eq!(flag_state(&config), CompletionFlag::NotInitialized);
        cleanup(&dir);
    }

    #[test]
    fn invalid_masters_value_keeps_flag() {
        let dir = test_dir();
        let config = node_config(&dir);
        let kv = cluster_kv().with("config/services/documents/masters", "many");
        let services = MockServiceManager::new();
        let sleeper = RecordingSleeper::new();

        let err = controller(&config, &kv, &services, &sleeper)
            .attempt_converge()
            .unwrap_err();

        assert!(matches!(err, BootstrapError::InvalidPrecondition { .. }));
        assert!(services.calls().is_empty());
        assert!(!config.elasticsearch.config_file().exists());
        assert_eq!(flag_state(&config), CompletionFlag::NotInitialized);
        cleanup(&dir);
    }

    #[test]
    fn corrupt_flag_is_surfaced() {
        let dir = test_dir();
        let config = node_config(&dir);
        std::fs::write(&config.bootstrap.flag_path, "half-written").unwrap();
        let kv = cluster_kv();
        let services = MockServiceManager::new();
        let sleeper = RecordingSleeper::new();

        let err = controller(&config, &kv, &services, &sleeper)
            .attempt_converge()
            .unwrap_err();

        assert!(matches!(err, BootstrapError::FlagCorrupt { .. }));
        assert!(services.calls().is_empty());
        cleanup(&dir);
    }

    #[test]
    fn exponential_policy_from_config() {
        let dir = test_dir();
        let mut config = node_config(&dir);
        config.bootstrap.poll.strategy = BackoffStrategy::Exponential;
        config.bootstrap.poll.interval_ms = 100;
        let kv = cluster_kv();
        let services = MockServiceManager::new().lagging(0, 3);
        let sleeper = RecordingSleeper::new();

        controller(&config, &kv, &services, &sleeper).attempt_converge().unwrap();

        assert_eq!(
            sleeper.sleeps(),
            vec![
                Duration::from_millis(100),
                Duration::from_millis(200),
                Duration::from_millis(400),
            ]
        );
        cleanup(&dir);
    }
}
