//! Search node bootstrap.
//!
//! A node is provisioned once with static files and templates. From then on
//! the templating daemon re-renders a snapshot of the coordination store's
//! keys and calls back into this crate, which writes the cluster
//! configuration and (re)starts the search service exactly once, as soon
//! as every prerequisite key exists.

pub mod convergence;
pub mod data;
pub mod error;
pub mod fsutil;
pub mod infrastructure;
pub mod kv;
pub mod metrics;
pub mod provision;
pub mod render;
pub mod types;

pub use convergence::BootstrapController;
pub use error::{BootstrapError, Result};
pub use types::config::NodeConfig;
pub use types::flag::CompletionFlag;
pub use types::outcome::{ConvergeOutcome, ResourceStatus, ServiceAction};
