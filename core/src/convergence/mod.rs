//! Cluster bootstrap: the one-shot `controller` and the bounded service
//! state polling (`retry`) it relies on.

pub mod controller;
pub mod retry;

pub use controller::BootstrapController;
pub use retry::{wait_until, PollPolicy, RecordingSleeper, Sleeper, ThreadSleeper, WaitOutcome};
