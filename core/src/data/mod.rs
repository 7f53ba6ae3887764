//! Persistent node state: the node configuration file and the completion
//! flag.

pub mod flag;
pub mod settings;

pub use flag::FlagFile;
