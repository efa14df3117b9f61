//! Shared primitives for the OVS forwarder crates.
//!
//! This crate provides:
//!
//! - [`shell`]: the external-command layer (`CommandRunner`, shell
//!   quoting, command paths) every dataplane adapter executes through
//! - [`error`]: the forwarder error type and result alias
//! - [`counted`]: reference-counted tracking for host artifacts shared
//!   between connections

pub mod counted;
pub mod error;
pub mod shell;

pub use counted::RefCounts;
pub use error::{join_errors, FwdError, FwdResult};
pub use shell::{CommandRunner, ExecResult, RecordingRunner, ShellRunner};
