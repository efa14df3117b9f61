//! Host link adapter for the OVS forwarder.
//!
//! Wraps the iproute2 CLI behind typed operations: veth pair lifecycle,
//! link state, address listing and moves, and MTU queries.

pub mod commands;
pub mod link;

pub use commands::VETH_MTU;
pub use link::{IfAddr, Links};
