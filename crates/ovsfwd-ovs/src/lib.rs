//! Open vSwitch adapter for the forwarder.
//!
//! Typed wrappers around `ovs-vsctl` / `ovs-ofctl` plus the boot-time
//! bridge configuration.

pub mod bootstrap;
pub mod commands;
pub mod ovs;

pub use bootstrap::{configure_bridges, L2ConnectionPoint};
pub use ovs::Ovs;
