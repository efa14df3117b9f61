//! Dataplane forwarder realizing point-to-point L2 cross-connects on an
//! Open vSwitch bridge.
//!
//! A connection has two sides: the client-workload-facing port plumbed
//! by the inbound chain and the endpoint-facing port plumbed by the
//! outbound chain. Either side may be local (veth pair or VF
//! representor) or remote (VXLAN tunnel); paired OpenFlow rules join
//! them, with optional 802.1Q tagging and VLAN breakout onto dedicated
//! egress bridges.

pub mod chain;
pub mod config;
pub mod elements;
pub mod endpoint;
pub mod model;
pub mod portinfo;
pub mod sriov;

pub use chain::{Chain, Ctx, Element, Next};
pub use config::Config;
pub use endpoint::Forwarder;
pub use model::{Connection, Mechanism, Request};
pub use portinfo::{OvsPortInfo, Side};

#[cfg(test)]
mod scenarios;
