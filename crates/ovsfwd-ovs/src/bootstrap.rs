//! Forwarder boot-time bridge configuration.
//!
//! Ensures the per-egress-point bridges and the main bridge exist, and
//! hands the egress interface addresses over from the NIC to its bridge
//! device so routed traffic keeps working after the reparenting.

use std::collections::HashMap;

use serde::Deserialize;
use tracing::{info, warn};

use ovsfwd_common::FwdResult;
use ovsfwd_link::Links;

use crate::ovs::Ovs;

/// One configured L2 egress point: `via` selectors map to these.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct L2ConnectionPoint {
    /// Physical interface carrying the breakout traffic. May be empty
    /// when the bridge has no dedicated uplink.
    #[serde(default)]
    pub interface: String,
    /// The bridge breakout ports are moved onto.
    pub bridge: String,
}

/// Creates the egress bridges and the main bridge, flushing stale flows.
///
/// For each egress point with an uplink interface, the interface's
/// addresses are removed from the link, the link is attached to the
/// egress bridge, and the same addresses are configured on the bridge
/// device.
pub async fn configure_bridges(
    ovs: &Ovs,
    links: &Links,
    l2_connections: &HashMap<String, L2ConnectionPoint>,
    bridge_name: &str,
) -> FwdResult<()> {
    for (selector, point) in l2_connections {
        info!(selector = %selector, bridge = %point.bridge, "configuring L2 egress point");
        ovs.add_bridge(&point.bridge).await?;
        if point.interface.is_empty() {
            continue;
        }

        let addrs = links.list_addresses(&point.interface).await?;
        for addr in &addrs {
            links.del_address(&point.interface, addr).await?;
        }
        ovs.add_port(&point.bridge, &point.interface, None).await?;
        for addr in &addrs {
            links.add_address(&point.bridge, addr).await?;
        }
    }

    if let Err(e) = ovs.add_bridge(bridge_name).await {
        warn!(bridge = bridge_name, error = %e, "failed to add main bridge");
    }
    if let Err(e) = ovs.flush_flows(bridge_name).await {
        warn!(bridge = bridge_name, error = %e, "failed to flush flows on main bridge");
    }
    Ok(())
}
