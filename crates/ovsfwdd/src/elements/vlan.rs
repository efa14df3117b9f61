//! VLAN breakout element.
//!
//! When the next hop negotiates a VLAN mechanism and the connection's
//! `via` label names a configured L2 egress point, the client-facing
//! port is moved from the main bridge onto the egress bridge with the
//! negotiated tag. Bridge membership then does the forwarding; no
//! cross-connect flows are installed for these connections.

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use ovsfwd_common::{join_errors, FwdResult};
use ovsfwd_ovs::{L2ConnectionPoint, Ovs};

use crate::chain::{Ctx, Element, Next};
use crate::model::{
    Connection, MechanismClass, MechanismKind, MechanismPreference, Request,
};
use crate::portinfo::{OvsPortInfo, Side};

/// Label selecting the L2 egress point for a breakout connection.
pub const VIA_LABEL: &str = "via";

/// Outbound VLAN breakout element.
pub struct VlanClient {
    bridge_name: String,
    l2_connections: HashMap<String, L2ConnectionPoint>,
    ovs: Ovs,
}

impl VlanClient {
    /// Creates the element over the configured egress table.
    pub fn new(
        bridge_name: String,
        l2_connections: HashMap<String, L2ConnectionPoint>,
        ovs: Ovs,
    ) -> Self {
        Self {
            bridge_name,
            l2_connections,
            ovs,
        }
    }

    fn egress_point(&self, conn: &Connection) -> Option<&L2ConnectionPoint> {
        let via = conn.labels.get(VIA_LABEL)?;
        self.l2_connections.get(via)
    }

    async fn add_del_vlan(&self, ctx: &Ctx, conn: &Connection, is_add: bool) -> FwdResult<()> {
        let Some(mechanism) = conn.mechanism.as_ref().and_then(|m| m.as_vlan()) else {
            return Ok(());
        };
        let meta = ctx.metadata()?;
        let Some(info) = meta.port_info(Side::Client) else {
            return Ok(());
        };
        if is_add && info.is_cross_connected {
            return Ok(());
        }
        // breakout moves veth trunks only; a VF representor never ends
        // up on an egress bridge
        if info.is_vf_representor {
            return Ok(());
        }
        let Some(l2_point) = self.egress_point(conn) else {
            return Ok(());
        };

        if is_add {
            // move the client port from the main bridge onto the egress
            // bridge with the negotiated tag
            self.ovs.del_port(&self.bridge_name, &info.port_name).await?;
            self.ovs
                .add_port(&l2_point.bridge, &info.port_name, Some(mechanism.vlan_id))
                .await?;
            meta.side(Side::Client).update::<OvsPortInfo>(|i| {
                i.is_l2_connect = true;
                i.is_cross_connected = true;
            });
            debug!(
                port = %info.port_name,
                bridge = %l2_point.bridge,
                vlan_id = mechanism.vlan_id,
                "moved port to egress bridge"
            );
        } else if info.is_l2_connect {
            self.ovs
                .del_port_best_effort(&l2_point.bridge, &info.port_name)
                .await;
        }
        Ok(())
    }
}

#[async_trait]
impl Element for VlanClient {
    async fn request(
        &self,
        ctx: &Ctx,
        request: &mut Request,
        next: Next<'_>,
    ) -> FwdResult<Connection> {
        request.mechanism_preferences.push(MechanismPreference {
            class: MechanismClass::Remote,
            kind: MechanismKind::Vlan,
            supports_vlan: true,
            tunnel_ip: None,
        });

        let postpone = ctx.postpone();
        let conn = next.request(ctx, request).await?;

        if let Err(err) = self.add_del_vlan(ctx, &conn, true).await {
            let close_ctx = postpone();
            let close_result = self.close(&close_ctx, &conn, next).await;
            return Err(match close_result {
                Err(close_err) => ovsfwd_common::FwdError::joined(err, close_err),
                Ok(()) => err,
            });
        }

        Ok(conn)
    }

    async fn close(&self, ctx: &Ctx, conn: &Connection, next: Next<'_>) -> FwdResult<()> {
        let downstream_err = next.close(ctx, conn).await.err();
        let vlan_err = self.add_del_vlan(ctx, conn, false).await.err();

        match (downstream_err, vlan_err) {
            (None, None) => Ok(()),
            (Some(err), None) => Err(err),
            (prior, Some(err)) => Err(join_errors(prior, err)),
        }
    }
}
