//! The L2 cross-connect programmer.
//!
//! Once both sides of a connection have a bridge port, this element
//! installs the paired flow rules that join them: direct forwarding for
//! local connections (with optional 802.1Q push/pop) and tunnel-id
//! encapsulation for remote ones.
//!
//! Rule: VLAN breakout bypasses pair-install. A VLAN-mechanism
//! connection is forwarded by egress-bridge membership, its
//! endpoint-side slot is never populated, and this element steps aside.

use async_trait::async_trait;
use tracing::warn;

use ovsfwd_common::{join_errors, FwdResult};
use ovsfwd_ovs::Ovs;

use crate::chain::{Ctx, Element, Next};
use crate::model::{Connection, Request};
use crate::portinfo::{OvsPortInfo, Side};

/// OFPVID_PRESENT: OpenFlow sets this bit in `vlan_vid` to mark a
/// frame as tagged.
const OFPVID_PRESENT: u32 = 4096;

/// Splits the two sides of a remote cross-connect into the local port
/// and the tunnel port, with the tunnel's VNI.
fn remote_ports<'a>(
    endpoint: &'a OvsPortInfo,
    client: &'a OvsPortInfo,
) -> (&'a OvsPortInfo, &'a OvsPortInfo, u32) {
    if endpoint.is_tunnel_port {
        (client, endpoint, endpoint.vni)
    } else {
        (endpoint, client, client.vni)
    }
}

/// Outbound element installing and removing cross-connect flows.
pub struct L2ConnectClient {
    bridge_name: String,
    ovs: Ovs,
}

impl L2ConnectClient {
    /// Creates the element for the main bridge.
    pub fn new(bridge_name: String, ovs: Ovs) -> Self {
        Self { bridge_name, ovs }
    }

    async fn create_local(
        &self,
        ctx: &Ctx,
        endpoint: &OvsPortInfo,
        client: &OvsPortInfo,
    ) -> FwdResult<()> {
        let (to_client, to_endpoint) = if endpoint.vlan_id > 0 {
            (
                format!(
                    "priority=100,in_port={},dl_vlan={},actions=strip_vlan,output:{}",
                    endpoint.port_no, endpoint.vlan_id, client.port_no
                ),
                format!(
                    "priority=100,in_port={},actions=push_vlan:0x8100,set_field:{}->vlan_vid,output:{}",
                    client.port_no,
                    u32::from(endpoint.vlan_id) + OFPVID_PRESENT,
                    endpoint.port_no
                ),
            )
        } else {
            (
                format!(
                    "priority=100,in_port={},actions=output:{}",
                    endpoint.port_no, client.port_no
                ),
                format!(
                    "priority=100,in_port={},actions=output:{}",
                    client.port_no, endpoint.port_no
                ),
            )
        };

        self.ovs.add_flow(&self.bridge_name, &to_client).await?;
        self.ovs.add_flow(&self.bridge_name, &to_endpoint).await?;

        let meta = ctx.metadata()?;
        meta.side(Side::Endpoint)
            .update::<OvsPortInfo>(|i| i.is_cross_connected = true);
        meta.side(Side::Client)
            .update::<OvsPortInfo>(|i| i.is_cross_connected = true);
        Ok(())
    }

    async fn delete_local(
        &self,
        endpoint: &OvsPortInfo,
        client: &OvsPortInfo,
    ) -> FwdResult<()> {
        let match_endpoint = if endpoint.vlan_id > 0 {
            format!("in_port={},dl_vlan={}", endpoint.port_no, endpoint.vlan_id)
        } else {
            format!("in_port={}", endpoint.port_no)
        };
        self.ovs.del_flows(&self.bridge_name, &match_endpoint).await?;

        let match_client = format!("in_port={}", client.port_no);
        if let Err(e) = self.ovs.del_flows(&self.bridge_name, &match_client).await {
            warn!(port = %client.port_name, error = %e, "failed to delete client-side flow");
        }
        Ok(())
    }

    async fn create_remote(
        &self,
        ctx: &Ctx,
        endpoint: &OvsPortInfo,
        client: &OvsPortInfo,
    ) -> FwdResult<()> {
        let (local, tunnel, vni) = remote_ports(endpoint, client);

        let (to_tunnel, to_local) = if local.vlan_id > 0 {
            (
                format!(
                    "priority=100,in_port={},dl_vlan={},actions=strip_vlan,set_field:{}->tun_id,output:{}",
                    local.port_no, local.vlan_id, vni, tunnel.port_no
                ),
                format!(
                    "priority=100,in_port={},tun_id={},actions=push_vlan:0x8100,set_field:{}->vlan_vid,output:{}",
                    tunnel.port_no,
                    vni,
                    u32::from(local.vlan_id) + OFPVID_PRESENT,
                    local.port_no
                ),
            )
        } else {
            (
                format!(
                    "priority=100,in_port={},actions=set_field:{}->tun_id,output:{}",
                    local.port_no, vni, tunnel.port_no
                ),
                format!(
                    "priority=100,in_port={},tun_id={},actions=output:{}",
                    tunnel.port_no, vni, local.port_no
                ),
            )
        };

        self.ovs.add_flow(&self.bridge_name, &to_tunnel).await?;
        self.ovs.add_flow(&self.bridge_name, &to_local).await?;

        let meta = ctx.metadata()?;
        meta.side(Side::Endpoint)
            .update::<OvsPortInfo>(|i| i.is_cross_connected = true);
        meta.side(Side::Client)
            .update::<OvsPortInfo>(|i| i.is_cross_connected = true);
        Ok(())
    }

    async fn delete_remote(
        &self,
        endpoint: &OvsPortInfo,
        client: &OvsPortInfo,
    ) -> FwdResult<()> {
        let (local, tunnel, vni) = remote_ports(endpoint, client);

        let match_local = if local.vlan_id > 0 {
            format!("in_port={},dl_vlan={}", local.port_no, local.vlan_id)
        } else {
            format!("in_port={}", local.port_no)
        };
        self.ovs.del_flows(&self.bridge_name, &match_local).await?;

        let match_tunnel = format!("in_port={},tun_id={}", tunnel.port_no, vni);
        self.ovs.del_flows(&self.bridge_name, &match_tunnel).await?;
        Ok(())
    }

    async fn add_del(&self, ctx: &Ctx, conn: &Connection, is_add: bool) -> FwdResult<()> {
        // VLAN bypasses pair-install
        if conn.mechanism.as_ref().and_then(|m| m.as_vlan()).is_some() {
            return Ok(());
        }
        let meta = ctx.metadata()?;
        let Some(endpoint_info) = meta.port_info(Side::Endpoint) else {
            return Ok(());
        };
        let Some(client_info) = meta.port_info(Side::Client) else {
            return Ok(());
        };

        if !endpoint_info.is_tunnel_port && !client_info.is_tunnel_port {
            if is_add {
                self.create_local(ctx, &endpoint_info, &client_info).await
            } else {
                self.delete_local(&endpoint_info, &client_info).await
            }
        } else if is_add {
            self.create_remote(ctx, &endpoint_info, &client_info).await
        } else {
            self.delete_remote(&endpoint_info, &client_info).await
        }
    }

    async fn close_impl(&self, ctx: &Ctx, conn: &Connection, next: Next<'_>) -> FwdResult<()> {
        let downstream_err = next.close(ctx, conn).await.err();
        let connect_err = self.add_del(ctx, conn, false).await.err();
        if let Ok(meta) = ctx.metadata() {
            meta.side(Side::Endpoint).delete::<OvsPortInfo>();
        }

        match (downstream_err, connect_err) {
            (None, None) => Ok(()),
            (Some(err), None) => Err(err),
            (prior, Some(err)) => Err(join_errors(prior, err)),
        }
    }
}

#[async_trait]
impl Element for L2ConnectClient {
    async fn request(
        &self,
        ctx: &Ctx,
        request: &mut Request,
        next: Next<'_>,
    ) -> FwdResult<Connection> {
        let postpone = ctx.postpone();

        let is_established = ctx
            .metadata()?
            .port_info(Side::Client)
            .map(|i| i.is_cross_connected)
            .unwrap_or(false);

        let conn = next.request(ctx, request).await?;
        if is_established {
            return Ok(conn);
        }

        if let Err(err) = self.add_del(ctx, &conn, true).await {
            let close_ctx = postpone();
            if let Err(close_err) = self.close_impl(&close_ctx, &conn, next).await {
                warn!(
                    connection = %conn.id,
                    error = %close_err,
                    "failed to close failed connection"
                );
            }
            return Err(err);
        }
        Ok(conn)
    }

    async fn close(&self, ctx: &Ctx, conn: &Connection, next: Next<'_>) -> FwdResult<()> {
        self.close_impl(ctx, conn, next).await
    }
}
