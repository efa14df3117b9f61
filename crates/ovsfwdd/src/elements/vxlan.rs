//! VXLAN mechanism elements: tunnel port attachment and detachment.
//!
//! Tunnel ports are shared: every connection to the same remote forwarder
//! rides one OVS vxlan port keyed by flow metadata, so the port is
//! created by the first connection and removed by the last.

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::warn;

use ovsfwd_common::{join_errors, FwdError, FwdResult, RefCounts};
use ovsfwd_ovs::Ovs;

use crate::chain::{Ctx, Element, Next};
use crate::model::{
    Connection, MechanismClass, MechanismKind, MechanismPreference, Request,
};
use crate::portinfo::{OvsPortInfo, Side};

/// The VXLAN tunnel-port reference counts behind their mutex.
pub type SharedVxlanCounts = Arc<Mutex<RefCounts>>;

/// Creates an empty shared tunnel-port counter map.
pub fn shared_vxlan_counts() -> SharedVxlanCounts {
    Arc::new(Mutex::new(RefCounts::new()))
}

/// Derives the OVS tunnel port name for a remote forwarder address.
pub fn tunnel_port_name(remote_ip: &IpAddr) -> String {
    format!("v{}", remote_ip.to_string().replace('.', ""))
}

/// Attaches the tunnel port for one side and records its port info.
async fn add(
    ctx: &Ctx,
    ovs: &Ovs,
    bridge: &str,
    counts: &SharedVxlanCounts,
    conn: &Connection,
    side: Side,
    client_chain: bool,
    dst_port: Option<u16>,
) -> FwdResult<()> {
    let Some(mechanism) = conn.mechanism.as_ref().and_then(|m| m.as_vxlan()) else {
        return Ok(());
    };
    let meta = ctx.metadata()?;
    if meta.port_info(side).is_some() {
        return Ok(());
    }

    let src_ip = mechanism
        .src_ip
        .ok_or_else(|| FwdError::parse("vxlan mechanism", "no vxlan SrcIP provided"))?;
    let dst_ip = mechanism
        .dst_ip
        .ok_or_else(|| FwdError::parse("vxlan mechanism", "no vxlan DstIP provided"))?;

    // the outbound side encapsulates toward DstIP, the inbound side
    // answers back toward SrcIP
    let (egress_ip, remote_ip) = if client_chain {
        (src_ip, dst_ip)
    } else {
        (dst_ip, src_ip)
    };

    let tunnel_name = tunnel_port_name(&remote_ip);
    let mut counts = counts.lock().await;
    counts
        .acquire(&tunnel_name, async {
            ovs.add_vxlan_port(bridge, &tunnel_name, egress_ip, remote_ip, dst_port)
                .await
        })
        .await?;

    let port_no = ovs.get_of_port(&tunnel_name).await?;

    meta.side(side).store(OvsPortInfo {
        port_name: tunnel_name,
        port_no,
        is_tunnel_port: true,
        vni: mechanism.vni,
        ..Default::default()
    });
    Ok(())
}

/// Releases one reference to the tunnel port, removing it when the last
/// connection using the remote leaves.
async fn remove(
    ovs: &Ovs,
    bridge: &str,
    counts: &SharedVxlanCounts,
    conn: &Connection,
    client_chain: bool,
) -> FwdResult<()> {
    let Some(mechanism) = conn.mechanism.as_ref().and_then(|m| m.as_vxlan()) else {
        return Ok(());
    };
    let remote_ip = if client_chain {
        mechanism.dst_ip
    } else {
        mechanism.src_ip
    };
    let Some(remote_ip) = remote_ip else {
        return Ok(());
    };

    let tunnel_name = tunnel_port_name(&remote_ip);
    let mut counts = counts.lock().await;
    if !counts.contains(&tunnel_name) {
        return Ok(());
    }
    counts
        .release(&tunnel_name, async {
            ovs.del_port(bridge, &tunnel_name).await
        })
        .await?;
    Ok(())
}

/// Inbound VXLAN element: terminates a tunnel from a remote forwarder.
pub struct VxlanServer {
    bridge_name: String,
    counts: SharedVxlanCounts,
    ovs: Ovs,
    dst_port: Option<u16>,
}

impl VxlanServer {
    /// Creates the element; `dst_port` overrides the default VXLAN port.
    pub fn new(
        bridge_name: String,
        counts: SharedVxlanCounts,
        ovs: Ovs,
        dst_port: Option<u16>,
    ) -> Self {
        Self {
            bridge_name,
            counts,
            ovs,
            dst_port,
        }
    }
}

#[async_trait]
impl Element for VxlanServer {
    async fn request(
        &self,
        ctx: &Ctx,
        request: &mut Request,
        next: Next<'_>,
    ) -> FwdResult<Connection> {
        let conn = next.request(ctx, request).await?;

        if let Err(err) = add(
            ctx,
            &self.ovs,
            &self.bridge_name,
            &self.counts,
            &conn,
            Side::Client,
            false,
            self.dst_port,
        )
        .await
        {
            if let Err(remove_err) =
                remove(&self.ovs, &self.bridge_name, &self.counts, &conn, false).await
            {
                warn!(connection = %conn.id, error = %remove_err, "failed to undo tunnel port");
            }
            if let Err(close_err) = next.close(ctx, &conn).await {
                warn!(connection = %conn.id, error = %close_err, "failed to close failed connection");
            }
            return Err(err);
        }
        Ok(conn)
    }

    async fn close(&self, ctx: &Ctx, conn: &Connection, next: Next<'_>) -> FwdResult<()> {
        remove(&self.ovs, &self.bridge_name, &self.counts, conn, false).await?;
        next.close(ctx, conn).await
    }
}

/// Outbound VXLAN element: opens a tunnel toward a remote forwarder.
pub struct VxlanClient {
    bridge_name: String,
    counts: SharedVxlanCounts,
    ovs: Ovs,
    tunnel_ip: IpAddr,
    dst_port: Option<u16>,
}

impl VxlanClient {
    /// Creates the element advertising `tunnel_ip` as the local endpoint.
    pub fn new(
        bridge_name: String,
        counts: SharedVxlanCounts,
        ovs: Ovs,
        tunnel_ip: IpAddr,
        dst_port: Option<u16>,
    ) -> Self {
        Self {
            bridge_name,
            counts,
            ovs,
            tunnel_ip,
            dst_port,
        }
    }
}

#[async_trait]
impl Element for VxlanClient {
    async fn request(
        &self,
        ctx: &Ctx,
        request: &mut Request,
        next: Next<'_>,
    ) -> FwdResult<Connection> {
        request.mechanism_preferences.push(MechanismPreference {
            class: MechanismClass::Remote,
            kind: MechanismKind::Vxlan,
            supports_vlan: false,
            tunnel_ip: Some(self.tunnel_ip),
        });

        let conn = next.request(ctx, request).await?;

        if let Err(err) = add(
            ctx,
            &self.ovs,
            &self.bridge_name,
            &self.counts,
            &conn,
            Side::Endpoint,
            true,
            self.dst_port,
        )
        .await
        {
            if let Err(remove_err) =
                remove(&self.ovs, &self.bridge_name, &self.counts, &conn, true).await
            {
                warn!(connection = %conn.id, error = %remove_err, "failed to undo tunnel port");
            }
            if let Err(close_err) = next.close(ctx, &conn).await {
                warn!(connection = %conn.id, error = %close_err, "failed to close failed connection");
            }
            return Err(err);
        }
        Ok(conn)
    }

    async fn close(&self, ctx: &Ctx, conn: &Connection, next: Next<'_>) -> FwdResult<()> {
        let downstream_err = next.close(ctx, conn).await.err();
        let vxlan_err = remove(&self.ovs, &self.bridge_name, &self.counts, conn, true)
            .await
            .err();

        match (downstream_err, vxlan_err) {
            (None, None) => Ok(()),
            (Some(err), None) => Err(err),
            (prior, Some(err)) => Err(join_errors(prior, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tunnel_port_name_strips_dots() {
        let ip: IpAddr = "10.0.0.2".parse().unwrap();
        assert_eq!(tunnel_port_name(&ip), "v10002");

        let ip: IpAddr = "192.168.10.1".parse().unwrap();
        assert_eq!(tunnel_port_name(&ip), "v192168101");
    }
}
