//! Kernel mechanism elements: veth pair and VF representor attachment.
//!
//! The inbound chain plumbs the client-workload-facing port before
//! delegating; the outbound chain plumbs the endpoint-facing port after
//! the next hop has answered. Both share the parent-interface reference
//! counts so connections of one VLAN service can coalesce on a single
//! host trunk.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use ovsfwd_common::{join_errors, FwdError, FwdResult, RefCounts};
use ovsfwd_link::Links;
use ovsfwd_ovs::Ovs;

use crate::chain::{Ctx, Element, Next};
use crate::model::{
    Connection, MechanismClass, MechanismKind, MechanismPreference, Request,
};
use crate::portinfo::{OvsPortInfo, Side, VfConfig};
use crate::sriov::SriovProvider;

const OVS_PORT_SRC_PREFIX: &str = "tapsrc";
const OVS_PORT_DST_PREFIX: &str = "tapdst";
const CONT_PORT_SRC_PREFIX: &str = "contsrc";
const CONT_PORT_DST_PREFIX: &str = "contdst";

/// Kernel limit on interface name length.
const LINUX_IF_MAX_LENGTH: usize = 15;

/// Parent-interface accounting shared by all kernel elements.
///
/// `service_trunks` maps a network service to the host interface its
/// VLAN-tagged connections share; it lives under the same lock as the
/// reference counts.
#[derive(Debug, Default)]
pub struct ParentIfState {
    pub(crate) ref_counts: RefCounts,
    service_trunks: HashMap<String, String>,
}

/// The parent-interface state behind its mutex.
pub type SharedParentIf = Arc<Mutex<ParentIfState>>;

/// Creates an empty shared parent-interface state.
pub fn shared_parent_if() -> SharedParentIf {
    Arc::new(Mutex::new(ParentIfState::default()))
}

/// Derives the host or container interface name for a connection.
pub fn interface_name(prefix: &str, conn_id: &str) -> String {
    let mut name = format!("{}-{}", prefix, conn_id);
    name.truncate(LINUX_IF_MAX_LENGTH);
    name
}

fn side_prefixes(side: Side) -> (&'static str, &'static str) {
    match side {
        Side::Client => (OVS_PORT_SRC_PREFIX, CONT_PORT_SRC_PREFIX),
        Side::Endpoint => (OVS_PORT_DST_PREFIX, CONT_PORT_DST_PREFIX),
    }
}

/// Attaches a veth pair for the given side of the connection.
///
/// A VLAN-tagged connection reuses the trunk interface already serving
/// its network service instead of creating a second pair.
async fn setup_veth(
    ctx: &Ctx,
    ovs: &Ovs,
    links: &Links,
    bridge: &str,
    state: &mut ParentIfState,
    conn: &Connection,
    side: Side,
) -> FwdResult<()> {
    let Some(mechanism) = conn.mechanism.as_ref().and_then(|m| m.as_kernel()) else {
        return Ok(());
    };
    let meta = ctx.metadata()?;
    if meta.port_info(side).is_some() {
        return Ok(());
    }

    let (host_prefix, cont_prefix) = side_prefixes(side);
    // the intermediate container-side name avoids collisions between
    // parallel requests for the same pod
    let mut host_if = interface_name(host_prefix, &conn.id);
    let cont_if = interface_name(cont_prefix, &conn.id);

    let vlan_id = mechanism.vlan_id;
    let mut shared_trunk = false;
    if vlan_id != 0 {
        if let Some(existing) = state.service_trunks.get(&conn.network_service) {
            debug!(
                service = %conn.network_service,
                trunk = %existing,
                "reusing shared trunk interface"
            );
            host_if = existing.clone();
            shared_trunk = true;
        }
    }

    if !shared_trunk {
        links.add_veth(&cont_if, &host_if).await?;
        links.set_links_up(&[&cont_if, &host_if]).await?;
    }

    ovs.add_port(bridge, &host_if, None).await?;
    state.ref_counts.acquire(&host_if, async { Ok(()) }).await?;
    if vlan_id != 0 {
        state
            .service_trunks
            .insert(conn.network_service.clone(), host_if.clone());
    }

    let port_no = ovs.get_of_port(&host_if).await?;

    meta.side(side).store(VfConfig {
        vf_interface_name: cont_if,
        ..Default::default()
    });
    meta.side(side).store(OvsPortInfo {
        port_name: host_if,
        port_no,
        vlan_id,
        ..Default::default()
    });
    Ok(())
}

/// Detaches a veth port, tearing down the pair when the last connection
/// sharing it leaves.
///
/// A port that was moved to an egress bridge is not detached from the
/// main bridge here; the breakout element already removed it. A link
/// that has already vanished counts as success.
async fn reset_veth(
    ovs: &Ovs,
    links: &Links,
    bridge: &str,
    state: &mut ParentIfState,
    port_name: &str,
    is_l2_connect: bool,
) -> FwdResult<()> {
    let destroyed = state
        .ref_counts
        .release(port_name, async {
            if !is_l2_connect {
                ovs.del_port_best_effort(bridge, port_name).await;
            }
            links.del_link(port_name).await
        })
        .await?;
    if destroyed {
        state.service_trunks.retain(|_, trunk| trunk != port_name);
    }
    Ok(())
}

/// Attaches the VF representor for the given side of the connection.
async fn setup_vf(
    ctx: &Ctx,
    ovs: &Ovs,
    bridge: &str,
    state: &mut ParentIfState,
    sriov: &dyn SriovProvider,
    conn: &Connection,
    side: Side,
) -> FwdResult<()> {
    let Some(mechanism) = conn.mechanism.as_ref().and_then(|m| m.as_kernel()) else {
        return Ok(());
    };
    let meta = ctx.metadata()?;
    if meta.port_info(side).is_some() {
        return Ok(());
    }

    let vf_config = meta
        .side(side)
        .load::<VfConfig>()
        .ok_or_else(|| FwdError::internal("vfconfig not found"))?;

    // the representor is the host-side shadow of the VF handed into the
    // pod; attaching it to the bridge steers the VF's traffic
    let representor =
        sriov.vf_representor(&vf_config.pf_interface_name, vf_config.vf_num)?;

    state
        .ref_counts
        .acquire(&representor, async {
            ovs.add_port(bridge, &representor, None).await
        })
        .await?;

    let port_no = ovs.get_of_port(&representor).await?;

    meta.side(side).store(OvsPortInfo {
        port_name: representor,
        port_no,
        vlan_id: mechanism.vlan_id,
        is_vf_representor: true,
        ..Default::default()
    });
    Ok(())
}

/// Detaches a VF representor when its last connection leaves.
async fn reset_vf(
    ovs: &Ovs,
    bridge: &str,
    state: &mut ParentIfState,
    port_info: &OvsPortInfo,
) -> FwdResult<()> {
    state
        .ref_counts
        .release(&port_info.port_name, async {
            ovs.del_port(bridge, &port_info.port_name).await
        })
        .await?;
    Ok(())
}

/// Inbound veth element: plumbs the client-workload-facing pair.
pub struct KernelVethServer {
    bridge_name: String,
    state: SharedParentIf,
    ovs: Ovs,
    links: Links,
}

impl KernelVethServer {
    /// Creates the element.
    pub fn new(bridge_name: String, state: SharedParentIf, ovs: Ovs, links: Links) -> Self {
        Self {
            bridge_name,
            state,
            ovs,
            links,
        }
    }
}

#[async_trait]
impl Element for KernelVethServer {
    async fn request(
        &self,
        ctx: &Ctx,
        request: &mut Request,
        next: Next<'_>,
    ) -> FwdResult<Connection> {
        let meta = ctx.metadata()?;
        let is_established = meta.port_info(Side::Client).is_some();

        if !is_established {
            let mut state = self.state.lock().await;
            if let Err(err) = setup_veth(
                ctx,
                &self.ovs,
                &self.links,
                &self.bridge_name,
                &mut state,
                &request.connection,
                Side::Client,
            )
            .await
            {
                let (host_prefix, _) = side_prefixes(Side::Client);
                let host_if = interface_name(host_prefix, &request.connection.id);
                if let Err(reset_err) = reset_veth(
                    &self.ovs,
                    &self.links,
                    &self.bridge_name,
                    &mut state,
                    &host_if,
                    false,
                )
                .await
                {
                    warn!(error = %reset_err, "failed to undo partial veth setup");
                }
                meta.side(Side::Client).delete::<OvsPortInfo>();
                meta.side(Side::Client).delete::<VfConfig>();
                return Err(err);
            }
        }

        let postpone = ctx.postpone();
        match next.request(ctx, request).await {
            Ok(conn) => Ok(conn),
            Err(err) if !is_established => {
                let close_ctx = postpone();
                let mut err = err;
                if let Some(info) = close_ctx
                    .metadata()?
                    .side(Side::Client)
                    .load_and_delete::<OvsPortInfo>()
                {
                    let mut state = self.state.lock().await;
                    if let Err(close_err) = reset_veth(
                        &self.ovs,
                        &self.links,
                        &self.bridge_name,
                        &mut state,
                        &info.port_name,
                        false,
                    )
                    .await
                    {
                        err = FwdError::joined(err, close_err);
                    }
                    close_ctx.metadata()?.side(Side::Client).delete::<VfConfig>();
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn close(&self, ctx: &Ctx, conn: &Connection, next: Next<'_>) -> FwdResult<()> {
        let downstream_err = next.close(ctx, conn).await.err();

        let mut kernel_err = None;
        if conn.mechanism.as_ref().and_then(|m| m.as_kernel()).is_some() {
            let meta = ctx.metadata()?;
            if let Some(info) = meta.side(Side::Client).load_and_delete::<OvsPortInfo>() {
                let mut state = self.state.lock().await;
                kernel_err = reset_veth(
                    &self.ovs,
                    &self.links,
                    &self.bridge_name,
                    &mut state,
                    &info.port_name,
                    info.is_l2_connect,
                )
                .await
                .err();
            }
            meta.side(Side::Client).delete::<VfConfig>();
        }

        match (downstream_err, kernel_err) {
            (None, None) => Ok(()),
            (Some(err), None) => Err(err),
            (prior, Some(err)) => Err(join_errors(prior, err)),
        }
    }
}

/// Inbound VF element: attaches the representor of an assigned VF.
pub struct KernelVfServer {
    bridge_name: String,
    state: SharedParentIf,
    ovs: Ovs,
    sriov: Arc<dyn SriovProvider>,
}

impl KernelVfServer {
    /// Creates the element.
    pub fn new(
        bridge_name: String,
        state: SharedParentIf,
        ovs: Ovs,
        sriov: Arc<dyn SriovProvider>,
    ) -> Self {
        Self {
            bridge_name,
            state,
            ovs,
            sriov,
        }
    }
}

#[async_trait]
impl Element for KernelVfServer {
    async fn request(
        &self,
        ctx: &Ctx,
        request: &mut Request,
        next: Next<'_>,
    ) -> FwdResult<Connection> {
        let meta = ctx.metadata()?;
        let is_established = meta.port_info(Side::Client).is_some();

        if !is_established {
            let mut state = self.state.lock().await;
            setup_vf(
                ctx,
                &self.ovs,
                &self.bridge_name,
                &mut state,
                self.sriov.as_ref(),
                &request.connection,
                Side::Client,
            )
            .await?;
        }

        let postpone = ctx.postpone();
        match next.request(ctx, request).await {
            Ok(conn) => Ok(conn),
            Err(err) if !is_established => {
                let close_ctx = postpone();
                let mut err = err;
                if let Some(info) = close_ctx
                    .metadata()?
                    .side(Side::Client)
                    .load_and_delete::<OvsPortInfo>()
                {
                    let mut state = self.state.lock().await;
                    if let Err(close_err) =
                        reset_vf(&self.ovs, &self.bridge_name, &mut state, &info).await
                    {
                        err = FwdError::joined(err, close_err);
                    }
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    async fn close(&self, ctx: &Ctx, conn: &Connection, next: Next<'_>) -> FwdResult<()> {
        let downstream_err = next.close(ctx, conn).await.err();

        let mut kernel_err = None;
        if conn.mechanism.as_ref().and_then(|m| m.as_kernel()).is_some() {
            let meta = ctx.metadata()?;
            if let Some(info) = meta.side(Side::Client).load_and_delete::<OvsPortInfo>() {
                let mut state = self.state.lock().await;
                kernel_err = reset_vf(&self.ovs, &self.bridge_name, &mut state, &info)
                    .await
                    .err();
            }
        }

        match (downstream_err, kernel_err) {
            (None, None) => Ok(()),
            (Some(err), None) => Err(err),
            (prior, Some(err)) => Err(join_errors(prior, err)),
        }
    }
}

/// Outbound kernel element: plumbs the endpoint-facing port once the
/// next hop has negotiated a kernel mechanism.
pub struct KernelClient {
    bridge_name: String,
    state: SharedParentIf,
    ovs: Ovs,
    links: Links,
    sriov: Arc<dyn SriovProvider>,
}

impl KernelClient {
    /// Creates the element.
    pub fn new(
        bridge_name: String,
        state: SharedParentIf,
        ovs: Ovs,
        links: Links,
        sriov: Arc<dyn SriovProvider>,
    ) -> Self {
        Self {
            bridge_name,
            state,
            ovs,
            links,
            sriov,
        }
    }

    async fn close_impl(&self, ctx: &Ctx, conn: &Connection, next: Next<'_>) -> FwdResult<()> {
        let downstream_err = next.close(ctx, conn).await.err();

        let mut kernel_err = None;
        if conn.mechanism.as_ref().and_then(|m| m.as_kernel()).is_some() {
            let meta = ctx.metadata()?;
            // the slot itself is removed later by the cross-connect
            // element; only the host artifacts go away here
            if let Some(info) = meta.side(Side::Endpoint).load::<OvsPortInfo>() {
                let mut state = self.state.lock().await;
                kernel_err = if !info.is_vf_representor {
                    reset_veth(
                        &self.ovs,
                        &self.links,
                        &self.bridge_name,
                        &mut state,
                        &info.port_name,
                        info.is_l2_connect,
                    )
                    .await
                    .err()
                } else {
                    reset_vf(&self.ovs, &self.bridge_name, &mut state, &info)
                        .await
                        .err()
                };
            }
            meta.side(Side::Endpoint).delete::<VfConfig>();
        }

        match (downstream_err, kernel_err) {
            (None, None) => Ok(()),
            (Some(err), None) => Err(err),
            (prior, Some(err)) => Err(join_errors(prior, err)),
        }
    }
}

#[async_trait]
impl Element for KernelClient {
    async fn request(
        &self,
        ctx: &Ctx,
        request: &mut Request,
        next: Next<'_>,
    ) -> FwdResult<Connection> {
        let meta = ctx.metadata()?;
        let is_established = meta.port_info(Side::Endpoint).is_some();

        request.mechanism_preferences.push(MechanismPreference {
            class: MechanismClass::Local,
            kind: MechanismKind::Kernel,
            supports_vlan: true,
            tunnel_ip: None,
        });

        let postpone = ctx.postpone();
        let conn = next.request(ctx, request).await?;
        if is_established {
            return Ok(conn);
        }

        let is_vf = conn
            .mechanism
            .as_ref()
            .and_then(|m| m.as_kernel())
            .map(|k| k.pci_address.is_some())
            .unwrap_or(false);

        let setup_result = {
            let mut state = self.state.lock().await;
            if is_vf {
                setup_vf(
                    ctx,
                    &self.ovs,
                    &self.bridge_name,
                    &mut state,
                    self.sriov.as_ref(),
                    &conn,
                    Side::Endpoint,
                )
                .await
            } else {
                setup_veth(
                    ctx,
                    &self.ovs,
                    &self.links,
                    &self.bridge_name,
                    &mut state,
                    &conn,
                    Side::Endpoint,
                )
                .await
            }
        };

        if let Err(err) = setup_result {
            let close_ctx = postpone();
            // a mid-setup failure stores no port info, so the close
            // below cannot find the half-built pair; undo it by name
            if !is_vf && conn.mechanism.as_ref().and_then(|m| m.as_kernel()).is_some() {
                let (host_prefix, _) = side_prefixes(Side::Endpoint);
                let host_if = interface_name(host_prefix, &conn.id);
                let mut state = self.state.lock().await;
                if let Err(reset_err) = reset_veth(
                    &self.ovs,
                    &self.links,
                    &self.bridge_name,
                    &mut state,
                    &host_if,
                    false,
                )
                .await
                {
                    warn!(error = %reset_err, "failed to undo partial veth setup");
                }
                close_ctx.metadata()?.side(Side::Endpoint).delete::<VfConfig>();
            }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interface_name_truncation() {
        assert_eq!(interface_name("tapsrc", "1"), "tapsrc-1");
        let long = interface_name("tapsrc", "0123456789abcdef");
        assert_eq!(long.len(), LINUX_IF_MAX_LENGTH);
        assert_eq!(long, "tapsrc-01234567");
    }

    #[test]
    fn test_side_prefixes() {
        assert_eq!(side_prefixes(Side::Client), ("tapsrc", "contsrc"));
        assert_eq!(side_prefixes(Side::Endpoint), ("tapdst", "contdst"));
    }
}
