//! The endpoint composer: wires the adapters and chain elements into a
//! forwarder with one request/close entry point.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use ovsfwd_common::shell::CommandRunner;
use ovsfwd_common::FwdResult;
use ovsfwd_link::Links;
use ovsfwd_ovs::{configure_bridges, Ovs};

use crate::chain::{Chain, Ctx};
use crate::config::Config;
use crate::elements::connect::{
    ConnectElement, Downstream, DownstreamElement, MechanismTranslateClient,
};
use crate::elements::kernel::{
    shared_parent_if, KernelClient, KernelVethServer, KernelVfServer, SharedParentIf,
};
use crate::elements::l2connect::L2ConnectClient;
use crate::elements::mechanisms::MechanismsServer;
use crate::elements::metadata::{MetadataElement, MetadataRegistry};
use crate::elements::mtu::MtuClient;
use crate::elements::passthrough;
use crate::elements::resourcepool::{NullResourcePool, ResourcePool, ResourcePoolElement};
use crate::elements::vlan::VlanClient;
use crate::elements::vxlan::{shared_vxlan_counts, SharedVxlanCounts, VxlanClient, VxlanServer};
use crate::model::{Connection, Request};
use crate::portinfo::Side;
use crate::sriov::{SriovProvider, SysfsSriov};

/// The composed forwarder.
pub struct Forwarder {
    name: String,
    server_chain: Chain,
    registry: Arc<MetadataRegistry>,
    pub(crate) parent_if: SharedParentIf,
    pub(crate) vxlan_counts: SharedVxlanCounts,
}

impl Forwarder {
    /// Composes the kernel-only forwarder (no SR-IOV accounting).
    pub async fn new_kernel_server(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        downstream: Arc<dyn Downstream>,
    ) -> FwdResult<Self> {
        Self::new_endpoint(
            config,
            runner,
            downstream,
            Arc::new(NullResourcePool),
            Arc::new(SysfsSriov::new()),
        )
        .await
    }

    /// Composes the SR-IOV forwarder around a shared resource pool.
    pub async fn new_sriov_server(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        downstream: Arc<dyn Downstream>,
        resource_pool: Arc<dyn ResourcePool>,
        sriov: Arc<dyn SriovProvider>,
    ) -> FwdResult<Self> {
        Self::new_endpoint(config, runner, downstream, resource_pool, sriov).await
    }

    async fn new_endpoint(
        config: Config,
        runner: Arc<dyn CommandRunner>,
        downstream: Arc<dyn Downstream>,
        resource_pool: Arc<dyn ResourcePool>,
        sriov: Arc<dyn SriovProvider>,
    ) -> FwdResult<Self> {
        let ovs = Ovs::new(runner.clone());
        let links = Links::new(runner);

        let tunnel_ip = links.parse_tunnel_ip(config.tunnel_ip_cidr).await?;
        configure_bridges(&ovs, &links, &config.l2_connections, &config.bridge_name).await?;

        let bridge = config.bridge_name.clone();
        let parent_if = shared_parent_if();
        let vxlan_counts = shared_vxlan_counts();
        // one lock coordinates the pool's server and client use
        let resource_lock = Arc::new(Mutex::new(()));

        let client_chain = Chain::new(vec![
            Arc::new(MechanismTranslateClient),
            Arc::new(L2ConnectClient::new(bridge.clone(), ovs.clone())),
            passthrough::kernel_ctx(),
            passthrough::inject(),
            Arc::new(KernelClient::new(
                bridge.clone(),
                parent_if.clone(),
                ovs.clone(),
                links.clone(),
                sriov.clone(),
            )),
            Arc::new(ResourcePoolElement::new(
                resource_pool.clone(),
                resource_lock.clone(),
                Side::Endpoint,
            )),
            Arc::new(VxlanClient::new(
                bridge.clone(),
                vxlan_counts.clone(),
                ovs.clone(),
                tunnel_ip,
                config.vxlan_port,
            )),
            Arc::new(MtuClient::new(config.l2_connections.clone(), links.clone())),
            Arc::new(VlanClient::new(
                bridge.clone(),
                config.l2_connections.clone(),
                ovs.clone(),
            )),
            passthrough::filter_mechanisms(),
            passthrough::fd_recv(),
            passthrough::fd_send(),
            Arc::new(DownstreamElement::new(downstream)),
        ]);

        let registry = Arc::new(MetadataRegistry::new());
        let server_chain = Chain::new(vec![
            Arc::new(MetadataElement::new(registry.clone())),
            passthrough::fd_recv(),
            passthrough::fd_send(),
            passthrough::discover(),
            passthrough::round_robin(),
            Arc::new(MechanismsServer::new(
                Arc::new(KernelVethServer::new(
                    bridge.clone(),
                    parent_if.clone(),
                    ovs.clone(),
                    links.clone(),
                )),
                Arc::new(KernelVfServer::new(
                    bridge.clone(),
                    parent_if.clone(),
                    ovs.clone(),
                    sriov.clone(),
                )),
                Arc::new(VxlanServer::new(
                    bridge.clone(),
                    vxlan_counts.clone(),
                    ovs.clone(),
                    config.vxlan_port,
                )),
                resource_pool,
                resource_lock,
            )),
            passthrough::inject(),
            passthrough::kernel_ctx(),
            Arc::new(ConnectElement::new(client_chain)),
        ]);

        info!(
            name = %config.name,
            bridge = %config.bridge_name,
            %tunnel_ip,
            client_url = %config.client_url,
            dial_timeout_ms = config.dial_timeout.as_millis() as u64,
            "forwarder endpoint composed"
        );

        Ok(Self {
            name: config.name,
            server_chain,
            registry,
            parent_if,
            vxlan_counts,
        })
    }

    /// The forwarder's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handles one inbound connection request (initial or refresh).
    pub async fn request(&self, ctx: &Ctx, request: &mut Request) -> FwdResult<Connection> {
        self.server_chain.request(ctx, request).await
    }

    /// Tears one connection down.
    pub async fn close(&self, ctx: &Ctx, conn: &Connection) -> FwdResult<()> {
        self.server_chain.close(ctx, conn).await
    }

    /// Number of connections with live metadata.
    pub fn active_connections(&self) -> usize {
        self.registry.len()
    }
}
