//! Typed wrapper around the OVS command-line tools.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use ovsfwd_common::shell::CommandRunner;
use ovsfwd_common::{FwdError, FwdResult};

use crate::commands::{
    build_add_bridge_cmd, build_add_flow_cmd, build_add_port_cmd, build_add_vxlan_port_cmd,
    build_del_flows_cmd, build_del_port_cmd, build_flush_flows_cmd, build_get_ofport_cmd,
    build_set_interface_cmd,
};

/// Attempts made while OVS still reports OpenFlow port number 0.
const OFPORT_RETRY_COUNT: u32 = 5;

/// Delay between OpenFlow port number retries.
const OFPORT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Adapter for `ovs-vsctl` / `ovs-ofctl` operations.
#[derive(Clone)]
pub struct Ovs {
    runner: Arc<dyn CommandRunner>,
}

impl Ovs {
    /// Creates the adapter on top of the given runner.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Ensures the bridge exists.
    pub async fn add_bridge(&self, bridge: &str) -> FwdResult<()> {
        self.runner.exec_ok(&build_add_bridge_cmd(bridge)).await?;
        Ok(())
    }

    /// Attaches an interface to the bridge, optionally with an access tag.
    pub async fn add_port(&self, bridge: &str, ifname: &str, tag: Option<u16>) -> FwdResult<()> {
        self.runner
            .exec_ok(&build_add_port_cmd(bridge, ifname, tag))
            .await?;
        Ok(())
    }

    /// Detaches an interface from the bridge.
    pub async fn del_port(&self, bridge: &str, ifname: &str) -> FwdResult<()> {
        self.runner
            .exec_ok(&build_del_port_cmd(bridge, ifname))
            .await?;
        Ok(())
    }

    /// Detaches an interface, logging instead of failing.
    ///
    /// Used on teardown paths where the flows and the link itself are
    /// removed next anyway.
    pub async fn del_port_best_effort(&self, bridge: &str, ifname: &str) {
        if let Err(e) = self.del_port(bridge, ifname).await {
            warn!(bridge, ifname, error = %e, "failed to delete bridge port");
        }
    }

    /// Sets options on an OVS interface record.
    pub async fn set_interface(&self, ifname: &str, options: &[String]) -> FwdResult<()> {
        self.runner
            .exec_ok(&build_set_interface_cmd(ifname, options))
            .await?;
        Ok(())
    }

    /// Attaches a VXLAN tunnel port keyed by flow metadata.
    pub async fn add_vxlan_port(
        &self,
        bridge: &str,
        tunnel_port: &str,
        egress_ip: IpAddr,
        remote_ip: IpAddr,
        dst_port: Option<u16>,
    ) -> FwdResult<()> {
        self.runner
            .exec_ok(&build_add_vxlan_port_cmd(
                bridge,
                tunnel_port,
                egress_ip,
                remote_ip,
                dst_port,
            ))
            .await?;
        Ok(())
    }

    /// Installs one flow rule.
    pub async fn add_flow(&self, bridge: &str, rule: &str) -> FwdResult<()> {
        self.runner.exec_ok(&build_add_flow_cmd(bridge, rule)).await?;
        Ok(())
    }

    /// Deletes all flows matching the given match expression.
    pub async fn del_flows(&self, bridge: &str, flow_match: &str) -> FwdResult<()> {
        self.runner
            .exec_ok(&build_del_flows_cmd(bridge, flow_match))
            .await?;
        Ok(())
    }

    /// Flushes the whole flow table of the bridge.
    pub async fn flush_flows(&self, bridge: &str) -> FwdResult<()> {
        self.runner.exec_ok(&build_flush_flows_cmd(bridge)).await?;
        Ok(())
    }

    /// Resolves the OpenFlow port number for an interface.
    ///
    /// OVS reports 0 transiently between port add and activation, so a
    /// zero answer is retried up to 5 times with a 500 ms delay. A
    /// persistent 0 after exhaustion is returned as-is; command errors
    /// abort immediately.
    pub async fn get_of_port(&self, ifname: &str) -> FwdResult<i32> {
        let mut port_no = 0;
        for attempt in 0..OFPORT_RETRY_COUNT {
            let result = self.runner.exec(&build_get_ofport_cmd(ifname)).await?;
            if !result.success() {
                return Err(FwdError::CommandFailed {
                    command: build_get_ofport_cmd(ifname),
                    exit_code: result.exit_code,
                    output: result.combined_output(),
                });
            }
            if !result.stderr.is_empty() {
                info!(ifname, stderr = %result.stderr, "ofport query produced diagnostics");
            }
            port_no = result
                .stdout
                .trim()
                .parse::<i32>()
                .map_err(|e| FwdError::parse("ofport", format!("{}: {e}", result.stdout)))?;
            if port_no != 0 {
                break;
            }
            info!(ifname, attempt, "got port number 0, retrying");
            tokio::time::sleep(OFPORT_RETRY_DELAY).await;
        }
        debug!(ifname, port_no, "resolved OpenFlow port number");
        Ok(port_no)
    }
}
