//! Host link operations through iproute2.
//!
//! This is the narrow adapter through which the forwarder touches host
//! interfaces: veth pair lifecycle, link state, address moves for the
//! bridge bootstrap, and MTU queries. Everything executes through the
//! shared [`CommandRunner`] so tests observe the exact commands.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use ovsfwd_common::shell::CommandRunner;
use ovsfwd_common::{FwdError, FwdResult};

use crate::commands::{
    build_add_veth_cmd, build_addr_add_cmd, build_addr_del_cmd, build_addr_show_all_cmd,
    build_addr_show_cmd, build_del_link_cmd, build_link_show_cmd, build_set_link_up_cmd,
};

/// One address assigned to a host interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfAddr {
    /// The address itself.
    pub address: IpAddr,
    /// Prefix length of the subnet.
    pub prefix_len: u8,
}

impl IfAddr {
    /// Returns the `ip/prefixlen` form used by iproute2.
    pub fn cidr(&self) -> String {
        format!("{}/{}", self.address, self.prefix_len)
    }

    /// Returns the network address of the subnet this address lives in.
    pub fn network(&self) -> IpAddr {
        match self.address {
            IpAddr::V4(v4) => {
                let bits = u32::from(v4);
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u32::MAX << (32 - u32::from(self.prefix_len.min(32)))
                };
                IpAddr::V4(Ipv4Addr::from(bits & mask))
            }
            IpAddr::V6(v6) => {
                let bits = u128::from(v6);
                let mask = if self.prefix_len == 0 {
                    0
                } else {
                    u128::MAX << (128 - u128::from(self.prefix_len.min(128)))
                };
                IpAddr::V6(Ipv6Addr::from(bits & mask))
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct IpLinkEntry {
    #[serde(default)]
    ifname: String,
    mtu: Option<u32>,
    #[serde(default)]
    addr_info: Vec<IpAddrInfo>,
}

#[derive(Debug, Deserialize)]
struct IpAddrInfo {
    family: String,
    local: Option<String>,
    prefixlen: Option<u8>,
    scope: Option<String>,
}

/// Host link adapter.
#[derive(Clone)]
pub struct Links {
    runner: Arc<dyn CommandRunner>,
}

impl Links {
    /// Creates the adapter on top of the given runner.
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Creates a veth pair with the container-side and host-side names.
    pub async fn add_veth(&self, cont_if: &str, host_if: &str) -> FwdResult<()> {
        self.runner
            .exec_ok(&build_add_veth_cmd(cont_if, host_if))
            .await?;
        Ok(())
    }

    /// Brings each of the given interfaces up.
    pub async fn set_links_up(&self, ifnames: &[&str]) -> FwdResult<()> {
        for ifname in ifnames {
            self.runner
                .exec_ok(&build_set_link_up_cmd(ifname))
                .await?;
        }
        Ok(())
    }

    /// Deletes a host link. A link that is already gone counts as success.
    pub async fn del_link(&self, ifname: &str) -> FwdResult<()> {
        let result = self.runner.exec(&build_del_link_cmd(ifname)).await?;
        if result.success() {
            return Ok(());
        }
        if result.stderr.contains("Cannot find device") {
            debug!(ifname, "link already deleted");
            return Ok(());
        }
        Err(FwdError::CommandFailed {
            command: build_del_link_cmd(ifname),
            exit_code: result.exit_code,
            output: result.combined_output(),
        })
    }

    /// Returns the MTU of the interface, or 0 when the link is absent.
    pub async fn get_mtu(&self, ifname: &str) -> FwdResult<u32> {
        let result = self.runner.exec(&build_link_show_cmd(ifname)).await?;
        if !result.success() {
            debug!(ifname, "link not found while querying MTU");
            return Ok(0);
        }
        let entries: Vec<IpLinkEntry> =
            serde_json::from_str(&result.stdout).map_err(|e| FwdError::parse("link json", e.to_string()))?;
        let mtu = entries.first().and_then(|e| e.mtu).unwrap_or(0);
        if mtu > 65535 {
            return Err(FwdError::parse("mtu", format!("invalid MTU value {mtu}")));
        }
        Ok(mtu)
    }

    /// Lists the global-scope addresses assigned to the interface.
    ///
    /// Link-scoped addresses stay with the interface and are not part of
    /// the bootstrap address handoff.
    pub async fn list_addresses(&self, ifname: &str) -> FwdResult<Vec<IfAddr>> {
        let stdout = self.runner.exec_ok(&build_addr_show_cmd(ifname)).await?;
        let entries: Vec<IpLinkEntry> =
            serde_json::from_str(&stdout).map_err(|e| FwdError::parse("addr json", e.to_string()))?;
        Ok(entries
            .into_iter()
            .flat_map(|e| e.addr_info)
            .filter_map(parse_addr_info)
            .collect())
    }

    /// Adds an address to the interface.
    pub async fn add_address(&self, ifname: &str, addr: &IfAddr) -> FwdResult<()> {
        self.runner
            .exec_ok(&build_addr_add_cmd(&addr.cidr(), ifname))
            .await?;
        Ok(())
    }

    /// Removes an address from the interface.
    pub async fn del_address(&self, ifname: &str, addr: &IfAddr) -> FwdResult<()> {
        self.runner
            .exec_ok(&build_addr_del_cmd(&addr.cidr(), ifname))
            .await?;
        Ok(())
    }

    /// Lists every global-scope address on the host with its interface.
    pub async fn host_addresses(&self) -> FwdResult<Vec<(String, IfAddr)>> {
        let stdout = self.runner.exec_ok(&build_addr_show_all_cmd()).await?;
        let entries: Vec<IpLinkEntry> =
            serde_json::from_str(&stdout).map_err(|e| FwdError::parse("addr json", e.to_string()))?;
        let mut out = Vec::new();
        for entry in entries {
            for info in entry.addr_info {
                if let Some(addr) = parse_addr_info(info) {
                    out.push((entry.ifname.clone(), addr));
                }
            }
        }
        Ok(out)
    }

    /// Resolves the local tunnel endpoint address.
    ///
    /// `target` may be a host address or the network address of a CIDR;
    /// the first interface address equal to it, or living in a subnet
    /// whose network address equals it, is returned.
    pub async fn parse_tunnel_ip(&self, target: IpAddr) -> FwdResult<IpAddr> {
        for (ifname, addr) in self.host_addresses().await? {
            if addr.address == target || addr.network() == target {
                debug!(%ifname, address = %addr.address, "selected tunnel endpoint address");
                return Ok(addr.address);
            }
        }
        warn!(%target, "no host interface matches the tunnel address");
        Err(FwdError::parse(
            "tunnel ip",
            format!("no interface address matches {target}"),
        ))
    }
}

fn parse_addr_info(info: IpAddrInfo) -> Option<IfAddr> {
    if info.family != "inet" && info.family != "inet6" {
        return None;
    }
    if info.scope.as_deref() == Some("link") {
        return None;
    }
    let address: IpAddr = info.local.as_deref()?.parse().ok()?;
    Some(IfAddr {
        address,
        prefix_len: info.prefixlen.unwrap_or(if address.is_ipv4() { 32 } else { 128 }),
    })
}
