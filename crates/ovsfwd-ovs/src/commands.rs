//! Command builders for `ovs-vsctl` and `ovs-ofctl`.

use std::net::IpAddr;

use ovsfwd_common::shell::{self, OVS_OFCTL_CMD, OVS_VSCTL_CMD};

/// OpenFlow protocol version flag used for every flow operation.
pub const OPENFLOW13: &str = "-OOpenflow13";

/// Build bridge creation command (idempotent).
pub fn build_add_bridge_cmd(bridge: &str) -> String {
    format!(
        "{} -- --may-exist add-br {}",
        OVS_VSCTL_CMD,
        shell::shellquote(bridge)
    )
}

/// Build port attach command (idempotent), with an optional access tag.
pub fn build_add_port_cmd(bridge: &str, ifname: &str, tag: Option<u16>) -> String {
    let mut cmd = format!(
        "{} -- --may-exist add-port {} {}",
        OVS_VSCTL_CMD,
        shell::shellquote(bridge),
        shell::shellquote(ifname)
    );
    if let Some(tag) = tag {
        cmd.push_str(&format!(" tag={}", tag));
    }
    cmd
}

/// Build port detach command.
pub fn build_del_port_cmd(bridge: &str, ifname: &str) -> String {
    format!(
        "{} del-port {} {}",
        OVS_VSCTL_CMD,
        shell::shellquote(bridge),
        shell::shellquote(ifname)
    )
}

/// Build interface option set command.
pub fn build_set_interface_cmd(ifname: &str, options: &[String]) -> String {
    format!(
        "{} set interface {} {}",
        OVS_VSCTL_CMD,
        shell::shellquote(ifname),
        options.join(" ")
    )
}

/// Build the compound command that attaches a VXLAN tunnel port.
///
/// The port is attached and typed in one invocation so a crash between
/// the two steps cannot leave a half-configured interface.
pub fn build_add_vxlan_port_cmd(
    bridge: &str,
    tunnel_port: &str,
    egress_ip: IpAddr,
    remote_ip: IpAddr,
    dst_port: Option<u16>,
) -> String {
    let mut cmd = format!(
        "{} -- --may-exist add-port {} {} -- set interface {} type=vxlan \
         options:local_ip={} options:remote_ip={} options:key=flow",
        OVS_VSCTL_CMD,
        shell::shellquote(bridge),
        shell::shellquote(tunnel_port),
        shell::shellquote(tunnel_port),
        egress_ip,
        remote_ip
    );
    if let Some(port) = dst_port {
        cmd.push_str(&format!(" options:dst_port={}", port));
    }
    cmd
}

/// Build OpenFlow port number query (empty output when the port is gone).
pub fn build_get_ofport_cmd(ifname: &str) -> String {
    format!(
        "{} --if-exists get interface {} ofport",
        OVS_VSCTL_CMD,
        shell::shellquote(ifname)
    )
}

/// Build flow install command.
pub fn build_add_flow_cmd(bridge: &str, rule: &str) -> String {
    format!(
        "{} add-flow {} {} {}",
        OVS_OFCTL_CMD,
        OPENFLOW13,
        shell::shellquote(bridge),
        shell::shellquote(rule)
    )
}

/// Build flow delete command for the given match.
pub fn build_del_flows_cmd(bridge: &str, flow_match: &str) -> String {
    format!(
        "{} del-flows {} {} {}",
        OVS_OFCTL_CMD,
        OPENFLOW13,
        shell::shellquote(bridge),
        shell::shellquote(flow_match)
    )
}

/// Build the flow table flush command used at bridge bootstrap.
pub fn build_flush_flows_cmd(bridge: &str) -> String {
    format!("{} del-flows {}", OVS_OFCTL_CMD, shell::shellquote(bridge))
}
