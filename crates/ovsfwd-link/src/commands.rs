//! iproute2 command builders for host link operations.

use ovsfwd_common::shell::{self, IP_CMD};

/// MTU set on created veth pairs. Large enough that the connection MTU is
/// always limited by the pod or egress interface, never by the pair.
pub const VETH_MTU: u32 = 16000;

/// Build veth pair creation command.
///
/// The container-side name carries the MTU; the peer inherits it.
pub fn build_add_veth_cmd(cont_if: &str, host_if: &str) -> String {
    format!(
        "{} link add {} mtu {} type veth peer name {}",
        IP_CMD,
        shell::shellquote(cont_if),
        VETH_MTU,
        shell::shellquote(host_if)
    )
}

/// Build link deletion command.
pub fn build_del_link_cmd(ifname: &str) -> String {
    format!("{} link del {}", IP_CMD, shell::shellquote(ifname))
}

/// Build link up command.
pub fn build_set_link_up_cmd(ifname: &str) -> String {
    format!("{} link set {} up", IP_CMD, shell::shellquote(ifname))
}

/// Build JSON link query for one device.
pub fn build_link_show_cmd(ifname: &str) -> String {
    format!("{} -json link show dev {}", IP_CMD, shell::shellquote(ifname))
}

/// Build JSON address listing for one device.
pub fn build_addr_show_cmd(ifname: &str) -> String {
    format!("{} -json addr show dev {}", IP_CMD, shell::shellquote(ifname))
}

/// Build JSON address listing for every host interface.
pub fn build_addr_show_all_cmd() -> String {
    format!("{} -json addr show", IP_CMD)
}

/// Build address add command. `addr` is in `ip/prefixlen` form.
pub fn build_addr_add_cmd(addr: &str, ifname: &str) -> String {
    format!(
        "{} addr add {} dev {}",
        IP_CMD,
        shell::shellquote(addr),
        shell::shellquote(ifname)
    )
}

/// Build address delete command. `addr` is in `ip/prefixlen` form.
pub fn build_addr_del_cmd(addr: &str, ifname: &str) -> String {
    format!(
        "{} addr del {} dev {}",
        IP_CMD,
        shell::shellquote(addr),
        shell::shellquote(ifname)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_add_veth_cmd() {
        let cmd = build_add_veth_cmd("contsrc-1", "tapsrc-1");
        assert!(cmd.contains("link add \"contsrc-1\""));
        assert!(cmd.contains("mtu 16000"));
        assert!(cmd.contains("type veth peer name \"tapsrc-1\""));
    }

    #[test]
    fn test_build_del_link_cmd() {
        let cmd = build_del_link_cmd("tapsrc-1");
        assert!(cmd.contains("link del \"tapsrc-1\""));
    }

    #[test]
    fn test_build_set_link_up_cmd() {
        assert!(build_set_link_up_cmd("tapsrc-1").ends_with("link set \"tapsrc-1\" up"));
    }

    #[test]
    fn test_build_addr_cmds() {
        assert!(build_addr_add_cmd("10.0.0.1/24", "br-red").contains("addr add \"10.0.0.1/24\" dev \"br-red\""));
        assert!(build_addr_del_cmd("10.0.0.1/24", "eth1").contains("addr del \"10.0.0.1/24\" dev \"eth1\""));
        assert!(build_addr_show_cmd("eth1").contains("-json addr show dev \"eth1\""));
    }
}
