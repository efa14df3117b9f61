//! Forwarder configuration surface.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::Duration;

use uuid::Uuid;

use ovsfwd_common::{FwdError, FwdResult};
use ovsfwd_ovs::L2ConnectionPoint;

/// Default name of the main bridge.
pub const DEFAULT_BRIDGE_NAME: &str = "br-nsm";

/// Default URL of the local connection manager socket.
pub const DEFAULT_CLIENT_URL: &str = "unix://connect.to.socket";

/// Default timeout for dialing the next hop.
pub const DEFAULT_DIAL_TIMEOUT: Duration = Duration::from_millis(200);

/// Everything the forwarder needs at boot. All state is in memory; the
/// surrounding mesh reconstructs connections on reconnect.
#[derive(Debug, Clone)]
pub struct Config {
    /// Forwarder name, used in path segments and logs.
    pub name: String,
    /// Name of the main bridge.
    pub bridge_name: String,
    /// URL of the local connection manager used for outbound requests.
    pub client_url: String,
    /// Timeout for dialing the next hop.
    pub dial_timeout: Duration,
    /// Host address, or network address of a CIDR, selecting the local
    /// VXLAN tunnel endpoint.
    pub tunnel_ip_cidr: IpAddr,
    /// Non-default VXLAN destination port, if any.
    pub vxlan_port: Option<u16>,
    /// L2 egress points addressable through the `via` label.
    pub l2_connections: HashMap<String, L2ConnectionPoint>,
}

impl Config {
    /// A configuration with defaults and a generated forwarder name.
    pub fn new(tunnel_ip_cidr: IpAddr) -> Self {
        Self {
            name: format!("forwarder-ovs-{}", Uuid::new_v4()),
            bridge_name: DEFAULT_BRIDGE_NAME.to_string(),
            client_url: DEFAULT_CLIENT_URL.to_string(),
            dial_timeout: DEFAULT_DIAL_TIMEOUT,
            tunnel_ip_cidr,
            vxlan_port: None,
            l2_connections: HashMap::new(),
        }
    }
}

/// Parses the L2 egress table from its YAML form:
///
/// ```yaml
/// red:
///   interface: eth1
///   bridge: br-red
/// service-domain:
///   bridge: br-ext
/// ```
pub fn parse_l2_connections(yaml: &str) -> FwdResult<HashMap<String, L2ConnectionPoint>> {
    serde_yaml::from_str(yaml).map_err(|e| FwdError::parse("l2 connections", e.to_string()))
}
