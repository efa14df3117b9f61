//! Connection and mechanism model for the forwarder.

use std::collections::HashMap;
use std::net::IpAddr;

/// One hop in the connection path. The first and last hop of the slice
/// handled here name this forwarder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSegment {
    /// Segment connection id.
    pub id: String,
    /// Name of the element that owns the segment.
    pub name: String,
}

/// The connection path with the index of this forwarder's segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Path {
    /// Index of the segment belonging to this forwarder.
    pub index: u32,
    /// All segments of the path.
    pub segments: Vec<PathSegment>,
}

impl Path {
    /// The segment before this forwarder's, if any.
    pub fn prev_segment(&self) -> Option<&PathSegment> {
        let index = (self.index as usize).checked_sub(1)?;
        self.segments.get(index)
    }

    /// The segment after this forwarder's, if any.
    pub fn next_segment(&self) -> Option<&PathSegment> {
        self.segments.get(self.index as usize + 1)
    }
}

/// Negotiated per-connection context values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionContext {
    /// Maximum transmission unit; 0 means not negotiated.
    pub mtu: u32,
}

/// Kernel mechanism: a veth pair or an SR-IOV VF into a pod netns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelMechanism {
    /// IEEE 802.1Q tag; 0 means untagged.
    pub vlan_id: u16,
    /// PCI address of the assigned VF, when traffic rides a VF.
    pub pci_address: Option<String>,
    /// SR-IOV device token id assigned by the resource pool.
    pub device_token_id: Option<String>,
}

/// VXLAN mechanism: a tunnel to a peer forwarder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VxlanMechanism {
    /// Tunnel source address.
    pub src_ip: Option<IpAddr>,
    /// Tunnel destination address.
    pub dst_ip: Option<IpAddr>,
    /// VXLAN network identifier, consumed from the VNI collaborator.
    pub vni: u32,
}

/// VLAN mechanism: breakout onto a configured L2 egress point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VlanMechanism {
    /// IEEE 802.1Q tag for the breakout port.
    pub vlan_id: u16,
}

/// The encapsulation negotiated for one side of a cross-connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mechanism {
    /// Local attachment via veth pair or VF representor.
    Kernel(KernelMechanism),
    /// Remote attachment via a VXLAN tunnel.
    Vxlan(VxlanMechanism),
    /// Remote attachment via VLAN breakout.
    Vlan(VlanMechanism),
}

impl Mechanism {
    /// Returns the kernel variant, if this is one.
    pub fn as_kernel(&self) -> Option<&KernelMechanism> {
        match self {
            Mechanism::Kernel(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the VXLAN variant, if this is one.
    pub fn as_vxlan(&self) -> Option<&VxlanMechanism> {
        match self {
            Mechanism::Vxlan(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the VLAN variant, if this is one.
    pub fn as_vlan(&self) -> Option<&VlanMechanism> {
        match self {
            Mechanism::Vlan(m) => Some(m),
            _ => None,
        }
    }
}

/// Mechanism locality class used in preference negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MechanismClass {
    /// Both sides on this node.
    Local,
    /// Peer is on another node.
    Remote,
}

/// Mechanism kind offered in a request's preference list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MechanismKind {
    /// Kernel (veth / VF) attachment.
    Kernel,
    /// VXLAN tunnel.
    Vxlan,
    /// VLAN breakout.
    Vlan,
}

/// A mechanism this forwarder offers to the next hop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MechanismPreference {
    /// Locality class.
    pub class: MechanismClass,
    /// Mechanism kind.
    pub kind: MechanismKind,
    /// Whether the offer includes 802.1Q tagging support.
    pub supports_vlan: bool,
    /// Local tunnel endpoint advertised with remote offers.
    pub tunnel_ip: Option<IpAddr>,
}

/// One point-to-point cross-connect handled by this forwarder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connection {
    /// Opaque connection identifier.
    pub id: String,
    /// Name of the network service being connected.
    pub network_service: String,
    /// The negotiated mechanism for this side, once selected.
    pub mechanism: Option<Mechanism>,
    /// Free-form labels; the `via` label selects an L2 egress point.
    pub labels: HashMap<String, String>,
    /// Negotiated context values.
    pub context: ConnectionContext,
    /// Path of hops; first and last hop name this forwarder.
    pub path: Path,
}

impl Default for Mechanism {
    fn default() -> Self {
        Mechanism::Kernel(KernelMechanism::default())
    }
}

/// A connection request travelling through the chain.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// The connection being established or refreshed.
    pub connection: Connection,
    /// Mechanisms this forwarder offers to the next hop, appended by
    /// the client-side mechanism elements.
    pub mechanism_preferences: Vec<MechanismPreference>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segments() {
        let path = Path {
            index: 1,
            segments: vec![
                PathSegment {
                    id: "nsc-1".into(),
                    name: "nsc".into(),
                },
                PathSegment {
                    id: "fwd-1".into(),
                    name: "forwarder".into(),
                },
                PathSegment {
                    id: "nse-1".into(),
                    name: "endpoint".into(),
                },
            ],
        };
        assert_eq!(path.prev_segment().unwrap().id, "nsc-1");
        assert_eq!(path.next_segment().unwrap().id, "nse-1");

        let first = Path {
            index: 0,
            segments: path.segments.clone(),
        };
        assert!(first.prev_segment().is_none());
    }

    #[test]
    fn test_mechanism_accessors() {
        let m = Mechanism::Kernel(KernelMechanism {
            vlan_id: 100,
            ..Default::default()
        });
        assert_eq!(m.as_kernel().unwrap().vlan_id, 100);
        assert!(m.as_vxlan().is_none());
        assert!(m.as_vlan().is_none());
    }
}
