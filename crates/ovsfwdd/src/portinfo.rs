//! Per-connection metadata: the OVS port-info store.
//!
//! Each connection carries one metadata bag with two sides. A side's
//! port-info slot exists exactly while the forwarder has a host artifact
//! attached for that side; mechanism elements create the slot on request
//! and remove it on close.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Mutex;

/// Which side of the cross-connect a slot belongs to.
///
/// `Client` is the port facing the requesting client workload, plumbed
/// by the inbound (server) chain and created first. `Endpoint` is the
/// port facing the service endpoint or the remote forwarder, plumbed by
/// the outbound (client) chain as part of this forwarder's own request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Client-workload-facing side.
    Client,
    /// Endpoint-facing side.
    Endpoint,
}

/// Bridge attachment details for one side of a connection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OvsPortInfo {
    /// Interface name attached to the bridge.
    pub port_name: String,
    /// OpenFlow port number on the bridge.
    pub port_no: i32,
    /// The port is a VXLAN endpoint.
    pub is_tunnel_port: bool,
    /// The port is an SR-IOV VF representor.
    pub is_vf_representor: bool,
    /// 802.1Q tag; 0 means untagged.
    pub vlan_id: u16,
    /// VXLAN tunnel id, for tunnel ports.
    pub vni: u32,
    /// Paired flow rules for this side have been installed.
    pub is_cross_connected: bool,
    /// The port has been moved to an L2 egress bridge.
    pub is_l2_connect: bool,
}

/// VF assignment recorded by the resource pool for the kernel element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VfConfig {
    /// Interface name handed into the pod (or the veth peer name).
    pub vf_interface_name: String,
    /// Physical function the VF belongs to.
    pub pf_interface_name: String,
    /// VF index on the physical function.
    pub vf_num: i32,
}

/// A typed key/value map for one side of a connection.
///
/// Values are keyed by their type; callers never share keys across
/// types. Mirrors the semantics of a per-connection sync map.
#[derive(Default)]
pub struct MetadataMap {
    slots: Mutex<HashMap<TypeId, Box<dyn Any + Send>>>,
}

impl std::fmt::Debug for MetadataMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataMap")
            .field("slots", &self.slots.lock().unwrap().len())
            .finish()
    }
}

impl MetadataMap {
    /// Stores a value, replacing any previous value of the same type.
    pub fn store<T: Send + 'static>(&self, value: T) {
        self.slots
            .lock()
            .unwrap()
            .insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Loads a copy of the stored value, if present.
    pub fn load<T: Clone + Send + 'static>(&self) -> Option<T> {
        self.slots
            .lock()
            .unwrap()
            .get(&TypeId::of::<T>())
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    /// Loads the stored value or stores and returns the given one.
    pub fn load_or_store<T: Clone + Send + 'static>(&self, value: T) -> T {
        let mut slots = self.slots.lock().unwrap();
        if let Some(existing) = slots.get(&TypeId::of::<T>()).and_then(|v| v.downcast_ref::<T>()) {
            return existing.clone();
        }
        slots.insert(TypeId::of::<T>(), Box::new(value.clone()));
        value
    }

    /// Removes and returns the stored value, if present.
    pub fn load_and_delete<T: Send + 'static>(&self) -> Option<T> {
        self.slots
            .lock()
            .unwrap()
            .remove(&TypeId::of::<T>())
            .and_then(|v| v.downcast::<T>().ok())
            .map(|v| *v)
    }

    /// Removes the stored value of the given type.
    pub fn delete<T: Send + 'static>(&self) {
        self.slots.lock().unwrap().remove(&TypeId::of::<T>());
    }

    /// Mutates the stored value in place. Returns false when absent.
    pub fn update<T: Send + 'static>(&self, f: impl FnOnce(&mut T)) -> bool {
        let mut slots = self.slots.lock().unwrap();
        match slots.get_mut(&TypeId::of::<T>()).and_then(|v| v.downcast_mut::<T>()) {
            Some(value) => {
                f(value);
                true
            }
            None => false,
        }
    }
}

/// The two-sided metadata bag of one connection.
#[derive(Debug, Default)]
pub struct ConnMetadata {
    client: MetadataMap,
    endpoint: MetadataMap,
}

impl ConnMetadata {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the map for the given side.
    pub fn side(&self, side: Side) -> &MetadataMap {
        match side {
            Side::Client => &self.client,
            Side::Endpoint => &self.endpoint,
        }
    }

    /// Loads the port info of the given side.
    pub fn port_info(&self, side: Side) -> Option<OvsPortInfo> {
        self.side(side).load::<OvsPortInfo>()
    }
}
