//! SR-IOV VF representor lookup.

use std::fs;
use std::path::PathBuf;

use ovsfwd_common::{FwdError, FwdResult};

/// Resolves the host-side representor of an SR-IOV virtual function.
pub trait SriovProvider: Send + Sync {
    /// Returns the representor interface name for `(pf, vf_num)`.
    fn vf_representor(&self, pf_interface_name: &str, vf_num: i32) -> FwdResult<String>;
}

/// Sysfs-backed representor lookup.
///
/// A representor shares the physical function's `phys_switch_id` and
/// carries the VF index in its `phys_port_name` (`pf0vf3`, `vf3` or a
/// bare `3` depending on the driver).
pub struct SysfsSriov {
    root: PathBuf,
}

impl SysfsSriov {
    /// Lookup rooted at the standard `/sys/class/net`.
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/sys/class/net"),
        }
    }

    /// Lookup rooted at an alternate path.
    pub fn with_root(root: PathBuf) -> Self {
        Self { root }
    }

    fn read_attr(&self, ifname: &str, attr: &str) -> Option<String> {
        let path = self.root.join(ifname).join(attr);
        fs::read_to_string(path).ok().map(|s| s.trim().to_string())
    }
}

impl Default for SysfsSriov {
    fn default() -> Self {
        Self::new()
    }
}

/// Parses the VF index out of a `phys_port_name` value.
fn port_name_vf_num(port_name: &str) -> Option<i32> {
    if let Ok(num) = port_name.parse::<i32>() {
        return Some(num);
    }
    let tail = match port_name.find("vf") {
        Some(pos) => &port_name[pos + 2..],
        None => return None,
    };
    tail.parse::<i32>().ok()
}

impl SriovProvider for SysfsSriov {
    fn vf_representor(&self, pf_interface_name: &str, vf_num: i32) -> FwdResult<String> {
        let switch_id = self
            .read_attr(pf_interface_name, "phys_switch_id")
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                FwdError::parse(
                    "sriov",
                    format!("{pf_interface_name} has no phys_switch_id, not in switchdev mode"),
                )
            })?;

        let entries = fs::read_dir(&self.root).map_err(|e| {
            FwdError::parse("sriov", format!("cannot list {}: {e}", self.root.display()))
        })?;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name == pf_interface_name {
                continue;
            }
            if self.read_attr(&name, "phys_switch_id").as_deref() != Some(switch_id.as_str()) {
                continue;
            }
            if let Some(port_name) = self.read_attr(&name, "phys_port_name") {
                if port_name_vf_num(&port_name) == Some(vf_num) {
                    return Ok(name);
                }
            }
        }
        Err(FwdError::not_found(format!(
            "representor of {pf_interface_name} vf {vf_num}"
        )))
    }
}
