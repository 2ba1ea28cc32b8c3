//! Network topology detection for LAN-facing and tunnel interfaces.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use get_if_addrs::{get_if_addrs, IfAddr};

use crate::error::Result;

/// Information about a network interface.
#[derive(Debug, Clone)]
pub struct InterfaceInfo {
    pub name: String,
    pub live_ip: Option<Ipv4Addr>,
    /// Whether a static distribution config exists for this interface.
    pub is_configured: bool,
}

/// What the configuration manager needs to know about the local network.
///
/// "Most trusted" means LAN-facing: an interface holding a private IPv4,
/// as opposed to WAN-facing or tunnel devices.
pub trait NetworkTopology {
    /// LAN-facing networks as `"ip/netmask"` entries, e.g.
    /// `"192.168.1.1/255.255.255.0"`.
    fn most_trusted_networks(&self) -> Result<Vec<String>>;

    /// IPs of the LAN-facing interfaces.
    fn most_trusted_ips(&self) -> Result<Vec<Ipv4Addr>>;

    /// All interfaces carrying an IPv4 address.
    fn interfaces(&self) -> Result<Vec<InterfaceInfo>>;
}

/// Topology provider backed by the live system interface table.
pub struct SystemTopology {
    ifcfg_dir: PathBuf,
}

impl SystemTopology {
    pub fn new() -> Self {
        Self {
            ifcfg_dir: PathBuf::from("/etc/sysconfig/network-scripts"),
        }
    }

    fn collect(&self) -> Result<Vec<RawInterface>> {
        let mut raw = Vec::new();

        for iface in get_if_addrs()? {
            if let IfAddr::V4(ref v4) = iface.addr {
                // First IPv4 address per interface wins.
                if raw.iter().any(|r: &RawInterface| r.name == iface.name) {
                    continue;
                }
                raw.push(RawInterface {
                    name: iface.name.clone(),
                    ip: v4.ip,
                    netmask: v4.netmask,
                });
            }
        }

        Ok(raw)
    }
}

impl Default for SystemTopology {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkTopology for SystemTopology {
    fn most_trusted_networks(&self) -> Result<Vec<String>> {
        Ok(trusted(&self.collect()?)
            .map(|r| format!("{}/{}", r.ip, r.netmask))
            .collect())
    }

    fn most_trusted_ips(&self) -> Result<Vec<Ipv4Addr>> {
        Ok(trusted(&self.collect()?).map(|r| r.ip).collect())
    }

    fn interfaces(&self) -> Result<Vec<InterfaceInfo>> {
        Ok(self
            .collect()?
            .into_iter()
            .map(|r| {
                let is_configured = self.ifcfg_dir.join(format!("ifcfg-{}", r.name)).exists();
                InterfaceInfo {
                    name: r.name,
                    live_ip: Some(r.ip),
                    is_configured,
                }
            })
            .collect())
    }
}

#[derive(Debug, Clone)]
struct RawInterface {
    name: String,
    ip: Ipv4Addr,
    netmask: Ipv4Addr,
}

/// LAN-facing interfaces: private IPv4, not loopback, not a tunnel device.
fn trusted(interfaces: &[RawInterface]) -> impl Iterator<Item = &RawInterface> {
    interfaces
        .iter()
        .filter(|r| r.ip.is_private() && !r.ip.is_loopback() && !is_tunnel_name(&r.name))
}

fn is_tunnel_name(name: &str) -> bool {
    ["pptp", "ppp", "tun", "utun", "tap"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
}
