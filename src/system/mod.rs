//! System interaction modules for config files, network topology, Samba,
//! and daemon control.

pub mod daemon;
pub mod network;
pub mod samba;
pub mod textfile;

pub use daemon::{DaemonControl, Systemctl};
pub use network::{InterfaceInfo, NetworkTopology, SystemTopology};
pub use samba::{NameService, SambaConfig};
pub use textfile::TextFile;
