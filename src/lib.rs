//! pptpctl - PPTP VPN server administration.
//!
//! Edits the pptpd daemon's line-oriented config files (`pptpd.conf`,
//! `options.pptpd`, an app settings file) and derives non-conflicting
//! address ranges, DNS, and WINS settings from the detected network
//! topology. The daemon itself is an external collaborator reached
//! through systemctl.

pub mod error;
pub mod pptpd;
pub mod stats;
pub mod system;
pub mod validate;

pub use error::{PptpctlError, Result};
pub use pptpd::{ActiveLink, Paths, Pptpd, ServerSettings};
pub use stats::InterfaceStats;
pub use validate::{
    validate_dns_server, validate_ip_range, validate_wins_server, IpRange, ValidationError,
};
