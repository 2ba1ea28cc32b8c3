//! PPTP server configuration management.
//!
//! `Pptpd` derives and persists VPN server settings: local/remote address
//! ranges in `pptpd.conf`, DNS/WINS handout in `options.pptpd`, and the
//! auto-configure flag in an app settings file. Settings have no object
//! identity of their own — every getter reads the files on demand.

use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::stats::{read_interface_statistics, InterfaceStats};
use crate::system::daemon::{DaemonControl, Systemctl};
use crate::system::network::{NetworkTopology, SystemTopology};
use crate::system::samba::{NameService, SambaConfig};
use crate::system::textfile::TextFile;
use crate::validate::{self, IpRange, ValidationError};

pub const FILE_APP_CONFIG: &str = "/etc/pptpctl/pptpd.conf";
pub const FILE_CONFIG: &str = "/etc/pptpd.conf";
pub const FILE_OPTIONS: &str = "/etc/ppp/options.pptpd";
pub const FILE_STATS: &str = "/proc/net/dev";

pub const PPTPD_UNIT: &str = "pptpd";
const DNS_UNIT: &str = "dnsmasq";

/// Fallback base when the detected LAN is not in private space; keeps the
/// VPN off a possibly public-facing network.
const SAFE_BASE: &str = "192.168.222";

/// Locations of the managed files.
#[derive(Debug, Clone)]
pub struct Paths {
    pub app_config: PathBuf,
    pub config: PathBuf,
    pub options: PathBuf,
    pub stats: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            app_config: PathBuf::from(FILE_APP_CONFIG),
            config: PathBuf::from(FILE_CONFIG),
            options: PathBuf::from(FILE_OPTIONS),
            stats: PathBuf::from(FILE_STATS),
        }
    }
}

/// Aggregated view of the persisted server settings. Empty strings mean
/// "unset".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServerSettings {
    pub local_ip_range: String,
    pub remote_ip_range: String,
    pub dns_server: String,
    pub wins_server: String,
    pub auto_configure: bool,
}

/// An active PPTP tunnel interface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveLink {
    pub name: String,
    pub address: String,
}

/// PPTP VPN server configuration manager.
pub struct Pptpd {
    app_config: TextFile,
    config: TextFile,
    options: TextFile,
    stats_path: PathBuf,
    topology: Box<dyn NetworkTopology>,
    name_service: Box<dyn NameService>,
    daemon: Box<dyn DaemonControl>,
}

impl Pptpd {
    /// Production wiring: live topology, `smb.conf`, systemctl, `/etc`
    /// paths.
    pub fn system() -> Self {
        Self::new(
            Paths::default(),
            Box::new(SystemTopology::new()),
            Box::new(SambaConfig::new()),
            Box::new(Systemctl::new(PPTPD_UNIT)),
        )
    }

    pub fn new(
        paths: Paths,
        topology: Box<dyn NetworkTopology>,
        name_service: Box<dyn NameService>,
        daemon: Box<dyn DaemonControl>,
    ) -> Self {
        Self {
            app_config: TextFile::new(paths.app_config),
            config: TextFile::new(paths.config),
            options: TextFile::new(paths.options),
            stats_path: paths.stats,
            topology,
            name_service,
            daemon,
        }
    }

    /// Derive server settings from the current network topology and
    /// restart the daemon. No-op while auto-configure mode is off.
    pub fn auto_configure(&self) -> Result<()> {
        if !self.get_auto_configure_state()? {
            debug!("auto-configure mode is off, leaving settings untouched");
            return Ok(());
        }

        // Local / remote IP configuration
        let lans = self.topology.most_trusted_networks()?;

        if let Some(lan) = lans.first() {
            let ip = lan.split_once('/').map(|(ip, _netmask)| ip).unwrap_or(lan);
            let detected_base = strip_last_octet(ip);

            let first_host: Option<Ipv4Addr> = format!("{detected_base}.1").parse().ok();
            let is_private = first_host.is_some_and(|ip| ip.is_private());

            let (base, local_range, remote_range) = if is_private {
                (detected_base, "80-89", "90-99")
            } else {
                (SAFE_BASE, "1-99", "100-199")
            };

            info!(base, local_range, remote_range, "auto-configuring IP ranges");
            self.set_local_ip(&format!("{base}.{local_range}"))?;
            self.set_remote_ip(&format!("{base}.{remote_range}"))?;
        }

        // DNS server configuration
        let ips = self.topology.most_trusted_ips()?;

        let handout_dns = !ips.is_empty() && self.daemon.is_installed(DNS_UNIT)?;
        if handout_dns {
            self.set_dns_server(&ips[0].to_string())?;
        } else {
            self.set_dns_server("")?;
        }

        // WINS server configuration: local WINS support wins over an
        // explicitly configured server, which wins over nothing.
        let is_wins = self.name_service.wins_support()?;
        let wins_server = self.name_service.wins_server()?;

        if is_wins && !ips.is_empty() {
            self.set_wins_server(&ips[0].to_string())?;
        } else if let Some(server) = wins_server {
            self.set_wins_server(&server)?;
        } else {
            self.set_wins_server("")?;
        }

        self.daemon.restart()
    }

    /// Auto-configure mode. A missing settings file or missing line reads
    /// as off.
    pub fn get_auto_configure_state(&self) -> Result<bool> {
        let Some(value) = self.app_config.lookup_value("auto_configure")? else {
            return Ok(false);
        };

        Ok(value.to_ascii_lowercase().contains("yes"))
    }

    /// Set auto-configure mode, recreating the settings file.
    pub fn set_auto_configure_state(&self, state: bool) -> Result<()> {
        let value = if state { "yes" } else { "no" };

        if self.app_config.exists() {
            self.app_config.delete()?;
        }
        self.app_config.create(0o644)?;
        self.app_config.add_line(&format!("auto_configure = {value}"))?;

        info!(state, "set auto-configure mode");
        Ok(())
    }

    pub fn get_local_ip(&self) -> Result<String> {
        self.get_config_parameter("localip")
    }

    pub fn get_remote_ip(&self) -> Result<String> {
        self.get_config_parameter("remoteip")
    }

    pub fn set_local_ip(&self, ip: &str) -> Result<()> {
        validate::validate_ip_range(ip)?;
        self.check_overlap(ip, &self.get_remote_ip()?)?;
        self.set_config_parameter("localip", ip)
    }

    pub fn set_remote_ip(&self, ip: &str) -> Result<()> {
        validate::validate_ip_range(ip)?;
        self.check_overlap(ip, &self.get_local_ip()?)?;
        self.set_config_parameter("remoteip", ip)
    }

    pub fn get_dns_server(&self) -> Result<String> {
        self.get_options_parameter("ms-dns")
    }

    pub fn get_wins_server(&self) -> Result<String> {
        self.get_options_parameter("ms-wins")
    }

    pub fn set_dns_server(&self, server: &str) -> Result<()> {
        validate::validate_dns_server(server)?;
        self.set_options_parameter("ms-dns", server)
    }

    pub fn set_wins_server(&self, server: &str) -> Result<()> {
        validate::validate_wins_server(server)?;
        self.set_options_parameter("ms-wins", server)
    }

    /// Per-interface rx/tx byte counters from the kernel device table.
    pub fn get_interface_statistics(&self) -> Result<BTreeMap<String, InterfaceStats>> {
        read_interface_statistics(&self.stats_path)
    }

    /// Live `pptp<n>` tunnel interfaces. Statically configured interfaces
    /// are excluded regardless of their address.
    pub fn get_active_list(&self) -> Result<Vec<ActiveLink>> {
        let mut links = Vec::new();

        for iface in self.topology.interfaces()? {
            if !is_pptp_name(&iface.name) {
                continue;
            }
            if iface.is_configured {
                continue;
            }

            links.push(ActiveLink {
                address: iface.live_ip.map(|ip| ip.to_string()).unwrap_or_default(),
                name: iface.name,
            });
        }

        Ok(links)
    }

    /// The aggregated settings view, read from the files on demand.
    pub fn settings(&self) -> Result<ServerSettings> {
        Ok(ServerSettings {
            local_ip_range: self.get_local_ip()?,
            remote_ip_range: self.get_remote_ip()?,
            dns_server: self.get_dns_server()?,
            wins_server: self.get_wins_server()?,
            auto_configure: self.get_auto_configure_state()?,
        })
    }

    /// Whether the managed daemon is currently running.
    pub fn is_running(&self) -> Result<bool> {
        self.daemon.is_running()
    }

    /// Reject a new range that collides with the persisted opposite range.
    /// Only same-base ranges can collide; a differing base is a legal
    /// transition state while re-basing onto a new LAN.
    fn check_overlap(&self, new_range: &str, other: &str) -> Result<()> {
        if other.is_empty() {
            return Ok(());
        }

        let new_range = IpRange::parse(new_range)?;
        if let Ok(other) = IpRange::parse(other) {
            if new_range.overlaps(&other) {
                return Err(ValidationError::RangesOverlap.into());
            }
        }

        Ok(())
    }

    fn get_config_parameter(&self, key: &str) -> Result<String> {
        Ok(self.config.lookup_value(key)?.unwrap_or_default())
    }

    fn get_options_parameter(&self, key: &str) -> Result<String> {
        Ok(self.options.lookup_value(key)?.unwrap_or_default())
    }

    fn set_config_parameter(&self, key: &str, value: &str) -> Result<()> {
        set_parameter(&self.config, key, value)
    }

    /// Options-file parameters support clearing: an empty value removes
    /// all lines for the key.
    fn set_options_parameter(&self, key: &str, value: &str) -> Result<()> {
        if value.is_empty() {
            self.options.delete_lines(key)?;
            return Ok(());
        }

        set_parameter(&self.options, key, value)
    }
}

/// Idempotent `key value` write: replace the first matching line in
/// place, or insert after the leading comment block when the key is new.
fn set_parameter(file: &TextFile, key: &str, value: &str) -> Result<()> {
    let line = format!("{key} {value}");

    if !file.replace_lines(key, &line)? {
        file.append_after_header(&line)?;
    }

    Ok(())
}

fn strip_last_octet(ip: &str) -> &str {
    ip.rsplit_once('.').map(|(base, _)| base).unwrap_or(ip)
}

fn is_pptp_name(name: &str) -> bool {
    name.strip_prefix("pptp")
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::network::InterfaceInfo;
    use std::cell::Cell;
    use std::fs;
    use std::rc::Rc;

    struct FakeTopology {
        networks: Vec<String>,
        ips: Vec<Ipv4Addr>,
        interfaces: Vec<InterfaceInfo>,
    }

    impl FakeTopology {
        fn lan(ip: &str, netmask: &str) -> Self {
            Self {
                networks: vec![format!("{ip}/{netmask}")],
                ips: vec![ip.parse().unwrap()],
                interfaces: Vec::new(),
            }
        }

        fn empty() -> Self {
            Self {
                networks: Vec::new(),
                ips: Vec::new(),
                interfaces: Vec::new(),
            }
        }
    }

    impl NetworkTopology for FakeTopology {
        fn most_trusted_networks(&self) -> Result<Vec<String>> {
            Ok(self.networks.clone())
        }

        fn most_trusted_ips(&self) -> Result<Vec<Ipv4Addr>> {
            Ok(self.ips.clone())
        }

        fn interfaces(&self) -> Result<Vec<InterfaceInfo>> {
            Ok(self.interfaces.clone())
        }
    }

    struct FakeNameService {
        support: bool,
        server: Option<String>,
    }

    impl NameService for FakeNameService {
        fn wins_support(&self) -> Result<bool> {
            Ok(self.support)
        }

        fn wins_server(&self) -> Result<Option<String>> {
            Ok(self.server.clone())
        }
    }

    struct FakeDaemon {
        restarts: Rc<Cell<u32>>,
        dns_installed: bool,
    }

    impl DaemonControl for FakeDaemon {
        fn restart(&self) -> Result<()> {
            self.restarts.set(self.restarts.get() + 1);
            Ok(())
        }

        fn is_running(&self) -> Result<bool> {
            Ok(true)
        }

        fn is_installed(&self, _unit: &str) -> Result<bool> {
            Ok(self.dns_installed)
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        pptpd: Pptpd,
        restarts: Rc<Cell<u32>>,
        paths: Paths,
    }

    fn fixture(
        topology: FakeTopology,
        name_service: FakeNameService,
        dns_installed: bool,
    ) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let paths = Paths {
            app_config: dir.path().join("app").join("pptpd.conf"),
            config: dir.path().join("pptpd.conf"),
            options: dir.path().join("options.pptpd"),
            stats: dir.path().join("net-dev"),
        };

        let restarts = Rc::new(Cell::new(0));
        let daemon = FakeDaemon {
            restarts: Rc::clone(&restarts),
            dns_installed,
        };

        let pptpd = Pptpd::new(
            paths.clone(),
            Box::new(topology),
            Box::new(name_service),
            Box::new(daemon),
        );

        Fixture {
            _dir: dir,
            pptpd,
            restarts,
            paths,
        }
    }

    fn no_wins() -> FakeNameService {
        FakeNameService {
            support: false,
            server: None,
        }
    }

    #[test]
    fn test_auto_configure_off_is_noop() {
        let fx = fixture(FakeTopology::lan("192.168.1.1", "255.255.255.0"), no_wins(), true);

        fx.pptpd.auto_configure().unwrap();

        assert!(!fx.paths.config.exists());
        assert!(!fx.paths.options.exists());
        assert_eq!(fx.restarts.get(), 0);
    }

    #[test]
    fn test_auto_configure_private_lan() {
        let fx = fixture(FakeTopology::lan("192.168.1.1", "255.255.255.0"), no_wins(), true);
        fx.pptpd.set_auto_configure_state(true).unwrap();

        fx.pptpd.auto_configure().unwrap();

        assert_eq!(fx.pptpd.get_local_ip().unwrap(), "192.168.1.80-89");
        assert_eq!(fx.pptpd.get_remote_ip().unwrap(), "192.168.1.90-99");
        assert_eq!(fx.pptpd.get_dns_server().unwrap(), "192.168.1.1");
        assert_eq!(fx.pptpd.get_wins_server().unwrap(), "");
        assert_eq!(fx.restarts.get(), 1);
    }

    #[test]
    fn test_auto_configure_public_lan_falls_back_to_safe_base() {
        let fx = fixture(FakeTopology::lan("203.0.113.7", "255.255.255.0"), no_wins(), false);
        fx.pptpd.set_auto_configure_state(true).unwrap();

        fx.pptpd.auto_configure().unwrap();

        assert_eq!(fx.pptpd.get_local_ip().unwrap(), "192.168.222.1-99");
        assert_eq!(fx.pptpd.get_remote_ip().unwrap(), "192.168.222.100-199");
        // Public LAN IP, dnsmasq absent: no DNS handout.
        assert_eq!(fx.pptpd.get_dns_server().unwrap(), "");
    }

    #[test]
    fn test_auto_configure_without_trusted_network() {
        let fx = fixture(FakeTopology::empty(), no_wins(), true);
        fx.pptpd.set_auto_configure_state(true).unwrap();
        fx.pptpd.set_dns_server("10.0.0.53").unwrap();

        fx.pptpd.auto_configure().unwrap();

        // Ranges untouched, DNS cleared (no trusted IP), daemon restarted.
        assert_eq!(fx.pptpd.get_local_ip().unwrap(), "");
        assert_eq!(fx.pptpd.get_dns_server().unwrap(), "");
        assert_eq!(fx.restarts.get(), 1);
    }

    #[test]
    fn test_auto_configure_skips_dns_without_local_dns_service() {
        let fx = fixture(FakeTopology::lan("192.168.1.1", "255.255.255.0"), no_wins(), false);
        fx.pptpd.set_auto_configure_state(true).unwrap();

        fx.pptpd.auto_configure().unwrap();

        assert_eq!(fx.pptpd.get_dns_server().unwrap(), "");
    }

    #[test]
    fn test_wins_priority_local_support_wins() {
        let name_service = FakeNameService {
            support: true,
            server: Some("10.9.9.9".to_string()),
        };
        let fx = fixture(FakeTopology::lan("192.168.1.1", "255.255.255.0"), name_service, false);
        fx.pptpd.set_auto_configure_state(true).unwrap();

        fx.pptpd.auto_configure().unwrap();

        assert_eq!(fx.pptpd.get_wins_server().unwrap(), "192.168.1.1");
    }

    #[test]
    fn test_wins_priority_explicit_server() {
        let name_service = FakeNameService {
            support: false,
            server: Some("10.9.9.9".to_string()),
        };
        let fx = fixture(FakeTopology::lan("192.168.1.1", "255.255.255.0"), name_service, false);
        fx.pptpd.set_auto_configure_state(true).unwrap();

        fx.pptpd.auto_configure().unwrap();

        assert_eq!(fx.pptpd.get_wins_server().unwrap(), "10.9.9.9");
    }

    #[test]
    fn test_wins_priority_clears_when_unconfigured() {
        let fx = fixture(FakeTopology::lan("192.168.1.1", "255.255.255.0"), no_wins(), false);
        fx.pptpd.set_auto_configure_state(true).unwrap();
        fx.pptpd.set_wins_server("10.9.9.9").unwrap();

        fx.pptpd.auto_configure().unwrap();

        assert_eq!(fx.pptpd.get_wins_server().unwrap(), "");
    }

    #[test]
    fn test_auto_configure_state_round_trip() {
        let fx = fixture(FakeTopology::empty(), no_wins(), false);

        // Missing file and missing line both read as off.
        assert!(!fx.pptpd.get_auto_configure_state().unwrap());
        fs::create_dir_all(fx.paths.app_config.parent().unwrap()).unwrap();
        fs::write(&fx.paths.app_config, "# settings\n").unwrap();
        assert!(!fx.pptpd.get_auto_configure_state().unwrap());

        fx.pptpd.set_auto_configure_state(true).unwrap();
        assert!(fx.pptpd.get_auto_configure_state().unwrap());

        fx.pptpd.set_auto_configure_state(false).unwrap();
        assert!(!fx.pptpd.get_auto_configure_state().unwrap());
    }

    #[test]
    fn test_set_parameter_is_idempotent() {
        let fx = fixture(FakeTopology::empty(), no_wins(), false);
        fs::write(&fx.paths.config, "# pptpd.conf\noption /etc/ppp/options.pptpd\n").unwrap();

        fx.pptpd.set_local_ip("192.168.1.80-89").unwrap();
        fx.pptpd.set_local_ip("192.168.2.80-89").unwrap();

        let contents = fs::read_to_string(&fx.paths.config).unwrap();
        let matches: Vec<&str> = contents.lines().filter(|l| l.starts_with("localip")).collect();
        assert_eq!(matches, vec!["localip 192.168.2.80-89"]);
        // Header block untouched.
        assert!(contents.starts_with("# pptpd.conf\noption /etc/ppp/options.pptpd\n"));
    }

    #[test]
    fn test_setter_creates_missing_file() {
        let fx = fixture(FakeTopology::empty(), no_wins(), false);

        fx.pptpd.set_local_ip("192.168.1.80-89").unwrap();

        let contents = fs::read_to_string(&fx.paths.config).unwrap();
        assert_eq!(contents, "localip 192.168.1.80-89\n");
    }

    #[test]
    fn test_clearing_options_parameter_removes_lines() {
        let fx = fixture(FakeTopology::empty(), no_wins(), false);
        fs::write(&fx.paths.options, "name pptp-vpn\nms-dns 10.0.0.1\nms-dns 10.0.0.2\n").unwrap();

        fx.pptpd.set_dns_server("").unwrap();

        assert_eq!(fx.pptpd.get_dns_server().unwrap(), "");
        let contents = fs::read_to_string(&fx.paths.options).unwrap();
        assert_eq!(contents, "name pptp-vpn\n");
    }

    #[test]
    fn test_invalid_dns_server_rejected_before_write() {
        let fx = fixture(FakeTopology::empty(), no_wins(), false);

        let err = fx.pptpd.set_dns_server("999.1.1.1").unwrap_err();
        assert!(matches!(
            err,
            crate::error::PptpctlError::Validation(ValidationError::DnsServerInvalid)
        ));
        assert!(!fx.paths.options.exists());
    }

    #[test]
    fn test_overlapping_ranges_rejected() {
        let fx = fixture(FakeTopology::empty(), no_wins(), false);

        fx.pptpd.set_local_ip("192.168.1.80-89").unwrap();
        let err = fx.pptpd.set_remote_ip("192.168.1.85-95").unwrap_err();
        assert!(matches!(
            err,
            crate::error::PptpctlError::Validation(ValidationError::RangesOverlap)
        ));

        // Disjoint and different-base ranges are fine.
        fx.pptpd.set_remote_ip("192.168.1.90-99").unwrap();
        fx.pptpd.set_remote_ip("10.0.0.90-99").unwrap();
    }

    #[test]
    fn test_active_list_filters_interfaces() {
        let interfaces = vec![
            InterfaceInfo {
                name: "eth0".to_string(),
                live_ip: Some("192.168.1.1".parse().unwrap()),
                is_configured: true,
            },
            InterfaceInfo {
                name: "pptp0".to_string(),
                live_ip: Some("192.168.1.90".parse().unwrap()),
                is_configured: false,
            },
            InterfaceInfo {
                name: "pptp1".to_string(),
                live_ip: Some("192.168.1.91".parse().unwrap()),
                is_configured: true,
            },
            InterfaceInfo {
                name: "pptpx".to_string(),
                live_ip: Some("192.168.1.92".parse().unwrap()),
                is_configured: false,
            },
        ];
        let topology = FakeTopology {
            networks: Vec::new(),
            ips: Vec::new(),
            interfaces,
        };
        let fx = fixture(topology, no_wins(), false);

        let active = fx.pptpd.get_active_list().unwrap();
        assert_eq!(
            active,
            vec![ActiveLink {
                name: "pptp0".to_string(),
                address: "192.168.1.90".to_string(),
            }]
        );
    }

    #[test]
    fn test_interface_statistics_from_file() {
        let fx = fixture(FakeTopology::empty(), no_wins(), false);
        fs::write(
            &fx.paths.stats,
            "eth0: 100 2 0 0 0 0 0 0 5000 10 0 0 0 0 0 0\n",
        )
        .unwrap();

        let stats = fx.pptpd.get_interface_statistics().unwrap();
        assert_eq!(stats["eth0"].received, 100);
        assert_eq!(stats["eth0"].sent, 5000);
    }

    #[test]
    fn test_settings_view_matches_getters() {
        let fx = fixture(FakeTopology::empty(), no_wins(), false);
        fx.pptpd.set_auto_configure_state(true).unwrap();
        fx.pptpd.set_local_ip("192.168.1.80-89").unwrap();
        fx.pptpd.set_remote_ip("192.168.1.90-99").unwrap();
        fx.pptpd.set_dns_server("192.168.1.1").unwrap();

        let settings = fx.pptpd.settings().unwrap();
        assert_eq!(
            settings,
            ServerSettings {
                local_ip_range: "192.168.1.80-89".to_string(),
                remote_ip_range: "192.168.1.90-99".to_string(),
                dns_server: "192.168.1.1".to_string(),
                wins_server: String::new(),
                auto_configure: true,
            }
        );
    }

    #[test]
    fn test_is_pptp_name() {
        assert!(is_pptp_name("pptp0"));
        assert!(is_pptp_name("pptp12"));
        assert!(!is_pptp_name("pptp"));
        assert!(!is_pptp_name("pptpx"));
        assert!(!is_pptp_name("eth0"));
    }
}
