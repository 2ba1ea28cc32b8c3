//! pptpctl - PPTP VPN server administration CLI.
//!
//! Edits pptpd's config files, auto-configures address ranges from the
//! detected network topology, and reports daemon/tunnel state. All
//! commands touch files under /etc and therefore require root.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pptpctl::Pptpd;

#[derive(Parser)]
#[clap(name = "pptpctl", version, about = "Administer a pptpd VPN server")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the persisted server settings
    Show {
        /// Print as JSON
        #[clap(long)]
        json: bool,
    },

    /// Show daemon state, active tunnels and interface statistics
    Status {
        /// Print as JSON
        #[clap(long)]
        json: bool,
    },

    /// Set the local IP range, e.g. 192.168.1.80-89
    SetLocalIp { range: String },

    /// Set the remote IP range, e.g. 192.168.1.90-99
    SetRemoteIp { range: String },

    /// Set the DNS server handed to clients ("-" clears it)
    SetDns { server: String },

    /// Set the WINS server handed to clients ("-" clears it)
    SetWins { server: String },

    /// Control auto-configure mode
    Autoconf {
        #[clap(subcommand)]
        action: AutoconfAction,
    },
}

#[derive(Subcommand)]
enum AutoconfAction {
    /// Enable auto-configure mode
    On,
    /// Disable auto-configure mode
    Off,
    /// Derive settings from the current network topology and restart pptpd
    Run,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if !is_root() {
        eprintln!("Error: this program must be run as root (sudo).");
        std::process::exit(1);
    }

    let cli = Cli::parse();
    let pptpd = Pptpd::system();

    match cli.command {
        Command::Show { json } => {
            let settings = pptpd.settings().context("Failed to read server settings")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&settings)?);
            } else {
                print_settings(&settings);
            }
        }

        Command::Status { json } => {
            let status = Status {
                running: pptpd.is_running().context("Failed to query daemon state")?,
                tunnels: pptpd.get_active_list().context("Failed to list tunnels")?,
                statistics: pptpd
                    .get_interface_statistics()
                    .context("Failed to read interface statistics")?,
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                print_status(&status);
            }
        }

        Command::SetLocalIp { range } => {
            pptpd
                .set_local_ip(&range)
                .context("Failed to set local IP range")?;
        }

        Command::SetRemoteIp { range } => {
            pptpd
                .set_remote_ip(&range)
                .context("Failed to set remote IP range")?;
        }

        Command::SetDns { server } => {
            pptpd
                .set_dns_server(clearable(&server))
                .context("Failed to set DNS server")?;
        }

        Command::SetWins { server } => {
            pptpd
                .set_wins_server(clearable(&server))
                .context("Failed to set WINS server")?;
        }

        Command::Autoconf { action } => match action {
            AutoconfAction::On => {
                pptpd
                    .set_auto_configure_state(true)
                    .context("Failed to enable auto-configure mode")?;
            }
            AutoconfAction::Off => {
                pptpd
                    .set_auto_configure_state(false)
                    .context("Failed to disable auto-configure mode")?;
            }
            AutoconfAction::Run => {
                pptpd
                    .auto_configure()
                    .context("Auto-configuration failed")?;
            }
        },
    }

    Ok(())
}

#[derive(serde::Serialize)]
struct Status {
    running: bool,
    tunnels: Vec<pptpctl::ActiveLink>,
    statistics: std::collections::BTreeMap<String, pptpctl::InterfaceStats>,
}

fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// "-" on the command line clears a field.
fn clearable(value: &str) -> &str {
    if value == "-" {
        ""
    } else {
        value
    }
}

fn print_settings(settings: &pptpctl::ServerSettings) {
    let unset = |v: &str| {
        if v.is_empty() {
            "(unset)".to_string()
        } else {
            v.to_string()
        }
    };

    println!("Local IP range:   {}", unset(&settings.local_ip_range));
    println!("Remote IP range:  {}", unset(&settings.remote_ip_range));
    println!("DNS server:       {}", unset(&settings.dns_server));
    println!("WINS server:      {}", unset(&settings.wins_server));
    println!(
        "Auto-configure:   {}",
        if settings.auto_configure { "yes" } else { "no" }
    );
}

fn print_status(status: &Status) {
    println!(
        "pptpd:            {}",
        if status.running { "running" } else { "stopped" }
    );

    if status.tunnels.is_empty() {
        println!("Active tunnels:   none");
    } else {
        println!("Active tunnels:");
        for link in &status.tunnels {
            println!("  {:<8} {}", link.name, link.address);
        }
    }

    println!("Interface statistics:");
    for (name, stats) in &status.statistics {
        println!(
            "  {:<8} received {:>12}  sent {:>12}",
            name, stats.received, stats.sent
        );
    }
}
