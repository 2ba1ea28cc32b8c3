//! Validation routines for server addresses and IP ranges.
//!
//! Validators reject before anything is written; setters in the
//! configuration manager call these first and never partially persist
//! after a failure.

use std::net::Ipv4Addr;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("DNS server is invalid.")]
    DnsServerInvalid,

    #[error("WINS server is invalid.")]
    WinsServerInvalid,

    #[error("IP range is invalid: {0}")]
    IpRangeInvalid(String),

    #[error("Local and remote IP ranges overlap.")]
    RangesOverlap,
}

/// A parsed PPTP address range, e.g. `192.168.222.1-99`.
///
/// `base` is the first three octets; `start`/`end` the inclusive host span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IpRange {
    pub base: String,
    pub start: u8,
    pub end: u8,
}

impl IpRange {
    /// Parse a `a.b.c.start-end` range string.
    pub fn parse(range: &str) -> Result<Self, ValidationError> {
        let invalid = || ValidationError::IpRangeInvalid(range.to_string());

        let (prefix, span) = range.rsplit_once('.').ok_or_else(invalid)?;
        let (start, end) = span.split_once('-').ok_or_else(invalid)?;

        let start: u8 = start.parse().map_err(|_| invalid())?;
        let end: u8 = end.parse().map_err(|_| invalid())?;

        // The base must itself be three valid octets.
        let first: Ipv4Addr = format!("{prefix}.{start}").parse().map_err(|_| invalid())?;
        if prefix.split('.').count() != 3 {
            return Err(invalid());
        }

        // Host span: network (0) and broadcast (255) addresses excluded.
        if start > end || start == 0 || end == 255 {
            return Err(invalid());
        }

        if !first.is_private() {
            return Err(invalid());
        }

        Ok(Self {
            base: prefix.to_string(),
            start,
            end,
        })
    }

    /// Whether two ranges collide. Ranges on different bases never
    /// overlap; a differing base is a legal transition state while
    /// auto-configuration re-bases onto a new LAN.
    pub fn overlaps(&self, other: &IpRange) -> bool {
        self.base == other.base && self.start <= other.end && other.start <= self.end
    }
}

/// Validate a `localip`/`remoteip` range value.
pub fn validate_ip_range(range: &str) -> Result<(), ValidationError> {
    IpRange::parse(range).map(|_| ())
}

/// Validate a DNS server address. Empty clears the field and is valid.
pub fn validate_dns_server(server: &str) -> Result<(), ValidationError> {
    if server.is_empty() {
        return Ok(());
    }

    if server.parse::<Ipv4Addr>().is_err() {
        return Err(ValidationError::DnsServerInvalid);
    }

    Ok(())
}

/// Validate a WINS server address. Same rule as DNS.
pub fn validate_wins_server(server: &str) -> Result<(), ValidationError> {
    if server.is_empty() {
        return Ok(());
    }

    if server.parse::<Ipv4Addr>().is_err() {
        return Err(ValidationError::WinsServerInvalid);
    }

    Ok(())
}
