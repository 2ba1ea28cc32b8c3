//! Interface statistics from the kernel network device table.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;

/// Byte counters for one interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InterfaceStats {
    pub received: u64,
    pub sent: u64,
}

/// Read per-interface rx/tx byte counters from a `/proc/net/dev`-format
/// file.
pub fn read_interface_statistics(path: &Path) -> Result<BTreeMap<String, InterfaceStats>> {
    let contents = fs::read_to_string(path)?;
    Ok(parse_device_table(&contents))
}

/// Parse the kernel device table. Each interface line is
/// `name: rx_bytes rx_packets ... tx_bytes tx_packets ...`; received is
/// the first value field, sent the ninth. Header and malformed lines are
/// skipped.
fn parse_device_table(contents: &str) -> BTreeMap<String, InterfaceStats> {
    let mut stats = BTreeMap::new();

    for line in contents.lines() {
        let Some((name, values)) = line.split_once(':') else {
            continue;
        };

        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            continue;
        }

        let fields: Vec<&str> = values.split_whitespace().collect();
        if fields.len() < 9 {
            continue;
        }

        let (Ok(received), Ok(sent)) = (fields[0].parse(), fields[8].parse()) else {
            continue;
        };

        stats.insert(name.to_string(), InterfaceStats { received, sent });
    }

    stats
}
