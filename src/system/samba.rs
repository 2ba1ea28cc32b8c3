//! WINS settings discovery from the Samba configuration.

use std::path::PathBuf;

use crate::error::Result;
use crate::system::textfile::TextFile;

const SMB_CONF: &str = "/etc/samba/smb.conf";

/// Naming-service settings the PPTP options depend on.
pub trait NameService {
    /// Whether WINS support is enabled (this host acts as a WINS server).
    fn wins_support(&self) -> Result<bool>;

    /// An explicitly configured external WINS server, if any.
    fn wins_server(&self) -> Result<Option<String>>;
}

/// Reads WINS state from `smb.conf`. A missing file or missing key reads
/// as "no WINS".
pub struct SambaConfig {
    file: TextFile,
}

impl SambaConfig {
    pub fn new() -> Self {
        Self::with_path(SMB_CONF)
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            file: TextFile::new(path.into()),
        }
    }
}

impl Default for SambaConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl NameService for SambaConfig {
    fn wins_support(&self) -> Result<bool> {
        Ok(self
            .file
            .lookup_value("wins support")?
            .is_some_and(|v| is_truthy(&v)))
    }

    fn wins_server(&self) -> Result<Option<String>> {
        Ok(self
            .file
            .lookup_value("wins server")?
            .filter(|v| !v.is_empty()))
    }
}

/// Samba boolean convention.
fn is_truthy(value: &str) -> bool {
    matches!(value.to_ascii_lowercase().as_str(), "yes" | "true" | "1")
}
