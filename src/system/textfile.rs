//! Line-oriented config file editing.
//!
//! All pptpd-related files (`pptpd.conf`, `options.pptpd`, the app settings
//! file, `smb.conf`) are flat `key value` / `key = value` tables with `#`
//! comments. This module provides the lookup/replace/delete/append
//! primitives the configuration manager builds on.
//!
//! A missing file and a missing key are both "empty value" conditions and
//! surface as `Ok(None)` / `Ok(false)`; only real I/O failures are errors.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

/// A small line-oriented text file under `/etc`.
#[derive(Debug, Clone)]
pub struct TextFile {
    path: PathBuf,
}

impl TextFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Create the file empty with the given mode, owned by root:root.
    ///
    /// Parent directories are created as needed. Ownership is only changed
    /// when running as root.
    pub fn create(&self, mode: u32) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&self.path, "")?;
        fs::set_permissions(&self.path, fs::Permissions::from_mode(mode))?;

        if unsafe { libc::geteuid() } == 0 {
            std::os::unix::fs::chown(&self.path, Some(0), Some(0))?;
        }

        let mode = format!("{mode:o}");
        debug!(path = %self.path.display(), mode = %mode, "created file");
        Ok(())
    }

    /// Remove the file. Missing is not an error.
    pub fn delete(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Append a single line at the end of the file, creating it if needed.
    pub fn add_line(&self, line: &str) -> Result<()> {
        let mut contents = self.read()?.unwrap_or_default();
        if !contents.is_empty() && !contents.ends_with('\n') {
            contents.push('\n');
        }
        contents.push_str(line);
        contents.push('\n');
        fs::write(&self.path, contents)?;
        Ok(())
    }

    /// Look up the value of the first line whose key matches `key`
    /// (case-insensitive, `key value` or `key = value` form).
    ///
    /// `Ok(None)` when the file is absent or no line matches.
    pub fn lookup_value(&self, key: &str) -> Result<Option<String>> {
        let Some(contents) = self.read()? else {
            return Ok(None);
        };

        for line in contents.lines() {
            if let Some(value) = match_key(line, key) {
                return Ok(Some(value.to_string()));
            }
        }

        Ok(None)
    }

    /// Replace the first line whose key matches `key` with `replacement`.
    ///
    /// Returns whether a line was replaced. A missing file reports no
    /// match (the caller appends, which creates the file).
    pub fn replace_lines(&self, key: &str, replacement: &str) -> Result<bool> {
        let Some(contents) = self.read()? else {
            return Ok(false);
        };

        let mut lines: Vec<&str> = contents.lines().collect();
        let Some(index) = lines.iter().position(|l| match_key(l, key).is_some()) else {
            return Ok(false);
        };

        lines[index] = replacement;
        self.write_lines(&lines)?;
        debug!(path = %self.path.display(), key, "replaced parameter line");
        Ok(true)
    }

    /// Delete every line whose key matches `key`. Returns how many were
    /// removed; a missing file removes nothing.
    pub fn delete_lines(&self, key: &str) -> Result<usize> {
        let Some(contents) = self.read()? else {
            return Ok(0);
        };

        let lines: Vec<&str> = contents.lines().collect();
        let kept: Vec<&str> = lines
            .iter()
            .copied()
            .filter(|l| match_key(l, key).is_none())
            .collect();

        let removed = lines.len() - kept.len();
        if removed > 0 {
            self.write_lines(&kept)?;
            debug!(path = %self.path.display(), key, removed, "deleted parameter lines");
        }
        Ok(removed)
    }

    /// Insert `line` directly after the first non-comment, non-blank line,
    /// keeping any leading comment/header block intact. Appends at the end
    /// when no such line exists; creates the file when absent.
    pub fn append_after_header(&self, line: &str) -> Result<()> {
        let contents = self.read()?.unwrap_or_default();
        let mut lines: Vec<&str> = contents.lines().collect();

        let insert_at = lines
            .iter()
            .position(|l| {
                let trimmed = l.trim();
                !trimmed.is_empty() && !trimmed.starts_with('#')
            })
            .map(|i| i + 1)
            .unwrap_or(lines.len());

        lines.insert(insert_at, line);
        self.write_lines(&lines)?;
        debug!(path = %self.path.display(), "appended parameter line");
        Ok(())
    }

    fn read(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_lines(&self, lines: &[&str]) -> Result<()> {
        let mut contents = lines.join("\n");
        contents.push('\n');
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

/// Match a `key value` / `key = value` line, ignoring leading whitespace
/// and key case. Returns the value portion with the separator stripped.
fn match_key<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let trimmed = line.trim_start();
    if trimmed.len() < key.len() || !trimmed.is_char_boundary(key.len()) {
        return None;
    }

    let (head, rest) = trimmed.split_at(key.len());
    if !head.eq_ignore_ascii_case(key) {
        return None;
    }

    match rest.chars().next() {
        None => Some(""),
        Some(c) if c.is_whitespace() || c == '=' => {
            let mut value = rest.trim_start();
            if let Some(stripped) = value.strip_prefix('=') {
                value = stripped.trim_start();
            }
            Some(value.trim_end())
        }
        _ => None,
    }
}
