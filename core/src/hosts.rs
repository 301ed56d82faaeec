//! Persisted list of scan targets, one hostname per line.

use std::fs;
use std::io;
use std::path::Path;
use thiserror::Error;

/// Errors from host list mutations and persistence.
#[derive(Debug, Error)]
pub enum HostsError {
    #[error("host already in the list: {0}")]
    AlreadyExists(String),
    #[error("host not in the list: {0}")]
    NotExists(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// List of hosts to scan. Entries are unique (case-sensitive exact match);
/// mutations keep the backing vector sorted, a bulk [`HostsList::load`]
/// keeps file order.
#[derive(Debug, Default, Clone)]
pub struct HostsList {
    hosts: Vec<String>,
}

impl HostsList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hosts in their current in-memory order.
    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    // Binary search over the sorted vector. Indexes are not stable across
    // mutations.
    fn search(&self, host: &str) -> Result<usize, usize> {
        self.hosts.binary_search_by(|h| h.as_str().cmp(host))
    }

    /// Add a host to the list. Fails if the host is already present.
    pub fn add(&mut self, host: &str) -> Result<(), HostsError> {
        // Loaded entries may be in file order; mutations restore the sorted
        // invariant before the existence check.
        self.hosts.sort_unstable();
        match self.search(host) {
            Ok(_) => Err(HostsError::AlreadyExists(host.to_string())),
            Err(pos) => {
                self.hosts.insert(pos, host.to_string());
                Ok(())
            }
        }
    }

    /// Remove a host from the list. Fails if the host is not present.
    pub fn remove(&mut self, host: &str) -> Result<(), HostsError> {
        self.hosts.sort_unstable();
        match self.search(host) {
            Ok(pos) => {
                self.hosts.remove(pos);
                Ok(())
            }
            Err(_) => Err(HostsError::NotExists(host.to_string())),
        }
    }

    /// Load hosts from a file, one per line, appended verbatim: no
    /// trimming beyond line endings, no dedup, no validation. A missing
    /// file is not an error and leaves the list unchanged.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<(), HostsError> {
        let contents = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e.into()),
        };
        self.hosts.extend(contents.lines().map(str::to_string));
        Ok(())
    }

    /// Save all hosts to a file, one per line, LF-terminated, overwriting
    /// any previous contents.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), HostsError> {
        let mut output = String::new();
        for h in &self.hosts {
            output.push_str(h);
            output.push('\n');
        }
        fs::write(path, output)?;
        Ok(())
    }
}
