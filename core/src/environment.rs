use crate::error::SnapshotError;
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fs;
use std::io::ErrorKind;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

/// Environment handed to every child process the bootstrap starts.
///
/// Captured once from the process environment and only changed by the
/// bootstrap itself (for example when `DISPLAY` is exported), so the
/// diagnostics, the snapshot and the children all see the same set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Environment {
    vars: BTreeMap<OsString, OsString>,
}

impl Environment {
    pub fn capture() -> Self {
        Self::from_vars(std::env::vars_os())
    }

    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        Self {
            vars: vars
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&OsStr> {
        self.vars.get(OsStr::new(key)).map(OsString::as_os_str)
    }

    pub fn set(&mut self, key: impl Into<OsString>, value: impl Into<OsString>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OsStr, &OsStr)> {
        self.vars.iter().map(|(k, v)| (k.as_os_str(), v.as_os_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// `KEY=VALUE` lines sorted bytewise by the whole line.
    ///
    /// Sorting the joined line rather than the key matters for keys that
    /// share a prefix: `A-B=..` sorts before `A=..`.
    pub fn sorted_lines(&self) -> Vec<Vec<u8>> {
        let mut lines: Vec<Vec<u8>> = self
            .iter()
            .map(|(k, v)| {
                let mut line = Vec::with_capacity(k.len() + v.len() + 1);
                line.extend_from_slice(k.as_bytes());
                line.push(b'=');
                line.extend_from_slice(v.as_bytes());
                line
            })
            .collect();
        lines.sort();
        lines
    }

    /// The sorted lines joined with newlines, values kept byte for byte.
    pub fn render(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for line in self.sorted_lines() {
            out.extend_from_slice(&line);
            out.push(b'\n');
        }
        out
    }
}

/// Point-in-time dump of an [`Environment`] at a fixed path.
#[derive(Debug, Clone)]
pub struct EnvSnapshot {
    path: PathBuf,
}

impl EnvSnapshot {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the snapshot file with a fresh dump of `env`.
    ///
    /// The previous file is removed first; a missing file is not an error.
    /// Restricting the file to owner read/write is best-effort and only logged
    /// when it fails.
    pub fn write(&self, env: &Environment) -> Result<(), SnapshotError> {
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed previous snapshot {:?}", self.path),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                return Err(SnapshotError::Remove {
                    path: self.path.clone(),
                    source,
                });
            }
        }

        fs::write(&self.path, env.render()).map_err(|source| SnapshotError::Write {
            path: self.path.clone(),
            source,
        })?;

        if let Err(e) = restrict_to_owner(&self.path) {
            tracing::warn!("Could not restrict permissions on {:?}: {}", self.path, e);
        }

        Ok(())
    }
}

fn restrict_to_owner(path: &Path) -> std::io::Result<()> {
    // rw------- = 0o600
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms)
}
