//! Filesystem helpers.

use std::os::unix::fs::MetadataExt;
use std::path::Path;

/// Extension trait for checking file properties relevant to command lookup.
pub(crate) trait PathExt {
    /// Returns whether the path names a regular file.
    fn is_regular_file(&self) -> bool;

    /// Returns whether the current user may execute the file, testing the
    /// owner, group, or other execute bit according to which identity
    /// matches.
    fn executable(&self) -> bool;
}

impl PathExt for Path {
    fn is_regular_file(&self) -> bool {
        self.metadata().map(|m| m.file_type().is_file()).unwrap_or(false)
    }

    fn executable(&self) -> bool {
        let Ok(metadata) = self.metadata() else {
            return false;
        };

        let mode = metadata.mode();
        if metadata.uid() == nix::unistd::geteuid().as_raw() {
            mode & 0o100 != 0
        } else if metadata.gid() == nix::unistd::getegid().as_raw() {
            mode & 0o010 != 0
        } else {
            mode & 0o001 != 0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    #[test]
    fn executability_follows_permission_bits() {
        let dir = tempfile::tempdir().unwrap();

        let exec_path = dir.path().join("runnable");
        let mut f = std::fs::File::create(&exec_path).unwrap();
        f.write_all(b"#!/bin/sh\n").unwrap();
        drop(f);
        std::fs::set_permissions(&exec_path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let plain_path = dir.path().join("plain");
        std::fs::File::create(&plain_path).unwrap();
        std::fs::set_permissions(&plain_path, std::fs::Permissions::from_mode(0o644)).unwrap();

        assert!(exec_path.as_path().is_regular_file());
        assert!(exec_path.as_path().executable());
        assert!(!plain_path.as_path().executable());
        assert!(!dir.path().join("missing").as_path().executable());
    }
}
