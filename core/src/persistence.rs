//! Persistence mounts: host directories bound into a capsule's sandbox at a
//! fixed guest path, surviving container recreation.

use std::path::Component;
use std::path::Path;
use std::path::PathBuf;

use crate::config::CapsulePaths;
use crate::error::CapsuleError;
use crate::error::Result;

/// Host directory backing the mount for `guest_path`.
///
/// `/data/cache` maps to `<persistence>/<capsule>/data/cache`; a relative
/// guest path maps unchanged.
///
/// NOTE: only the root component is stripped, so a guest path built from
/// `..` segments can still point outside the persistence root. Known
/// hardening gap.
pub fn mount_point(paths: &CapsulePaths, capsule: &str, guest_path: &str) -> PathBuf {
    let relative: PathBuf = Path::new(guest_path)
        .components()
        .filter(|component| !matches!(component, Component::RootDir))
        .collect();

    paths.persistence_root(capsule).join(relative)
}

/// The engine option recorded for a mount.
pub fn mount_option(location: &Path, guest_path: &str) -> String {
    format!("volume={}:{guest_path}:Z", location.display())
}

/// Create the mount directory owned by the sandbox UID/GID.
pub fn create_mount(paths: &CapsulePaths, location: &Path) -> Result<()> {
    std::fs::create_dir_all(location).map_err(|err| CapsuleError::io(location, err))?;
    std::os::unix::fs::chown(location, Some(paths.sandbox_uid), Some(paths.sandbox_gid))
        .map_err(|err| CapsuleError::io(location, err))
}

/// Recursively remove a mount directory (or a capsule's whole persistence
/// tree). A missing directory is success; any other failure propagates.
pub fn remove_mount(location: &Path) -> Result<()> {
    match std::fs::remove_dir_all(location) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(CapsuleError::io(location, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn paths(state_dir: &Path) -> CapsulePaths {
        CapsulePaths {
            config_dir: state_dir.join("etc"),
            state_dir: state_dir.to_path_buf(),
            polkit_rules_file: state_dir.join("rules"),
            sandbox_uid: 1000,
            sandbox_gid: 1000,
        }
    }

    #[test]
    fn absolute_guest_paths_drop_the_leading_root() {
        let paths = paths(Path::new("/var/lib/capsule"));

        let location = mount_point(&paths, "dev", "/data/cache");

        assert_eq!(
            location,
            PathBuf::from("/var/lib/capsule/persistence/dev/data/cache")
        );
    }

    #[test]
    fn relative_guest_paths_map_unchanged() {
        let paths = paths(Path::new("/var/lib/capsule"));

        let location = mount_point(&paths, "dev", "data");

        assert_eq!(
            location,
            PathBuf::from("/var/lib/capsule/persistence/dev/data")
        );
    }

    #[test]
    fn mount_options_record_both_endpoints() {
        let option = mount_option(Path::new("/var/lib/capsule/persistence/dev/data"), "/data");

        assert_eq!(
            option,
            "volume=/var/lib/capsule/persistence/dev/data:/data:Z"
        );
    }

    #[test]
    fn removing_a_missing_mount_is_success() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;

        remove_mount(&dir.path().join("never-created"))?;
        Ok(())
    }
}
