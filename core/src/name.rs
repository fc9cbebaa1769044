//! Capsule identity: name validation and name <-> path resolution.
//!
//! Validation runs on both sides of the privilege boundary. The privileged
//! handlers never assume the unprivileged front end already checked a name.

use std::path::Path;
use std::path::PathBuf;

use crate::config::CapsulePaths;
use crate::error::CapsuleError;
use crate::error::Result;

/// Character class a capsule name must match, verbatim as it is embedded in
/// the generated polkit rules script.
pub const CAPSULE_NAME_PATTERN: &str = "[0-9a-zA-Z_.-]+";

/// Directory-scoped link marker: `./.capsule/default.json` is a symlink to
/// the linked capsule's canonical document.
const LINK_DIR: &str = ".capsule";
const LINK_FILE: &str = "default.json";

pub fn is_valid_capsule_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

pub fn verify_capsule_name(name: &str) -> Result<()> {
    if is_valid_capsule_name(name) {
        Ok(())
    } else {
        Err(CapsuleError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// Map a name token to the canonical on-disk document path.
///
/// The `.` token resolves through the nearest link marker at or above
/// `start_dir`. Without a marker it falls through to the global derivation
/// like any other name (and then fails any existence check downstream).
pub fn capsule_path(paths: &CapsulePaths, name: &str, start_dir: &Path) -> Result<PathBuf> {
    verify_capsule_name(name)?;

    if name == "."
        && let Some(marker) = find_link_marker(start_dir)
    {
        return Ok(marker);
    }

    Ok(paths.capsule_file(name))
}

/// The inverse mapping: the canonical name of an existing capsule, derived
/// from its document path. Commands invoked through a link marker resolve
/// the real name here before anything crosses the privilege boundary.
pub fn resolve_capsule_name(paths: &CapsulePaths, name: &str, start_dir: &Path) -> Result<String> {
    let path = capsule_path(paths, name, start_dir)?;
    if !path.exists() {
        return Err(CapsuleError::CapsuleNotFound {
            name: name.to_string(),
        });
    }

    capsule_name_of(&path)
}

/// File stem of a capsule document path (`…/foo.json` -> `foo`).
pub fn capsule_name_of(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| CapsuleError::InvalidName {
            name: path.display().to_string(),
        })
}

/// Install the link marker in `dir`, aliasing the capsule document at
/// `target`. An existing marker is replaced.
pub fn install_link(target: &Path, dir: &Path) -> Result<()> {
    let link_dir = dir.join(LINK_DIR);
    std::fs::create_dir_all(&link_dir).map_err(|err| CapsuleError::io(&link_dir, err))?;

    let link = link_dir.join(LINK_FILE);
    match std::fs::remove_file(&link) {
        Ok(()) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => return Err(CapsuleError::io(&link, err)),
    }

    std::os::unix::fs::symlink(target, &link).map_err(|err| CapsuleError::io(&link, err))
}

fn find_link_marker(start_dir: &Path) -> Option<PathBuf> {
    start_dir.ancestors().find_map(|dir| {
        let marker = dir.join(LINK_DIR).join(LINK_FILE);
        // Follow the symlink so the name can be recovered from the target.
        marker
            .exists()
            .then(|| marker.canonicalize().unwrap_or(marker))
    })
}
