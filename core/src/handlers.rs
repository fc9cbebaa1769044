//! Privileged-side action handlers.
//!
//! These run after the elevation broker has re-invoked the program with
//! elevated rights. The broker's argv is the only input, and nothing about
//! it is taken on faith: each handler checks names and preconditions itself
//! before touching any state.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tracing::info;

use crate::capsule::CapsuleDoc;
use crate::capsule::DefaultsDoc;
use crate::capsule::TrustDoc;
use crate::capsule::apply_option_edits;
use crate::config::CapsulePaths;
use crate::config::PROGRAM_PATH;
use crate::engine;
use crate::error::CapsuleError;
use crate::error::Result;
use crate::name;
use crate::persistence;
use crate::policy;
use crate::store;

/// Create a capsule: pull the image first (fail fast if it is unavailable),
/// seed the option set from the host-wide defaults document, and refuse to
/// overwrite an existing capsule.
pub fn create(paths: &CapsulePaths, name: &str, image: &str) -> Result<()> {
    name::verify_capsule_name(name)?;
    engine::pull_image(image)?;
    init_capsule(paths, name, image)
}

/// The storage half of [`create`], separated from the image pull.
pub(crate) fn init_capsule(paths: &CapsulePaths, name: &str, image: &str) -> Result<()> {
    let defaults = match store::read_json::<DefaultsDoc>(&paths.defaults_file()) {
        Ok(doc) => doc.options,
        Err(CapsuleError::NotFound { .. }) => Vec::new(),
        Err(err) => return Err(err),
    };

    let target = paths.capsule_file(name);
    if target.exists() {
        return Err(CapsuleError::CapsuleExists {
            name: name.to_string(),
        });
    }

    info!("creating capsule `{name}` from `{image}`");
    let document = CapsuleDoc {
        image: image.to_string(),
        options: defaults.into_iter().collect(),
    };
    store::write_json(&target, &document)
}

/// Delete a capsule's document and its entire persistence tree.
pub fn delete(paths: &CapsulePaths, name: &str) -> Result<()> {
    name::verify_capsule_name(name)?;

    let target = paths.capsule_file(name);
    if !target.exists() {
        return Err(CapsuleError::CapsuleNotFound {
            name: name.to_string(),
        });
    }

    info!("deleting capsule `{name}`");
    std::fs::remove_file(&target).map_err(|err| CapsuleError::io(&target, err))?;
    persistence::remove_mount(&paths.persistence_root(name))
}

/// Apply set edits to a capsule's option set and atomically rewrite its
/// document.
pub fn modify_options(path: &Path, adds: &[String], removes: &[String]) -> Result<()> {
    let mut document: CapsuleDoc = store::read_json(path)?;

    apply_option_edits(&mut document.options, adds, removes);

    info!("rewriting options of `{}`", path.display());
    store::write_json(path, &document)
}

/// Add and remove persistence mounts.
///
/// Each added guest path gets a host directory under the persistence root,
/// owned by the sandbox UID/GID; each removed one has its directory deleted.
/// The capsule document itself is updated by handing the synthesized mount
/// strings to [`modify_options`], so persisted mounts live in the option set
/// like any other engine option.
pub fn modify_persistence(
    paths: &CapsulePaths,
    path: &Path,
    adds: &[String],
    removes: &[String],
) -> Result<()> {
    if !path.exists() {
        return Err(CapsuleError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let capsule = name::capsule_name_of(path)?;

    let mut option_adds = Vec::new();
    let mut option_removes = Vec::new();

    for guest in adds {
        let location = persistence::mount_point(paths, &capsule, guest);
        option_adds.push(persistence::mount_option(&location, guest));
        persistence::create_mount(paths, &location)?;
    }

    for guest in removes {
        let location = persistence::mount_point(paths, &capsule, guest);
        option_removes.push(persistence::mount_option(&location, guest));
        persistence::remove_mount(&location)?;
    }

    modify_options(path, &option_adds, &option_removes)
}

/// Write the export shim for `(capsule, command)` into the shared bin
/// directory, named after the command's basename. Regenerated wholesale on
/// every export.
pub fn export(paths: &CapsulePaths, capsule: &str, prefix: &str, command: &str) -> Result<()> {
    name::verify_capsule_name(capsule)?;

    let basename = Path::new(command)
        .file_name()
        .and_then(|base| base.to_str())
        .ok_or_else(|| CapsuleError::InvalidCommand {
            command: command.to_string(),
        })?;

    let bin_dir = paths.exports_bin_dir();
    std::fs::create_dir_all(&bin_dir).map_err(|err| CapsuleError::io(&bin_dir, err))?;

    let shim = bin_dir.join(basename);
    let contents = format!("#!{PROGRAM_PATH} run-exported-internal:{prefix}{capsule}\n{command}\n");

    info!("exporting `{command}` from capsule `{capsule}`");
    std::fs::write(&shim, contents).map_err(|err| CapsuleError::io(&shim, err))?;
    std::fs::set_permissions(&shim, std::fs::Permissions::from_mode(0o755))
        .map_err(|err| CapsuleError::io(&shim, err))
}

/// Add a name to the trust list and recompile the policy pair.
pub fn trust(paths: &CapsulePaths, name: &str) -> Result<()> {
    name::verify_capsule_name(name)?;

    let mut trusted = load_trusted(paths)?;
    trusted.insert(name.to_string());

    info!("trusting capsule `{name}`");
    policy::install(paths, &trusted)
}

/// Remove a name from the trust list and recompile the policy pair.
/// Untrusting a name that was never trusted fails before anything is
/// written.
pub fn untrust(paths: &CapsulePaths, name: &str) -> Result<()> {
    name::verify_capsule_name(name)?;

    let mut trusted = load_trusted(paths)?;
    if !trusted.remove(name) {
        return Err(CapsuleError::NotTrusted {
            name: name.to_string(),
        });
    }

    info!("untrusting capsule `{name}`");
    policy::install(paths, &trusted)
}

fn load_trusted(paths: &CapsulePaths) -> Result<BTreeSet<String>> {
    match store::read_json::<TrustDoc>(&paths.trust_list_file()) {
        Ok(document) => Ok(document.trusted),
        Err(CapsuleError::NotFound { .. }) => Ok(BTreeSet::new()),
        Err(err) => Err(err),
    }
}

/// Run `command` in a capsule. Terminal action: on success the process image
/// is replaced by the container engine and this never returns; the only
/// return value is the launch failure.
pub fn run(
    paths: &CapsulePaths,
    capsule: &str,
    cwd: &str,
    command: &str,
    start_dir: &Path,
) -> Result<Infallible> {
    let path = name::capsule_path(paths, capsule, start_dir)?;
    if !path.exists() {
        return Err(CapsuleError::CapsuleNotFound {
            name: capsule.to_string(),
        });
    }

    let document: CapsuleDoc = store::read_json(&path)?;

    info!("running `{command}` in capsule `{capsule}`");
    Err(engine::exec_run(paths, &document, cwd, command))
}
