//! Container engine boundary.
//!
//! The engine is consumed at two points: `pull` as an ordinary delegated
//! child process, and `run` as a terminal process-image replacement.

use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::Command;

use crate::capsule::CapsuleDoc;
use crate::config::CapsulePaths;
use crate::error::CapsuleError;
use crate::error::Result;

pub const ENGINE: &str = "podman";

/// Account created inside the sandbox for the requested command.
const SANDBOX_USER: &str = "capsule";

/// Fetch an image. A non-zero engine exit propagates as this process's exit
/// status; the engine already reported the failure itself.
pub fn pull_image(image: &str) -> Result<()> {
    let status = Command::new(ENGINE)
        .args(["pull", image])
        .status()
        .map_err(|err| CapsuleError::Spawn {
            program: ENGINE.to_string(),
            source: err,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(CapsuleError::Delegated {
            program: ENGINE.to_string(),
            status: status.code().unwrap_or(1),
        })
    }
}

/// Replace the current process image with the engine invocation for `doc`.
///
/// A non-empty `cwd` is bound into the sandbox under `/var/work` and becomes
/// the sandbox working directory. The entrypoint creates the fixed
/// unprivileged account, drops to it preserving the caller's `PATH`, and
/// executes `command` under a shell, so nothing runs as the image's default
/// (usually root) identity.
///
/// Returns only when the exec itself fails.
pub fn exec_run(paths: &CapsulePaths, doc: &CapsuleDoc, cwd: &str, command: &str) -> CapsuleError {
    let mut args: Vec<String> = vec!["run".to_string(), "--rm".to_string()];
    args.extend(doc.options.iter().map(|option| format!("--{option}")));

    if !cwd.is_empty() {
        let base = Path::new(cwd)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        args.push(format!("--volume={cwd}:/var/work/{base}:Z"));
        args.push(format!("--workdir=/var/work/{base}"));
    }

    args.push(doc.image.clone());
    args.push("sh".to_string());
    args.push("-c".to_string());
    args.push(entrypoint(paths.sandbox_uid));
    // The requested command becomes `$0` of the entrypoint shell.
    args.push(command.to_string());

    let err = Command::new(ENGINE).args(&args).exec();
    CapsuleError::Spawn {
        program: ENGINE.to_string(),
        source: err,
    }
}

fn entrypoint(uid: u32) -> String {
    format!("useradd {SANDBOX_USER} -o -u {uid} && exec su -c \"env PATH='$PATH' $0\" {SANDBOX_USER}")
}
