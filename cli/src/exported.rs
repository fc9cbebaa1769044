//! Re-entry from an export shim.
//!
//! The kernel hands us the shim's path as the first argument after the
//! shebang token; everything after that is what the user typed. The shim's
//! recorded command plus the extra arguments become one shell-quoted command
//! string in an escalated run request.

use std::path::Path;

use anyhow::bail;
use capsule_core::CapsuleError;
use capsule_core::CapsulePaths;
use capsule_core::name;

use crate::InternalAction;
use crate::escalate::escalate;

pub fn run_exported(paths: &CapsulePaths, token: &str, args: &[String]) -> anyhow::Result<()> {
    let [shim, extra @ ..] = args else {
        bail!("usage: capsule run-exported-internal:<capsule> <export-file> [args…]");
    };

    let recorded = read_exported_command(Path::new(shim))?;
    let command = compose_command(&recorded, extra)?;

    let start_dir = std::env::current_dir()?;
    // A leading `.` on the token asks for directory scoping: bind the
    // caller's working directory into the sandbox.
    let (capsule, cwd) = match token.strip_prefix('.') {
        Some(stripped) => (stripped, start_dir.to_string_lossy().into_owned()),
        None => (token, String::new()),
    };

    let resolved = name::resolve_capsule_name(paths, capsule, &start_dir)?;
    escalate(
        InternalAction::Run,
        [resolved.as_str(), cwd.as_str(), command.as_str()],
    )
}

/// The first line of the shim that is neither blank nor a shebang: the
/// literal command recorded at export time.
fn read_exported_command(path: &Path) -> Result<String, CapsuleError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Err(CapsuleError::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(err) => return Err(CapsuleError::io(path, err)),
    };

    contents
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with("#!"))
        .map(str::to_string)
        .ok_or_else(|| CapsuleError::InvalidExport {
            path: path.to_path_buf(),
        })
}

/// The run request's command string: the recorded command and the extra
/// arguments, each shell-quoted, joined in order.
fn compose_command(recorded: &str, extra: &[String]) -> anyhow::Result<String> {
    let mut words = vec![recorded];
    words.extend(extra.iter().map(String::as_str));
    Ok(shlex::try_join(words)?)
}
