//! Client side of the privilege escalation broker.
//!
//! Privileged work always goes through [`escalate`] and a fresh elevated
//! process; the unprivileged side never calls a handler directly.

use std::ffi::OsStr;
use std::process::Command;

use capsule_core::CapsuleError;
use capsule_core::config::PROGRAM_PATH;

use crate::InternalAction;

/// External elevation broker. It authorizes the `internal-*` action against
/// the installed polkit policy before re-invoking the program with elevated
/// rights.
const BROKER: &str = "pkexec";

/// Hand a privileged action to the elevation broker as
/// `pkexec /usr/bin/capsule internal-<action> <args…>`.
///
/// The broker's exit status is propagated verbatim; this returns normally
/// only when the broker reports success.
pub fn escalate<I, S>(action: InternalAction, args: I) -> anyhow::Result<()>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    tracing::debug!("delegating `{}` to {BROKER}", action.token());
    let status = Command::new(BROKER)
        .arg(PROGRAM_PATH)
        .arg(action.token())
        .args(args)
        .status()
        .map_err(|err| CapsuleError::Spawn {
            program: BROKER.to_string(),
            source: err,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(CapsuleError::Delegated {
            program: BROKER.to_string(),
            status: status.code().unwrap_or(1),
        }
        .into())
    }
}
