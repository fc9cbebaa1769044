//! The `capsule` binary is entered three ways: as the ordinary unprivileged
//! CLI, as an `internal-*` privileged dispatch from the elevation broker,
//! and as a `run-exported-internal:*` re-entry from an export shim. The
//! entry point is decided from the first argument before clap ever runs, so
//! the privileged paths never pass through the unprivileged parser.

mod commands;
mod escalate;
mod exported;
mod internal;

use anyhow::bail;
use capsule_core::CapsulePaths;
use tracing_subscriber::EnvFilter;

const EXPORTED_PREFIX: &str = "run-exported-internal:";
const INTERNAL_PREFIX: &str = "internal-";

/// The privileged operations, one per `internal-*` token. Only the
/// elevation broker is expected to invoke these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InternalAction {
    Create,
    Delete,
    Export,
    Modify,
    Persistence,
    Run,
    Trust,
    Untrust,
}

impl InternalAction {
    pub const fn token(self) -> &'static str {
        match self {
            InternalAction::Create => "internal-create",
            InternalAction::Delete => "internal-delete",
            InternalAction::Export => "internal-export",
            InternalAction::Modify => "internal-modify",
            InternalAction::Persistence => "internal-persistence",
            InternalAction::Run => "internal-run",
            InternalAction::Trust => "internal-trust",
            InternalAction::Untrust => "internal-untrust",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        [
            InternalAction::Create,
            InternalAction::Delete,
            InternalAction::Export,
            InternalAction::Modify,
            InternalAction::Persistence,
            InternalAction::Run,
            InternalAction::Trust,
            InternalAction::Untrust,
        ]
        .into_iter()
        .find(|action| action.token() == token)
    }
}

/// How the program was entered.
#[derive(Debug)]
pub enum Invocation {
    /// `capsule internal-<action> <args…>` from the elevation broker.
    Internal(InternalAction, Vec<String>),
    /// `capsule run-exported-internal:<token> <shim> <args…>` from a shim's
    /// shebang line.
    Exported(String, Vec<String>),
    /// The ordinary unprivileged CLI.
    Cli,
}

/// Decide the entry point from argv (without the program name).
pub fn detect_invocation(args: &[String]) -> anyhow::Result<Invocation> {
    let Some(first) = args.first() else {
        return Ok(Invocation::Cli);
    };

    if let Some(action) = InternalAction::from_token(first) {
        return Ok(Invocation::Internal(action, args[1..].to_vec()));
    }
    if first.starts_with(INTERNAL_PREFIX) {
        bail!("invalid internal action `{first}`");
    }
    if let Some(token) = first.strip_prefix(EXPORTED_PREFIX) {
        return Ok(Invocation::Exported(token.to_string(), args[1..].to_vec()));
    }

    Ok(Invocation::Cli)
}

pub fn run_main() -> anyhow::Result<()> {
    init_logging();

    let paths = CapsulePaths::from_env();
    let args: Vec<String> = std::env::args().skip(1).collect();

    match detect_invocation(&args)? {
        Invocation::Internal(action, args) => internal::dispatch(&paths, action, &args),
        Invocation::Exported(token, args) => exported::run_exported(&paths, &token, &args),
        Invocation::Cli => commands::run_cli(&paths),
    }
}

fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("error"));
    // stdout carries command output only; all diagnostics go to stderr.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn internal_tokens_dispatch_to_their_action() -> anyhow::Result<()> {
        let invocation = detect_invocation(&args(&["internal-run", "dev", "", "ls"]))?;

        assert!(matches!(
            invocation,
            Invocation::Internal(InternalAction::Run, rest) if rest == args(&["dev", "", "ls"])
        ));
        Ok(())
    }

    #[test]
    fn unknown_internal_tokens_are_rejected_not_parsed_as_cli() {
        assert!(detect_invocation(&args(&["internal-frobnicate"])).is_err());
    }

    #[test]
    fn exported_tokens_carry_the_capsule_and_shim_args() -> anyhow::Result<()> {
        let invocation =
            detect_invocation(&args(&["run-exported-internal:.dev", "/shim", "-x"]))?;

        assert!(matches!(
            invocation,
            Invocation::Exported(token, rest) if token == ".dev" && rest == args(&["/shim", "-x"])
        ));
        Ok(())
    }

    #[test]
    fn ordinary_commands_fall_through_to_the_cli() -> anyhow::Result<()> {
        assert!(matches!(
            detect_invocation(&args(&["create", "dev", "fedora:41"]))?,
            Invocation::Cli
        ));
        assert!(matches!(detect_invocation(&[])?, Invocation::Cli));
        Ok(())
    }
}
