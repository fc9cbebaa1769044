//! Unprivileged CLI surface.
//!
//! Commands that mutate state validate their input locally and end in an
//! [`escalate`] call; `link`, `list`, and `options-dump` are read-only (or
//! touch only the caller's directory) and never escalate.

use std::collections::BTreeSet;
use std::path::Path;

use clap::Parser;
use clap::Subcommand;

use capsule_core::CapsuleError;
use capsule_core::CapsulePaths;
use capsule_core::name;

use crate::InternalAction;
use crate::escalate::escalate;

/// Manage container-backed application capsules.
#[derive(Debug, Parser)]
#[clap(author, version, bin_name = "capsule")]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a capsule from an image.
    Create {
        /// The new capsule name.
        capsule: String,
        /// The image the capsule runs.
        image: String,
    },
    /// Delete a capsule together with its persistence tree.
    Delete { capsule: String },
    /// Alias a capsule into the current directory as `.`.
    Link { capsule: String },
    /// List the defined capsules.
    List,
    /// Allow normal users to run the capsule without an elevation prompt.
    Trust { capsule: String },
    /// Revoke the capsule's run policy.
    Untrust { capsule: String },
    /// Add or remove engine options on a capsule.
    OptionsModify {
        capsule: String,
        /// Options to add.
        #[clap(long, short = 'a', num_args = 0..)]
        add: Vec<String>,
        /// Options to remove.
        #[clap(long, short = 'r', num_args = 0..)]
        remove: Vec<String>,
    },
    /// Print a capsule's configuration document.
    OptionsDump { capsule: String },
    /// Add or remove persisted guest paths on a capsule.
    Persistence {
        capsule: String,
        /// Guest paths to persist.
        #[clap(long, short = 'a', num_args = 0..)]
        add: Vec<String>,
        /// Guest paths to stop persisting.
        #[clap(long, short = 'r', num_args = 0..)]
        remove: Vec<String>,
    },
    /// Export a capsule command as a launcher on the host.
    Export { capsule: String, command: String },
    /// Run a command inside a capsule.
    Run {
        capsule: String,
        #[clap(trailing_var_arg = true, required = true)]
        command: Vec<String>,
    },
}

pub fn run_cli(paths: &CapsulePaths) -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Create { capsule, image } => create(&capsule, &image),
        Command::Delete { capsule } => delete(&capsule),
        Command::Link { capsule } => link(paths, &capsule),
        Command::List => list(paths),
        Command::Trust { capsule } => trust_change(paths, &capsule, InternalAction::Trust),
        Command::Untrust { capsule } => trust_change(paths, &capsule, InternalAction::Untrust),
        Command::OptionsModify {
            capsule,
            add,
            remove,
        } => modify(paths, &capsule, InternalAction::Modify, &add, &remove),
        Command::OptionsDump { capsule } => options_dump(paths, &capsule),
        Command::Persistence {
            capsule,
            add,
            remove,
        } => modify(paths, &capsule, InternalAction::Persistence, &add, &remove),
        Command::Export { capsule, command } => export(paths, &capsule, &command),
        Command::Run { capsule, command } => run(paths, &capsule, &command),
    }
}

fn create(capsule: &str, image: &str) -> anyhow::Result<()> {
    name::verify_capsule_name(capsule)?;
    escalate(InternalAction::Create, [capsule, image])
}

fn delete(capsule: &str) -> anyhow::Result<()> {
    name::verify_capsule_name(capsule)?;
    escalate(InternalAction::Delete, [capsule])
}

fn link(paths: &CapsulePaths, capsule: &str) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let path = existing_capsule_path(paths, capsule, &cwd)?;
    Ok(name::install_link(&path, &cwd)?)
}

fn list(paths: &CapsulePaths) -> anyhow::Result<()> {
    let capsules_dir = paths.capsules_dir();
    let entries = match std::fs::read_dir(&capsules_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(CapsuleError::io(&capsules_dir, err).into()),
    };

    let mut names = BTreeSet::new();
    for entry in entries {
        let path = entry
            .map_err(|err| CapsuleError::io(&capsules_dir, err))?
            .path();
        if path.extension().is_some_and(|ext| ext == "json")
            && let Ok(name) = name::capsule_name_of(&path)
        {
            names.insert(name);
        }
    }

    for name in names {
        println!("{name}");
    }
    Ok(())
}

fn trust_change(
    paths: &CapsulePaths,
    capsule: &str,
    action: InternalAction,
) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let resolved = name::resolve_capsule_name(paths, capsule, &cwd)?;
    escalate(action, [resolved.as_str()])
}

fn modify(
    paths: &CapsulePaths,
    capsule: &str,
    action: InternalAction,
    add: &[String],
    remove: &[String],
) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let path = existing_capsule_path(paths, capsule, &cwd)?;
    escalate(action, edit_args(&path, add, remove))
}

/// `<path> <nadd> <adds…> <removes…>`, the broker wire format for the two
/// edit actions.
fn edit_args(path: &Path, add: &[String], remove: &[String]) -> Vec<String> {
    let mut args = vec![path.display().to_string(), add.len().to_string()];
    args.extend(add.iter().cloned());
    args.extend(remove.iter().cloned());
    args
}

fn options_dump(paths: &CapsulePaths, capsule: &str) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let path = existing_capsule_path(paths, capsule, &cwd)?;
    let contents =
        std::fs::read_to_string(&path).map_err(|err| CapsuleError::io(&path, err))?;
    println!("{contents}");
    Ok(())
}

fn export(paths: &CapsulePaths, capsule: &str, command: &str) -> anyhow::Result<()> {
    // A `.` export records the directory scope in the shim so later runs
    // bind whichever directory the shim is invoked from.
    let prefix = if capsule == "." { "." } else { "" };
    let cwd = std::env::current_dir()?;
    let resolved = name::resolve_capsule_name(paths, capsule, &cwd)?;
    escalate(InternalAction::Export, [resolved.as_str(), prefix, command])
}

fn run(paths: &CapsulePaths, capsule: &str, command: &[String]) -> anyhow::Result<()> {
    let cwd = std::env::current_dir()?;
    let cwd_arg = if capsule == "." {
        cwd.to_string_lossy().into_owned()
    } else {
        String::new()
    };
    let resolved = name::resolve_capsule_name(paths, capsule, &cwd)?;
    let command = shlex::try_join(command.iter().map(String::as_str))?;
    escalate(
        InternalAction::Run,
        [resolved.as_str(), cwd_arg.as_str(), command.as_str()],
    )
}

fn existing_capsule_path(
    paths: &CapsulePaths,
    capsule: &str,
    cwd: &Path,
) -> anyhow::Result<std::path::PathBuf> {
    let path = name::capsule_path(paths, capsule, cwd)?;
    if !path.exists() {
        return Err(CapsuleError::CapsuleNotFound {
            name: capsule.to_string(),
        }
        .into());
    }
    Ok(path)
}
