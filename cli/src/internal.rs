//! Privileged dispatch: maps the elevation broker's positional argv onto
//! the action handlers in `capsule_core`. One function per action.
//!
//! Validation of the payload (names, paths, existence) belongs to the
//! handlers themselves; this layer only checks argv shape.

use std::path::PathBuf;

use anyhow::bail;
use capsule_core::CapsulePaths;
use capsule_core::handlers;

use crate::InternalAction;

pub fn dispatch(
    paths: &CapsulePaths,
    action: InternalAction,
    args: &[String],
) -> anyhow::Result<()> {
    match action {
        InternalAction::Create => create(paths, args),
        InternalAction::Delete => delete(paths, args),
        InternalAction::Export => export(paths, args),
        InternalAction::Modify => modify(args),
        InternalAction::Persistence => persistence(paths, args),
        InternalAction::Run => run(paths, args),
        InternalAction::Trust => trust(paths, args),
        InternalAction::Untrust => untrust(paths, args),
    }
}

fn create(paths: &CapsulePaths, args: &[String]) -> anyhow::Result<()> {
    let [name, image] = args else {
        bail!("usage: capsule internal-create <name> <image>");
    };
    Ok(handlers::create(paths, name, image)?)
}

fn delete(paths: &CapsulePaths, args: &[String]) -> anyhow::Result<()> {
    let [name] = args else {
        bail!("usage: capsule internal-delete <name>");
    };
    Ok(handlers::delete(paths, name)?)
}

fn export(paths: &CapsulePaths, args: &[String]) -> anyhow::Result<()> {
    let [capsule, prefix, command] = args else {
        bail!("usage: capsule internal-export <name> <prefix> <command>");
    };
    Ok(handlers::export(paths, capsule, prefix, command)?)
}

fn modify(args: &[String]) -> anyhow::Result<()> {
    let (path, adds, removes) = split_edit_args(args, "internal-modify")?;
    Ok(handlers::modify_options(&path, adds, removes)?)
}

fn persistence(paths: &CapsulePaths, args: &[String]) -> anyhow::Result<()> {
    let (path, adds, removes) = split_edit_args(args, "internal-persistence")?;
    Ok(handlers::modify_persistence(paths, &path, adds, removes)?)
}

fn run(paths: &CapsulePaths, args: &[String]) -> anyhow::Result<()> {
    let [capsule, cwd, command] = args else {
        bail!("usage: capsule internal-run <name> <cwd> <command>");
    };
    let start_dir = std::env::current_dir()?;
    match handlers::run(paths, capsule, cwd, command, &start_dir) {
        Err(err) => Err(err.into()),
        Ok(never) => match never {},
    }
}

fn trust(paths: &CapsulePaths, args: &[String]) -> anyhow::Result<()> {
    let [name] = args else {
        bail!("usage: capsule internal-trust <name>");
    };
    Ok(handlers::trust(paths, name)?)
}

fn untrust(paths: &CapsulePaths, args: &[String]) -> anyhow::Result<()> {
    let [name] = args else {
        bail!("usage: capsule internal-untrust <name>");
    };
    Ok(handlers::untrust(paths, name)?)
}

/// Wire format of the two edit actions:
/// `<path> <nadd> <adds…> <removes…>`, where `<nadd>` counts how many of
/// the trailing arguments are adds.
fn split_edit_args<'a>(
    args: &'a [String],
    action: &str,
) -> anyhow::Result<(PathBuf, &'a [String], &'a [String])> {
    let [path, nadd, rest @ ..] = args else {
        bail!("usage: capsule {action} <path> <nadd> <adds…> <removes…>");
    };
    let nadd: usize = nadd
        .parse()
        .map_err(|_| anyhow::anyhow!("{action}: `{nadd}` is not a count"))?;
    if nadd > rest.len() {
        bail!(
            "{action}: add count {nadd} exceeds the {} remaining arguments",
            rest.len()
        );
    }

    let (adds, removes) = rest.split_at(nadd);
    Ok((PathBuf::from(path), adds, removes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn edit_args_split_on_the_add_count() -> anyhow::Result<()> {
        let args = args(&["/tmp/dev.json", "2", "a", "b", "b", "c"]);

        let (path, adds, removes) = split_edit_args(&args, "internal-modify")?;

        assert_eq!(path, PathBuf::from("/tmp/dev.json"));
        assert_eq!(adds, ["a", "b"]);
        assert_eq!(removes, ["b", "c"]);
        Ok(())
    }

    #[test]
    fn an_oversized_add_count_is_rejected() {
        let args = args(&["/tmp/dev.json", "3", "a"]);

        assert!(split_edit_args(&args, "internal-modify").is_err());
    }

    #[test]
    fn a_non_numeric_add_count_is_rejected() {
        let args = args(&["/tmp/dev.json", "lots", "a"]);

        assert!(split_edit_args(&args, "internal-modify").is_err());
    }
}
