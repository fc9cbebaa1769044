//! Policy compiler: keeps the trust list and the generated polkit rules
//! script consistent as a pair.
//!
//! The script has exactly one generated piece, the trusted-name table; the
//! matcher body around it is fixed. Every trust change rewrites the whole
//! script from the full set, never patching individual entries.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::capsule::TrustDoc;
use crate::config::CapsulePaths;
use crate::error::Result;
use crate::name::CAPSULE_NAME_PATTERN;
use crate::store;

/// polkit action id the generated rule matches on. The elevation broker
/// raises this id for every `internal-run` request.
pub const POLKIT_ACTION_ID: &str = "org.capsule.run";

/// Render the rules script for the full trusted set.
///
/// The script re-checks the capsule argument against the name allow-list at
/// evaluation time instead of trusting the table alone, and hard-denies on a
/// pattern mismatch. Names not in the table fall through to whatever other
/// policy is installed.
pub fn render_rules(trusted: &BTreeSet<String>) -> String {
    let table: serde_json::Map<String, serde_json::Value> = trusted
        .iter()
        .map(|name| (name.clone(), serde_json::Value::Bool(true)))
        .collect();
    let table_js = serde_json::Value::Object(table).to_string();

    format!(
        r#"// THIS FILE IS AUTOMATICALLY GENERATED by capsule
// Do NOT edit: your changes will be overwritten!

var TRUSTED = {table_js}

polkit.addRule(function (action, subject) {{
    if (action.id == '{POLKIT_ACTION_ID}') {{
        var cmdline = action.lookup('command_line')
        var capsule = cmdline.match(/internal-run (\S+)/)[1]
        polkit.log('capsule:' + capsule)
        if (!capsule.match(/^{CAPSULE_NAME_PATTERN}$/))
            return polkit.Result.NO
        if (TRUSTED.hasOwnProperty(capsule))
            return polkit.Result.YES
    }}

    return polkit.Result.NOT_HANDLED
}});
"#
    )
}

/// Persist the trust list and regenerate the rules script from the same
/// in-memory set.
///
/// Write order: the list is staged, the rules land atomically, and only
/// then is the list renamed into place. Dying between the two writes leaves
/// both artifacts at their previous state; the enforcing script is never
/// older than the list it sits next to.
pub fn install(paths: &CapsulePaths, trusted: &BTreeSet<String>) -> Result<()> {
    let document = TrustDoc {
        trusted: trusted.clone(),
    };

    let staged_list = store::stage_json(&paths.trust_list_file(), &document)?;
    store::write_text(&paths.polkit_rules_file, &render_rules(trusted))?;
    staged_list.commit()
}

/// Parse the trusted-name table back out of a rendered script, for
/// structural comparison. `None` when the table line is missing.
pub fn parse_trusted_table(script: &str) -> Option<BTreeMap<String, bool>> {
    let table = script
        .lines()
        .find_map(|line| line.strip_prefix("var TRUSTED = "))?;
    serde_json::from_str(table).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn the_embedded_table_mirrors_the_trusted_set() {
        let script = render_rules(&set(&["dev", "web"]));

        let table = parse_trusted_table(&script).unwrap_or_default();

        assert_eq!(
            table,
            BTreeMap::from([("dev".to_string(), true), ("web".to_string(), true)])
        );
    }

    #[test]
    fn an_empty_set_renders_an_empty_table() {
        let script = render_rules(&BTreeSet::new());

        assert_eq!(parse_trusted_table(&script), Some(BTreeMap::new()));
    }

    #[test]
    fn the_matcher_body_checks_id_and_pattern() {
        let script = render_rules(&set(&["dev"]));

        assert!(script.contains(POLKIT_ACTION_ID));
        assert!(script.contains(&format!("/^{CAPSULE_NAME_PATTERN}$/")));
        assert!(script.contains("polkit.Result.NO"));
        assert!(script.contains("polkit.Result.NOT_HANDLED"));
    }

    #[test]
    fn names_are_json_escaped_into_the_table() {
        // Every character in the allow-list is inert in JSON, but the table
        // must stay well-formed for any set it is handed.
        let script = render_rules(&set(&["a\"b"]));

        let table = parse_trusted_table(&script).unwrap_or_default();
        assert_eq!(table.get("a\"b"), Some(&true));
    }

    #[test]
    fn install_writes_both_artifacts() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let paths = CapsulePaths {
            config_dir: dir.path().join("etc"),
            state_dir: dir.path().join("state"),
            polkit_rules_file: dir.path().join("rules.d").join("49-capsule.rules"),
            sandbox_uid: 1000,
            sandbox_gid: 1000,
        };

        install(&paths, &set(&["dev"]))?;

        let list: TrustDoc = store::read_json(&paths.trust_list_file())?;
        assert_eq!(list.trusted, set(&["dev"]));

        let script = std::fs::read_to_string(&paths.polkit_rules_file)?;
        let table = parse_trusted_table(&script).unwrap_or_default();
        assert_eq!(table, BTreeMap::from([("dev".to_string(), true)]));
        Ok(())
    }
}
