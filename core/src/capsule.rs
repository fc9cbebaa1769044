//! On-disk document types.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

/// A capsule definition: the image it runs and the engine options applied to
/// every run. Options are a set; the sorted on-disk order carries no meaning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapsuleDoc {
    pub image: String,
    pub options: BTreeSet<String>,
}

/// Host-wide seed options for newly created capsules
/// (`<config>/defaults.json`). The file and the `options` key are both
/// optional; a present key of the wrong type is a fatal parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DefaultsDoc {
    #[serde(default)]
    pub options: Vec<String>,
}

/// The set of capsule names granted unprivileged run authorization
/// (`<state>/trusted.json`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustDoc {
    pub trusted: BTreeSet<String>,
}

/// Option-set update: union with `adds`, then difference with `removes`.
/// An entry that appears in both ends up removed.
pub fn apply_option_edits(options: &mut BTreeSet<String>, adds: &[String], removes: &[String]) {
    options.extend(adds.iter().cloned());
    for entry in removes {
        options.remove(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn set(entries: &[&str]) -> BTreeSet<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn removal_wins_over_a_simultaneous_add() {
        let mut options = set(&["x", "b"]);

        apply_option_edits(
            &mut options,
            &["a".to_string(), "b".to_string()],
            &["b".to_string(), "c".to_string()],
        );

        assert_eq!(options, set(&["a", "x"]));
    }

    #[test]
    fn duplicate_adds_collapse() {
        let mut options = set(&[]);

        apply_option_edits(
            &mut options,
            &["net=host".to_string(), "net=host".to_string()],
            &[],
        );

        assert_eq!(options, set(&["net=host"]));
    }

    #[test]
    fn removing_an_absent_entry_is_a_no_op() {
        let mut options = set(&["x"]);

        apply_option_edits(&mut options, &[], &["ghost".to_string()]);

        assert_eq!(options, set(&["x"]));
    }
}
