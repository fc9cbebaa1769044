use std::path::PathBuf;

/// Installed location of the `capsule` binary. Export shims and the
/// escalation broker both reference the program by this path so the elevated
/// command line stays stable regardless of how the caller was invoked.
pub const PROGRAM_PATH: &str = "/usr/bin/capsule";

const DEFAULT_CONFIG_DIR: &str = "/etc/capsule";
const DEFAULT_STATE_DIR: &str = "/var/lib/capsule";
const DEFAULT_POLKIT_RULES_FILE: &str = "/etc/polkit-1/rules.d/49-capsule.rules";

/// UID/GID every sandboxed command runs under.
const DEFAULT_SANDBOX_UID: u32 = 1000;
const DEFAULT_SANDBOX_GID: u32 = 1000;

/// The storage roots and sandbox identity the whole system operates on.
///
/// Constructed once at startup and threaded through every component instead
/// of reading fixed globals at the point of use.
#[derive(Debug, Clone)]
pub struct CapsulePaths {
    /// Host-wide configuration (the defaults document).
    pub config_dir: PathBuf,
    /// Capsule documents, persistence mounts, trust list, and exports.
    pub state_dir: PathBuf,
    /// Generated polkit rules script.
    pub polkit_rules_file: PathBuf,
    pub sandbox_uid: u32,
    pub sandbox_gid: u32,
}

impl CapsulePaths {
    /// System locations, with `CAPSULE_CONFIG_DIR`, `CAPSULE_STATE_DIR`, and
    /// `CAPSULE_POLKIT_RULES_FILE` environment overrides honored so tests
    /// and packaging can relocate the roots.
    pub fn from_env() -> Self {
        Self {
            config_dir: env_path("CAPSULE_CONFIG_DIR", DEFAULT_CONFIG_DIR),
            state_dir: env_path("CAPSULE_STATE_DIR", DEFAULT_STATE_DIR),
            polkit_rules_file: env_path("CAPSULE_POLKIT_RULES_FILE", DEFAULT_POLKIT_RULES_FILE),
            sandbox_uid: DEFAULT_SANDBOX_UID,
            sandbox_gid: DEFAULT_SANDBOX_GID,
        }
    }

    pub fn defaults_file(&self) -> PathBuf {
        self.config_dir.join("defaults.json")
    }

    pub fn capsules_dir(&self) -> PathBuf {
        self.state_dir.join("capsules")
    }

    pub fn capsule_file(&self, name: &str) -> PathBuf {
        self.capsules_dir().join(format!("{name}.json"))
    }

    pub fn persistence_root(&self, capsule: &str) -> PathBuf {
        self.state_dir.join("persistence").join(capsule)
    }

    pub fn trust_list_file(&self) -> PathBuf {
        self.state_dir.join("trusted.json")
    }

    pub fn exports_bin_dir(&self) -> PathBuf {
        self.state_dir.join("exports").join("bin")
    }
}

fn env_path(var: &str, default: &str) -> PathBuf {
    match std::env::var(var) {
        Ok(val) if !val.is_empty() => PathBuf::from(val),
        _ => PathBuf::from(default),
    }
}
