//! CLI argument parsing for per-crate debug flags
//!
//! Supports flags like `--debug-dvs-streamer` to raise one crate to debug level,
//! and `--debug-all` for every workspace crate.

use std::collections::BTreeSet;
use std::env;

use crate::KNOWN_CRATES;

/// Per-crate debug flags
///
/// # Example
/// ```rust
/// use dvs_observability::CrateDebugFlags;
///
/// let flags = CrateDebugFlags::from_args(vec!["--debug-dvs-streamer".to_string()]);
/// assert!(flags.is_enabled("dvs-streamer"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CrateDebugFlags {
    pub enabled_crates: BTreeSet<String>,
}

impl CrateDebugFlags {
    /// Parse debug flags from command-line arguments
    ///
    /// Looks for arguments matching `--debug-{crate-name}`. `--debug-all`
    /// enables all known crates.
    pub fn from_args<I>(args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut flags = CrateDebugFlags::default();

        for arg in args {
            if arg == "--debug-all" {
                flags.enable_all();
                continue;
            }
            if let Some(crate_name) = arg.strip_prefix("--debug-") {
                flags.enabled_crates.insert(crate_name.to_string());
            }
        }

        flags
    }

    /// Enable every crate in [`KNOWN_CRATES`]
    pub fn enable_all(&mut self) {
        for crate_name in KNOWN_CRATES {
            self.enabled_crates.insert(crate_name.to_string());
        }
    }

    pub fn is_enabled(&self, crate_name: &str) -> bool {
        self.enabled_crates.contains(crate_name)
    }

    pub fn any_enabled(&self) -> bool {
        !self.enabled_crates.is_empty()
    }

    /// Build an `EnvFilter` directive string
    ///
    /// Crate names are translated to their tracing targets (`-` becomes `_`),
    /// and `base_level` applies to everything else.
    /// Format: `"dvs_streamer=debug,info"`.
    pub fn to_filter_string(&self, base_level: &str) -> String {
        let mut filters: Vec<String> = self
            .enabled_crates
            .iter()
            .map(|name| format!("{}=debug", name.replace('-', "_")))
            .collect();
        filters.push(base_level.to_lowercase());
        filters.join(",")
    }
}

/// Parse debug flags from the process arguments and `DVS_DEBUG`
///
/// `DVS_DEBUG` is either `all` or a comma-separated list of crate names.
pub fn parse_debug_flags() -> CrateDebugFlags {
    let mut flags = CrateDebugFlags::from_args(env::args());

    if let Ok(env_var) = env::var("DVS_DEBUG") {
        if env_var == "all" {
            flags.enable_all();
        } else {
            for crate_name in env_var.split(',') {
                let crate_name = crate_name.trim();
                if !crate_name.is_empty() {
                    flags.enabled_crates.insert(crate_name.to_string());
                }
            }
        }
    }

    flags
}
