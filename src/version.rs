//! Build metadata embedded by `build.rs`.
//!
//! Git fields fall back to `"unknown"` when the crate is built outside a
//! checkout (e.g. from a published tarball).

use std::fmt;

use serde::Serialize;

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

const UNKNOWN: &str = "unknown";

/// What the running binary was built from.
///
/// Serialized into the `/healthz` body; its `Display` form
/// (`{version}+{branch}.{sha}[.dirty]`) is what logs carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BuildInfo {
    pub package: &'static str,
    pub git_branch: &'static str,
    /// Short (7 character) commit id.
    pub git_sha: &'static str,
    pub dirty: bool,
    pub built_at: &'static str,
}

impl BuildInfo {
    /// Metadata of this build.
    pub fn current() -> Self {
        let sha = option_env!("VERGEN_GIT_SHA").unwrap_or(UNKNOWN);
        Self {
            package: PKG_VERSION,
            git_branch: option_env!("VERGEN_GIT_BRANCH").unwrap_or(UNKNOWN),
            git_sha: &sha[..7.min(sha.len())],
            dirty: option_env!("VERGEN_GIT_DIRTY") == Some("true"),
            built_at: option_env!("VERGEN_BUILD_TIMESTAMP").unwrap_or(UNKNOWN),
        }
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+{}.{}", self.package, self.git_branch, self.git_sha)?;
        if self.dirty {
            f.write_str(".dirty")?;
        }
        Ok(())
    }
}
