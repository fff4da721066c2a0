//! ---
//! eb_section: "01-core-functionality"
//! eb_subsection: "module"
//! eb_type: "source"
//! eb_scope: "code"
//! eb_description: "Shared primitives and utilities for the benchmark runtime."
//! eb_version: "v0.1.0"
//! eb_owner: "tbd"
//! ---
use serde::Serialize;

/// Build metadata captured by `build.rs`.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct VersionInfo {
    pub semver: String,
    pub build_timestamp: String,
    pub target: String,
    pub profile: String,
}

impl VersionInfo {
    pub fn current() -> Self {
        let debug = option_env!("VERGEN_CARGO_DEBUG").unwrap_or("false");
        Self {
            semver: env!("CARGO_PKG_VERSION").to_owned(),
            build_timestamp: option_env!("VERGEN_BUILD_TIMESTAMP")
                .unwrap_or("unknown")
                .to_owned(),
            target: option_env!("VERGEN_CARGO_TARGET_TRIPLE")
                .unwrap_or("unknown")
                .to_owned(),
            profile: if debug == "true" { "debug" } else { "release" }.to_owned(),
        }
    }

    /// Multi-line description printed by `--version`.
    pub fn extended(&self) -> String {
        format!(
            "encbench {}\nbuilt: {}\ntarget: {}\nprofile: {}",
            self.semver, self.build_timestamp, self.target, self.profile
        )
    }
}
