use std::fmt::Write;

/// The current version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Schema version of the JSON printed by `optimize`, `tree` and `scan`.
pub const SCHEMA_VERSION: u32 = 1;

/// `nmhoist <version>`, plus the git hash when the build recorded one and the
/// report schema.
#[must_use]
pub fn version_string() -> String {
    let mut s = format!("nmhoist {VERSION}");

    if let Some(hash) = option_env!("NMHOIST_BUILD_GIT_HASH") {
        let _ = write!(s, " ({hash})");
    }
    let _ = write!(s, " [report schema v{SCHEMA_VERSION}]");

    s
}
