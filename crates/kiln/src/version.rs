//! Version information.

/// Get the version string.
#[must_use]
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Get the full version string with target info.
#[must_use]
pub fn full_version() -> String {
    format!(
        "kiln {} ({}-{})",
        version(),
        std::env::consts::ARCH,
        std::env::consts::OS
    )
}
