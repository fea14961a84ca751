use crate::errors::{ReleaseflowError, Result};

/// Maps an OS and architecture, as named by `std::env::consts`, to the
/// triple pinned tools are published for.
#[must_use]
pub fn triple_for(os: &str, arch: &str) -> Option<&'static str> {
    match (os, arch) {
        ("macos", "x86_64") => Some("x86_64-apple-darwin"),
        ("macos", "aarch64") => Some("aarch64-apple-darwin"),
        ("windows", "x86_64") => Some("x86_64-pc-windows-msvc"),
        ("windows", "aarch64") => Some("aarch64-pc-windows-msvc"),
        ("linux", "x86_64") => Some("x86_64-unknown-linux-gnu"),
        ("linux", "aarch64") => Some("aarch64-unknown-linux-gnu"),
        _ => None,
    }
}

/// The triple of the machine this process runs on.
///
/// # Errors
///
/// `Config` if no pinned tool is published for this platform.
pub fn host_triple() -> Result<&'static str> {
    let (os, arch) = (std::env::consts::OS, std::env::consts::ARCH);
    triple_for(os, arch).ok_or_else(|| {
        ReleaseflowError::config(format!("no pinned tools are published for {os}/{arch}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triple_for() {
        assert_eq!(triple_for("macos", "aarch64"), Some("aarch64-apple-darwin"));
        assert_eq!(triple_for("windows", "x86_64"), Some("x86_64-pc-windows-msvc"));
        assert_eq!(triple_for("linux", "aarch64"), Some("aarch64-unknown-linux-gnu"));
        assert_eq!(triple_for("freebsd", "x86_64"), None);
    }
}
