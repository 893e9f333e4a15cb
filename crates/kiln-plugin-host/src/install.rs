//! Filename qualification for managed plugin installations.
//!
//! The installer lays binaries out three directories deep
//! (`<source>/<org>/<name>`) and qualifies every filename with the version,
//! the plugin API version pair, and the target platform. Discovery only
//! needs the suffix side of that contract: which filenames belong to this
//! host, on this platform, speaking this API.

use crate::checksum::ChecksumAlgorithm;
use std::env::consts;

/// Platform and API qualification for scanning the installation tree.
///
/// Immutable per discovery pass.
///
/// # Examples
///
/// ```
/// use kiln_plugin_host::BinaryInstallationOptions;
///
/// let opts = BinaryInstallationOptions::for_host();
/// assert!(opts.filename_suffix().starts_with("_x"));
/// ```
#[derive(Debug, Clone)]
pub struct BinaryInstallationOptions {
    /// Target operating system, e.g. `linux`.
    pub os: String,
    /// Target architecture, e.g. `x86_64`.
    pub arch: String,
    /// Major plugin API version binaries must speak.
    pub api_version_major: u32,
    /// Minor plugin API version binaries must speak.
    pub api_version_minor: u32,
    /// Platform executable extension, `.exe` on Windows, empty elsewhere.
    pub ext: String,
    /// Checksum algorithms to try, in order, when admitting a binary.
    pub checksummers: Vec<ChecksumAlgorithm>,
}

impl BinaryInstallationOptions {
    /// Options describing the running host.
    #[must_use]
    pub fn for_host() -> Self {
        Self {
            os: consts::OS.to_string(),
            arch: consts::ARCH.to_string(),
            api_version_major: kiln_core::API_VERSION_MAJOR,
            api_version_minor: kiln_core::API_VERSION_MINOR,
            ext: if cfg!(windows) {
                ".exe".to_string()
            } else {
                String::new()
            },
            checksummers: ChecksumAlgorithm::DEFAULT.to_vec(),
        }
    }

    /// The qualified filename suffix:
    /// `_x<major>.<minor>_<os>_<arch><ext>`.
    ///
    /// The version segment between the plugin name and this suffix is
    /// covered by the glob wildcard, so the full installed filename is
    /// `kiln-plugin-<name>_<version><suffix>`.
    #[must_use]
    pub fn filename_suffix(&self) -> String {
        format!(
            "_x{}.{}_{}_{}{}",
            self.api_version_major, self.api_version_minor, self.os, self.arch, self.ext
        )
    }
}
