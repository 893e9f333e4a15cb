//! Core types, constants, and errors for kiln plugin resolution.
//!
//! This crate provides the foundational vocabulary shared by the plugin
//! host and the plugin client:
//!
//! - The four capability classes and the composite-key derivation rules
//! - Well-known constants of the plugin contract (binary prefix, default
//!   component sentinel, API version, magic cookie)
//! - The error hierarchy with contextual information

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod error;
mod types;

pub use error::{Error, Result};
pub use types::{ComponentClass, ComponentKey};

/// Filename prefix shared by every plugin binary, managed or manual.
pub const PLUGIN_BINARY_PREFIX: &str = "kiln-plugin-";

/// Reserved component name a plugin may declare to mean "register this
/// component under my unqualified plugin name" instead of a hyphen-joined
/// composite key.
pub const DEFAULT_NAME: &str = "-kiln-default-plugin-name-";

/// Major plugin API version the host speaks. Installed binaries carry this
/// pair in their filename suffix.
pub const API_VERSION_MAJOR: u32 = 1;

/// Minor plugin API version the host speaks.
pub const API_VERSION_MINOR: u32 = 0;

/// Environment variable carrying the plugin magic cookie.
///
/// The host sets it when launching a plugin subprocess; a plugin binary that
/// finds the expected value in its own environment knows it is already
/// inside a plugin lifecycle and must not run its own discovery pass.
pub const MAGIC_COOKIE_KEY: &str = "KILN_PLUGIN_MAGIC_COOKIE";

/// Expected value of the magic cookie. The value itself is arbitrary; only
/// the exact match matters.
pub const MAGIC_COOKIE_VALUE: &str =
    "8fe2c7d339c41b0deb7df97c2cd2ea8881d6f9cbb44160f1e62ad2f0e55f2dda";

/// Marker that stands in for the spaces separating an internal plugin
/// command from its embedded arguments, so the whole invocation can travel
/// as a single executable reference without being confused with spaces in
/// the path itself.
pub const INTERNAL_COMMAND_SPACE: &str = "-KILNSPACE-";
