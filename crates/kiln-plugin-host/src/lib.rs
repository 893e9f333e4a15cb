//! Plugin discovery, integrity verification, and capability registries.
//!
//! This crate is the host side of kiln's plugin system. It locates
//! installed plugin binaries on disk, verifies them against their checksum
//! sidecars, asks each binary what it provides, and files the answers into
//! four capability registries (builders, provisioners, post-processors,
//! data sources) that the orchestration layer looks up by composite key.
//!
//! # Architecture
//!
//! Discovery is one sequential pass over the configured search folders:
//!
//! 1. The versioned installation tree (the last, highest-priority folder)
//!    is scanned with a platform/API-qualified glob; only candidates whose
//!    SHA-256 sidecar verifies are admitted.
//! 2. Every search folder is then scanned flat for `kiln-plugin-*`
//!    binaries; placement in a search folder is the trust decision, so no
//!    checksum is required and later folders override earlier ones.
//! 3. Each admitted binary is run with the `describe` subcommand and its
//!    JSON manifest decides which registry keys it claims.
//!
//! Registries hold plain [`ComponentDescriptor`] data, not closures;
//! nothing is spawned until a descriptor is materialized into a
//! [`PluginClient`](kiln_plugin_client::PluginClient) and launched.
//!
//! # Examples
//!
//! ```no_run
//! use kiln_plugin_host::PluginConfig;
//!
//! # async fn example() -> kiln_core::Result<()> {
//! let mut config = PluginConfig::new();
//! let report = config.discover().await?;
//! for failure in &report.failures {
//!     eprintln!("plugin {} skipped: {}", failure.plugin, failure.error);
//! }
//!
//! // Look up a capability and launch it on demand.
//! let client = config.builder("amazon-ebs")?;
//! let session = client.launch().await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

pub mod checksum;
pub mod config;
pub mod describe;
pub mod install;
pub mod locate;
pub mod registry;

pub use checksum::ChecksumAlgorithm;
pub use config::{DiscoveryFailure, DiscoveryReport, PluginConfig, RegisteredPlugin};
pub use describe::PluginDescription;
pub use install::BinaryInstallationOptions;
pub use registry::{ComponentDescriptor, ComponentRegistry};
