//! Plugin subprocess client factory and session lifecycle.
//!
//! This crate turns a registered capability into a running plugin process:
//!
//! - [`PluginClient`] resolves an executable reference (internal command,
//!   PATH, or host-executable directory) into a not-yet-running session
//!   descriptor. Nothing is spawned at resolution time.
//! - [`PluginClient::launch`] spawns the subprocess with the magic-cookie
//!   and port-range environment, reads the handshake line, and hands back a
//!   [`PluginSession`] that owns the child and its port lease.
//! - [`PortAllocator`] hands out single-port leases inside the configured
//!   RPC range, so concurrent sessions never collide on a port.
//!
//! Managed sessions are killed when dropped; abandoning a build therefore
//! terminates every plugin subprocess it owned.
//!
//! # Examples
//!
//! ```no_run
//! use std::sync::Arc;
//! use kiln_plugin_client::{PluginClient, PortAllocator};
//!
//! # async fn example() -> kiln_core::Result<()> {
//! let ports = Arc::new(PortAllocator::new(10_000, 25_000));
//! let client = PluginClient::new(
//!     "kiln-plugin-amazon",
//!     vec!["start".into(), "builder".into(), "ebs".into()],
//!     ports,
//! );
//!
//! let session = client.launch().await?;
//! println!("plugin listening on {}", session.address());
//! session.shutdown().await?;
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod client;
mod ports;
mod session;

pub use client::{ClientConfig, PluginClient};
pub use ports::{PortAllocator, PortLease};
pub use session::{
    HandshakeInfo, PluginSession, HANDSHAKE_PROTOCOL_VERSION, MAX_PORT_ENV, MIN_PORT_ENV,
};
