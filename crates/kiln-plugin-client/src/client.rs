//! Client factory: from an executable reference to a deferred session.
//!
//! Resolution happens eagerly so a registered capability always points at a
//! concrete command line; spawning stays deferred until the orchestration
//! layer actually exercises the capability.

use crate::ports::PortAllocator;
use crate::session::{self, PluginSession};
use kiln_core::{Result, INTERNAL_COMMAND_SPACE};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Launch configuration for a not-yet-running plugin session.
///
/// Carries everything needed to spawn the subprocess later: the resolved
/// command, the full argument list, whether the host owns the child's
/// lifecycle, and the RPC port range to negotiate inside.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Resolved command, or the original reference when resolution failed
    /// everywhere (so the spawn error names the real command).
    pub command: PathBuf,
    /// Full argument list, embedded internal arguments first.
    pub args: Vec<String>,
    /// When `true` the host is responsible for terminating the subprocess;
    /// the session kills the child on drop.
    pub managed: bool,
    /// Lower bound of the RPC port range.
    pub min_port: u16,
    /// Upper bound of the RPC port range.
    pub max_port: u16,
}

/// Handle for one plugin capability, bound to a resolved command line.
///
/// Construction never spawns; call [`PluginClient::launch`] to start the
/// subprocess and perform the handshake.
#[derive(Debug)]
pub struct PluginClient {
    config: ClientConfig,
    ports: Arc<PortAllocator>,
    internal: bool,
}

impl PluginClient {
    /// Resolves `reference` and builds a deferred session descriptor.
    ///
    /// Resolution order:
    ///
    /// 1. A reference containing [`INTERNAL_COMMAND_SPACE`] is split into
    ///    the real executable and a prefix of embedded arguments; `args`
    ///    are appended after them.
    /// 2. Otherwise the executable search path is consulted.
    /// 3. Failing that, the directory holding the running host executable
    ///    is tried with the reference's file name.
    /// 4. If nothing resolved, the reference is passed through unmodified
    ///    and the eventual spawn reports the real "not found" error.
    #[must_use]
    pub fn new(reference: &str, args: Vec<String>, ports: Arc<PortAllocator>) -> Self {
        let (command, mut full_args, internal) = resolve_reference(reference);
        full_args.extend(args);

        let config = ClientConfig {
            command,
            args: full_args,
            managed: true,
            min_port: ports.min(),
            max_port: ports.max(),
        };
        Self {
            config,
            ports,
            internal,
        }
    }

    /// The launch configuration this client will spawn with.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Whether the reference routed to an internal subcommand of the host
    /// binary rather than a separate plugin executable.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        self.internal
    }

    /// Spawns the plugin subprocess and performs the RPC handshake.
    ///
    /// A single-port lease is taken from the allocator and passed to the
    /// plugin as a degenerate `[min, max]` range, making port
    /// collision-freedom a host-side invariant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoFreePort`](kiln_core::Error::NoFreePort) when the
    /// range is exhausted, [`Error::Spawn`](kiln_core::Error::Spawn) when
    /// the command cannot be started, and a handshake or timeout error when
    /// the plugin does not greet the host in time.
    pub async fn launch(&self) -> Result<PluginSession> {
        let lease = self.ports.acquire()?;
        if self.internal {
            tracing::info!(
                args = ?self.config.args,
                "starting internal plugin"
            );
        } else {
            tracing::info!(
                command = %self.config.command.display(),
                args = ?self.config.args,
                "starting external plugin"
            );
        }
        session::launch(&self.config, lease).await
    }
}

/// Splits or resolves an executable reference.
///
/// Returns `(command, embedded_args, internal)`.
fn resolve_reference(reference: &str) -> (PathBuf, Vec<String>, bool) {
    if reference.contains(INTERNAL_COMMAND_SPACE) {
        let mut parts = reference.split(INTERNAL_COMMAND_SPACE);
        let command = parts.next().unwrap_or_default();
        let embedded = parts.map(str::to_owned).collect();
        return (PathBuf::from(command), embedded, true);
    }

    match which::which(reference) {
        Ok(found) => (found, Vec::new(), false),
        Err(err) => {
            tracing::debug!(
                reference,
                error = %err,
                "not on the executable search path, checking the host executable's directory"
            );
            if let Some(candidate) = host_sibling(reference) {
                return (candidate, Vec::new(), false);
            }
            (PathBuf::from(reference), Vec::new(), false)
        }
    }
}

/// Looks for the reference's file name next to the running host executable.
fn host_sibling(reference: &str) -> Option<PathBuf> {
    let exe = env::current_exe().ok()?;
    let file_name = Path::new(reference).file_name()?;
    let candidate = exe.parent()?.join(file_name);
    candidate.is_file().then_some(candidate)
}
