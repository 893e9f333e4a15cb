//! Running plugin sessions and the handshake contract.
//!
//! A launched plugin greets the host with a single stdout line:
//!
//! ```text
//! <core-protocol-version>|<network>|<address>
//! ```
//!
//! e.g. `1|tcp|127.0.0.1:14023`. Everything past that line is plugin log
//! output and is drained to tracing at trace level.

use crate::client::ClientConfig;
use crate::ports::PortLease;
use kiln_core::{Error, Result, MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::timeout;

/// Core protocol version expected in the first handshake field.
pub const HANDSHAKE_PROTOCOL_VERSION: u32 = 1;

/// Environment variable carrying the lower bound of the RPC port range.
pub const MIN_PORT_ENV: &str = "KILN_PLUGIN_MIN_PORT";

/// Environment variable carrying the upper bound of the RPC port range.
pub const MAX_PORT_ENV: &str = "KILN_PLUGIN_MAX_PORT";

/// How long a launched plugin gets to print its handshake line.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(60);

/// Decoded handshake line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeInfo {
    /// Core protocol version the plugin speaks.
    pub protocol_version: u32,
    /// Listener network, e.g. `tcp`.
    pub network: String,
    /// Listener address, e.g. `127.0.0.1:14023`.
    pub address: String,
}

pub(crate) fn parse_handshake(line: &str) -> Result<HandshakeInfo> {
    let mut fields = line.trim().splitn(3, '|');
    let version = fields
        .next()
        .unwrap_or_default()
        .parse::<u32>()
        .map_err(|_| Error::Handshake {
            message: format!("malformed handshake line {line:?}"),
        })?;
    let (Some(network), Some(address)) = (fields.next(), fields.next()) else {
        return Err(Error::Handshake {
            message: format!("malformed handshake line {line:?}"),
        });
    };
    if version != HANDSHAKE_PROTOCOL_VERSION {
        return Err(Error::Handshake {
            message: format!(
                "plugin speaks core protocol {version}, host expects {HANDSHAKE_PROTOCOL_VERSION}"
            ),
        });
    }
    Ok(HandshakeInfo {
        protocol_version: version,
        network: network.to_string(),
        address: address.to_string(),
    })
}

/// Spawns the configured command and completes the handshake.
pub(crate) async fn launch(config: &ClientConfig, lease: PortLease) -> Result<PluginSession> {
    let mut command = Command::new(&config.command);
    command
        .args(&config.args)
        .env(MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE)
        .env(MIN_PORT_ENV, lease.port().to_string())
        .env(MAX_PORT_ENV, lease.port().to_string())
        .stdin(Stdio::null())
        .stdout(Stdio::piped());
    if config.managed {
        // Host owns shutdown: an abandoned session must not leave the
        // subprocess running.
        command.kill_on_drop(true);
    }

    let mut child = command.spawn().map_err(|source| Error::Spawn {
        command: config.command.clone(),
        source,
    })?;

    let stdout = child.stdout.take().ok_or_else(|| Error::Handshake {
        message: "plugin stdout was not captured".to_string(),
    })?;
    let mut lines = BufReader::new(stdout).lines();

    let line = timeout(HANDSHAKE_TIMEOUT, lines.next_line())
        .await
        .map_err(|_| Error::Timeout {
            operation: format!("handshake with {}", config.command.display()),
            duration_secs: HANDSHAKE_TIMEOUT.as_secs(),
        })?
        .map_err(Error::Io)?
        .ok_or_else(|| Error::Handshake {
            message: "plugin exited before completing the handshake".to_string(),
        })?;
    let handshake = parse_handshake(&line)?;

    tracing::debug!(
        address = %handshake.address,
        network = %handshake.network,
        "plugin handshake complete"
    );

    // Anything the plugin writes after the handshake is log output; keep
    // the pipe drained so the child never blocks on a full buffer.
    let command_name = config.command.clone();
    tokio::spawn(async move {
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::trace!(plugin = %command_name.display(), "{line}");
        }
    });

    Ok(PluginSession {
        child,
        handshake,
        lease,
        managed: config.managed,
    })
}

/// A running plugin subprocess with a negotiated RPC address.
///
/// The session owns the child process and its port lease. Managed sessions
/// kill the child when the session drops; [`PluginSession::shutdown`] does
/// the same thing explicitly and reaps the process.
#[derive(Debug)]
pub struct PluginSession {
    child: Child,
    handshake: HandshakeInfo,
    lease: PortLease,
    managed: bool,
}

impl PluginSession {
    /// The address the plugin is listening on.
    #[must_use]
    pub fn address(&self) -> &str {
        &self.handshake.address
    }

    /// The listener network, e.g. `tcp`.
    #[must_use]
    pub fn network(&self) -> &str {
        &self.handshake.network
    }

    /// The decoded handshake.
    #[must_use]
    pub const fn handshake(&self) -> &HandshakeInfo {
        &self.handshake
    }

    /// The port leased for this session.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.lease.port()
    }

    /// OS process id of the plugin, if it is still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Terminates a managed plugin and reaps it.
    ///
    /// Unmanaged sessions only wait for the plugin to exit on its own.
    pub async fn shutdown(mut self) -> Result<()> {
        if self.managed {
            self.child.kill().await?;
        } else {
            self.child.wait().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_handshake() {
        let info = parse_handshake("1|tcp|127.0.0.1:14023").unwrap();
        assert_eq!(info.protocol_version, 1);
        assert_eq!(info.network, "tcp");
        assert_eq!(info.address, "127.0.0.1:14023");
    }

    #[test]
    fn test_parse_handshake_trims_newline() {
        let info = parse_handshake("1|unix|/tmp/kiln-plugin.sock\n").unwrap();
        assert_eq!(info.network, "unix");
        assert_eq!(info.address, "/tmp/kiln-plugin.sock");
    }

    #[test]
    fn test_parse_handshake_rejects_missing_fields() {
        assert!(parse_handshake("1|tcp").is_err());
        assert!(parse_handshake("").is_err());
        assert!(parse_handshake("banana").is_err());
    }

    #[test]
    fn test_parse_handshake_rejects_version_mismatch() {
        let err = parse_handshake("9|tcp|127.0.0.1:1").unwrap_err();
        assert!(format!("{err}").contains("core protocol 9"));
    }
}
