//! Out-of-process capability introspection.
//!
//! Asking an unknown binary what it provides is a trust boundary. The
//! contract is deliberately narrow: one fixed argument in, one JSON object
//! out on stdout, inside a bounded amount of time. The manifest schema is
//! the interface; nothing else the subprocess does is interpreted.

use kiln_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;

/// Subcommand a plugin must answer with its capability manifest.
pub const DESCRIBE_COMMAND: &str = "describe";

/// Default time a plugin gets to print its manifest. Introspection runs
/// once per candidate inside the sequential discovery pass, so a hung
/// plugin would otherwise stall every plugin behind it.
pub const DEFAULT_DESCRIBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Capability manifest self-reported by a plugin binary.
///
/// A name equal to [`DEFAULT_NAME`](kiln_core::DEFAULT_NAME) in any list
/// means the component registers under the bare plugin name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescription {
    /// Plugin version string, informational only.
    #[serde(default)]
    pub version: String,
    /// Plugin API version the binary was built against.
    #[serde(default)]
    pub api_version: String,
    /// Builder component names.
    #[serde(default)]
    pub builders: Vec<String>,
    /// Post-processor component names.
    #[serde(default)]
    pub post_processors: Vec<String>,
    /// Provisioner component names.
    #[serde(default)]
    pub provisioners: Vec<String>,
    /// Data source component names.
    #[serde(default)]
    pub datasources: Vec<String>,
}

impl PluginDescription {
    /// Total number of components across all four classes.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.builders.len()
            + self.post_processors.len()
            + self.provisioners.len()
            + self.datasources.len()
    }
}

/// Runs `<path> describe` and decodes the manifest from stdout.
///
/// The subprocess is awaited to completion; on timeout it is killed and
/// the expiry is reported as this plugin's introspection failure, not as a
/// failure of the whole scan.
///
/// # Errors
///
/// [`Error::Describe`] when the binary cannot be executed or exits
/// non-zero, [`Error::DescriptionDecode`] when stdout is not a valid
/// manifest, [`Error::Timeout`] when the time limit expires.
pub async fn describe_plugin(
    plugin: &str,
    path: &Path,
    limit: Duration,
) -> Result<PluginDescription> {
    tracing::debug!(plugin, path = %path.display(), "asking plugin to describe itself");

    let mut command = Command::new(path);
    command.arg(DESCRIBE_COMMAND).kill_on_drop(true);

    let output = timeout(limit, command.output())
        .await
        .map_err(|_| Error::Timeout {
            operation: format!("describe {plugin}"),
            duration_secs: limit.as_secs(),
        })?
        .map_err(|source| Error::Describe {
            plugin: plugin.to_string(),
            message: source.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Describe {
            plugin: plugin.to_string(),
            message: format!("{}: {}", output.status, stderr.trim()),
        });
    }

    serde_json::from_slice(&output.stdout).map_err(|source| Error::DescriptionDecode {
        plugin: plugin.to_string(),
        source,
    })
}
