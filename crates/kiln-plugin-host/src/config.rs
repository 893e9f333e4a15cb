//! Process-wide plugin configuration and the discovery pass.
//!
//! [`PluginConfig`] owns the search folders, the RPC port range, and the
//! four capability registries. [`PluginConfig::discover`] populates the
//! registries in one sequential pass; afterwards the registries are pure
//! data and safe for concurrent reads.
//!
//! Priority is scan order. The versioned installation tree (the last,
//! highest-priority folder) is scanned first under checksum enforcement,
//! then every folder is scanned flat, in ascending priority, with no
//! checksum: a manually placed plugin put there by explicit user action
//! overrides whatever the installer chose.

use crate::checksum;
use crate::describe::{self, PluginDescription, DEFAULT_DESCRIBE_TIMEOUT};
use crate::install::BinaryInstallationOptions;
use crate::locate::locate_binaries;
use crate::registry::{ComponentDescriptor, ComponentRegistry};
use kiln_core::{
    ComponentClass, ComponentKey, Error, Result, MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE,
    PLUGIN_BINARY_PREFIX,
};
use kiln_plugin_client::{PluginClient, PortAllocator};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default lower bound of the RPC port range.
pub const DEFAULT_MIN_PORT: u16 = 10_000;

/// Default upper bound of the RPC port range.
pub const DEFAULT_MAX_PORT: u16 = 25_000;

/// Environment variable overriding the plugin search folders, as a
/// platform path list (colon-separated on unix).
pub const PLUGIN_PATH_ENV: &str = "KILN_PLUGIN_PATH";

/// Search folders used when none are configured: the working directory,
/// then the per-user installation root (which, being last, is the managed
/// installation tree).
#[must_use]
pub fn default_plugin_folders() -> Vec<PathBuf> {
    if let Ok(paths) = env::var(PLUGIN_PATH_ENV) {
        return env::split_paths(&paths).collect();
    }
    let mut folders = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        folders.push(cwd);
    }
    if let Some(config_dir) = dirs::config_dir() {
        folders.push(config_dir.join("kiln").join("plugins"));
    }
    folders
}

/// Everything one successful plugin registration recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredPlugin {
    /// Canonical plugin name.
    pub name: String,
    /// Resolved binary path.
    pub path: PathBuf,
}

/// One plugin that failed introspection and was skipped.
#[derive(Debug)]
pub struct DiscoveryFailure {
    /// Canonical plugin name.
    pub plugin: String,
    /// Resolved binary path.
    pub path: PathBuf,
    /// Why registration was skipped.
    pub error: Error,
}

/// Outcome of one discovery pass.
///
/// The pass itself only returns `Err` when the search space is unreliable
/// (glob or filesystem failure). Per-plugin problems land here instead, so
/// one broken plugin never blocks unrelated plugins from registering; the
/// caller decides whether recorded failures become a user-facing error.
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    /// Plugins registered, in registration order.
    pub registered: Vec<RegisteredPlugin>,
    /// Binaries skipped by the installed-tree scanner for missing or
    /// mismatched checksums.
    pub integrity_skipped: Vec<PathBuf>,
    /// Plugins that failed introspection.
    pub failures: Vec<DiscoveryFailure>,
}

impl DiscoveryReport {
    /// `true` when every discovered plugin registered cleanly.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Process-wide plugin configuration: search folders, port range, and the
/// four capability registries.
///
/// # Examples
///
/// ```no_run
/// use kiln_plugin_host::PluginConfig;
///
/// # async fn example() -> kiln_core::Result<()> {
/// let mut config = PluginConfig::new()
///     .with_folders(vec!["/etc/kiln/plugins".into()])
///     .with_port_range(10_000, 25_000);
///
/// let report = config.discover().await?;
/// println!("{} plugins registered", report.registered.len());
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct PluginConfig {
    known_plugin_folders: Vec<PathBuf>,
    builders: ComponentRegistry,
    provisioners: ComponentRegistry,
    post_processors: ComponentRegistry,
    data_sources: ComponentRegistry,
    ports: Arc<PortAllocator>,
    describe_timeout: Duration,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginConfig {
    /// Creates a configuration with empty registries, no search folders,
    /// and the default port range.
    #[must_use]
    pub fn new() -> Self {
        Self {
            known_plugin_folders: Vec::new(),
            builders: ComponentRegistry::new(ComponentClass::Builder),
            provisioners: ComponentRegistry::new(ComponentClass::Provisioner),
            post_processors: ComponentRegistry::new(ComponentClass::PostProcessor),
            data_sources: ComponentRegistry::new(ComponentClass::DataSource),
            ports: Arc::new(PortAllocator::new(DEFAULT_MIN_PORT, DEFAULT_MAX_PORT)),
            describe_timeout: DEFAULT_DESCRIBE_TIMEOUT,
        }
    }

    /// Replaces the search folders, lowest to highest priority.
    #[must_use]
    pub fn with_folders(mut self, folders: Vec<PathBuf>) -> Self {
        self.known_plugin_folders = folders;
        self
    }

    /// Replaces the RPC port range.
    #[must_use]
    pub fn with_port_range(mut self, min: u16, max: u16) -> Self {
        self.ports = Arc::new(PortAllocator::new(min, max));
        self
    }

    /// Replaces the per-plugin introspection time limit.
    #[must_use]
    pub const fn with_describe_timeout(mut self, limit: Duration) -> Self {
        self.describe_timeout = limit;
        self
    }

    /// The configured search folders.
    #[must_use]
    pub fn known_plugin_folders(&self) -> &[PathBuf] {
        &self.known_plugin_folders
    }

    /// The builder registry.
    #[must_use]
    pub const fn builders(&self) -> &ComponentRegistry {
        &self.builders
    }

    /// The provisioner registry.
    #[must_use]
    pub const fn provisioners(&self) -> &ComponentRegistry {
        &self.provisioners
    }

    /// The post-processor registry.
    #[must_use]
    pub const fn post_processors(&self) -> &ComponentRegistry {
        &self.post_processors
    }

    /// The data source registry.
    #[must_use]
    pub const fn data_sources(&self) -> &ComponentRegistry {
        &self.data_sources
    }

    /// Discovers plugins and populates the registries.
    ///
    /// The pass is read-only with respect to the filesystem and idempotent:
    /// re-running it against an unchanged installation yields the same key
    /// set and resolved paths.
    ///
    /// # Errors
    ///
    /// Returns `Err` only for glob and filesystem failures, which make the
    /// search space itself unreliable. Everything per-plugin is recorded in
    /// the returned [`DiscoveryReport`].
    pub async fn discover(&mut self) -> Result<DiscoveryReport> {
        let mut report = DiscoveryReport::default();

        // Inside a plugin process the cookie is already set; a plugin must
        // not run its own discovery pass.
        if env::var(MAGIC_COOKIE_KEY).is_ok_and(|value| value == MAGIC_COOKIE_VALUE) {
            tracing::debug!("already inside a plugin process, skipping discovery");
            return Ok(report);
        }

        if self.known_plugin_folders.is_empty() {
            self.known_plugin_folders = default_plugin_folders();
        }

        // The last folder is the managed installation root; the same
        // convention the installer follows when it writes binaries.
        if let Some(install_root) = self.known_plugin_folders.last().cloned() {
            let options = BinaryInstallationOptions::for_host();
            self.discover_installed(&install_root, &options, &mut report)
                .await?;
        }

        // Manually placed plugins take precedence over everything the
        // installer put down. Folders are scanned in ascending priority,
        // so a later hit overwrites an earlier registration.
        for folder in self.known_plugin_folders.clone() {
            let pattern = folder.join(format!("{PLUGIN_BINARY_PREFIX}*"));
            let candidates = locate_binaries(&pattern)?;
            for (name, path) in candidates {
                if let Err(err) = which::which(&path) {
                    tracing::warn!(
                        path = %path.display(),
                        error = %err,
                        "plugin is not executable, skipping"
                    );
                    continue;
                }
                self.register_plugin(&name, &path, &mut report).await;
            }
        }

        tracing::info!(
            builders = self.builders.len(),
            provisioners = self.provisioners.len(),
            post_processors = self.post_processors.len(),
            data_sources = self.data_sources.len(),
            "plugin discovery complete"
        );
        Ok(report)
    }

    /// Scans the versioned installation tree under `root`.
    ///
    /// This is the sole trusted path for automatically installed plugins:
    /// candidates without a verifying checksum sidecar are never
    /// registered from here, however plausible their name looks.
    async fn discover_installed(
        &mut self,
        root: &Path,
        options: &BinaryInstallationOptions,
        report: &mut DiscoveryReport,
    ) -> Result<()> {
        // Three wildcard levels: source namespace / organization / name.
        let pattern = root
            .join("*")
            .join("*")
            .join("*")
            .join(format!("{PLUGIN_BINARY_PREFIX}*{}", options.filename_suffix()));
        let candidates = locate_binaries(&pattern)?;

        for (name, path) in candidates {
            if let Err(err) = checksum::verify_any(&path, &options.checksummers) {
                tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "ignoring possibly unsafe binary without a valid checksum"
                );
                report.integrity_skipped.push(path);
                continue;
            }
            self.register_plugin(&name, &path, report).await;
        }
        Ok(())
    }

    /// Introspects one verified candidate and files its components.
    ///
    /// Introspection failure skips this plugin and is recorded; it never
    /// aborts the pass.
    async fn register_plugin(&mut self, plugin: &str, path: &Path, report: &mut DiscoveryReport) {
        let description = match describe::describe_plugin(plugin, path, self.describe_timeout).await
        {
            Ok(description) => description,
            Err(error) => {
                tracing::warn!(
                    plugin,
                    path = %path.display(),
                    %error,
                    "plugin failed introspection, skipping registration"
                );
                report.failures.push(DiscoveryFailure {
                    plugin: plugin.to_string(),
                    path: path.to_path_buf(),
                    error,
                });
                return;
            }
        };

        self.register_description(plugin, path, &description);
        report.registered.push(RegisteredPlugin {
            name: plugin.to_string(),
            path: path.to_path_buf(),
        });
    }

    fn register_description(&mut self, plugin: &str, path: &Path, description: &PluginDescription) {
        Self::register_components(&mut self.builders, plugin, path, &description.builders);
        if !description.builders.is_empty() {
            tracing::info!(plugin, components = ?description.builders, "found external builders");
        }

        Self::register_components(
            &mut self.post_processors,
            plugin,
            path,
            &description.post_processors,
        );
        if !description.post_processors.is_empty() {
            tracing::info!(
                plugin,
                components = ?description.post_processors,
                "found external post-processors"
            );
        }

        Self::register_components(
            &mut self.provisioners,
            plugin,
            path,
            &description.provisioners,
        );
        if !description.provisioners.is_empty() {
            tracing::info!(
                plugin,
                components = ?description.provisioners,
                "found external provisioners"
            );
        }

        Self::register_components(&mut self.data_sources, plugin, path, &description.datasources);
        if !description.datasources.is_empty() {
            tracing::info!(
                plugin,
                components = ?description.datasources,
                "found external data sources"
            );
        }
    }

    fn register_components(
        registry: &mut ComponentRegistry,
        plugin: &str,
        path: &Path,
        components: &[String],
    ) {
        for component in components {
            let key = ComponentKey::qualified(plugin, component);
            registry.insert(
                key,
                ComponentDescriptor {
                    plugin_path: path.to_path_buf(),
                    class: registry.class(),
                    component: component.clone(),
                },
            );
        }
    }

    /// Low-level client factory: resolves `reference` and returns a
    /// deferred session descriptor sharing this configuration's port
    /// allocator. Nothing is spawned here.
    #[must_use]
    pub fn client(&self, reference: &str, args: Vec<String>) -> PluginClient {
        PluginClient::new(reference, args, Arc::clone(&self.ports))
    }

    /// Materializes a deferred client for a registered descriptor, bound
    /// to `start <class> <component>` on the descriptor's binary.
    #[must_use]
    pub fn client_for(&self, descriptor: &ComponentDescriptor) -> PluginClient {
        self.client(
            &descriptor.plugin_path.to_string_lossy(),
            descriptor.start_args(),
        )
    }

    /// Looks up a builder by composite key and materializes its client.
    pub fn builder(&self, key: &str) -> Result<PluginClient> {
        Ok(self.client_for(self.builders.get(key)?))
    }

    /// Looks up a provisioner by composite key and materializes its client.
    pub fn provisioner(&self, key: &str) -> Result<PluginClient> {
        Ok(self.client_for(self.provisioners.get(key)?))
    }

    /// Looks up a post-processor by composite key and materializes its
    /// client.
    pub fn post_processor(&self, key: &str) -> Result<PluginClient> {
        Ok(self.client_for(self.post_processors.get(key)?))
    }

    /// Looks up a data source by composite key and materializes its client.
    pub fn data_source(&self, key: &str) -> Result<PluginClient> {
        Ok(self.client_for(self.data_sources.get(key)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_config_is_empty() {
        let config = PluginConfig::new();
        assert!(config.known_plugin_folders().is_empty());
        assert!(config.builders().is_empty());
        assert!(config.provisioners().is_empty());
        assert!(config.post_processors().is_empty());
        assert!(config.data_sources().is_empty());
    }

    #[test]
    fn test_lookup_on_empty_registry_is_not_found() {
        let config = PluginConfig::new();
        let err = config.builder("amazon-ebs").unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_client_for_binds_start_subcommand() {
        let config = PluginConfig::new().with_port_range(14_500, 14_510);
        let descriptor = ComponentDescriptor {
            plugin_path: PathBuf::from("/plugins/kiln-plugin-amazon"),
            class: ComponentClass::Builder,
            component: "ebs".to_string(),
        };

        let client = config.client_for(&descriptor);
        assert_eq!(client.config().args, vec!["start", "builder", "ebs"]);
        assert_eq!(client.config().min_port, 14_500);
        assert_eq!(client.config().max_port, 14_510);
        assert!(client.config().managed);
    }

    #[test]
    fn test_default_plugin_folders_end_with_install_root() {
        // Highest priority last; that folder doubles as the managed
        // installation root.
        let folders = default_plugin_folders();
        if env::var(PLUGIN_PATH_ENV).is_err() {
            if let Some(config_dir) = dirs::config_dir() {
                assert_eq!(
                    folders.last(),
                    Some(&config_dir.join("kiln").join("plugins"))
                );
            }
        }
    }
}
