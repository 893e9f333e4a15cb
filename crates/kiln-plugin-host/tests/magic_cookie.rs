//! Discovery must be a no-op inside a plugin process.
//!
//! Kept in its own integration binary: the test mutates this process's
//! environment, and no other test may observe that.

#![cfg(unix)]

use kiln_core::{MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE};
use kiln_plugin_host::PluginConfig;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use tempfile::TempDir;

#[tokio::test]
async fn cookie_short_circuits_discovery() {
    let folder = TempDir::new().unwrap();
    let path = folder.path().join("kiln-plugin-visible");
    fs::write(
        &path,
        "#!/bin/sh\necho '{\"builders\": [\"x\"]}'\n",
    )
    .unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();

    // SAFETY: this is the only test in this binary, so nothing else reads
    // the environment concurrently.
    unsafe {
        std::env::set_var(MAGIC_COOKIE_KEY, MAGIC_COOKIE_VALUE);
    }

    let mut config = PluginConfig::new().with_folders(vec![folder.path().to_path_buf()]);
    let report = config.discover().await.unwrap();

    assert!(report.registered.is_empty());
    assert!(config.builders().is_empty());
}
