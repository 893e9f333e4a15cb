//! Binary location: glob expansion and canonical name extraction.
//!
//! A search pattern looks like `<folder>/kiln-plugin-*` (flat folders) or
//! `<root>/*/*/*/kiln-plugin-*_x1.0_linux_x86_64` (the versioned
//! installation tree). The locator expands the pattern, filters out
//! everything that cannot be a plugin binary, and derives each match's
//! canonical plugin name from its filename.

use crate::checksum::ChecksumAlgorithm;
use kiln_core::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Executable extension stripped from filenames before name extraction.
pub const EXECUTABLE_EXTENSION: &str = ".exe";

/// Expands `pattern` and returns canonical plugin name to absolute path.
///
/// Filtering rules, applied in order to every match:
///
/// 1. Directories are skipped (SDK support folders can match the glob).
/// 2. On Windows, matches without the executable extension are skipped.
/// 3. Matches whose filename contains a checksum sidecar suffix are
///    skipped, case-insensitively.
/// 4. A trailing executable extension is stripped.
/// 5. The name is the filename minus the pattern's literal prefix,
///    truncated at the first `_` (managed installs qualify filenames with
///    `_<version>_x<api>_<os>_<arch>`).
///
/// Matches are processed in lexicographic order, so when several versions
/// of one plugin share an unmanaged folder the lexicographically last one
/// wins. That is a best-effort fallback only (`v0.2.9` sorts after
/// `v0.2.10`); the versioned installation tree is the supported way to pin
/// exactly one version per plugin.
///
/// # Errors
///
/// Returns [`Error::Pattern`] for malformed patterns and for filesystem
/// errors hit while reading matches; the search space is unreliable at
/// that point, so callers abort discovery.
pub fn locate_binaries(pattern: &Path) -> Result<BTreeMap<String, PathBuf>> {
    let pattern_str = pattern.to_string_lossy();
    let prefix = literal_prefix(&pattern_str)?;

    let mut matches = glob::glob(&pattern_str)
        .map_err(|source| Error::Pattern {
            pattern: pattern_str.clone().into_owned(),
            source: Box::new(source),
        })?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|source| Error::Pattern {
            pattern: pattern_str.clone().into_owned(),
            source: Box::new(source),
        })?;
    matches.sort();

    let mut found = BTreeMap::new();
    for candidate in matches {
        if candidate.is_dir() {
            tracing::trace!(path = %candidate.display(), "ignoring directory match");
            continue;
        }
        let Some(file_name) = candidate.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if cfg!(windows)
            && !file_name
                .to_ascii_lowercase()
                .ends_with(EXECUTABLE_EXTENSION)
        {
            tracing::trace!(path = %candidate.display(), "ignoring match without exe extension");
            continue;
        }
        if is_checksum_sidecar(file_name) {
            tracing::trace!(
                path = %candidate.display(),
                "ignoring match which looks to be a checksum file"
            );
            continue;
        }

        let mut base = file_name;
        if let Some(idx) = base.find(EXECUTABLE_EXTENSION) {
            base = &base[..idx];
        }
        let Some(qualified) = base.strip_prefix(prefix.as_str()) else {
            continue;
        };
        let name = qualified.split('_').next().unwrap_or(qualified).to_string();

        let path = candidate
            .canonicalize()
            .unwrap_or_else(|_| candidate.clone());
        tracing::debug!(plugin = %name, path = %path.display(), "discovered potential plugin");
        found.insert(name, path);
    }

    Ok(found)
}

/// The literal part of the pattern's file name, up to its first wildcard.
fn literal_prefix(pattern: &str) -> Result<String> {
    let base = Path::new(pattern)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    base.find('*').map_or_else(
        || {
            Err(Error::Pattern {
                pattern: pattern.to_string(),
                source: "pattern has no wildcard in its file name".into(),
            })
        },
        |idx| Ok(base[..idx].to_string()),
    )
}

/// `true` when the filename carries any configured checksum suffix,
/// compared case-insensitively.
fn is_checksum_sidecar(file_name: &str) -> bool {
    let upper = file_name.to_ascii_uppercase();
    ChecksumAlgorithm::DEFAULT
        .iter()
        .any(|algorithm| upper.contains(algorithm.file_ext()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, "binary").unwrap();
        path
    }

    #[test]
    fn test_name_is_substring_before_first_underscore() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "kiln-plugin-amazon_v1.2.3_x1.0_linux_x86_64");
        touch(dir.path(), "kiln-plugin-docker");

        let found = locate_binaries(&dir.path().join("kiln-plugin-*")).unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.contains_key("amazon"));
        assert!(found.contains_key("docker"));
    }

    #[test]
    fn test_exe_extension_is_stripped_before_extraction() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "kiln-plugin-azure.exe");

        let found = locate_binaries(&dir.path().join("kiln-plugin-*")).unwrap();
        assert!(found.contains_key("azure"));
    }

    #[test]
    fn test_checksum_sidecars_are_never_binaries() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "kiln-plugin-amazon");
        touch(dir.path(), "kiln-plugin-amazon_SHA256SUM");
        touch(dir.path(), "kiln-plugin-other_sha256sum");

        let found = locate_binaries(&dir.path().join("kiln-plugin-*")).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("amazon"));
    }

    #[test]
    fn test_directories_are_skipped() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("kiln-plugin-sdk")).unwrap();
        touch(dir.path(), "kiln-plugin-real");

        let found = locate_binaries(&dir.path().join("kiln-plugin-*")).unwrap();
        assert_eq!(found.len(), 1);
        assert!(found.contains_key("real"));
    }

    #[test]
    fn test_lexicographically_last_version_wins() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "kiln-plugin-amazon_v0.1.0");
        let newer = touch(dir.path(), "kiln-plugin-amazon_v0.2.0");

        let found = locate_binaries(&dir.path().join("kiln-plugin-*")).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["amazon"], newer.canonicalize().unwrap());
    }

    #[test]
    fn test_returned_paths_are_absolute() {
        let dir = TempDir::new().unwrap();
        touch(dir.path(), "kiln-plugin-local");

        let found = locate_binaries(&dir.path().join("kiln-plugin-*")).unwrap();
        assert!(found["local"].is_absolute());
    }

    #[test]
    fn test_pattern_without_wildcard_is_rejected() {
        let err = locate_binaries(Path::new("/nonexistent/kiln-plugin-exact")).unwrap_err();
        assert!(matches!(err, Error::Pattern { .. }));
    }

    #[test]
    fn test_empty_folder_yields_empty_map() {
        let dir = TempDir::new().unwrap();
        let found = locate_binaries(&dir.path().join("kiln-plugin-*")).unwrap();
        assert!(found.is_empty());
    }
}
