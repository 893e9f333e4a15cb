//! Checksum sidecar verification for installed plugin binaries.
//!
//! The installer writes every binary with a sibling digest file named after
//! the binary plus an uppercase algorithm suffix (`_SHA256SUM`). Discovery
//! admits a binary from the versioned installation tree only when one of
//! the configured algorithms finds a matching sidecar. Several algorithms
//! can be configured at once so an installation survives a checksum
//! algorithm migration without being re-downloaded.

use kiln_core::{Error, Result};
use sha2::{Digest, Sha256};
use std::ffi::OsStr;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

/// A checksum algorithm with its canonical sidecar extension.
///
/// Digest state is created fresh per file, so verifying many candidates
/// concurrently needs no shared mutable state.
///
/// # Examples
///
/// ```
/// use kiln_plugin_host::ChecksumAlgorithm;
///
/// let algo = ChecksumAlgorithm::Sha256;
/// assert_eq!(algo.name(), "sha256");
/// assert_eq!(algo.file_ext(), "_SHA256SUM");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    /// SHA-256, the algorithm the installer currently writes.
    Sha256,
}

impl ChecksumAlgorithm {
    /// Algorithms tried, in order, when admitting installed binaries.
    pub const DEFAULT: &'static [Self] = &[Self::Sha256];

    /// Lowercase algorithm identifier.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Sha256 => "sha256",
        }
    }

    /// Canonical sidecar extension: `_` + uppercase identifier + `SUM`.
    #[must_use]
    pub const fn file_ext(self) -> &'static str {
        match self {
            Self::Sha256 => "_SHA256SUM",
        }
    }

    /// Path of the digest sidecar for `binary`.
    #[must_use]
    pub fn sidecar_path(self, binary: &Path) -> PathBuf {
        let mut file_name = binary
            .file_name()
            .map_or_else(Default::default, OsStr::to_os_string);
        file_name.push(self.file_ext());
        binary.with_file_name(file_name)
    }

    /// Reads the expected digest from the sidecar: the first
    /// whitespace-delimited token, lowercased.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChecksumMissing`] when the sidecar is absent,
    /// unreadable, or empty.
    pub fn expected_digest(self, binary: &Path) -> Result<String> {
        let sidecar = self.sidecar_path(binary);
        let contents = fs::read_to_string(&sidecar).map_err(|_| Error::ChecksumMissing {
            path: binary.to_path_buf(),
        })?;
        contents
            .split_whitespace()
            .next()
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| Error::ChecksumMissing {
                path: binary.to_path_buf(),
            })
    }

    /// Computes the digest of `path`'s bytes as lowercase hex.
    pub fn digest_file(self, path: &Path) -> Result<String> {
        match self {
            Self::Sha256 => {
                let mut file = File::open(path)?;
                let mut hasher = Sha256::new();
                let mut buf = [0u8; 64 * 1024];
                loop {
                    let n = file.read(&mut buf)?;
                    if n == 0 {
                        break;
                    }
                    hasher.update(&buf[..n]);
                }
                Ok(format!("{:x}", hasher.finalize()))
            }
        }
    }

    /// Verifies `binary` against its sidecar with this algorithm.
    ///
    /// # Errors
    ///
    /// [`Error::ChecksumMissing`] when no sidecar exists,
    /// [`Error::ChecksumMismatch`] when the digests differ.
    pub fn verify_file(self, binary: &Path) -> Result<()> {
        let expected = self.expected_digest(binary)?;
        let actual = self.digest_file(binary)?;
        if expected == actual {
            Ok(())
        } else {
            Err(Error::ChecksumMismatch {
                path: binary.to_path_buf(),
                algorithm: self.name(),
                expected,
                actual,
            })
        }
    }
}

/// Verifies `binary` with the first algorithm whose sidecar is present and
/// matches.
///
/// # Errors
///
/// Returns the last algorithm's failure when none succeeds, or
/// [`Error::ChecksumMissing`] when `algorithms` is empty.
pub fn verify_any(binary: &Path, algorithms: &[ChecksumAlgorithm]) -> Result<()> {
    let mut last_err = None;
    for algorithm in algorithms {
        match algorithm.verify_file(binary) {
            Ok(()) => return Ok(()),
            Err(err) => {
                tracing::trace!(
                    path = %binary.display(),
                    algorithm = algorithm.name(),
                    error = %err,
                    "checksum verification attempt failed"
                );
                last_err = Some(err);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| Error::ChecksumMissing {
        path: binary.to_path_buf(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // sha256("hello world") and sha256("") are fixed vectors.
    const HELLO_DIGEST: &str =
        "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
    const EMPTY_DIGEST: &str =
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn test_digest_file_known_vectors() {
        let dir = TempDir::new().unwrap();
        let hello = dir.path().join("hello");
        fs::write(&hello, "hello world").unwrap();
        assert_eq!(
            ChecksumAlgorithm::Sha256.digest_file(&hello).unwrap(),
            HELLO_DIGEST
        );

        let empty = dir.path().join("empty");
        fs::write(&empty, "").unwrap();
        assert_eq!(
            ChecksumAlgorithm::Sha256.digest_file(&empty).unwrap(),
            EMPTY_DIGEST
        );
    }

    #[test]
    fn test_sidecar_path_appends_extension() {
        let sidecar =
            ChecksumAlgorithm::Sha256.sidecar_path(Path::new("/p/kiln-plugin-amazon_v1.2.3"));
        assert_eq!(
            sidecar,
            PathBuf::from("/p/kiln-plugin-amazon_v1.2.3_SHA256SUM")
        );
    }

    #[test]
    fn test_verify_file_matching_sidecar() {
        let dir = TempDir::new().unwrap();
        let binary = dir.path().join("kiln-plugin-good");
        fs::write(&binary, "hello world").unwrap();
        fs::write(
            ChecksumAlgorithm::Sha256.sidecar_path(&binary),
            format!("{HELLO_DIGEST}  kiln-plugin-good\n"),
        )
        .unwrap();

        ChecksumAlgorithm::Sha256.verify_file(&binary).unwrap();
    }

    #[test]
    fn test_verify_file_mismatch() {
        let dir = TempDir::new().unwrap();
        let binary = dir.path().join("kiln-plugin-tampered");
        fs::write(&binary, "tampered contents").unwrap();
        fs::write(
            ChecksumAlgorithm::Sha256.sidecar_path(&binary),
            format!("{HELLO_DIGEST}\n"),
        )
        .unwrap();

        let err = ChecksumAlgorithm::Sha256.verify_file(&binary).unwrap_err();
        assert!(err.is_integrity_error());
        assert!(matches!(err, Error::ChecksumMismatch { .. }));
    }

    #[test]
    fn test_verify_file_missing_sidecar() {
        let dir = TempDir::new().unwrap();
        let binary = dir.path().join("kiln-plugin-bare");
        fs::write(&binary, "no sidecar here").unwrap();

        let err = ChecksumAlgorithm::Sha256.verify_file(&binary).unwrap_err();
        assert!(matches!(err, Error::ChecksumMissing { .. }));
    }

    #[test]
    fn test_expected_digest_takes_first_token_lowercased() {
        let dir = TempDir::new().unwrap();
        let binary = dir.path().join("kiln-plugin-upper");
        fs::write(&binary, "x").unwrap();
        fs::write(
            ChecksumAlgorithm::Sha256.sidecar_path(&binary),
            "ABCDEF0123  some-filename-annotation\n",
        )
        .unwrap();

        assert_eq!(
            ChecksumAlgorithm::Sha256.expected_digest(&binary).unwrap(),
            "abcdef0123"
        );
    }

    #[test]
    fn test_empty_sidecar_counts_as_missing() {
        let dir = TempDir::new().unwrap();
        let binary = dir.path().join("kiln-plugin-blank");
        fs::write(&binary, "x").unwrap();
        fs::write(ChecksumAlgorithm::Sha256.sidecar_path(&binary), "  \n").unwrap();

        let err = ChecksumAlgorithm::Sha256.verify_file(&binary).unwrap_err();
        assert!(matches!(err, Error::ChecksumMissing { .. }));
    }

    #[test]
    fn test_verify_any_succeeds_when_one_algorithm_matches() {
        let dir = TempDir::new().unwrap();
        let binary = dir.path().join("kiln-plugin-ok");
        fs::write(&binary, "hello world").unwrap();
        fs::write(
            ChecksumAlgorithm::Sha256.sidecar_path(&binary),
            HELLO_DIGEST,
        )
        .unwrap();

        verify_any(&binary, ChecksumAlgorithm::DEFAULT).unwrap();
    }

    #[test]
    fn test_verify_any_with_no_algorithms() {
        let dir = TempDir::new().unwrap();
        let binary = dir.path().join("kiln-plugin-none");
        fs::write(&binary, "x").unwrap();

        let err = verify_any(&binary, &[]).unwrap_err();
        assert!(matches!(err, Error::ChecksumMissing { .. }));
    }
}
