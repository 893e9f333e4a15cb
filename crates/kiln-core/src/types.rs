//! Strong domain types for the capability registries.
//!
//! Capability lookups are stringly-typed at the template boundary, so the
//! newtype pattern keeps registry keys from being confused with plugin
//! names or component names along the way.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// The four capability classes a plugin binary can provide.
///
/// Each class has its own registry namespace; the same composite key can
/// exist in several classes without ambiguity. [`ComponentClass::as_str`]
/// yields the spelling used in the `start <class> <name>` subcommand.
///
/// # Examples
///
/// ```
/// use kiln_core::ComponentClass;
///
/// assert_eq!(ComponentClass::Builder.as_str(), "builder");
/// assert_eq!(ComponentClass::PostProcessor.as_str(), "post-processor");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentClass {
    /// Produces machine images.
    Builder,
    /// Configures a running machine during a build.
    Provisioner,
    /// Transforms build artifacts after the fact.
    PostProcessor,
    /// Fetches external data for template interpolation.
    #[serde(rename = "datasource")]
    DataSource,
}

impl ComponentClass {
    /// Every capability class, in registration order.
    pub const ALL: [Self; 4] = [
        Self::Builder,
        Self::Provisioner,
        Self::PostProcessor,
        Self::DataSource,
    ];

    /// Returns the subcommand spelling of this class.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Builder => "builder",
            Self::Provisioner => "provisioner",
            Self::PostProcessor => "post-processor",
            Self::DataSource => "datasource",
        }
    }
}

impl fmt::Display for ComponentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Composite registry key addressing one capability of one plugin.
///
/// Keys are derived, not free-form: a component named with the reserved
/// [`DEFAULT_NAME`](crate::DEFAULT_NAME) sentinel collapses to the bare
/// plugin name, any other component is hyphen-joined onto it.
///
/// # Examples
///
/// ```
/// use kiln_core::{ComponentKey, DEFAULT_NAME};
///
/// let ebs = ComponentKey::qualified("amazon", "ebs");
/// assert_eq!(ebs.as_str(), "amazon-ebs");
///
/// let bare = ComponentKey::qualified("amazon", DEFAULT_NAME);
/// assert_eq!(bare.as_str(), "amazon");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentKey(String);

impl ComponentKey {
    /// Creates a key from an already-derived string, e.g. one read back
    /// from a template.
    #[inline]
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Derives the key for `component` of `plugin`, collapsing the
    /// default-name sentinel to the bare plugin name.
    #[must_use]
    pub fn qualified(plugin: &str, component: &str) -> Self {
        if component == crate::DEFAULT_NAME {
            Self(plugin.to_string())
        } else {
            Self(format!("{plugin}-{component}"))
        }
    }

    /// Returns the key as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the key and returns the inner `String`.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ComponentKey {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<String> for ComponentKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ComponentKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DEFAULT_NAME;

    #[test]
    fn test_class_subcommand_spellings() {
        assert_eq!(ComponentClass::Builder.as_str(), "builder");
        assert_eq!(ComponentClass::Provisioner.as_str(), "provisioner");
        assert_eq!(ComponentClass::PostProcessor.as_str(), "post-processor");
        assert_eq!(ComponentClass::DataSource.as_str(), "datasource");
    }

    #[test]
    fn test_class_serde_round_trip() {
        for class in ComponentClass::ALL {
            let json = serde_json::to_string(&class).unwrap();
            assert_eq!(json, format!("\"{}\"", class.as_str()));
            let back: ComponentClass = serde_json::from_str(&json).unwrap();
            assert_eq!(back, class);
        }
    }

    #[test]
    fn test_qualified_key_is_hyphen_joined() {
        let key = ComponentKey::qualified("amazon", "ebs");
        assert_eq!(key.as_str(), "amazon-ebs");
    }

    #[test]
    fn test_default_name_collapses_to_plugin_name() {
        let key = ComponentKey::qualified("ansible", DEFAULT_NAME);
        assert_eq!(key.as_str(), "ansible");
    }

    #[test]
    fn test_key_display_and_into_inner() {
        let key = ComponentKey::new("docker-import");
        assert_eq!(format!("{key}"), "docker-import");
        assert_eq!(key.into_inner(), "docker-import");
    }

    #[test]
    fn test_key_borrows_as_str() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(ComponentKey::qualified("amazon", "ebs"), 1);
        assert_eq!(map.get("amazon-ebs"), Some(&1));
    }
}
