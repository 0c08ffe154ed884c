use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Secret fields attached to a node instance (tokens, keys, passwords).
///
/// `Debug` never prints values, so a credentials map can sit inside any
/// struct that gets logged.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(BTreeMap<String, String>);

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Non-empty value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(|v| v.is_empty())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Rewrite every value through `resolve`, e.g. to expand `env:NAME` references.
    pub fn resolve_with<F>(&mut self, mut resolve: F)
    where
        F: FnMut(&str) -> Option<String>,
    {
        for value in self.0.values_mut() {
            if let Some(resolved) = resolve(value) {
                *value = resolved;
            }
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.0.keys().map(|k| (k, "<redacted>")))
            .finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Credentials {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_output_hides_values() {
        let creds = Credentials::new().with("token", "xoxb-secret");
        let printed = format!("{:?}", creds);
        assert!(printed.contains("token"));
        assert!(!printed.contains("xoxb-secret"));
    }

    #[test]
    fn empty_values_are_absent() {
        let creds = Credentials::new().with("user", "").with("password", "pw");
        assert!(!creds.has("user"));
        assert_eq!(creds.get("password"), Some("pw"));
    }
}
