use std::fmt;

use crate::error::Error;

/// Canonical identity of a watchable resource: `group/version/resource/namespace/name`.
///
/// An empty `namespace` segment means "all namespaces"; an empty `name` segment
/// means "no name filter". Equality and ordering are byte-exact over the
/// formatted string, so a `ResourceKey` is cheap to use as a map key or inside
/// a sorted `Vec` without a bespoke `Ord` impl walking the five fields.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Build a key from its five components, none of which may themselves
    /// contain a `/`.
    pub fn new(group: &str, version: &str, resource: &str, namespace: &str, name: &str) -> Self {
        Self(format!("{group}/{version}/{resource}/{namespace}/{name}"))
    }

    /// Parse the wire format `group/version/resource/namespace/name`.
    ///
    /// Returns [`Error::InvalidResourceKey`] unless the string splits into
    /// exactly five `/`-separated fields (namespace and name may be empty).
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let fields: Vec<&str> = raw.split('/').collect();
        if fields.len() != 5 {
            return Err(Error::InvalidResourceKey(raw.to_string()));
        }
        Ok(Self(raw.to_string()))
    }

    /// The five `/`-separated fields: `[group, version, resource, namespace, name]`.
    pub fn fields(&self) -> [&str; 5] {
        let mut parts = self.0.splitn(5, '/');
        let group = parts.next().unwrap_or_default();
        let version = parts.next().unwrap_or_default();
        let resource = parts.next().unwrap_or_default();
        let namespace = parts.next().unwrap_or_default();
        let name = parts.next().unwrap_or_default();
        [group, version, resource, namespace, name]
    }

    pub fn group(&self) -> &str {
        self.fields()[0]
    }

    pub fn version(&self) -> &str {
        self.fields()[1]
    }

    pub fn resource(&self) -> &str {
        self.fields()[2]
    }

    /// `None` means "watch all namespaces".
    pub fn namespace(&self) -> Option<&str> {
        let ns = self.fields()[3];
        if ns.is_empty() {
            None
        } else {
            Some(ns)
        }
    }

    /// `None` means "no name filter".
    pub fn name(&self) -> Option<&str> {
        let name = self.fields()[4];
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ResourceKey> for String {
    fn from(key: ResourceKey) -> Self {
        key.0
    }
}
