//! `namespace:id` identifiers for subjects, objects and resources.
//!
//! Every principal, resource and relation endpoint in the engine is addressed
//! by an [`ObjectRef`] written as `"{namespace}:{id}"`, for example
//! `app/organization:92f69c3a-...` or `app/user:alice`. Short aliases such as
//! `org` or `project` are normalized to their full namespace on construction,
//! so two refs compare equal regardless of which spelling the caller used.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Well-known namespaces seeded at bootstrap.
pub mod namespaces {
    pub const PLATFORM: &str = "app/platform";
    pub const ORGANIZATION: &str = "app/organization";
    pub const PROJECT: &str = "app/project";
    pub const GROUP: &str = "app/group";
    pub const USER: &str = "app/user";
    pub const SERVICE_USER: &str = "app/serviceuser";
    pub const SUPERUSER: &str = "app/superuser";
    pub const ROLE: &str = "app/role";
    pub const ROLE_BINDING: &str = "app/rolebinding";
}

/// Identifier of the single platform object (`app/platform:platform`).
pub const PLATFORM_ID: &str = "platform";

/// Map a short namespace alias to its full name. Unknown names pass through.
#[must_use]
pub fn resolve_namespace_alias(name: &str) -> &str {
    match name {
        "user" => namespaces::USER,
        "serviceuser" => namespaces::SERVICE_USER,
        "superuser" => namespaces::SUPERUSER,
        "group" => namespaces::GROUP,
        "org" | "organization" => namespaces::ORGANIZATION,
        "project" => namespaces::PROJECT,
        other => other,
    }
}

/// Errors produced while parsing an object reference.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ObjectRefError {
    #[error("bad object reference '{0}', expected format namespace:id")]
    Malformed(String),

    #[error("object reference '{0}' has an empty namespace")]
    EmptyNamespace(String),

    #[error("object reference '{0}' has an empty id")]
    EmptyId(String),
}

/// A `namespace:id` pair with the namespace alias already resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    namespace: String,
    id: String,
}

impl ObjectRef {
    /// Build a reference from parts, resolving namespace aliases.
    pub fn new(namespace: impl AsRef<str>, id: impl Into<String>) -> Self {
        Self {
            namespace: resolve_namespace_alias(namespace.as_ref()).to_owned(),
            id: id.into(),
        }
    }

    /// Parse `"{namespace}:{id}"`.
    ///
    /// # Errors
    ///
    /// Returns [`ObjectRefError`] when the separator is missing or repeated,
    /// or when either side is empty.
    pub fn parse(raw: &str) -> Result<Self, ObjectRefError> {
        let (namespace, id) = raw
            .split_once(':')
            .ok_or_else(|| ObjectRefError::Malformed(raw.to_owned()))?;
        if id.contains(':') {
            return Err(ObjectRefError::Malformed(raw.to_owned()));
        }
        if namespace.trim().is_empty() {
            return Err(ObjectRefError::EmptyNamespace(raw.to_owned()));
        }
        if id.trim().is_empty() {
            return Err(ObjectRefError::EmptyId(raw.to_owned()));
        }
        Ok(Self::new(namespace, id))
    }

    /// The `app/platform:platform` object.
    #[must_use]
    pub fn platform() -> Self {
        Self::new(namespaces::PLATFORM, PLATFORM_ID)
    }

    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether this reference lives in `namespace` (alias-aware).
    #[must_use]
    pub fn is_in(&self, namespace: &str) -> bool {
        self.namespace == resolve_namespace_alias(namespace)
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.id)
    }
}

impl FromStr for ObjectRef {
    type Err = ObjectRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ObjectRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ObjectRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
