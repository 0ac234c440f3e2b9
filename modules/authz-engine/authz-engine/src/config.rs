//! Configuration for the authorization engine.

use std::time::Duration;

use serde::Deserialize;

/// Evaluation and management settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Maximum hops followed through group membership edges. One hop
    /// reaches a subject's direct groups; groups nested in groups need more.
    pub max_group_depth: usize,

    /// Maximum hops followed up the resource ancestor chain.
    pub max_ancestor_depth: usize,

    /// Relations that link an object to its parent, in lookup order.
    pub parent_relations: Vec<String>,

    /// Grant everything to superusers and platform admins.
    pub superuser_bypass: bool,

    /// Default evaluation budget when the request carries no deadline.
    pub check_timeout_ms: u64,

    /// Require callers of management operations to hold the matching
    /// `policymanage`/`rolemanage` permission, or be a superuser.
    pub enforce_management_permissions: bool,
}

impl EngineConfig {
    #[must_use]
    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_group_depth: 1,
            max_ancestor_depth: 8,
            parent_relations: vec!["org".to_owned(), "project".to_owned()],
            superuser_bypass: true,
            check_timeout_ms: 5_000,
            enforce_management_permissions: true,
        }
    }
}

/// Bearer token authentication for the REST surface.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Authentication mode.
    pub mode: AuthMode,

    /// Identity returned in `accept_all` mode.
    pub default_identity: IdentityConfig,

    /// Static token-to-identity mappings for `static_tokens` mode.
    pub tokens: Vec<TokenMapping>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            mode: AuthMode::AcceptAll,
            default_identity: IdentityConfig::default(),
            tokens: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    /// Accept any non-empty token and return the default identity.
    #[default]
    AcceptAll,
    /// Map specific tokens to specific identities.
    StaticTokens,
}

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IdentityConfig {
    /// Principal reference, e.g. `app/user:alice` or `user:alice`.
    pub principal: String,

    /// Organization the principal acts within.
    pub org_id: Option<uuid::Uuid>,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            principal: "app/user:anonymous".to_owned(),
            org_id: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenMapping {
    /// The bearer token value to match.
    pub token: String,
    /// The identity to return when this token is presented.
    pub identity: IdentityConfig,
}

/// Data seeded at startup on top of the built-in Frontier schema.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BootstrapConfig {
    /// Extra resource namespaces and their verbs.
    pub namespaces: Vec<NamespaceDefinition>,

    /// Extra platform roles.
    pub roles: Vec<RoleDefinition>,

    /// Principals granted `admin` on the platform object.
    pub superusers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NamespaceDefinition {
    /// `service/resource`
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleDefinition {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    pub permissions: Vec<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}
