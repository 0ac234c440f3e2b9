#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
//! Frontier `AuthZ` Engine SDK
//!
//! Public surface of the `authz_engine` module:
//!
//! - [`AuthzEngineClient`] - in-process API trait for consumers
//! - [`Namespace`], [`Permission`], [`Role`], [`Relation`], [`Policy`] - graph models
//! - [`CheckItem`], [`CheckPair`] - check and batch check payloads
//! - [`AuthzError`] - error taxonomy shared by the engine and its callers
//!
//! ## Usage
//!
//! ```ignore
//! use authz_engine_sdk::{AuthzEngineClient, CheckItem};
//! use frontier_security::{ObjectRef, RequestContext};
//!
//! let ctx = RequestContext::builder()
//!     .principal(ObjectRef::new("user", "alice"))
//!     .build();
//!
//! let allowed = engine
//!     .check(&ctx, "get", &ObjectRef::parse("project:p1")?)
//!     .await?;
//! ```

pub mod api;
pub mod error;
pub mod models;

pub use api::AuthzEngineClient;
pub use error::AuthzError;
pub use models::{
    CheckItem, CheckPair, Namespace, NewPolicy, NewRelation, NewRole, Permission, Policy,
    PolicyFilter, Relation, RelationFilter, Role, RoleFilter, WILDCARD_PERMISSION,
};
