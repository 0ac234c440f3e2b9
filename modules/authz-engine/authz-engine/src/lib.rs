//! Frontier ReBAC authorization engine.
//!
//! Resources, principals and roles are nodes of one relation graph. Policies
//! materialize as rolebinding edges; a check walks the resource's ancestor
//! chain and the subject's group memberships and matches role permissions.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod api;
pub mod config;
pub mod domain;
pub mod infra;
pub mod module;

pub use config::{AuthConfig, BootstrapConfig, EngineConfig};
pub use domain::{AuthzEngineLocalClient, DomainError, Service};
pub use module::AuthzEngine;
