//! Domain layer for the authorization engine.

pub mod batch;
pub mod bootstrap;
pub mod error;
pub mod evaluator;
pub mod local_client;
pub mod namespace_registry;
pub mod policy_store;
pub mod relation_store;
pub mod repo;
pub mod role_registry;
pub mod service;

pub use error::DomainError;
pub use local_client::AuthzEngineLocalClient;
pub use service::{CascadeSummary, Service};
