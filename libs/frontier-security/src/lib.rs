#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
pub mod context;
pub mod object_ref;

pub use context::{RequestContext, RequestContextBuilder};
pub use object_ref::{ObjectRef, ObjectRefError, PLATFORM_ID, namespaces, resolve_namespace_alias};
