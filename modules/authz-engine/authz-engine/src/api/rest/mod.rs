//! REST surface of the authorization engine.

pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;

pub use auth::{AuthState, StaticAuthenticator};
pub use error::{ApiResult, Problem};
pub use routes::router;
