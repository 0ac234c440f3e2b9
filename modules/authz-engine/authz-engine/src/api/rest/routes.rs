use std::sync::Arc;

use axum::routing::{delete, get, post};
use axum::{Extension, Router, middleware};

use super::auth::{AuthState, authn_middleware};
use super::handlers;
use crate::domain::Service;

/// All engine endpoints. Everything except `/health` requires a bearer token.
pub fn router(svc: Arc<Service>, auth: AuthState) -> Router {
    let api = Router::new()
        .route("/v1beta1/check", post(handlers::check))
        .route("/v1beta1/batchcheck", post(handlers::batch_check))
        .route("/v1beta1/admin/check", post(handlers::admin_check))
        .route(
            "/v1beta1/policies",
            get(handlers::list_policies).post(handlers::create_policy),
        )
        .route(
            "/v1beta1/policies/{id}",
            get(handlers::get_policy).delete(handlers::delete_policy),
        )
        .route(
            "/v1beta1/roles",
            get(handlers::list_platform_roles).post(handlers::create_platform_role),
        )
        .route(
            "/v1beta1/roles/{id}",
            get(handlers::get_role)
                .put(handlers::update_role)
                .delete(handlers::delete_role),
        )
        .route(
            "/v1beta1/organizations/{org_id}/roles",
            get(handlers::list_org_roles).post(handlers::create_org_role),
        )
        .route(
            "/v1beta1/relations",
            get(handlers::list_relations).post(handlers::create_relation),
        )
        .route(
            "/v1beta1/relations/{relation}/object/{object}/subject/{subject}",
            delete(handlers::delete_relation),
        )
        .route("/v1beta1/namespaces", get(handlers::list_namespaces))
        .route("/v1beta1/namespaces/{id}", get(handlers::get_namespace))
        .route(
            "/v1beta1/permissions",
            get(handlers::list_permissions).post(handlers::create_permission),
        )
        .route(
            "/v1beta1/permissions/{key}",
            get(handlers::get_permission).delete(handlers::delete_permission),
        )
        .route("/v1beta1/entities/{entity}", delete(handlers::delete_entity))
        .route_layer(middleware::from_fn_with_state(auth, authn_middleware))
        .layer(Extension(svc));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(api)
}
