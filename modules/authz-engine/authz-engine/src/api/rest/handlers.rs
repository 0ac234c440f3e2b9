use std::sync::Arc;

use authz_engine_sdk::{PolicyFilter, RelationFilter, RoleFilter};
use axum::Json;
use axum::extract::{Extension, Path, Query};
use frontier_security::RequestContext;
use http::{HeaderMap, StatusCode};
use tracing::field::{Empty, display};
use tracing::info;
use uuid::Uuid;

use super::dto::{
    AdminCheckRequest, BatchCheckRequest, BatchCheckResponse, CascadeResponse, CheckRequest,
    CheckResponse, CreatePermissionRequest, CreatePolicyRequest, CreateRelationRequest,
    CreateRoleRequest, NamespaceResponse, NamespacesResponse, PermissionQuery, PermissionResponse,
    PermissionsResponse, PoliciesResponse, PolicyResponse, RelationQuery, RelationResponse,
    RelationsResponse, RoleResponse, RolesResponse, parse_ref, scopes_from_query,
};
use super::error::ApiResult;
use crate::domain::Service;

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Copy the `x-request-id` header onto the current span's `request_id` field.
fn record_request_id(headers: &HeaderMap) {
    if let Some(id) = headers.get("x-request-id").and_then(|v| v.to_str().ok()) {
        tracing::Span::current().record("request_id", display(id));
    }
}

// ----------------------------------------------------------------------------
// Checks
// ----------------------------------------------------------------------------

#[tracing::instrument(
    skip_all,
    fields(permission = %req.permission, resource = %req.resource, request_id = Empty)
)]
pub async fn check(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    headers: HeaderMap,
    Json(req): Json<CheckRequest>,
) -> ApiResult<Json<CheckResponse>> {
    record_request_id(&headers);
    let item = req.into_item()?;
    let status = svc.check(&ctx, &item.permission, &item.resource).await?;
    Ok(Json(CheckResponse { status }))
}

#[tracing::instrument(skip_all, fields(items = req.bodies.len(), request_id = Empty))]
pub async fn batch_check(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    headers: HeaderMap,
    Json(req): Json<BatchCheckRequest>,
) -> ApiResult<Json<BatchCheckResponse>> {
    record_request_id(&headers);
    let items = req
        .bodies
        .into_iter()
        .map(CheckRequest::into_item)
        .collect::<Result<Vec<_>, _>>()?;
    let pairs = svc.batch_check(&ctx, items).await?;
    Ok(Json(BatchCheckResponse {
        pairs: pairs.into_iter().map(Into::into).collect(),
    }))
}

#[tracing::instrument(
    skip_all,
    fields(subject = %req.subject, permission = %req.permission, resource = %req.resource)
)]
pub async fn admin_check(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Json(req): Json<AdminCheckRequest>,
) -> ApiResult<Json<CheckResponse>> {
    let subject = parse_ref(&req.subject)?;
    let resource = parse_ref(&req.resource)?;
    let status = svc
        .admin_check(&ctx, &subject, &req.permission, &resource)
        .await?;
    Ok(Json(CheckResponse { status }))
}

// ----------------------------------------------------------------------------
// Policies
// ----------------------------------------------------------------------------

pub async fn list_policies(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Query(filter): Query<PolicyFilter>,
) -> ApiResult<Json<PoliciesResponse>> {
    let policies = svc.list_policies(&ctx, &filter).await?;
    Ok(Json(PoliciesResponse { policies }))
}

#[tracing::instrument(skip_all, fields(role = %req.role_id, resource = %req.resource))]
pub async fn create_policy(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Json(req): Json<CreatePolicyRequest>,
) -> ApiResult<(StatusCode, Json<PolicyResponse>)> {
    let policy = svc.create_policy(&ctx, req.into_new_policy()?).await?;
    info!(policy_id = %policy.id, "policy created via REST");
    Ok((StatusCode::CREATED, Json(PolicyResponse { policy })))
}

pub async fn get_policy(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PolicyResponse>> {
    let policy = svc.get_policy(&ctx, id).await?;
    Ok(Json(PolicyResponse { policy }))
}

pub async fn delete_policy(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    svc.delete_policy(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------------
// Roles
// ----------------------------------------------------------------------------

pub async fn list_platform_roles(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Query(query): Query<Vec<(String, String)>>,
) -> ApiResult<Json<RolesResponse>> {
    let filter = RoleFilter {
        scopes: scopes_from_query(&query),
        ..RoleFilter::default()
    };
    let roles = svc.list_roles(&ctx, &filter).await?;
    Ok(Json(RolesResponse { roles }))
}

pub async fn list_org_roles(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Path(org_id): Path<Uuid>,
    Query(query): Query<Vec<(String, String)>>,
) -> ApiResult<Json<RolesResponse>> {
    let filter = RoleFilter {
        scopes: scopes_from_query(&query),
        org_id: Some(org_id),
        include_platform: false,
    };
    let roles = svc.list_roles(&ctx, &filter).await?;
    Ok(Json(RolesResponse { roles }))
}

pub async fn create_platform_role(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Json(req): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let role = svc.create_role(&ctx, req.into_new_role(None)).await?;
    Ok((StatusCode::CREATED, Json(RoleResponse { role })))
}

pub async fn create_org_role(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Path(org_id): Path<Uuid>,
    Json(req): Json<CreateRoleRequest>,
) -> ApiResult<(StatusCode, Json<RoleResponse>)> {
    let role = svc.create_role(&ctx, req.into_new_role(Some(org_id))).await?;
    Ok((StatusCode::CREATED, Json(RoleResponse { role })))
}

pub async fn get_role(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<String>,
) -> ApiResult<Json<RoleResponse>> {
    let role = svc.get_role(&ctx, &id, ctx.org_id()).await?;
    Ok(Json(RoleResponse { role }))
}

pub async fn update_role(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<Uuid>,
    Json(req): Json<CreateRoleRequest>,
) -> ApiResult<Json<RoleResponse>> {
    // the owning organization is kept by the registry
    let role = svc.update_role(&ctx, id, req.into_new_role(None)).await?;
    Ok(Json(RoleResponse { role }))
}

pub async fn delete_role(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    svc.delete_role(&ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------------
// Relations
// ----------------------------------------------------------------------------

pub async fn list_relations(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Query(query): Query<RelationQuery>,
) -> ApiResult<Json<RelationsResponse>> {
    let filter = RelationFilter {
        subject: query.subject.as_deref().map(parse_ref).transpose()?,
        relation: query.relation,
        object: query.object.as_deref().map(parse_ref).transpose()?,
    };
    let relations = svc.list_relations(&ctx, &filter).await?;
    Ok(Json(RelationsResponse { relations }))
}

pub async fn create_relation(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Json(req): Json<CreateRelationRequest>,
) -> ApiResult<(StatusCode, Json<RelationResponse>)> {
    let relation = svc.create_relation(&ctx, req.into_new_relation()?).await?;
    Ok((StatusCode::CREATED, Json(RelationResponse { relation })))
}

pub async fn delete_relation(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Path((relation, object, subject)): Path<(String, String, String)>,
) -> ApiResult<StatusCode> {
    let object = parse_ref(&object)?;
    let subject = parse_ref(&subject)?;
    svc.delete_relation(&ctx, &subject, &relation, &object)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------------
// Namespaces and permissions
// ----------------------------------------------------------------------------

pub async fn list_namespaces(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
) -> ApiResult<Json<NamespacesResponse>> {
    let namespaces = svc.list_namespaces(&ctx).await?;
    Ok(Json(NamespacesResponse { namespaces }))
}

pub async fn get_namespace(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<String>,
) -> ApiResult<Json<NamespaceResponse>> {
    let namespace = svc.get_namespace(&ctx, &id).await?;
    Ok(Json(NamespaceResponse { namespace }))
}

pub async fn list_permissions(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Query(query): Query<PermissionQuery>,
) -> ApiResult<Json<PermissionsResponse>> {
    let permissions = svc
        .list_permissions(&ctx, query.namespace.as_deref())
        .await?;
    Ok(Json(PermissionsResponse { permissions }))
}

pub async fn create_permission(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Json(req): Json<CreatePermissionRequest>,
) -> ApiResult<(StatusCode, Json<PermissionResponse>)> {
    let permission = svc
        .create_permission(&ctx, &req.namespace, &req.verb, req.title)
        .await?;
    Ok((StatusCode::CREATED, Json(PermissionResponse { permission })))
}

pub async fn get_permission(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Path(key): Path<String>,
) -> ApiResult<Json<PermissionResponse>> {
    let permission = svc.get_permission(&ctx, &key).await?;
    Ok(Json(PermissionResponse { permission }))
}

pub async fn delete_permission(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Path(key): Path<String>,
) -> ApiResult<StatusCode> {
    svc.delete_permission(&ctx, &key).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ----------------------------------------------------------------------------
// Entities
// ----------------------------------------------------------------------------

#[tracing::instrument(skip_all, fields(entity = %entity))]
pub async fn delete_entity(
    Extension(ctx): Extension<RequestContext>,
    Extension(svc): Extension<Arc<Service>>,
    Path(entity): Path<String>,
) -> ApiResult<Json<CascadeResponse>> {
    let entity = parse_ref(&entity)?;
    let summary = svc.delete_entity(&ctx, &entity).await?;
    Ok(Json(summary.into()))
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use tower::ServiceExt;

    use crate::{AuthConfig, AuthzEngine, BootstrapConfig, EngineConfig};

    async fn post(uri: &str, body: serde_json::Value) -> http::StatusCode {
        let engine = AuthzEngine::init(&EngineConfig::default(), &BootstrapConfig::default())
            .await
            .unwrap();
        let router = engine
            .router(&AuthConfig::default(), Duration::from_secs(30))
            .unwrap();
        let req = http::Request::builder()
            .method(http::Method::POST)
            .uri(uri)
            .header(http::header::AUTHORIZATION, "Bearer tok")
            .header(http::header::CONTENT_TYPE, "application/json")
            .header("x-request-id", "req-42")
            .body(Body::from(body.to_string()))
            .unwrap();
        router.oneshot(req).await.unwrap().status()
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn check_span_carries_the_request_id() {
        let status = post(
            "/v1beta1/check",
            serde_json::json!({"permission": "get", "resource": "project:p1"}),
        )
        .await;
        assert_eq!(status, http::StatusCode::OK);
        assert!(logs_contain("request_id=req-42"));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn batch_check_span_carries_the_request_id() {
        let status = post(
            "/v1beta1/batchcheck",
            serde_json::json!({"bodies": [{"permission": "get", "resource": "project:p1"}]}),
        )
        .await;
        assert_eq!(status, http::StatusCode::OK);
        assert!(logs_contain("request_id=req-42"));
    }
}
