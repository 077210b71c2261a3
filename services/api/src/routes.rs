//! API service routes

use auth::{
    Principal,
    models::{
        ActivityQuery, CreateApiKeyRequest, IssuedSession, LoginCredentials, NewRole, NewUser,
        NotificationDraft, NotificationQuery, Permission, RoleAssignment,
    },
};
use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    middleware,
    response::IntoResponse,
    routing::{MethodRouter, delete, get, post, put},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde_json::json;
use time::OffsetDateTime;
use tracing::info;
use uuid::Uuid;

use crate::{
    error::{ApiError, ApiResult},
    middleware::{
        Gate, SESSION_COOKIE, client_info, require_auth, require_permission, require_session,
    },
    models::{
        RecentQuery, SessionResponse,
        inventory::{AssetKind, AssetQuery, NewAsset, UpdateAsset},
    },
    state::AppState,
};

/// Create the router for the API service
pub fn create_router(state: AppState) -> Router {
    let session_routes = Router::new()
        .route("/auth/refresh", post(refresh))
        .route("/auth/me", get(me))
        .route("/user/api-keys", get(list_api_keys).post(create_api_key))
        .route("/user/api-keys/permissions", get(permission_catalog))
        .route("/user/api-keys/:id", delete(revoke_api_key))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_session,
        ));

    let protected_routes = Router::new()
        .route(
            "/user/notifications",
            gated(&state, get(list_notifications), Permission::ReadNotifications).merge(gated(
                &state,
                post(create_notification),
                Permission::WriteNotifications,
            )),
        )
        .route(
            "/user/notifications/unread-count",
            gated(&state, get(unread_count), Permission::ReadNotifications),
        )
        .route(
            "/user/notifications/read-all",
            gated(&state, put(mark_all_read), Permission::WriteNotifications),
        )
        .route(
            "/user/notifications/:id/read",
            gated(&state, put(mark_read), Permission::WriteNotifications),
        )
        .route(
            "/user/notifications/:id",
            gated(&state, delete(delete_notification), Permission::WriteNotifications),
        )
        .route(
            "/activity",
            gated(&state, get(search_activity), Permission::ReadActivity),
        )
        .route(
            "/activity/recent",
            gated(&state, get(recent_activity), Permission::ReadActivity),
        )
        .route(
            "/role",
            gated(&state, get(list_roles), Permission::ReadRoles).merge(gated(
                &state,
                post(create_role),
                Permission::WriteRoles,
            )),
        )
        .route(
            "/role/assign",
            gated(&state, post(assign_role), Permission::WriteRoles),
        )
        .route(
            "/role/unassign",
            gated(&state, post(unassign_role), Permission::WriteRoles),
        )
        .route(
            "/role/:id",
            gated(&state, delete(delete_role), Permission::WriteRoles),
        )
        .nest("/device/server", asset_routes(&state, AssetKind::Server))
        .nest("/vm", asset_routes(&state, AssetKind::Vm))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/health", get(health_check))
        .route("/auth/register", post(register))
        .route("/auth/login/password", post(login))
        .route("/auth/logout", post(logout))
        .merge(session_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// Require any of one permission on a single method. The check runs after
/// authentication and before the handler's extractors.
fn gated(
    state: &AppState,
    method: MethodRouter<AppState>,
    required: Permission,
) -> MethodRouter<AppState> {
    method.route_layer(middleware::from_fn_with_state(
        Gate {
            evaluator: state.evaluator,
            required: vec![required],
        },
        require_permission,
    ))
}

fn asset_routes(state: &AppState, kind: AssetKind) -> Router<AppState> {
    let read = kind.read_permission();
    let write = kind.write_permission();

    Router::new()
        .route(
            "/",
            gated(state, get(list_assets), read).merge(gated(state, post(create_asset), write)),
        )
        .route(
            "/:id",
            gated(state, get(get_asset), read)
                .merge(gated(state, put(update_asset), write))
                .merge(gated(state, delete(delete_asset), kind.delete_permission())),
        )
        .layer(Extension(kind))
}

/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "service": "api-service"
    }))
}

fn session_cookie(issued: &IssuedSession, secure: bool) -> Cookie<'static> {
    let expires = OffsetDateTime::from_unix_timestamp(issued.cookie_expires_at.timestamp())
        .unwrap_or(OffsetDateTime::UNIX_EPOCH);

    Cookie::build((SESSION_COOKIE, issued.token.clone()))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure)
        .expires(expires)
        .build()
}

fn cleared_cookie(secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, ""))
        .http_only(true)
        .path("/")
        .same_site(SameSite::Lax)
        .secure(secure)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}

// Accounts and sessions

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<NewUser>,
) -> ApiResult<impl IntoResponse> {
    let profile = state.accounts.register(payload).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(payload): Json<LoginCredentials>,
) -> ApiResult<impl IntoResponse> {
    let issued = state
        .accounts
        .login(payload, &client_info(&headers))
        .await?;
    info!("User logged in: {}", issued.user_id);

    let cookie = session_cookie(&issued, state.sessions.config().cookie_secure);
    Ok((
        jar.add(cookie),
        Json(SessionResponse {
            user_id: issued.user_id,
            message: "Login successful".to_string(),
        }),
    ))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> ApiResult<impl IntoResponse> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
        .ok_or_else(|| ApiError::BadRequest("Session token not found".to_string()))?;

    state.sessions.delete_session(&token).await?;

    let cookie = cleared_cookie(state.sessions.config().cookie_secure);
    Ok((jar.add(cookie), Json(json!({ "message": "Logged out" }))))
}

pub async fn refresh(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    jar: CookieJar,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let issued = state
        .sessions
        .refresh_session(principal.user_id, &client_info(&headers))
        .await?;

    let cookie = session_cookie(&issued, state.sessions.config().cookie_secure);
    Ok((
        jar.add(cookie),
        Json(SessionResponse {
            user_id: issued.user_id,
            message: "Session refreshed".to_string(),
        }),
    ))
}

pub async fn me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.accounts.me(principal.user_id).await?))
}

// API keys

pub async fn list_api_keys(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.api_keys.list(principal.user_id).await?))
}

pub async fn create_api_key(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<CreateApiKeyRequest>,
) -> ApiResult<impl IntoResponse> {
    let created = state.api_keys.create(&principal, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn revoke_api_key(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.api_keys.revoke(principal.user_id, id).await?;
    Ok(Json(json!({ "message": "API key revoked" })))
}

pub async fn permission_catalog() -> impl IntoResponse {
    Json(Permission::catalog())
}

// Notifications

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state.notifications.list(principal.user_id, &query).await?,
    ))
}

pub async fn create_notification(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<NotificationDraft>,
) -> ApiResult<impl IntoResponse> {
    let notification = state
        .notifications
        .create(principal.user_id, payload)
        .await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

pub async fn unread_count(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<impl IntoResponse> {
    let count = state.notifications.unread_count(principal.user_id).await?;
    Ok(Json(json!({ "count": count })))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.notifications.mark_read(id, principal.user_id).await?;
    Ok(Json(json!({ "message": "Notification marked as read" })))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
) -> ApiResult<impl IntoResponse> {
    let updated = state.notifications.mark_all_read(principal.user_id).await?;
    Ok(Json(json!({ "updated": updated })))
}

pub async fn delete_notification(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.notifications.delete(id, principal.user_id).await?;
    Ok(Json(json!({ "message": "Notification deleted" })))
}

// Activity

pub async fn search_activity(
    State(state): State<AppState>,
    Query(query): Query<ActivityQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.activity.search(&query).await?))
}

pub async fn recent_activity(
    State(state): State<AppState>,
    Query(query): Query<RecentQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.activity.recent(query.limit).await?))
}

// Roles

pub async fn list_roles(
    State(state): State<AppState>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.roles.list().await?))
}

pub async fn create_role(
    State(state): State<AppState>,
    Json(payload): Json<NewRole>,
) -> ApiResult<impl IntoResponse> {
    Ok((StatusCode::CREATED, Json(state.roles.create(payload).await?)))
}

pub async fn delete_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.roles.delete(id).await?;
    Ok(Json(json!({ "message": "Role deleted" })))
}

pub async fn assign_role(
    State(state): State<AppState>,
    Json(payload): Json<RoleAssignment>,
) -> ApiResult<impl IntoResponse> {
    Ok((StatusCode::CREATED, Json(state.roles.assign(payload).await?)))
}

pub async fn unassign_role(
    State(state): State<AppState>,
    Json(payload): Json<RoleAssignment>,
) -> ApiResult<impl IntoResponse> {
    state.roles.unassign(payload).await?;
    Ok(Json(json!({ "message": "Role unassigned" })))
}

// Servers and VMs

pub async fn list_assets(
    State(state): State<AppState>,
    Extension(kind): Extension<AssetKind>,
    Query(query): Query<AssetQuery>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.inventory.list(kind, &query).await?))
}

pub async fn get_asset(
    State(state): State<AppState>,
    Extension(kind): Extension<AssetKind>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(state.inventory.get(kind, id).await?))
}

pub async fn create_asset(
    State(state): State<AppState>,
    Extension(kind): Extension<AssetKind>,
    Extension(principal): Extension<Principal>,
    Json(payload): Json<NewAsset>,
) -> ApiResult<impl IntoResponse> {
    let asset = state
        .inventory
        .create(kind, payload, principal.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(asset)))
}

pub async fn update_asset(
    State(state): State<AppState>,
    Extension(kind): Extension<AssetKind>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateAsset>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(
        state
            .inventory
            .update(kind, id, payload, principal.user_id)
            .await?,
    ))
}

pub async fn delete_asset(
    State(state): State<AppState>,
    Extension(kind): Extension<AssetKind>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<Uuid>,
) -> ApiResult<impl IntoResponse> {
    state.inventory.delete(kind, id, principal.user_id).await?;
    Ok(Json(json!({ "message": format!("{} deleted", kind.label()) })))
}
