//! Session and unauthorized-page endpoints

use crate::error::Result;
use crate::server::AppState;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tilo_rbac::prelude::*;
use tracing::warn;

/// Body of `POST /session/role`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSwitchRequest {
    pub role: String,
}

/// Body of `POST /session/impersonate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpersonateRequest {
    pub target_role: String,
}

/// What the UI needs to render for the current session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionView {
    pub session: RoleSession,
    pub display_name: String,
    pub grant: Option<ImpersonationGrant>,
    pub mobile_demo: bool,
    pub capabilities: CapabilitySet,
}

impl SessionView {
    fn new(context: &SessionContext, policy: &CapabilityPolicy) -> Self {
        Self {
            session: context.session.clone(),
            display_name: RoleResolver::display_name(context.role()),
            grant: context.grant.clone(),
            mobile_demo: context.mobile_demo,
            capabilities: context.capabilities(policy),
        }
    }
}

/// Placeholder page body; real pages are merged in through the builder
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageView {
    pub path: String,
    pub role: Role,
    pub class: RouteClass,
}

/// `GET /unauthorized`
pub async fn unauthorized(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<UnauthorizedNotice> {
    let (store, _) = state.store_for(&headers);
    Json(UnauthorizedNotice::from_store(&store))
}

/// `GET /session`
pub async fn current_session(
    State(state): State<Arc<AppState>>,
    Extension(context): Extension<SessionContext>,
) -> Json<SessionView> {
    Json(SessionView::new(&context, &state.policy))
}

/// `POST /session/role`
pub async fn switch_role(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<RoleSwitchRequest>,
) -> Response {
    let (store, jar) = state.store_for(&headers);
    store.set(&body.role);
    let view = SessionView::new(&store.snapshot(), &state.policy);
    with_cookies(&jar, Json(view))
}

/// `POST /session/logout`
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let (store, jar) = state.store_for(&headers);
    store.clear();
    with_cookies(&jar, StatusCode::NO_CONTENT)
}

/// `POST /session/impersonate`
pub async fn begin_impersonation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ImpersonateRequest>,
) -> Result<Response> {
    let (store, jar) = state.store_for(&headers);
    let grant = ImpersonationOverlay::new(&store).begin(&body.target_role)?;
    Ok(with_cookies(&jar, Json(grant)))
}

/// `DELETE /session/impersonate`
pub async fn end_impersonation(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Response {
    let (store, jar) = state.store_for(&headers);
    ImpersonationOverlay::new(&store).end();
    with_cookies(&jar, StatusCode::NO_CONTENT)
}

/// Fallback for paths with no registered page
pub async fn page(
    State(state): State<Arc<AppState>>,
    Extension(context): Extension<SessionContext>,
    uri: Uri,
) -> Json<PageView> {
    let path = uri.path().to_string();
    Json(PageView {
        class: state.guard.classify(&path),
        role: context.session.role,
        path,
    })
}

/// Attach the jar's pending `Set-Cookie` headers to a response
fn with_cookies(jar: &CookieJar, body: impl IntoResponse) -> Response {
    let mut response = body.into_response();
    for cookie in jar.set_cookie_headers() {
        match HeaderValue::from_str(&cookie) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!(error = %e, "Dropping unencodable Set-Cookie header"),
        }
    }
    response
}
