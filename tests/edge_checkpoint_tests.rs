//! Integration tests for the HTTP edge checkpoint
//!
//! Requests go through the full router (edge middleware included) with
//! `tower::ServiceExt::oneshot`, no socket involved.

use anyhow::Result;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use axum::routing::get;
use serde_json::{Value, json};
use std::sync::Arc;
use tilo::prelude::*;
use tilo::server::handlers::SessionView;
use tower::ServiceExt;

fn app_with_local(local: Arc<MemoryStorage>) -> Router {
    let pages = Router::new().route("/admin/dashboard", get(|| async { "admin dashboard" }));
    DashboardServer::builder()
        .with_config(RbacConfig::default())
        .with_local_store(local)
        .with_pages(pages)
        .build()
        .expect("valid server config")
        .router()
}

fn app() -> Router {
    app_with_local(Arc::new(MemoryStorage::new()))
}

fn get_request(path: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method("GET").uri(path);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

fn json_request(method: &str, path: &str, cookie: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: Response) -> Result<Value> {
    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn test_ceo_cookie_reaches_ceo_zone() -> Result<()> {
    let response = app()
        .oneshot(get_request("/admin/ceo/reports", Some("tilo_role=CEO")))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let page = body_json(response).await?;
    assert_eq!(page["role"], "ceo");
    assert_eq!(page["class"], "ceo-subzone");
    Ok(())
}

#[tokio::test]
async fn test_denied_request_redirects_without_query() -> Result<()> {
    let response = app()
        .oneshot(get_request("/admin/dashboard?tab=agents", Some("tilo_role=hr")))
        .await?;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/unauthorized");
    Ok(())
}

#[tokio::test]
async fn test_local_store_role_redirected_and_reported() -> Result<()> {
    let local = Arc::new(MemoryStorage::new());
    ScopedStorage::new(local.clone(), "client-a").set("tilo.role", "client")?;
    let app = app_with_local(local);

    let response = app
        .clone()
        .oneshot(get_request("/admin/dashboard", Some("tilo_client=client-a")))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app
        .oneshot(get_request("/unauthorized", Some("tilo_client=client-a")))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let notice = body_json(response).await?;
    assert_eq!(notice["detected_role"], "client");
    assert_eq!(notice["display_name"], "Client");
    Ok(())
}

#[tokio::test]
async fn test_role_switch_stays_with_its_client() -> Result<()> {
    let app = app();

    // Client A switches to admin without sending any cookie
    let response = app
        .clone()
        .oneshot(json_request("POST", "/session/role", None, json!({ "role": "admin" })))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let client_cookie = set_cookies(&response)
        .into_iter()
        .find(|c| c.starts_with("tilo_client="))
        .expect("client cookie issued");
    let client_a = client_cookie.split(';').next().unwrap_or_default().to_string();

    // Client B never switched and has no cookies
    let response = app
        .clone()
        .oneshot(get_request("/admin/dashboard", None))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app.clone().oneshot(get_request("/session", None)).await?;
    let view: SessionView = serde_json::from_value(body_json(response).await?)?;
    assert_eq!(view.session, RoleSession::new(Role::Client, RoleSource::Default));

    // Client A keeps its role through the local store alone
    let response = app
        .oneshot(get_request("/session", Some(&client_a)))
        .await?;
    let view: SessionView = serde_json::from_value(body_json(response).await?)?;
    assert_eq!(view.session, RoleSession::new(Role::Admin, RoleSource::LocalStore));
    Ok(())
}

#[tokio::test]
async fn test_registered_page_served_to_admin() -> Result<()> {
    let response = app()
        .oneshot(get_request("/admin/dashboard", Some("tilo_role=admin")))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = to_bytes(response.into_body(), usize::MAX).await?;
    assert_eq!(&bytes[..], b"admin dashboard");
    Ok(())
}

#[tokio::test]
async fn test_assistant_reachable_without_session() -> Result<()> {
    let response = app().oneshot(get_request("/client/tilo-chat", None)).await?;
    assert_eq!(response.status(), StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_role_switch_sets_cookie() -> Result<()> {
    let response = app()
        .oneshot(json_request(
            "POST",
            "/session/role",
            None,
            json!({ "role": "Mobile CEO" }),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    let expected = "tilo_role=mobile%20ceo; Path=/; Max-Age=86400; SameSite=Lax";
    assert!(cookies.iter().any(|c| c == expected));

    let view: SessionView = serde_json::from_value(body_json(response).await?)?;
    assert_eq!(view.session.role, Role::MobileCeo);
    assert!(view.mobile_demo);
    assert_eq!(view.display_name, "Mobile CEO");
    assert!(view.capabilities.has_capability(Capabilities::VIEW_FINANCIALS));
    Ok(())
}

#[tokio::test]
async fn test_session_view_uses_request_cookie() -> Result<()> {
    let response = app()
        .oneshot(get_request("/session", Some("tilo_role=Legal")))
        .await?;
    let view: SessionView = serde_json::from_value(body_json(response).await?)?;

    assert_eq!(view.session, RoleSession::new(Role::Legal, RoleSource::Cookie));
    assert!(view.grant.is_none());
    Ok(())
}

#[tokio::test]
async fn test_logout_expires_cookies_and_local_store() -> Result<()> {
    let local = Arc::new(MemoryStorage::new());
    let client_a = ScopedStorage::new(local.clone(), "client-a");
    let client_b = ScopedStorage::new(local.clone(), "client-b");
    client_a.set("tilo.role", "admin")?;
    client_b.set("tilo.role", "finance")?;
    let app = app_with_local(local);

    let response = app
        .oneshot(json_request(
            "POST",
            "/session/logout",
            Some("tilo_client=client-a; tilo_role=admin"),
            json!({}),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let cookies = set_cookies(&response);
    let expired = |name: &str| {
        cookies
            .iter()
            .any(|c| c.starts_with(&format!("{}=;", name)) && c.contains("Max-Age=0"))
    };
    assert!(expired("tilo_role"));
    assert!(expired("tilo_impersonation"));

    assert_eq!(client_a.get("tilo.role")?, None);
    assert_eq!(client_b.get("tilo.role")?.as_deref(), Some("finance"));
    Ok(())
}

#[tokio::test]
async fn test_impersonation_requires_admin() -> Result<()> {
    let response = app()
        .oneshot(json_request(
            "POST",
            "/session/impersonate",
            Some("tilo_role=hr"),
            json!({ "target_role": "client" }),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert!(set_cookies(&response).is_empty());

    let error = body_json(response).await?;
    assert!(error["error"].as_str().unwrap_or_default().contains("admin"));
    Ok(())
}

#[tokio::test]
async fn test_admin_impersonation_round_trip() -> Result<()> {
    let app = app();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/session/impersonate",
            Some("tilo_role=admin"),
            json!({ "target_role": "New Client" }),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    let grant_cookie = set_cookies(&response)
        .into_iter()
        .find(|c| c.starts_with("tilo_impersonation="))
        .expect("grant cookie written");
    let pair = grant_cookie.split(';').next().unwrap_or_default().to_string();

    let grant = body_json(response).await?;
    assert_eq!(grant["target_role"], "new client");
    assert_eq!(grant["acting_role"], "admin");

    // The grant travels with the role cookie
    let cookie = format!("tilo_role=admin; {}", pair);
    let response = app
        .clone()
        .oneshot(get_request("/session", Some(&cookie)))
        .await?;
    let view: SessionView = serde_json::from_value(body_json(response).await?)?;
    assert_eq!(view.grant.map(|g| g.target_role), Some(Role::NewClient));

    // Still no way into the CEO sub-zone
    let response = app
        .clone()
        .oneshot(get_request("/admin/ceo/board", Some(&cookie)))
        .await?;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/session/impersonate")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert!(
        set_cookies(&response)
            .iter()
            .any(|c| c.starts_with("tilo_impersonation=;"))
    );
    Ok(())
}

#[test]
fn test_builder_rejects_invalid_config() {
    let mut config = RbacConfig::default();
    config.routes.unauthorized_path = "/client/denied".to_string();

    let result = DashboardServer::builder().with_config(config).build();
    assert!(matches!(
        result,
        Err(ServerError::Rbac(RbacError::Configuration(_)))
    ));
}
