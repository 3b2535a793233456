//! Role store integration tests
//!
//! Storage precedence, normalization, logout and the end-to-end scenarios
//! that combine the store with the route guard.

use anyhow::Result;
use std::sync::Arc;
use tempfile::TempDir;
use tilo::prelude::*;

fn store_over(
    cookie_header: &str,
    local: Arc<dyn KeyValueStorage>,
) -> (RoleStore, Arc<CookieJar>) {
    let config = RbacConfig::default();
    let jar = Arc::new(CookieJar::from_header(
        cookie_header,
        CookieOptions::from(&config.cookie),
    ));
    (RoleStore::new(&config, jar.clone(), local), jar)
}

#[test]
fn test_set_then_get_normalizes_case() {
    let store = RoleStore::in_memory(&RbacConfig::default());
    store.set("Finance");
    assert_eq!(store.get().role.as_str(), "finance");
}

#[test]
fn test_double_clear_matches_single_clear() {
    let store = RoleStore::in_memory(&RbacConfig::default());
    store.set("admin");
    ImpersonationOverlay::new(&store).begin("client").unwrap();

    store.clear();
    let single = store.snapshot();
    store.clear();
    let double = store.snapshot();

    assert_eq!(single, double);
    assert_eq!(double.session, RoleSession::new(Role::Client, RoleSource::Default));
    assert!(double.grant.is_none());
}

#[test]
fn test_cookie_scenario_ceo_reaches_ceo_reports() {
    let config = RbacConfig::default();
    let guard = RouteGuard::new(&config);
    let (store, _) = store_over("tilo_role=CEO", Arc::new(MemoryStorage::new()));

    let context = store.snapshot();
    assert_eq!(context.session.source, RoleSource::Cookie);
    assert!(
        context
            .authorize(&guard, Checkpoint::Edge, "/admin/ceo/reports")
            .is_allowed()
    );
}

#[test]
fn test_local_store_scenario_client_redirected_from_admin() -> Result<()> {
    let config = RbacConfig::default();
    let guard = RouteGuard::new(&config);
    let local = Arc::new(MemoryStorage::new());
    local.set("tilo.role", "client")?;
    let (store, _) = store_over("", local);

    let decision = store
        .snapshot()
        .authorize(&guard, Checkpoint::Edge, "/admin/dashboard");
    match decision {
        Decision::Redirected {
            location,
            detected_role,
            ..
        } => {
            assert_eq!(location, "/unauthorized");
            assert_eq!(detected_role, Role::Client);
        }
        other => panic!("Expected redirect, got {:?}", other),
    }

    let notice = UnauthorizedNotice::from_store(&store);
    assert_eq!(notice.detected_role, Role::Client);
    assert_eq!(notice.display_name, "Client");
    Ok(())
}

#[test]
fn test_role_switch_emits_cookie_attributes() {
    let (store, jar) = store_over("", Arc::new(MemoryStorage::new()));
    store.set("Mobile CEO");

    let headers = jar.set_cookie_headers();
    let role_cookie = headers
        .iter()
        .find(|h| h.starts_with("tilo_role="))
        .expect("role cookie written");
    assert_eq!(
        role_cookie,
        "tilo_role=mobile%20ceo; Path=/; Max-Age=86400; SameSite=Lax"
    );
    assert!(store.is_mobile_demo());
}

#[test]
fn test_file_backed_local_store_survives_restart() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("local-store.json");

    {
        let (store, _) = store_over("", Arc::new(FileStorage::new(&path)));
        store.set("Legal");
    }

    // A new visit without cookies falls back to the persisted local store
    let (store, _) = store_over("", Arc::new(FileStorage::new(&path)));
    assert_eq!(
        store.get(),
        RoleSession::new(Role::Legal, RoleSource::LocalStore)
    );

    store.clear();
    let (store, _) = store_over("", Arc::new(FileStorage::new(&path)));
    assert_eq!(store.get().source, RoleSource::Default);
    Ok(())
}

#[test]
fn test_legacy_keys_kept_in_sync() -> Result<()> {
    let local = Arc::new(MemoryStorage::new());
    let (store, _) = store_over("", local.clone());

    store.set("developer");
    for key in ["tilo.role", "userRole", "role"] {
        assert_eq!(local.get(key)?.as_deref(), Some("developer"));
    }

    store.clear();
    for key in ["tilo.role", "userRole", "role"] {
        assert_eq!(local.get(key)?, None);
    }
    Ok(())
}

#[test]
fn test_capabilities_follow_session() {
    let policy = CapabilityPolicy::with_defaults();
    let store = RoleStore::in_memory(&RbacConfig::default());

    store.set("mobile ceo");
    let capabilities = store.snapshot().capabilities(&policy);
    assert!(capabilities.has_capability(Capabilities::MOBILE_DEMO));
    assert!(capabilities.has_capability(Capabilities::EXECUTIVE_DASHBOARD));

    store.set("intern");
    assert!(store.snapshot().capabilities(&policy).is_empty());
}
