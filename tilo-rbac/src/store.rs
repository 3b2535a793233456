//! The role store: the single source of truth for the current role

use crate::config::{CookieConfig, LocalStoreConfig, RbacConfig};
use crate::cookie::{CookieJar, CookieOptions};
use crate::error::RbacError;
use crate::impersonation::ImpersonationGrant;
use crate::roles::{Role, RoleResolver};
use crate::session::{RoleSession, RoleSource, SessionContext};
use crate::storage::{KeyValueStorage, MemoryStorage};
use chrono::Utc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

type RbacResult<T> = std::result::Result<T, RbacError>;

/// Reads and writes the current role across the role cookie and the
/// persistent local store.
///
/// Read precedence is cookie, then the canonical local key, then the legacy
/// local keys, then the configured default role. Reads never fail: a storage
/// location that errors is logged and skipped.
///
/// Every read and write holds the store lock, so a concurrent reader never
/// observes a half-applied `set` or `clear`. Each mutation publishes a fresh
/// [`SessionContext`] to subscribers before returning.
pub struct RoleStore {
    cookies: Arc<dyn KeyValueStorage>,
    local: Arc<dyn KeyValueStorage>,
    cookie_config: CookieConfig,
    local_config: LocalStoreConfig,
    default_role: Role,
    lock: Arc<Mutex<()>>,
    notifier: watch::Sender<SessionContext>,
}

impl RoleStore {
    pub fn new(
        config: &RbacConfig,
        cookies: Arc<dyn KeyValueStorage>,
        local: Arc<dyn KeyValueStorage>,
    ) -> Self {
        let default_role = RoleResolver::normalize(&config.default_role);
        let (notifier, _) = watch::channel(SessionContext {
            session: RoleSession::new(default_role.clone(), RoleSource::Default),
            grant: None,
            mobile_demo: false,
        });

        let store = Self {
            cookies,
            local,
            cookie_config: config.cookie.clone(),
            local_config: config.local_store.clone(),
            default_role,
            lock: Arc::new(Mutex::new(())),
            notifier,
        };

        let initial = {
            let _guard = store.acquire();
            store.snapshot_locked()
        };
        store.notifier.send_replace(initial);
        store
    }

    /// Serialize this store with every other store sharing `lock`.
    ///
    /// Stores built per request over the same client's storage need a common
    /// lock for their multi-key writes to stay atomic.
    pub fn with_lock(mut self, lock: Arc<Mutex<()>>) -> Self {
        self.lock = lock;
        self
    }

    /// A store over a fresh cookie jar and in-memory local store
    pub fn in_memory(config: &RbacConfig) -> Self {
        let cookies = Arc::new(CookieJar::new(CookieOptions::from(&config.cookie)));
        Self::new(config, cookies, Arc::new(MemoryStorage::new()))
    }

    /// Current role and where it came from
    pub fn get(&self) -> RoleSession {
        let _guard = self.acquire();
        self.read_session_locked()
    }

    /// Persist `role` (normalized) to every location.
    ///
    /// Also sets the mobile demo flag for `mobile ceo` and removes it for any
    /// other role. Switching away from `admin` ends an active impersonation.
    /// Failed writes are logged; the returned session reflects what a
    /// subsequent read will see.
    pub fn set(&self, role: &str) -> RoleSession {
        let role = RoleResolver::normalize(role);
        let _guard = self.acquire();

        self.write(
            self.cookies.as_ref(),
            &self.cookie_config.role_cookie,
            role.as_str(),
        );
        for key in self.local_role_keys() {
            self.write(self.local.as_ref(), key, role.as_str());
        }

        let mobile_key = &self.local_config.mobile_demo_key;
        if role == Role::MobileCeo {
            self.write(self.local.as_ref(), mobile_key, "true");
        } else {
            self.delete(self.local.as_ref(), mobile_key);
        }

        if role != Role::Admin {
            self.delete(self.cookies.as_ref(), &self.cookie_config.grant_cookie);
        }

        let snapshot = self.snapshot_locked();
        info!(role = %role, source = %snapshot.session.source, "Role switched");
        let session = snapshot.session.clone();
        self.notifier.send_replace(snapshot);
        session
    }

    /// Remove the role, the demo flag and any impersonation grant from every
    /// location. Clearing an empty store is a no-op.
    pub fn clear(&self) {
        let _guard = self.acquire();

        self.delete(self.cookies.as_ref(), &self.cookie_config.role_cookie);
        self.delete(self.cookies.as_ref(), &self.cookie_config.grant_cookie);
        for key in self.local_role_keys() {
            self.delete(self.local.as_ref(), key);
        }
        self.delete(self.local.as_ref(), &self.local_config.mobile_demo_key);

        let snapshot = self.snapshot_locked();
        debug!(role = %snapshot.session.role, "Role store cleared");
        self.notifier.send_replace(snapshot);
    }

    /// Whether the mobile CEO demo flag is set
    pub fn is_mobile_demo(&self) -> bool {
        let _guard = self.acquire();
        self.read_mobile_demo_locked()
    }

    /// Single consistent read of role, grant and demo flag
    pub fn snapshot(&self) -> SessionContext {
        let _guard = self.acquire();
        self.snapshot_locked()
    }

    /// Receive a new [`SessionContext`] after every mutation
    pub fn subscribe(&self) -> watch::Receiver<SessionContext> {
        self.notifier.subscribe()
    }

    pub fn default_role(&self) -> &Role {
        &self.default_role
    }

    /// Store a grant for `target`, provided the session is exactly `admin`
    pub(crate) fn issue_grant(&self, target: Role) -> RbacResult<ImpersonationGrant> {
        let _guard = self.acquire();

        let session = self.read_session_locked();
        if session.role != Role::Admin {
            return Err(RbacError::NotAdmin {
                role: session.role.to_string(),
            });
        }

        let grant = ImpersonationGrant::new(target);
        let value = serde_json::to_string(&grant)?;
        self.cookies.set(&self.cookie_config.grant_cookie, &value)?;

        self.notifier.send_replace(self.snapshot_locked());
        Ok(grant)
    }

    pub(crate) fn revoke_grant(&self) {
        let _guard = self.acquire();
        self.delete(self.cookies.as_ref(), &self.cookie_config.grant_cookie);
        self.notifier.send_replace(self.snapshot_locked());
    }

    fn acquire(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn local_role_keys(&self) -> impl Iterator<Item = &String> {
        std::iter::once(&self.local_config.role_key).chain(&self.local_config.legacy_role_keys)
    }

    fn snapshot_locked(&self) -> SessionContext {
        let session = self.read_session_locked();
        let grant = if session.role == Role::Admin {
            self.read_grant_locked()
        } else {
            None
        };
        SessionContext {
            session,
            grant,
            mobile_demo: self.read_mobile_demo_locked(),
        }
    }

    fn read_session_locked(&self) -> RoleSession {
        if let Some(role) = self.read(self.cookies.as_ref(), &self.cookie_config.role_cookie) {
            return RoleSession::new(role, RoleSource::Cookie);
        }

        for key in self.local_role_keys() {
            if let Some(role) = self.read(self.local.as_ref(), key) {
                return RoleSession::new(role, RoleSource::LocalStore);
            }
        }

        RoleSession::new(self.default_role.clone(), RoleSource::Default)
    }

    fn read_mobile_demo_locked(&self) -> bool {
        match self.local.get(&self.local_config.mobile_demo_key) {
            Ok(value) => value.is_some_and(|v| v == "true"),
            Err(e) => {
                warn!(error = %e, "Failed to read mobile demo flag");
                false
            }
        }
    }

    fn read_grant_locked(&self) -> Option<ImpersonationGrant> {
        let raw = match self.cookies.get(&self.cookie_config.grant_cookie) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(error = %e, "Failed to read impersonation grant");
                return None;
            }
        };

        let grant: ImpersonationGrant = match serde_json::from_str(&raw) {
            Ok(grant) => grant,
            Err(e) => {
                warn!(error = %e, "Ignoring malformed impersonation grant");
                return None;
            }
        };

        if grant.is_expired(self.cookie_config.max_age_seconds, Utc::now()) {
            debug!(grant = %grant.id, "Ignoring expired impersonation grant");
            return None;
        }
        Some(grant)
    }

    fn read(&self, storage: &dyn KeyValueStorage, key: &str) -> Option<Role> {
        match storage.get(key) {
            Ok(Some(value)) if !value.trim().is_empty() => Some(RoleResolver::normalize(&value)),
            Ok(_) => None,
            Err(e) => {
                warn!(key = %key, error = %e, "Role storage unavailable, skipping");
                None
            }
        }
    }

    fn write(&self, storage: &dyn KeyValueStorage, key: &str, value: &str) {
        if let Err(e) = storage.set(key, value) {
            warn!(key = %key, error = %e, "Failed to write role storage");
        }
    }

    fn delete(&self, storage: &dyn KeyValueStorage, key: &str) {
        if let Err(e) = storage.remove(key) {
            warn!(key = %key, error = %e, "Failed to clear role storage");
        }
    }
}
