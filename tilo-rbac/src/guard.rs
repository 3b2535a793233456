//! Route classification and the route guard decision function
//!
//! The same [`RouteGuard`] runs at the network edge (before a page is served)
//! and inside zone layouts (after the page loaded), so the two checkpoints
//! cannot drift apart.

use crate::config::{RbacConfig, RouteConfig, within_prefix};
use crate::impersonation::ImpersonationGrant;
use crate::roles::{Role, RoleResolver};
use crate::store::RoleStore;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Authorization category of a request path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RouteClass {
    /// Always allowed
    Public,
    /// Tilo assistant paths, reachable by every role
    TiloAssistant,
    AdminZone,
    /// Nested inside the admin zone, stricter
    CeoSubzone,
    ClientZone,
    /// Everything else; allowed by default
    Other,
}

impl fmt::Display for RouteClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RouteClass::Public => "public",
            RouteClass::TiloAssistant => "tilo-assistant",
            RouteClass::AdminZone => "admin-zone",
            RouteClass::CeoSubzone => "ceo-subzone",
            RouteClass::ClientZone => "client-zone",
            RouteClass::Other => "other",
        };
        write!(f, "{}", name)
    }
}

/// Where in the navigation a decision is taken
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Checkpoint {
    /// Network edge, before the page renders
    Edge,
    /// Admin or client zone layout, after the page loaded
    ZoneLayout,
    /// The page itself
    Page,
}

impl Checkpoint {
    pub const ALL: [Checkpoint; 3] = [Checkpoint::Edge, Checkpoint::ZoneLayout, Checkpoint::Page];
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Checkpoint::Edge => "edge",
            Checkpoint::ZoneLayout => "zone-layout",
            Checkpoint::Page => "page",
        };
        write!(f, "{}", name)
    }
}

/// Terminal outcome of a guard evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Decision {
    Allowed {
        class: RouteClass,
    },
    /// Send the caller to `location`. `detected_role` is for display on the
    /// unauthorized page only and must not feed further authorization.
    Redirected {
        class: RouteClass,
        location: String,
        detected_role: Role,
    },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed { .. })
    }

    pub fn class(&self) -> RouteClass {
        match self {
            Decision::Allowed { class } | Decision::Redirected { class, .. } => *class,
        }
    }

    fn outcome(&self) -> &'static str {
        match self {
            Decision::Allowed { .. } => "allowed",
            Decision::Redirected { .. } => "redirected",
        }
    }
}

/// Path + role → allow or redirect
#[derive(Debug, Clone)]
pub struct RouteGuard {
    routes: RouteConfig,
    audit_enabled: bool,
}

impl RouteGuard {
    pub fn new(config: &RbacConfig) -> Self {
        Self {
            routes: config.routes.clone(),
            audit_enabled: config.audit_enabled,
        }
    }

    pub fn unauthorized_path(&self) -> &str {
        &self.routes.unauthorized_path
    }

    /// Classify a path; the first matching class wins.
    ///
    /// Zone prefixes match whole path segments only.
    pub fn classify(&self, path: &str) -> RouteClass {
        let routes = &self.routes;
        if routes.public_paths.iter().any(|p| p == path) {
            RouteClass::Public
        } else if path.contains(&routes.assistant_marker) {
            RouteClass::TiloAssistant
        } else if within_prefix(path, &routes.ceo_prefix) {
            RouteClass::CeoSubzone
        } else if within_prefix(path, &routes.admin_prefix) {
            RouteClass::AdminZone
        } else if within_prefix(path, &routes.client_prefix) {
            RouteClass::ClientZone
        } else {
            RouteClass::Other
        }
    }

    /// Decide access to `path` for an already resolved role.
    ///
    /// `grant` only matters in the client zone, and only when held by an
    /// admin session.
    pub fn decide(&self, path: &str, role: &Role, grant: Option<&ImpersonationGrant>) -> Decision {
        let decision = self.evaluate(path, role, grant);
        self.log_decision(None, path, role, &decision);
        decision
    }

    /// [`RouteGuard::decide`] tagged with the checkpoint taking the decision
    pub fn check(
        &self,
        checkpoint: Checkpoint,
        path: &str,
        role: &Role,
        grant: Option<&ImpersonationGrant>,
    ) -> Decision {
        let decision = self.evaluate(path, role, grant);
        self.log_decision(Some(checkpoint), path, role, &decision);
        decision
    }

    fn evaluate(&self, path: &str, role: &Role, grant: Option<&ImpersonationGrant>) -> Decision {
        let class = self.classify(path);
        let acts_as_ceo = RoleResolver::is_equivalent(role, &Role::Ceo);

        let allowed = match class {
            RouteClass::Public | RouteClass::TiloAssistant | RouteClass::Other => true,
            // Strict: admin does not pass the CEO sub-zone
            RouteClass::CeoSubzone => acts_as_ceo,
            RouteClass::AdminZone => acts_as_ceo || *role == Role::Admin,
            RouteClass::ClientZone => {
                let impersonating = *role == Role::Admin
                    && grant.is_some_and(|g| g.acting_role == Role::Admin);
                acts_as_ceo
                    || matches!(role, Role::Client | Role::NewClient | Role::Admin)
                    || impersonating
            }
        };

        if allowed {
            Decision::Allowed { class }
        } else {
            Decision::Redirected {
                class,
                location: self.routes.unauthorized_path.clone(),
                detected_role: role.clone(),
            }
        }
    }

    fn log_decision(
        &self,
        checkpoint: Option<Checkpoint>,
        path: &str,
        role: &Role,
        decision: &Decision,
    ) {
        let checkpoint = checkpoint.map(|c| c.to_string()).unwrap_or_default();
        let class = decision.class();
        let outcome = decision.outcome();

        if !self.audit_enabled {
            debug!(%checkpoint, path = %path, role = %role, %class, outcome, "Route decision");
        } else if decision.is_allowed() {
            info!(%checkpoint, path = %path, role = %role, %class, outcome, "Route decision");
        } else {
            warn!(%checkpoint, path = %path, role = %role, %class, outcome, "Route decision");
        }
    }
}

/// Progress of one navigation through every checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationState {
    Pending,
    Allowed,
    Redirected { location: String, detected_role: Role },
}

/// Tracks checkpoint decisions for a single navigation.
///
/// The navigation is allowed only once every required checkpoint allowed it;
/// the first redirect is terminal.
#[derive(Debug, Clone)]
pub struct Navigation {
    path: String,
    required: Vec<Checkpoint>,
    passed: Vec<Checkpoint>,
    state: NavigationState,
}

impl Navigation {
    /// A navigation that must pass every checkpoint
    pub fn new(path: &str) -> Self {
        Self::with_checkpoints(path, &Checkpoint::ALL)
    }

    /// A navigation that must pass `checkpoints`; an empty list means all
    pub fn with_checkpoints(path: &str, checkpoints: &[Checkpoint]) -> Self {
        let mut required = if checkpoints.is_empty() {
            Checkpoint::ALL.to_vec()
        } else {
            checkpoints.to_vec()
        };
        required.sort();
        required.dedup();
        Self {
            path: path.to_string(),
            required,
            passed: Vec::new(),
            state: NavigationState::Pending,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    /// Record a checkpoint's decision; ignored once the navigation is terminal
    pub fn record(&mut self, checkpoint: Checkpoint, decision: &Decision) -> &NavigationState {
        if self.state != NavigationState::Pending {
            return &self.state;
        }

        match decision {
            Decision::Redirected {
                location,
                detected_role,
                ..
            } => {
                self.state = NavigationState::Redirected {
                    location: location.clone(),
                    detected_role: detected_role.clone(),
                };
            }
            Decision::Allowed { .. } => {
                if !self.passed.contains(&checkpoint) {
                    self.passed.push(checkpoint);
                }
                if self.required.iter().all(|c| self.passed.contains(c)) {
                    self.state = NavigationState::Allowed;
                }
            }
        }
        &self.state
    }
}

/// What the unauthorized page shows.
///
/// The page receives no query parameters; it re-derives the role from the
/// store using the same precedence as every other reader.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnauthorizedNotice {
    pub detected_role: Role,
    pub display_name: String,
    pub message: String,
}

impl UnauthorizedNotice {
    pub fn from_store(store: &RoleStore) -> Self {
        let role = store.get().role;
        let display_name = RoleResolver::display_name(&role);
        Self {
            message: format!(
                "Your current role ({}) does not have access to this page.",
                display_name
            ),
            detected_role: role,
            display_name,
        }
    }
}
