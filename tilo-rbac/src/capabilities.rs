//! Capability sets and the static per-role capability policy

use crate::config::{RbacConfig, RoleConfig};
use crate::error::RbacError;
use crate::roles::{Role, RoleResolver};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

type RbacResult<T> = std::result::Result<T, RbacError>;

/// Feature flags understood by the dashboard
pub struct Capabilities;

impl Capabilities {
    pub const VIEW_DASHBOARD: &'static str = "view_dashboard";
    pub const EXECUTIVE_DASHBOARD: &'static str = "executive_dashboard";
    pub const AGENT_MONITORING: &'static str = "agent_monitoring";
    pub const MANAGE_AGENTS: &'static str = "manage_agents";
    pub const VIEW_REPORTS: &'static str = "view_reports";
    pub const EXPORT_REPORTS: &'static str = "export_reports";
    pub const VIEW_FINANCIALS: &'static str = "view_financials";
    pub const MANAGE_CLIENTS: &'static str = "manage_clients";
    pub const IMPERSONATE: &'static str = "impersonate";
    pub const ROI_CALCULATOR: &'static str = "roi_calculator";
    pub const FEASIBILITY_CALCULATOR: &'static str = "feasibility_calculator";
    pub const CLIENT_INTAKE: &'static str = "client_intake";
    pub const TILO_ASSISTANT: &'static str = "tilo_assistant";
    pub const MOBILE_DEMO: &'static str = "mobile_demo";
}

/// Restriction tags. A restriction `no_<capability>` excludes `<capability>`.
pub struct Restrictions;

impl Restrictions {
    pub const NO_EXPORT: &'static str = "no_export_reports";
    pub const NO_REPORTS: &'static str = "no_view_reports";
    pub const NO_FINANCIALS: &'static str = "no_view_financials";
    pub const NO_AGENT_CONTROL: &'static str = "no_manage_agents";

    /// The restriction tag that excludes `capability`
    pub fn for_capability(capability: &str) -> String {
        format!("no_{}", capability)
    }

    /// The capability excluded by `restriction`, if it follows the naming rule
    pub fn excluded_capability(restriction: &str) -> Option<&str> {
        restriction.strip_prefix("no_")
    }
}

/// A visible navigation entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub label: String,
    pub path: String,
}

impl MenuEntry {
    pub fn new(label: &str, path: &str) -> Self {
        Self {
            label: label.to_string(),
            path: path.to_string(),
        }
    }
}

/// Capabilities, menu entries and restrictions held by one role
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    capabilities: BTreeSet<String>,
    menu: Vec<MenuEntry>,
    restrictions: BTreeSet<String>,
}

impl CapabilitySet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(mut self, capabilities: &[&str]) -> Self {
        self.capabilities
            .extend(capabilities.iter().map(|c| c.to_string()));
        self
    }

    pub fn with_restrictions(mut self, restrictions: &[&str]) -> Self {
        self.restrictions
            .extend(restrictions.iter().map(|r| r.to_string()));
        self
    }

    pub fn with_menu_entry(mut self, label: &str, path: &str) -> Self {
        self.menu.push(MenuEntry::new(label, path));
        self
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.contains(capability)
    }

    pub fn has_restriction(&self, restriction: &str) -> bool {
        self.restrictions.contains(restriction)
    }

    pub fn capabilities(&self) -> impl Iterator<Item = &str> {
        self.capabilities.iter().map(String::as_str)
    }

    pub fn restrictions(&self) -> impl Iterator<Item = &str> {
        self.restrictions.iter().map(String::as_str)
    }

    pub fn menu(&self) -> &[MenuEntry] {
        &self.menu
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty() && self.menu.is_empty() && self.restrictions.is_empty()
    }

    /// Reject a set that holds a capability together with its restriction
    pub fn validate(&self, role: &Role) -> RbacResult<()> {
        for restriction in &self.restrictions {
            if let Some(capability) = Restrictions::excluded_capability(restriction)
                && self.capabilities.contains(capability)
            {
                return Err(RbacError::ConflictingRestriction {
                    role: role.to_string(),
                    capability: capability.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Merge in the entry of a role this one is equivalent to.
    ///
    /// Own restrictions win over inherited capabilities and own capabilities
    /// win over inherited restrictions, so the result stays valid.
    fn inherit_from(&mut self, parent: &CapabilitySet) {
        for capability in &parent.capabilities {
            if !self
                .restrictions
                .contains(&Restrictions::for_capability(capability))
            {
                self.capabilities.insert(capability.clone());
            }
        }
        for restriction in &parent.restrictions {
            let overridden = Restrictions::excluded_capability(restriction)
                .is_some_and(|c| self.capabilities.contains(c));
            if !overridden {
                self.restrictions.insert(restriction.clone());
            }
        }
        for entry in &parent.menu {
            if !self.menu.iter().any(|e| e.path == entry.path) {
                self.menu.push(entry.clone());
            }
        }
    }
}

impl From<&RoleConfig> for CapabilitySet {
    fn from(config: &RoleConfig) -> Self {
        Self {
            capabilities: config.capabilities.iter().cloned().collect(),
            menu: config
                .menu
                .iter()
                .map(|m| MenuEntry::new(&m.label, &m.path))
                .collect(),
            restrictions: config.restrictions.iter().cloned().collect(),
        }
    }
}

/// Static role → capability table
#[derive(Debug, Clone)]
pub struct CapabilityPolicy {
    table: HashMap<Role, CapabilitySet>,
}

impl CapabilityPolicy {
    pub fn builder() -> CapabilityPolicyBuilder {
        CapabilityPolicyBuilder::new()
    }

    /// The built-in dashboard table
    pub fn with_defaults() -> Self {
        Self {
            table: default_table(),
        }
    }

    /// Built-in table with the configured per-role overrides applied
    pub fn from_config(config: &RbacConfig) -> RbacResult<Self> {
        let mut builder = Self::builder().with_default_roles();
        for role in &config.roles {
            builder = builder.with_role(RoleResolver::normalize(&role.name), role.into());
        }
        builder.build()
    }

    /// Effective capability set for a role.
    ///
    /// Unknown roles get an empty set. Roles equivalent to another role (such
    /// as `mobile ceo` to `ceo`) get that role's entry merged under their own.
    pub fn capabilities_for(&self, role: &Role) -> CapabilitySet {
        let mut set = self.table.get(role).cloned().unwrap_or_default();
        for (target, entry) in &self.table {
            if target != role && RoleResolver::is_equivalent(role, target) {
                set.inherit_from(entry);
            }
        }
        set
    }

    /// Whether `role` holds `capability`, directly or through equivalence
    pub fn has_capability(&self, role: &Role, capability: &str) -> bool {
        if let Some(own) = self.table.get(role) {
            if own.has_capability(capability) {
                return true;
            }
            if own.has_restriction(&Restrictions::for_capability(capability)) {
                return false;
            }
        }

        let inherited = self.table.iter().any(|(target, entry)| {
            target != role
                && RoleResolver::is_equivalent(role, target)
                && entry.has_capability(capability)
        });
        if !inherited {
            debug!(role = %role, capability = %capability, "Capability not held");
        }
        inherited
    }

    /// Whether `role` carries `restriction`, directly or through equivalence
    pub fn has_restriction(&self, role: &Role, restriction: &str) -> bool {
        self.capabilities_for(role).has_restriction(restriction)
    }

    /// Roles with an explicit table entry
    pub fn roles(&self) -> impl Iterator<Item = &Role> {
        self.table.keys()
    }
}

impl Default for CapabilityPolicy {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Builder for [`CapabilityPolicy`]
pub struct CapabilityPolicyBuilder {
    default_roles: bool,
    roles: Vec<(Role, CapabilitySet)>,
}

impl CapabilityPolicyBuilder {
    pub fn new() -> Self {
        Self {
            default_roles: false,
            roles: Vec::new(),
        }
    }

    /// Start from the built-in dashboard table
    pub fn with_default_roles(mut self) -> Self {
        self.default_roles = true;
        self
    }

    /// Add or replace a role's table entry
    pub fn with_role(mut self, role: impl Into<Role>, capabilities: CapabilitySet) -> Self {
        self.roles.push((role.into(), capabilities));
        self
    }

    pub fn build(self) -> RbacResult<CapabilityPolicy> {
        let mut table = if self.default_roles {
            default_table()
        } else {
            HashMap::new()
        };

        for (role, set) in self.roles {
            set.validate(&role)?;
            table.insert(role, set);
        }

        Ok(CapabilityPolicy { table })
    }
}

impl Default for CapabilityPolicyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_table() -> HashMap<Role, CapabilitySet> {
    let mut table = HashMap::new();

    table.insert(
        Role::Admin,
        CapabilitySet::new()
            .with_capabilities(&[
                Capabilities::VIEW_DASHBOARD,
                Capabilities::AGENT_MONITORING,
                Capabilities::MANAGE_AGENTS,
                Capabilities::VIEW_REPORTS,
                Capabilities::EXPORT_REPORTS,
                Capabilities::MANAGE_CLIENTS,
                Capabilities::IMPERSONATE,
                Capabilities::TILO_ASSISTANT,
            ])
            .with_menu_entry("Dashboard", "/admin/dashboard")
            .with_menu_entry("Agents", "/admin/agents")
            .with_menu_entry("Reports", "/admin/reports")
            .with_menu_entry("Clients", "/admin/clients")
            .with_menu_entry("Tilo Assistant", "/tilo"),
    );

    table.insert(
        Role::Ceo,
        CapabilitySet::new()
            .with_capabilities(&[
                Capabilities::EXECUTIVE_DASHBOARD,
                Capabilities::VIEW_DASHBOARD,
                Capabilities::AGENT_MONITORING,
                Capabilities::VIEW_REPORTS,
                Capabilities::EXPORT_REPORTS,
                Capabilities::VIEW_FINANCIALS,
                Capabilities::ROI_CALCULATOR,
                Capabilities::TILO_ASSISTANT,
            ])
            .with_restrictions(&[Restrictions::NO_AGENT_CONTROL])
            .with_menu_entry("Executive Overview", "/admin/ceo")
            .with_menu_entry("Dashboard", "/admin/dashboard")
            .with_menu_entry("Reports", "/admin/reports")
            .with_menu_entry("ROI Calculator", "/admin/ceo/roi")
            .with_menu_entry("Tilo Assistant", "/tilo"),
    );

    // Only the mobile-specific additions; everything else comes from `ceo`.
    table.insert(
        Role::MobileCeo,
        CapabilitySet::new()
            .with_capabilities(&[Capabilities::MOBILE_DEMO])
            .with_menu_entry("Mobile Briefing", "/admin/ceo/mobile"),
    );

    table.insert(
        Role::Client,
        CapabilitySet::new()
            .with_capabilities(&[
                Capabilities::CLIENT_INTAKE,
                Capabilities::FEASIBILITY_CALCULATOR,
                Capabilities::VIEW_REPORTS,
                Capabilities::TILO_ASSISTANT,
            ])
            .with_restrictions(&[Restrictions::NO_FINANCIALS])
            .with_menu_entry("Intake", "/client/intake")
            .with_menu_entry("Feasibility", "/client/feasibility")
            .with_menu_entry("Reports", "/client/reports")
            .with_menu_entry("Tilo Assistant", "/tilo"),
    );

    table.insert(
        Role::NewClient,
        CapabilitySet::new()
            .with_capabilities(&[
                Capabilities::CLIENT_INTAKE,
                Capabilities::FEASIBILITY_CALCULATOR,
                Capabilities::TILO_ASSISTANT,
            ])
            .with_restrictions(&[
                Restrictions::NO_REPORTS,
                Restrictions::NO_EXPORT,
                Restrictions::NO_FINANCIALS,
            ])
            .with_menu_entry("Intake", "/client/intake")
            .with_menu_entry("Feasibility", "/client/feasibility")
            .with_menu_entry("Tilo Assistant", "/tilo"),
    );

    table.insert(
        Role::Analyst,
        CapabilitySet::new()
            .with_capabilities(&[
                Capabilities::VIEW_REPORTS,
                Capabilities::EXPORT_REPORTS,
                Capabilities::AGENT_MONITORING,
                Capabilities::ROI_CALCULATOR,
                Capabilities::TILO_ASSISTANT,
            ])
            .with_restrictions(&[Restrictions::NO_AGENT_CONTROL])
            .with_menu_entry("Analytics", "/analytics")
            .with_menu_entry("Tilo Assistant", "/tilo"),
    );

    table.insert(
        Role::Developer,
        CapabilitySet::new()
            .with_capabilities(&[
                Capabilities::AGENT_MONITORING,
                Capabilities::MANAGE_AGENTS,
                Capabilities::TILO_ASSISTANT,
            ])
            .with_restrictions(&[Restrictions::NO_FINANCIALS])
            .with_menu_entry("Agents", "/agents")
            .with_menu_entry("Tilo Assistant", "/tilo"),
    );

    table.insert(
        Role::Hr,
        CapabilitySet::new()
            .with_capabilities(&[Capabilities::VIEW_REPORTS, Capabilities::TILO_ASSISTANT])
            .with_restrictions(&[Restrictions::NO_EXPORT, Restrictions::NO_FINANCIALS])
            .with_menu_entry("People", "/hr")
            .with_menu_entry("Tilo Assistant", "/tilo"),
    );

    table.insert(
        Role::Finance,
        CapabilitySet::new()
            .with_capabilities(&[
                Capabilities::VIEW_FINANCIALS,
                Capabilities::VIEW_REPORTS,
                Capabilities::EXPORT_REPORTS,
                Capabilities::ROI_CALCULATOR,
                Capabilities::TILO_ASSISTANT,
            ])
            .with_menu_entry("Finance", "/finance")
            .with_menu_entry("Tilo Assistant", "/tilo"),
    );

    table.insert(
        Role::Legal,
        CapabilitySet::new()
            .with_capabilities(&[Capabilities::VIEW_REPORTS, Capabilities::TILO_ASSISTANT])
            .with_restrictions(&[Restrictions::NO_EXPORT])
            .with_menu_entry("Legal", "/legal")
            .with_menu_entry("Tilo Assistant", "/tilo"),
    );

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table_is_consistent() {
        let policy = CapabilityPolicy::with_defaults();
        for role in Role::KNOWN.iter() {
            let set = policy.capabilities_for(role);
            assert!(!set.is_empty(), "{} should have a table entry", role);
            assert!(set.validate(role).is_ok(), "{} violates exclusivity", role);
        }
    }

    #[test]
    fn test_unknown_role_gets_empty_set() {
        let policy = CapabilityPolicy::with_defaults();
        let intern = Role::Custom("intern".to_string());

        assert!(policy.capabilities_for(&intern).is_empty());
        assert!(!policy.has_capability(&intern, Capabilities::TILO_ASSISTANT));
        assert!(!policy.has_restriction(&intern, Restrictions::NO_EXPORT));
    }

    #[test]
    fn test_mobile_ceo_inherits_ceo() {
        let policy = CapabilityPolicy::with_defaults();

        assert!(policy.has_capability(&Role::MobileCeo, Capabilities::VIEW_FINANCIALS));
        assert!(policy.has_capability(&Role::MobileCeo, Capabilities::MOBILE_DEMO));
        assert!(policy.has_restriction(&Role::MobileCeo, Restrictions::NO_AGENT_CONTROL));

        // The reverse does not hold
        assert!(!policy.has_capability(&Role::Ceo, Capabilities::MOBILE_DEMO));

        let menu = policy.capabilities_for(&Role::MobileCeo);
        assert_eq!(menu.menu()[0].path, "/admin/ceo/mobile");
        assert!(menu.menu().iter().any(|e| e.path == "/admin/ceo"));
    }

    #[test]
    fn test_mobile_override_beats_inherited_entry() {
        let policy = CapabilityPolicy::builder()
            .with_default_roles()
            .with_role(
                Role::MobileCeo,
                CapabilitySet::new()
                    .with_capabilities(&[Capabilities::MOBILE_DEMO])
                    .with_restrictions(&[Restrictions::NO_EXPORT]),
            )
            .build()
            .unwrap();

        assert!(!policy.has_capability(&Role::MobileCeo, Capabilities::EXPORT_REPORTS));
        assert!(policy.has_capability(&Role::MobileCeo, Capabilities::VIEW_REPORTS));
        assert!(policy.has_capability(&Role::Ceo, Capabilities::EXPORT_REPORTS));

        let set = policy.capabilities_for(&Role::MobileCeo);
        assert!(set.validate(&Role::MobileCeo).is_ok());
    }

    #[test]
    fn test_conflicting_entry_is_rejected() {
        let result = CapabilityPolicy::builder()
            .with_role(
                "auditor",
                CapabilitySet::new()
                    .with_capabilities(&[Capabilities::EXPORT_REPORTS])
                    .with_restrictions(&[Restrictions::NO_EXPORT]),
            )
            .build();

        match result {
            Err(RbacError::ConflictingRestriction { role, capability }) => {
                assert_eq!(role, "auditor");
                assert_eq!(capability, "export_reports");
            }
            other => panic!("Expected ConflictingRestriction, got {:?}", other),
        }
    }

    #[test]
    fn test_config_overrides_replace_entries() {
        let mut config = RbacConfig::default();
        config.roles.push(RoleConfig {
            name: "Legal".to_string(),
            capabilities: vec![Capabilities::EXPORT_REPORTS.to_string()],
            ..RoleConfig::default()
        });

        let policy = CapabilityPolicy::from_config(&config).unwrap();
        assert!(policy.has_capability(&Role::Legal, Capabilities::EXPORT_REPORTS));
        assert!(!policy.has_capability(&Role::Legal, Capabilities::TILO_ASSISTANT));
        assert!(policy.has_capability(&Role::Hr, Capabilities::TILO_ASSISTANT));
    }
}
