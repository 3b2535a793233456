//! Configuration types for Tilo RBAC

use serde::{Deserialize, Serialize};

/// RBAC configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RbacConfig {
    /// Role used when no storage location holds one
    pub default_role: String,
    /// Enable audit logging of every guard decision
    pub audit_enabled: bool,
    /// Role cookie settings
    pub cookie: CookieConfig,
    /// Persistent local store keys
    pub local_store: LocalStoreConfig,
    /// Route classification
    pub routes: RouteConfig,
    /// Per-role capability overrides, replacing the built-in table entry
    pub roles: Vec<RoleConfig>,
}

impl Default for RbacConfig {
    fn default() -> Self {
        Self {
            default_role: "client".to_string(),
            audit_enabled: true,
            cookie: CookieConfig::default(),
            local_store: LocalStoreConfig::default(),
            routes: RouteConfig::default(),
            roles: Vec::new(),
        }
    }
}

/// Role and impersonation cookie settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    /// Name of the role cookie
    pub role_cookie: String,
    /// Name of the impersonation grant cookie
    pub grant_cookie: String,
    /// Name of the cookie identifying a client's local store partition
    pub client_cookie: String,
    /// Cookie path attribute
    pub path: String,
    /// SameSite attribute
    pub same_site: String,
    /// Cookie lifetime in seconds; also bounds impersonation grants
    pub max_age_seconds: u64,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            role_cookie: "tilo_role".to_string(),
            grant_cookie: "tilo_impersonation".to_string(),
            client_cookie: "tilo_client".to_string(),
            path: "/".to_string(),
            same_site: "Lax".to_string(),
            max_age_seconds: 24 * 60 * 60,
        }
    }
}

/// Keys used in the persistent local store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalStoreConfig {
    /// Canonical role key
    pub role_key: String,
    /// Older keys kept in sync on every write
    pub legacy_role_keys: Vec<String>,
    /// Boolean flag set while the mobile CEO demo is active
    pub mobile_demo_key: String,
}

impl Default for LocalStoreConfig {
    fn default() -> Self {
        Self {
            role_key: "tilo.role".to_string(),
            legacy_role_keys: vec!["userRole".to_string(), "role".to_string()],
            mobile_demo_key: "tilo.mobileDemo".to_string(),
        }
    }
}

/// Path classification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// Paths that are always allowed (exact match)
    pub public_paths: Vec<String>,
    /// Substring marking Tilo assistant paths
    pub assistant_marker: String,
    /// Prefix of the CEO-only sub-zone, nested in the admin zone
    pub ceo_prefix: String,
    /// Prefix of the admin zone
    pub admin_prefix: String,
    /// Prefix of the client zone
    pub client_prefix: String,
    /// Redirect target for denied navigations
    pub unauthorized_path: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            public_paths: vec![
                "/".to_string(),
                "/login".to_string(),
                "/unauthorized".to_string(),
            ],
            assistant_marker: "tilo".to_string(),
            ceo_prefix: "/admin/ceo".to_string(),
            admin_prefix: "/admin".to_string(),
            client_prefix: "/client".to_string(),
            unauthorized_path: "/unauthorized".to_string(),
        }
    }
}

/// Capability table entry for a single role
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    /// Role name (normalized on load)
    pub name: String,
    /// Role description
    pub description: Option<String>,
    /// Feature flags granted to the role
    pub capabilities: Vec<String>,
    /// Restriction tags
    pub restrictions: Vec<String>,
    /// Visible menu entries
    pub menu: Vec<MenuEntryConfig>,
}

/// Menu entry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuEntryConfig {
    pub label: String,
    pub path: String,
}

impl RbacConfig {
    /// Load configuration from file
    pub fn from_file(path: &str) -> std::result::Result<Self, crate::error::RbacError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            crate::error::RbacError::Configuration(format!("Failed to read config file: {}", e))
        })?;

        let config: RbacConfig = serde_json::from_str(&content).map_err(|e| {
            crate::error::RbacError::Configuration(format!("Failed to parse config: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn to_file(&self, path: &str) -> std::result::Result<(), crate::error::RbacError> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            crate::error::RbacError::Configuration(format!("Failed to serialize config: {}", e))
        })?;

        std::fs::write(path, content).map_err(|e| {
            crate::error::RbacError::Configuration(format!("Failed to write config file: {}", e))
        })?;

        Ok(())
    }

    /// Configuration for local development: quiet audit log, short cookies
    pub fn development() -> Self {
        Self {
            audit_enabled: false,
            cookie: CookieConfig {
                max_age_seconds: 60 * 60,
                ..CookieConfig::default()
            },
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> std::result::Result<(), crate::error::RbacError> {
        use crate::error::RbacError;

        if self.default_role.trim().is_empty() {
            return Err(RbacError::Configuration(
                "Default role must not be empty".to_string(),
            ));
        }

        let cookie_names = [
            &self.cookie.role_cookie,
            &self.cookie.grant_cookie,
            &self.cookie.client_cookie,
        ];
        if cookie_names.iter().any(|name| name.is_empty()) {
            return Err(RbacError::Configuration(
                "Cookie names must not be empty".to_string(),
            ));
        }
        for (i, name) in cookie_names.iter().enumerate() {
            if cookie_names[i + 1..].contains(name) {
                return Err(RbacError::Configuration(format!(
                    "Two cookies share the name '{}'",
                    name
                )));
            }
        }

        if self.routes.assistant_marker.is_empty() {
            return Err(RbacError::Configuration(
                "Assistant marker must not be empty".to_string(),
            ));
        }

        for prefix in [
            &self.routes.ceo_prefix,
            &self.routes.admin_prefix,
            &self.routes.client_prefix,
            &self.routes.unauthorized_path,
        ] {
            if !prefix.starts_with('/') {
                return Err(RbacError::Configuration(format!(
                    "Route '{}' must start with '/'",
                    prefix
                )));
            }
        }

        if !within_prefix(&self.routes.ceo_prefix, &self.routes.admin_prefix) {
            return Err(RbacError::Configuration(format!(
                "CEO prefix '{}' must be nested inside admin prefix '{}'",
                self.routes.ceo_prefix, self.routes.admin_prefix
            )));
        }

        // A protected unauthorized page would redirect to itself
        let target = &self.routes.unauthorized_path;
        let is_public = self.routes.public_paths.iter().any(|p| p == target);
        let is_protected = within_prefix(target, &self.routes.admin_prefix)
            || within_prefix(target, &self.routes.client_prefix);
        if is_protected && !is_public {
            return Err(RbacError::Configuration(format!(
                "Unauthorized path '{}' lies inside a protected zone",
                target
            )));
        }

        let mut role_names = std::collections::HashSet::new();
        for role in &self.roles {
            let name = role.name.trim().to_lowercase();
            if name.is_empty() {
                return Err(RbacError::Configuration(
                    "Role entry with empty name".to_string(),
                ));
            }
            if !role_names.insert(name) {
                return Err(RbacError::Configuration(format!(
                    "Duplicate role name: {}",
                    role.name
                )));
            }
        }

        Ok(())
    }
}

/// Whether `path` is `prefix` itself or lies below it on a segment boundary.
///
/// `/admin` covers `/admin` and `/admin/...`, not `/administrator`.
pub fn within_prefix(path: &str, prefix: &str) -> bool {
    if prefix.ends_with('/') {
        return path.starts_with(prefix);
    }
    path.strip_prefix(prefix)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_config_serialization() {
        let config = RbacConfig::development();
        let json = serde_json::to_string_pretty(&config).unwrap();

        let parsed: RbacConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.default_role, config.default_role);
        assert_eq!(parsed.cookie.max_age_seconds, 3600);
        assert!(!parsed.audit_enabled);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let parsed: RbacConfig =
            serde_json::from_str(r#"{ "routes": { "assistant_marker": "assistant" } }"#).unwrap();
        assert_eq!(parsed.routes.assistant_marker, "assistant");
        assert_eq!(parsed.routes.admin_prefix, "/admin");
        assert_eq!(parsed.cookie.role_cookie, "tilo_role");
        assert_eq!(parsed.default_role, "client");
    }

    #[test]
    fn test_config_file_operations() {
        let mut config = RbacConfig::default();
        config.roles.push(RoleConfig {
            name: "auditor".to_string(),
            capabilities: vec!["view_reports".to_string()],
            ..RoleConfig::default()
        });
        let temp_file = NamedTempFile::new().unwrap();
        let path = temp_file.path().to_str().unwrap();

        config.to_file(path).unwrap();

        let loaded = RbacConfig::from_file(path).unwrap();
        assert_eq!(loaded.roles.len(), 1);
        assert_eq!(loaded.cookie.max_age_seconds, 86400);
    }

    #[test]
    fn test_config_validation() {
        let mut config = RbacConfig::default();
        assert!(config.validate().is_ok());

        config.routes.unauthorized_path = "/admin/denied".to_string();
        assert!(config.validate().is_err());

        let mut config = RbacConfig::default();
        config.roles.push(RoleConfig {
            name: "Analyst".to_string(),
            ..RoleConfig::default()
        });
        config.roles.push(RoleConfig {
            name: "analyst".to_string(),
            ..RoleConfig::default()
        });
        assert!(config.validate().is_err());

        let mut config = RbacConfig::default();
        config.routes.ceo_prefix = "/ceo".to_string();
        assert!(config.validate().is_err());

        let mut config = RbacConfig::default();
        config.cookie.grant_cookie = config.cookie.role_cookie.clone();
        assert!(config.validate().is_err());

        let mut config = RbacConfig::default();
        config.cookie.client_cookie = config.cookie.grant_cookie.clone();
        assert!(config.validate().is_err());

        // Shares a prefix string with /admin but not a path segment
        let mut config = RbacConfig::default();
        config.routes.ceo_prefix = "/administrator/ceo".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_within_prefix_respects_segments() {
        assert!(within_prefix("/admin", "/admin"));
        assert!(within_prefix("/admin/ceo/x", "/admin"));
        assert!(!within_prefix("/administrator", "/admin"));
        assert!(!within_prefix("/clients-overview", "/client"));
        assert!(within_prefix("/client/x", "/client/"));
        assert!(!within_prefix("/client", "/client/"));
    }
}
