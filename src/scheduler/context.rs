use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Role granting host-level administration (targeting disabled hosts).
pub const HOST_ADMIN_ROLE: &str = "admin";

/// Caller identity for one scheduling call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    #[serde(default = "Uuid::new_v4")]
    pub request_id: Uuid,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl RequestContext {
    /// Tenant-scoped context.
    pub fn new(user_id: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            user_id: Some(user_id.into()),
            project_id: Some(project_id.into()),
            is_admin: false,
            roles: Vec::new(),
        }
    }

    /// Context with no tenant and full privileges.
    pub fn admin() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            user_id: None,
            project_id: None,
            is_admin: true,
            roles: vec![HOST_ADMIN_ROLE.to_string()],
        }
    }

    /// Copy of this context with admin privileges, keeping the identity.
    pub fn elevated(&self) -> Self {
        let mut elevated = self.clone();
        elevated.is_admin = true;
        if !elevated.roles.iter().any(|r| r == HOST_ADMIN_ROLE) {
            elevated.roles.push(HOST_ADMIN_ROLE.to_string());
        }
        elevated
    }

    /// Whether the caller may place resources on disabled hosts.
    pub fn is_host_admin(&self) -> bool {
        self.is_admin && self.roles.iter().any(|r| r == HOST_ADMIN_ROLE)
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            user_id: None,
            project_id: None,
            is_admin: false,
            roles: Vec::new(),
        }
    }
}
