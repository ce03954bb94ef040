//! Authorization seam in front of lifecycle operations.
//!
//! Policy evaluation lives outside this crate; the controller only consumes
//! the enforce contract and surfaces denials as [`Forbidden`].

use std::collections::BTreeSet;

use thiserror::Error;

/// Caller identity presented to the enforcer.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub roles: Vec<String>,
    pub tenant_id: Option<String>,
}

impl RequestContext {
    pub fn with_roles(roles: &[&str]) -> Self {
        Self {
            roles: roles.iter().map(|r| r.to_string()).collect(),
            tenant_id: None,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// Denied by policy.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("action {action} denied by policy")]
pub struct Forbidden {
    pub action: String,
}

/// Enforcement contract consumed in front of lifecycle operations.
pub trait PolicyEnforcer: Send + Sync {
    fn enforce(&self, context: &RequestContext, action: &str) -> Result<(), Forbidden>;
}

/// Permits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PolicyEnforcer for AllowAll {
    fn enforce(&self, _context: &RequestContext, _action: &str) -> Result<(), Forbidden> {
        Ok(())
    }
}

/// Denies a fixed action set to callers carrying a given role.
#[derive(Debug, Clone)]
pub struct DenyRole {
    role: String,
    actions: BTreeSet<String>,
}

impl DenyRole {
    pub fn new(role: impl Into<String>, actions: &[&str]) -> Self {
        Self {
            role: role.into(),
            actions: actions.iter().map(|a| a.to_string()).collect(),
        }
    }
}

impl PolicyEnforcer for DenyRole {
    fn enforce(&self, context: &RequestContext, action: &str) -> Result<(), Forbidden> {
        if context.has_role(&self.role) && self.actions.contains(action) {
            return Err(Forbidden {
                action: action.to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_all() {
        let ctx = RequestContext::with_roles(&["stack_user"]);
        assert!(AllowAll.enforce(&ctx, "network:create").is_ok());
    }

    #[test]
    fn test_deny_role_blocks_listed_actions() {
        let enforcer = DenyRole::new("stack_user", &["network:create", "network:delete"]);
        let ctx = RequestContext::with_roles(&["stack_user"]);

        let denied = enforcer.enforce(&ctx, "network:create").unwrap_err();
        assert_eq!(denied.action, "network:create");
        assert!(enforcer.enforce(&ctx, "network:update").is_ok());
    }

    #[test]
    fn test_deny_role_ignores_other_roles() {
        let enforcer = DenyRole::new("stack_user", &["network:create"]);
        let ctx = RequestContext::with_roles(&["admin"]);
        assert!(enforcer.enforce(&ctx, "network:create").is_ok());

        let ctx = RequestContext::default();
        assert!(enforcer.enforce(&ctx, "network:create").is_ok());
    }
}
