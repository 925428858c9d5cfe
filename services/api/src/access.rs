//! Read/write predicates over projects
//!
//! Evaluated on every request from the freshly loaded project row; nothing is
//! cached between requests.

use common::models::{Project, User, UserRole};
use uuid::Uuid;

/// Who is asking
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequesterContext {
    pub user_id: Option<Uuid>,
    pub role: Option<UserRole>,
    /// `X-API-Key` matched the configured AR key
    pub api_key_valid: bool,
}

impl RequesterContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn for_user(user: &User) -> Self {
        Self {
            user_id: Some(user.id),
            role: Some(user.role),
            api_key_valid: false,
        }
    }

    pub fn with_api_key(mut self, valid: bool) -> Self {
        self.api_key_valid = valid;
        self
    }

    pub fn is_admin(&self) -> bool {
        self.role == Some(UserRole::Admin)
    }

    fn is_owner(&self, project: &Project) -> bool {
        self.user_id == Some(project.owner_user_id)
    }
}

/// Public, valid API key, owner, or admin
pub fn can_read(project: &Project, ctx: &RequesterContext) -> bool {
    project.is_public || ctx.api_key_valid || ctx.is_owner(project) || ctx.is_admin()
}

/// Owner or admin
pub fn can_write(project: &Project, ctx: &RequesterContext) -> bool {
    ctx.is_owner(project) || ctx.is_admin()
}
