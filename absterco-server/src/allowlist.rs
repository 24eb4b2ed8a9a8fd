use std::sync::Arc;

use absterco_auth::{AdminAllowList, StaticAllowList};
use absterco_content::{AdminUserDirectory, Role};
use absterco_core::AppResult;
use async_trait::async_trait;

/// Configured bootstrap emails plus every `Admin` in the user directory.
pub struct DirectoryAllowList {
    bootstrap: StaticAllowList,
    directory: Arc<AdminUserDirectory>,
}

impl DirectoryAllowList {
    pub fn new(bootstrap: StaticAllowList, directory: Arc<AdminUserDirectory>) -> Self {
        Self { bootstrap, directory }
    }
}

#[async_trait]
impl AdminAllowList for DirectoryAllowList {
    async fn is_admin(&self, email: &str) -> AppResult<bool> {
        if self.bootstrap.contains(email) {
            return Ok(true);
        }
        Ok(self
            .directory
            .find_by_email(email)
            .await?
            .is_some_and(|user| user.role == Role::Admin))
    }
}
