use std::collections::HashSet;

use absterco_core::AppResult;
use async_trait::async_trait;

/// Decides whether a verified email may enter the admin console.
#[async_trait]
pub trait AdminAllowList: Send + Sync {
    async fn is_admin(&self, email: &str) -> AppResult<bool>;
}

/// Fixed set of administrator emails, compared case-insensitively.
#[derive(Clone, Debug, Default)]
pub struct StaticAllowList {
    emails: HashSet<String>,
}

impl StaticAllowList {
    pub fn new<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            emails: emails
                .into_iter()
                .map(|e| e.as_ref().trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn contains(&self, email: &str) -> bool {
        self.emails.contains(&email.trim().to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

#[async_trait]
impl AdminAllowList for StaticAllowList {
    async fn is_admin(&self, email: &str) -> AppResult<bool> {
        Ok(self.contains(email))
    }
}
