//! Directory of people allowed into the admin console (`adminUsers`).
//!
//! Emails are stored lowercased. The directory always keeps at least one
//! `Admin`: demoting or deleting the last one is a conflict.

use std::sync::Arc;

use absterco_core::validation::not_blank;
use absterco_core::{validate, AppError, AppResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;
use validator::Validate;

use crate::store::{Direction, DocumentStore, Query};

pub const ADMIN_USERS: &str = "adminUsers";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Admin,
    Editor,
    Viewer,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUser {
    #[serde(default)]
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewAdminUser {
    #[validate(email(message = "must be a valid email"))]
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EditAdminUser {
    #[validate(email(message = "must be a valid email"))]
    pub email: Option<String>,
    #[validate(custom(function = "not_blank"))]
    pub display_name: Option<String>,
}

/// Result of bootstrapping the directory from configured admin emails.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SetupReport {
    pub created: Vec<AdminUser>,
    pub existing: usize,
}

pub struct AdminUserDirectory {
    store: Arc<dyn DocumentStore>,
}

impl AdminUserDirectory {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn list(&self) -> AppResult<Vec<AdminUser>> {
        let rows = self
            .store
            .query(ADMIN_USERS, &Query::new().order_by("email", Direction::Asc))
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| serde_json::from_value(row).ok())
            .collect())
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<AdminUser>> {
        let email = normalize_email(email);
        let rows = self
            .store
            .query(ADMIN_USERS, &Query::new().where_eq("email", email).limit(1))
            .await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| serde_json::from_value(row).ok()))
    }

    pub async fn get(&self, id: &str) -> AppResult<AdminUser> {
        let doc = self
            .store
            .get(ADMIN_USERS, id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Admin user not found: {id}")).into_anyhow())?;
        serde_json::from_value(doc).map_err(|e| {
            AppError::repository("Stored admin user has an unexpected shape")
                .with_source(e.into())
                .into_anyhow()
        })
    }

    /// Emails of every user with the `Admin` role.
    pub async fn admin_emails(&self) -> AppResult<Vec<String>> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .filter(|u| u.role == Role::Admin)
            .map(|u| u.email)
            .collect())
    }

    pub async fn add(&self, input: NewAdminUser) -> AppResult<AdminUser> {
        validate(&input, "Admin user validation failed")?;
        let email = normalize_email(&input.email);

        if self.find_by_email(&email).await?.is_some() {
            return Err(AppError::conflict(format!("Admin user already exists: {email}")).into_anyhow());
        }

        let now = Utc::now();
        let display_name = input
            .display_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| default_display_name(&email));

        let user = AdminUser {
            id: String::new(),
            email,
            display_name,
            role: input.role,
            created_at: Some(now),
            updated_at: Some(now),
        };

        let doc = serde_json::to_value(&user).map_err(|e| {
            AppError::repository("Failed to encode admin user")
                .with_source(e.into())
                .into_anyhow()
        })?;
        let created: AdminUser = serde_json::from_value(self.store.create(ADMIN_USERS, doc).await?)
            .map_err(|e| {
                AppError::repository("Stored admin user has an unexpected shape")
                    .with_source(e.into())
                    .into_anyhow()
            })?;

        info!(user_id = %created.id, email = %created.email, role = ?created.role, "admin_user.added");
        Ok(created)
    }

    pub async fn update_role(&self, id: &str, role: Role) -> AppResult<AdminUser> {
        let user = self.get(id).await?;
        if user.role == Role::Admin && role != Role::Admin {
            self.ensure_not_last_admin(&user, "demote").await?;
        }

        let patch = json!({ "role": role, "updatedAt": Utc::now() });
        let updated = self.patch(id, patch).await?;
        info!(user_id = id, role = ?role, "admin_user.role_updated");
        Ok(updated)
    }

    pub async fn edit(&self, id: &str, input: EditAdminUser) -> AppResult<AdminUser> {
        validate(&input, "Admin user validation failed")?;
        self.get(id).await?;

        let mut patch = json!({ "updatedAt": Utc::now() });
        if let Some(email) = input.email.as_deref().map(normalize_email) {
            if let Some(other) = self.find_by_email(&email).await? {
                if other.id != id {
                    return Err(AppError::conflict(format!("Admin user already exists: {email}")).into_anyhow());
                }
            }
            patch["email"] = json!(email);
        }
        if let Some(name) = input.display_name.as_deref() {
            patch["displayName"] = json!(name.trim());
        }

        let updated = self.patch(id, patch).await?;
        info!(user_id = id, "admin_user.edited");
        Ok(updated)
    }

    pub async fn delete(&self, id: &str) -> AppResult<AdminUser> {
        let user = self.get(id).await?;
        if user.role == Role::Admin {
            self.ensure_not_last_admin(&user, "delete").await?;
        }

        self.store.delete(ADMIN_USERS, id).await?;
        info!(user_id = id, email = %user.email, "admin_user.deleted");
        Ok(user)
    }

    /// Register each bootstrap email as an `Admin` unless already present.
    pub async fn setup(&self, bootstrap_emails: &[String]) -> AppResult<SetupReport> {
        let mut report = SetupReport {
            created: Vec::new(),
            existing: 0,
        };

        for email in bootstrap_emails {
            if self.find_by_email(email).await?.is_some() {
                report.existing += 1;
                continue;
            }
            let user = self
                .add(NewAdminUser {
                    email: email.clone(),
                    display_name: None,
                    role: Role::Admin,
                })
                .await?;
            report.created.push(user);
        }

        Ok(report)
    }

    async fn ensure_not_last_admin(&self, user: &AdminUser, action: &str) -> AppResult<()> {
        let admins = self
            .list()
            .await?
            .into_iter()
            .filter(|u| u.role == Role::Admin && u.id != user.id)
            .count();
        if admins == 0 {
            return Err(AppError::conflict(format!(
                "Cannot {action} {}: at least one administrator must remain",
                user.email
            ))
            .into_anyhow());
        }
        Ok(())
    }

    async fn patch(&self, id: &str, patch: serde_json::Value) -> AppResult<AdminUser> {
        let doc = self.store.update(ADMIN_USERS, id, patch).await?;
        serde_json::from_value(doc).map_err(|e| {
            AppError::repository("Stored admin user has an unexpected shape")
                .with_source(e.into())
                .into_anyhow()
        })
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn default_display_name(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocumentStore;
    use absterco_core::ErrorKind;

    fn directory() -> AdminUserDirectory {
        AdminUserDirectory::new(Arc::new(MemoryDocumentStore::new()))
    }

    fn new_user(email: &str, role: Role) -> NewAdminUser {
        NewAdminUser {
            email: email.to_string(),
            display_name: None,
            role,
        }
    }

    #[tokio::test]
    async fn setup_is_idempotent_and_lowercases() {
        let dir = directory();
        let emails = vec!["Owner@Absterco.com".to_string(), "ops@absterco.com".to_string()];

        let first = dir.setup(&emails).await.unwrap();
        assert_eq!(first.created.len(), 2);
        assert_eq!(first.created[0].email, "owner@absterco.com");
        assert_eq!(first.created[0].display_name, "owner");

        let second = dir.setup(&emails).await.unwrap();
        assert!(second.created.is_empty());
        assert_eq!(second.existing, 2);
        assert_eq!(dir.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_and_invalid_emails_are_rejected() {
        let dir = directory();
        dir.add(new_user("a@absterco.com", Role::Editor)).await.unwrap();

        let err = dir.add(new_user("A@ABSTERCO.com", Role::Admin)).await.unwrap_err();
        assert_eq!(AppError::kind_of(&err), ErrorKind::Conflict);

        let err = dir.add(new_user("not-an-email", Role::Admin)).await.unwrap_err();
        assert_eq!(AppError::kind_of(&err), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn last_admin_cannot_be_demoted_or_deleted() {
        let dir = directory();
        let owner = dir.add(new_user("owner@absterco.com", Role::Admin)).await.unwrap();
        let editor = dir.add(new_user("ed@absterco.com", Role::Editor)).await.unwrap();

        let err = dir.update_role(&owner.id, Role::Viewer).await.unwrap_err();
        assert_eq!(AppError::kind_of(&err), ErrorKind::Conflict);
        let err = dir.delete(&owner.id).await.unwrap_err();
        assert_eq!(AppError::kind_of(&err), ErrorKind::Conflict);

        dir.update_role(&editor.id, Role::Admin).await.unwrap();
        dir.delete(&owner.id).await.unwrap();
        assert_eq!(dir.admin_emails().await.unwrap(), vec!["ed@absterco.com"]);
    }

    #[tokio::test]
    async fn edit_changes_name_and_guards_email_collisions() {
        let dir = directory();
        let a = dir.add(new_user("a@absterco.com", Role::Admin)).await.unwrap();
        dir.add(new_user("b@absterco.com", Role::Admin)).await.unwrap();

        let edited = dir
            .edit(
                &a.id,
                EditAdminUser {
                    email: None,
                    display_name: Some("  Ana  ".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(edited.display_name, "Ana");

        let err = dir
            .edit(
                &a.id,
                EditAdminUser {
                    email: Some("B@absterco.com".into()),
                    display_name: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(AppError::kind_of(&err), ErrorKind::Conflict);

        let err = dir.edit("missing", EditAdminUser::default()).await.unwrap_err();
        assert_eq!(AppError::kind_of(&err), ErrorKind::NotFound);
    }
}
