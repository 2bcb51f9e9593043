//! Users, roles and rights

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::{fiql_escape, Client, CLOUDAPI};
use crate::error::{Error, Result};
use crate::types::{EntityRef, Values};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub role_entity_refs: Vec<EntityRef>,
    #[serde(default)]
    pub org_entity_ref: EntityRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default)]
    pub deployed_vm_quota: i64,
    #[serde(default)]
    pub stored_vm_quota: i64,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub locked: bool,
    #[serde(default = "local_provider")]
    pub provider_type: String,
}

fn enabled() -> bool {
    true
}

fn local_provider() -> String {
    "LOCAL".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bundle_key: String,
    #[serde(default)]
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Right {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub bundle_key: String,
    #[serde(default)]
    pub right_type: String,
    #[serde(default)]
    pub implied_rights: Vec<EntityRef>,
}

impl Client {
    pub async fn get_user(&self, id: &str) -> Result<User> {
        self.get(&format!("{}/users/{}", CLOUDAPI, id)).await
    }

    pub async fn get_user_by_name(&self, username: &str) -> Result<User> {
        let filter = format!("username=={}", fiql_escape(username));
        let mut found: Vec<User> = self
            .get_all(&format!("{}/users", CLOUDAPI), Some(&filter))
            .await?;
        if found.is_empty() {
            return Err(Error::not_found("user", username));
        }
        Ok(found.remove(0))
    }

    pub async fn create_user(&self, user: &User) -> Result<User> {
        info!(username = %user.username, "Creating user");
        let done = self.post(&format!("{}/users", CLOUDAPI), user).await?;
        match done.entity_id {
            Some(id) => self.get_user(&id).await,
            None => self.get_user_by_name(&user.username).await,
        }
    }

    pub async fn update_user(&self, id: &str, user: &User) -> Result<User> {
        info!(id = %id, "Updating user");
        let mut body = user.clone();
        body.id = id.to_string();
        self.put(&format!("{}/users/{}", CLOUDAPI, id), &body).await?;
        self.get_user(id).await
    }

    pub async fn delete_user(&self, id: &str) -> Result<()> {
        info!(id = %id, "Deleting user");
        self.delete(&format!("{}/users/{}", CLOUDAPI, id)).await
    }

    pub async fn get_role(&self, id: &str) -> Result<Role> {
        self.get(&format!("{}/roles/{}", CLOUDAPI, id)).await
    }

    pub async fn get_role_by_name(&self, name: &str) -> Result<Role> {
        self.get_by_name(
            &format!("{}/roles", CLOUDAPI),
            "role",
            &fiql_escape(name),
            None,
        )
        .await
    }

    pub async fn create_role(&self, role: &Role) -> Result<Role> {
        info!(name = %role.name, "Creating role");
        let done = self.post(&format!("{}/roles", CLOUDAPI), role).await?;
        match done.entity_id {
            Some(id) => self.get_role(&id).await,
            None => self.get_role_by_name(&role.name).await,
        }
    }

    pub async fn update_role(&self, id: &str, role: &Role) -> Result<Role> {
        info!(id = %id, "Updating role");
        let mut body = role.clone();
        body.id = id.to_string();
        self.put(&format!("{}/roles/{}", CLOUDAPI, id), &body).await?;
        self.get_role(id).await
    }

    pub async fn delete_role(&self, id: &str) -> Result<()> {
        info!(id = %id, "Deleting role");
        self.delete(&format!("{}/roles/{}", CLOUDAPI, id)).await
    }

    pub async fn get_role_rights(&self, role_id: &str) -> Result<Vec<EntityRef>> {
        self.get_all(&format!("{}/roles/{}/rights", CLOUDAPI, role_id), None)
            .await
    }

    /// Replaces the rights of the role.
    pub async fn set_role_rights(&self, role_id: &str, rights: Vec<EntityRef>) -> Result<()> {
        info!(role = %role_id, count = rights.len(), "Setting role rights");
        self.put(
            &format!("{}/roles/{}/rights", CLOUDAPI, role_id),
            &Values::new(rights),
        )
        .await?;
        Ok(())
    }

    pub async fn get_right_by_name(&self, name: &str) -> Result<Right> {
        self.get_by_name(
            &format!("{}/rights", CLOUDAPI),
            "right",
            &fiql_escape(name),
            None,
        )
        .await
    }

    /// Resolves right names to references, failing on the first unknown one.
    pub async fn resolve_rights(&self, names: &[String]) -> Result<Vec<EntityRef>> {
        let mut refs = Vec::with_capacity(names.len());
        for name in names {
            let right = self.get_right_by_name(name).await?;
            refs.push(EntityRef::named(right.id, right.name));
        }
        Ok(refs)
    }
}
