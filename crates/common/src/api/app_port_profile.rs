//! Application port profiles

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::{fiql_escape, Client, CLOUDAPI};
use crate::error::Result;
use crate::types::EntityRef;

pub const PROTOCOLS: &[&str] = &["TCP", "UDP", "ICMPv4", "ICMPv6"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPortProfile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "tenant_scope")]
    pub scope: String,
    #[serde(default)]
    pub org_ref: EntityRef,
    #[serde(default)]
    pub context_entity_id: String,
    #[serde(default)]
    pub application_ports: Vec<AppPort>,
}

fn tenant_scope() -> String {
    "TENANT".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppPort {
    pub protocol: String,
    #[serde(default)]
    pub destination_ports: Vec<String>,
}

/// Checks a port or port range (`80`, `1000-2000`).
pub fn valid_port_range(value: &str) -> bool {
    let parse = |p: &str| p.trim().parse::<u16>().ok().filter(|p| *p > 0);
    match value.split_once('-') {
        Some((low, high)) => match (parse(low), parse(high)) {
            (Some(low), Some(high)) => low <= high,
            _ => false,
        },
        None => parse(value).is_some(),
    }
}

impl Client {
    pub async fn get_app_port_profile(&self, id: &str) -> Result<AppPortProfile> {
        self.get(&format!("{}/applicationPortProfiles/{}", CLOUDAPI, id))
            .await
    }

    /// Tenant profiles are scoped to the VDC group passed as context.
    pub async fn get_app_port_profile_by_name(
        &self,
        context_id: &str,
        name: &str,
    ) -> Result<AppPortProfile> {
        let extra = format!("_context=={};scope==TENANT", context_id);
        self.get_by_name(
            &format!("{}/applicationPortProfiles", CLOUDAPI),
            "application port profile",
            &fiql_escape(name),
            Some(&extra),
        )
        .await
    }

    pub async fn create_app_port_profile(
        &self,
        profile: &AppPortProfile,
    ) -> Result<AppPortProfile> {
        info!(name = %profile.name, "Creating application port profile");
        let done = self
            .post(&format!("{}/applicationPortProfiles", CLOUDAPI), profile)
            .await?;
        match done.entity_id {
            Some(id) => self.get_app_port_profile(&id).await,
            None => {
                self.get_app_port_profile_by_name(&profile.context_entity_id, &profile.name)
                    .await
            }
        }
    }

    pub async fn update_app_port_profile(
        &self,
        id: &str,
        profile: &AppPortProfile,
    ) -> Result<AppPortProfile> {
        info!(id = %id, "Updating application port profile");
        let mut body = profile.clone();
        body.id = id.to_string();
        self.put(&format!("{}/applicationPortProfiles/{}", CLOUDAPI, id), &body)
            .await?;
        self.get_app_port_profile(id).await
    }

    pub async fn delete_app_port_profile(&self, id: &str) -> Result<()> {
        info!(id = %id, "Deleting application port profile");
        self.delete(&format!("{}/applicationPortProfiles/{}", CLOUDAPI, id))
            .await
    }
}
