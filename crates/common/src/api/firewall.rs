//! Distributed firewall rules and firewall groups (security groups, IP sets)

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::{fiql_escape, Client, CLOUDAPI};
use crate::error::Result;
use crate::types::EntityRef;

pub const DIRECTIONS: &[&str] = &["IN", "OUT", "IN_OUT"];
pub const IP_PROTOCOLS: &[&str] = &["IPV4", "IPV6", "IPV4_IPV6"];
pub const ACTIONS: &[&str] = &["ALLOW", "DROP", "REJECT"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DfwRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub direction: String,
    #[serde(default)]
    pub ip_protocol: String,
    #[serde(default)]
    pub action_value: String,
    #[serde(default)]
    pub logging: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_firewall_groups: Option<Vec<EntityRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_firewall_groups: Option<Vec<EntityRef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application_port_profiles: Option<Vec<EntityRef>>,
    #[serde(default)]
    pub source_groups_excluded: bool,
    #[serde(default)]
    pub destination_groups_excluded: bool,
}

pub const SECURITY_GROUP: &str = "SECURITY_GROUP";
pub const IP_SET: &str = "IP_SET";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallGroup {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner_ref: EntityRef,
    pub type_value: String,
    #[serde(default)]
    pub members: Vec<EntityRef>,
    #[serde(default)]
    pub ip_addresses: Vec<String>,
}

impl Client {
    pub async fn get_firewall_group(&self, id: &str) -> Result<FirewallGroup> {
        self.get(&format!("{}/firewallGroups/{}", CLOUDAPI, id)).await
    }

    pub async fn get_firewall_group_by_name(
        &self,
        owner_id: &str,
        name: &str,
        type_value: &str,
    ) -> Result<FirewallGroup> {
        let extra = format!("ownerRef.id=={};typeValue=={}", owner_id, type_value);
        let summary: EntityRef = self
            .get_by_name(
                &format!("{}/firewallGroups/summaries", CLOUDAPI),
                type_value,
                &fiql_escape(name),
                Some(&extra),
            )
            .await?;
        self.get_firewall_group(&summary.id).await
    }

    pub async fn create_firewall_group(&self, group: &FirewallGroup) -> Result<FirewallGroup> {
        info!(name = %group.name, kind = %group.type_value, "Creating firewall group");
        let done = self
            .post(&format!("{}/firewallGroups", CLOUDAPI), group)
            .await?;
        match done.entity_id {
            Some(id) => self.get_firewall_group(&id).await,
            None => {
                self.get_firewall_group_by_name(&group.owner_ref.id, &group.name, &group.type_value)
                    .await
            }
        }
    }

    pub async fn update_firewall_group(
        &self,
        id: &str,
        group: &FirewallGroup,
    ) -> Result<FirewallGroup> {
        info!(id = %id, "Updating firewall group");
        let mut body = group.clone();
        body.id = id.to_string();
        self.put(&format!("{}/firewallGroups/{}", CLOUDAPI, id), &body)
            .await?;
        self.get_firewall_group(id).await
    }

    pub async fn delete_firewall_group(&self, id: &str) -> Result<()> {
        info!(id = %id, "Deleting firewall group");
        self.delete(&format!("{}/firewallGroups/{}", CLOUDAPI, id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_omits_empty_references() {
        let rule = DfwRule {
            name: "allow-web".into(),
            enabled: true,
            direction: "IN".into(),
            ip_protocol: "IPV4".into(),
            action_value: "ALLOW".into(),
            ..Default::default()
        };
        let body = serde_json::to_value(&rule).unwrap();
        assert!(body.get("id").is_none());
        assert!(body.get("sourceFirewallGroups").is_none());
        assert_eq!(body["actionValue"], "ALLOW");
    }
}
