//! Org VDC networks (routed and isolated)

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::{fiql_escape, Client, CLOUDAPI};
use crate::error::Result;
use crate::types::{EntityRef, Values};

pub const NAT_ROUTED: &str = "NAT_ROUTED";
pub const ISOLATED: &str = "ISOLATED";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgVdcNetwork {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner_ref: EntityRef,
    pub network_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<NetworkConnection>,
    pub subnets: Values<Subnet>,
    #[serde(default)]
    pub guest_vlan_allowed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConnection {
    pub router_ref: EntityRef,
    #[serde(default = "internal_connection")]
    pub connection_type: String,
}

fn internal_connection() -> String {
    "INTERNAL".to_string()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    pub gateway: String,
    pub prefix_length: i64,
    #[serde(default)]
    pub dns_server1: String,
    #[serde(default)]
    pub dns_server2: String,
    #[serde(default)]
    pub dns_suffix: String,
    #[serde(default = "enabled")]
    pub enabled: bool,
    #[serde(default = "no_ranges")]
    pub ip_ranges: Values<IpRange>,
}

fn enabled() -> bool {
    true
}

fn no_ranges() -> Values<IpRange> {
    Values::new(Vec::new())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpRange {
    pub start_address: String,
    pub end_address: String,
}

impl Client {
    pub async fn get_network(&self, id: &str) -> Result<OrgVdcNetwork> {
        self.get(&format!("{}/orgVdcNetworks/{}", CLOUDAPI, id)).await
    }

    pub async fn get_network_by_name(&self, owner_id: &str, name: &str) -> Result<OrgVdcNetwork> {
        let extra = format!("ownerRef.id=={}", owner_id);
        self.get_by_name(
            &format!("{}/orgVdcNetworks", CLOUDAPI),
            "network",
            &fiql_escape(name),
            Some(&extra),
        )
        .await
    }

    pub async fn create_network(&self, network: &OrgVdcNetwork) -> Result<OrgVdcNetwork> {
        info!(name = %network.name, kind = %network.network_type, "Creating network");
        let done = self
            .post(&format!("{}/orgVdcNetworks", CLOUDAPI), network)
            .await?;
        match done.entity_id {
            Some(id) => self.get_network(&id).await,
            None => {
                self.get_network_by_name(&network.owner_ref.id, &network.name)
                    .await
            }
        }
    }

    pub async fn update_network(&self, id: &str, network: &OrgVdcNetwork) -> Result<OrgVdcNetwork> {
        info!(id = %id, "Updating network");
        let mut body = network.clone();
        body.id = id.to_string();
        self.put(&format!("{}/orgVdcNetworks/{}", CLOUDAPI, id), &body)
            .await?;
        self.get_network(id).await
    }

    pub async fn delete_network(&self, id: &str) -> Result<()> {
        info!(id = %id, "Deleting network");
        self.delete(&format!("{}/orgVdcNetworks/{}", CLOUDAPI, id))
            .await
    }
}
