//! Public IPs (Cloud Avenue API)

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::{Client, CUSTOMERS_V1};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIps {
    #[serde(default)]
    pub internal_ip: String,
    #[serde(default)]
    pub network_config: Vec<PublicIp>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIp {
    pub uplink_ip: String,
    #[serde(default)]
    pub translated_ip: String,
    #[serde(default)]
    pub edge_gateway_name: String,
}

impl Client {
    pub async fn list_public_ips(&self) -> Result<PublicIps> {
        self.get(&format!("{}/ip", CUSTOMERS_V1)).await
    }

    pub async fn get_public_ip(&self, ip: &str) -> Result<PublicIp> {
        self.list_public_ips()
            .await?
            .network_config
            .into_iter()
            .find(|p| p.uplink_ip == ip)
            .ok_or_else(|| Error::not_found("public IP", ip))
    }

    /// Orders a public IP for the edge gateway. The job does not say which
    /// address was allocated, so the new one is found by diff.
    pub async fn create_public_ip(&self, edge_gateway_name: &str) -> Result<PublicIp> {
        info!(edge = %edge_gateway_name, "Ordering public IP");
        let before: Vec<String> = self
            .list_public_ips()
            .await?
            .network_config
            .into_iter()
            .map(|p| p.uplink_ip)
            .collect();

        self.execute_job::<()>(
            Method::POST,
            &format!("{}/ip", CUSTOMERS_V1),
            &[("edgeGatewayName", edge_gateway_name.to_string())],
            None,
        )
        .await?;

        self.list_public_ips()
            .await?
            .network_config
            .into_iter()
            .find(|p| !before.contains(&p.uplink_ip))
            .ok_or_else(|| Error::not_found("new public IP on", edge_gateway_name))
    }

    pub async fn delete_public_ip(&self, ip: &str) -> Result<()> {
        info!(ip = %ip, "Releasing public IP");
        self.execute_job::<()>(
            Method::DELETE,
            &format!("{}/ip/{}", CUSTOMERS_V1, ip),
            &[],
            None,
        )
        .await
    }
}
