//! Edge gateways (Cloud Avenue API)

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::client::{Client, CLOUDAPI, CUSTOMERS_V2};
use crate::error::{Error, Result};
use crate::types::EntityRef;

pub const OWNER_VDC: &str = "vdc";
pub const OWNER_VDC_GROUP: &str = "vdc-group";

/// Allowed bandwidth values (Mbps) per tier-0 class of service.
pub const RATE_LIMITS: &[i64] = &[5, 25, 50, 75, 100, 150, 200, 250, 300, 400, 500, 1000, 2000];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeGateway {
    pub edge_id: String,
    pub edge_name: String,
    pub owner_type: String,
    pub owner_name: String,
    #[serde(default)]
    pub tier0_vrf_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rate_limit: i64,
}

impl EdgeGateway {
    /// vCD URN of the gateway.
    pub fn urn(&self) -> String {
        edge_urn(&self.edge_id)
    }
}

pub fn edge_urn(edge_id: &str) -> String {
    if edge_id.starts_with("urn:") {
        edge_id.to_string()
    } else {
        format!("urn:vcloud:gateway:{}", edge_id)
    }
}

/// The vCD view of a gateway, only read for its owner.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CloudApiGateway {
    owner_ref: EntityRef,
}

fn owner_segment(owner_type: &str) -> Result<&'static str> {
    match owner_type {
        OWNER_VDC => Ok("vdcs"),
        OWNER_VDC_GROUP => Ok("vdcgroups"),
        other => Err(Error::InvalidConfig(format!(
            "unknown edge gateway owner type {}",
            other
        ))),
    }
}

impl Client {
    pub async fn list_edge_gateways(&self) -> Result<Vec<EdgeGateway>> {
        self.get(&format!("{}/edges", CUSTOMERS_V2)).await
    }

    /// Accepts the Cloud Avenue edge id or the vCD URN.
    pub async fn get_edge_gateway(&self, id: &str) -> Result<EdgeGateway> {
        let edge_id = crate::types::urn_uuid(id);
        self.get(&format!("{}/edges/{}", CUSTOMERS_V2, edge_id)).await
    }

    /// VDC or VDC group owning the gateway, as a vCD reference.
    pub async fn edge_gateway_owner(&self, id: &str) -> Result<EntityRef> {
        let gateway: CloudApiGateway = self
            .get(&format!("{}/edgeGateways/{}", CLOUDAPI, edge_urn(id)))
            .await?;
        Ok(gateway.owner_ref)
    }

    pub async fn get_edge_gateway_by_name(&self, name: &str) -> Result<EdgeGateway> {
        self.list_edge_gateways()
            .await?
            .into_iter()
            .find(|e| e.edge_name == name)
            .ok_or_else(|| Error::not_found("edge gateway", name))
    }

    /// Creates an edge on the owner; the API does not return the new edge,
    /// so it is found by diffing the owner's edges before and after.
    pub async fn create_edge_gateway(
        &self,
        owner_type: &str,
        owner_name: &str,
        tier0_vrf: &str,
    ) -> Result<EdgeGateway> {
        info!(owner = %owner_name, tier0 = %tier0_vrf, "Creating edge gateway");
        let before: Vec<String> = self
            .list_edge_gateways()
            .await?
            .into_iter()
            .map(|e| e.edge_id)
            .collect();

        let path = format!(
            "{}/{}/{}/edges",
            CUSTOMERS_V2,
            owner_segment(owner_type)?,
            owner_name
        );
        self.execute_job(
            Method::POST,
            &path,
            &[],
            Some(&json!({ "tier0VrfId": tier0_vrf })),
        )
        .await?;

        self.list_edge_gateways()
            .await?
            .into_iter()
            .find(|e| e.owner_name == owner_name && !before.contains(&e.edge_id))
            .ok_or_else(|| Error::not_found("new edge gateway of", owner_name))
    }

    pub async fn update_edge_gateway_rate_limit(
        &self,
        id: &str,
        rate_limit: i64,
    ) -> Result<EdgeGateway> {
        info!(edge = %id, rate_limit, "Updating edge gateway bandwidth");
        let edge_id = crate::types::urn_uuid(id);
        self.execute_job(
            Method::PUT,
            &format!("{}/edges/{}", CUSTOMERS_V2, edge_id),
            &[],
            Some(&json!({ "rateLimit": rate_limit })),
        )
        .await?;
        self.get_edge_gateway(edge_id).await
    }

    pub async fn delete_edge_gateway(&self, id: &str) -> Result<()> {
        info!(edge = %id, "Deleting edge gateway");
        let edge_id = crate::types::urn_uuid(id);
        self.execute_job::<()>(
            Method::DELETE,
            &format!("{}/edges/{}", CUSTOMERS_V2, edge_id),
            &[],
            None,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_urn() {
        let edge = EdgeGateway {
            edge_id: "a1b2".into(),
            ..Default::default()
        };
        assert_eq!(edge.urn(), "urn:vcloud:gateway:a1b2");
        assert_eq!(edge_urn("urn:vcloud:gateway:a1b2"), "urn:vcloud:gateway:a1b2");
    }

    #[test]
    fn test_owner_segment() {
        assert_eq!(owner_segment("vdc").unwrap(), "vdcs");
        assert_eq!(owner_segment("vdc-group").unwrap(), "vdcgroups");
        assert!(owner_segment("org").is_err());
    }
}
