//! Edge gateway resource and data source

use anyhow::{anyhow, Result};
use cloudavenue_common::api::edge::{EdgeGateway, OWNER_VDC, OWNER_VDC_GROUP, RATE_LIMITS};
use cloudavenue_common::api::vdc::vdc_urn;
use cloudavenue_common::{Client, KV_MUTEX};
use tracing::info;

use super::{DataSource, Resource};
use crate::schema::{Attribute, Block, Schema, Validator};
use crate::state::{
    get_int_attr, get_optional_string_attr, get_string_attr, int_value, make_state, string_value,
    DynamicValue,
};

fn edge_block() -> Block {
    Block::new(
        "Provides a Cloud Avenue edge gateway connected to a tier-0 VRF.",
        vec![
            Attribute::id(),
            Attribute::string("name")
                .computed()
                .stable()
                .describe("The name of the edge gateway."),
            Attribute::string("owner_type")
                .required()
                .force_new()
                .validate(Validator::OneOf(&[OWNER_VDC, OWNER_VDC_GROUP]))
                .describe("The type of the edge gateway owner, `vdc` or `vdc-group`."),
            Attribute::string("owner_name")
                .required()
                .force_new()
                .describe("The name of the VDC or VDC group owning the edge gateway."),
            Attribute::string("tier0_vrf_name")
                .optional_computed()
                .stable()
                .force_new()
                .describe("The tier-0 VRF the edge gateway connects to. Defaults to the first VRF of the organization."),
            Attribute::string("description")
                .computed()
                .stable()
                .describe("The description of the edge gateway."),
            Attribute::number("bandwidth")
                .optional_computed()
                .stable()
                .validate(Validator::OneOfInt(RATE_LIMITS))
                .describe("The bandwidth in Mbps of the edge gateway."),
        ],
    )
}

/// URN of the VDC or VDC group named as owner. Networks lock on the same
/// key, so gateway and network changes on one owner are serialized.
async fn owner_id(client: &Client, owner_type: &str, owner_name: &str) -> Result<String> {
    if owner_type == OWNER_VDC_GROUP {
        Ok(client.get_vdc_group_by_name(owner_name).await?.id)
    } else {
        Ok(vdc_urn(&client.get_vdc(owner_name).await?.vdc_uuid))
    }
}

fn from_api(edge: &EdgeGateway) -> DynamicValue {
    make_state(vec![
        ("id", string_value(edge.urn())),
        ("name", string_value(&edge.edge_name)),
        ("owner_type", string_value(&edge.owner_type)),
        ("owner_name", string_value(&edge.owner_name)),
        ("tier0_vrf_name", string_value(&edge.tier0_vrf_name)),
        ("description", string_value(&edge.description)),
        ("bandwidth", int_value(edge.rate_limit)),
    ])
}

pub struct EdgeGatewayResource;

#[async_trait::async_trait]
impl Resource for EdgeGatewayResource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_edgegateway"
    }

    fn schema(&self) -> Schema {
        Schema::new(edge_block())
    }

    async fn create(&self, client: &Client, plan: &DynamicValue) -> Result<DynamicValue> {
        let owner_type = get_string_attr(plan, "owner_type");
        let owner_name = get_string_attr(plan, "owner_name");
        let tier0 = match get_optional_string_attr(plan, "tier0_vrf_name") {
            Some(name) => name,
            None => client
                .list_tier0_vrfs()
                .await?
                .into_iter()
                .next()
                .ok_or_else(|| anyhow!("no tier-0 VRF available for the organization"))?,
        };

        let _lock = KV_MUTEX
            .lock(owner_id(client, &owner_type, &owner_name).await?)
            .await;
        let mut edge = client
            .create_edge_gateway(&owner_type, &owner_name, &tier0)
            .await?;

        let bandwidth = get_int_attr(plan, "bandwidth", 0);
        if bandwidth > 0 && bandwidth != edge.rate_limit {
            info!(edge = %edge.edge_name, bandwidth, "Applying requested bandwidth");
            edge = client
                .update_edge_gateway_rate_limit(&edge.edge_id, bandwidth)
                .await?;
        }
        Ok(from_api(&edge))
    }

    async fn read(&self, client: &Client, state: &DynamicValue) -> Result<DynamicValue> {
        let edge = match get_optional_string_attr(state, "id") {
            Some(id) => client.get_edge_gateway(&id).await?,
            None => client.get_edge_gateway_by_name(&get_string_attr(state, "name")).await?,
        };
        Ok(from_api(&edge))
    }

    async fn update(
        &self,
        client: &Client,
        prior: &DynamicValue,
        plan: &DynamicValue,
    ) -> Result<DynamicValue> {
        let id = get_string_attr(prior, "id");
        let _lock = KV_MUTEX.lock(client.edge_gateway_owner(&id).await?.id).await;
        let bandwidth = get_int_attr(plan, "bandwidth", 0);
        let edge = if bandwidth > 0 && bandwidth != get_int_attr(prior, "bandwidth", 0) {
            client.update_edge_gateway_rate_limit(&id, bandwidth).await?
        } else {
            client.get_edge_gateway(&id).await?
        };
        Ok(from_api(&edge))
    }

    async fn delete(&self, client: &Client, state: &DynamicValue) -> Result<()> {
        let id = get_string_attr(state, "id");
        let _lock = KV_MUTEX.lock(client.edge_gateway_owner(&id).await?.id).await;
        client.delete_edge_gateway(&id).await?;
        Ok(())
    }

    /// Imported by URN or by edge name.
    fn import_state(&self, id: &str) -> Result<DynamicValue> {
        if id.starts_with("urn:") {
            Ok(make_state(vec![("id", string_value(id))]))
        } else {
            Ok(make_state(vec![("name", string_value(id))]))
        }
    }
}

pub struct EdgeGatewayDataSource;

#[async_trait::async_trait]
impl DataSource for EdgeGatewayDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_edgegateway"
    }

    fn schema(&self) -> Schema {
        Schema::new(edge_block().computed_except(vec![Attribute::string("name")
            .required()
            .describe("The name of the edge gateway.")]))
    }

    async fn read(&self, client: &Client, config: &DynamicValue) -> Result<DynamicValue> {
        let edge = client
            .get_edge_gateway_by_name(&get_string_attr(config, "name"))
            .await?;
        Ok(from_api(&edge))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_api_uses_urn() {
        let edge = EdgeGateway {
            edge_id: "2a3b".into(),
            edge_name: "tn01e02ocb0001234spt101".into(),
            owner_type: OWNER_VDC.into(),
            owner_name: "VDC_Test".into(),
            tier0_vrf_name: "prvrf01eocb0001234allsp01".into(),
            rate_limit: 5,
            ..Default::default()
        };
        let state = from_api(&edge);
        assert_eq!(get_string_attr(&state, "id"), "urn:vcloud:gateway:2a3b");
        assert_eq!(get_int_attr(&state, "bandwidth", 0), 5);
    }

    #[test]
    fn test_bandwidth_validation() {
        let config = make_state(vec![
            ("owner_type", string_value("vdc")),
            ("owner_name", string_value("VDC_Test")),
            ("bandwidth", int_value(42)),
        ]);
        let violations = EdgeGatewayResource.schema().block.check(&config);
        assert_eq!(violations.len(), 1);
        assert!(violations[0].detail.contains("42"));
    }
}
