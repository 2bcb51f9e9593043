//! Public IP resource and data source

use anyhow::Result;
use cloudavenue_common::api::publicip::PublicIp;
use cloudavenue_common::{Client, KV_MUTEX};

use super::{DataSource, Resource};
use crate::schema::{Attribute, Block, Schema, Validator};
use crate::state::{get_string_attr, make_state, string_value, DynamicValue};

fn publicip_block() -> Block {
    Block::new(
        "Provides a public IP routed to an edge gateway.",
        vec![
            Attribute::id(),
            Attribute::string("public_ip")
                .computed()
                .stable()
                .describe("The public IP address."),
            Attribute::string("edge_name")
                .required()
                .force_new()
                .describe("The name of the edge gateway the IP is attached to."),
        ],
    )
}

/// IPs are locked on the URN of their edge gateway, like routed networks.
async fn edge_lock_key(client: &Client, edge_name: &str) -> Result<String> {
    Ok(client.get_edge_gateway_by_name(edge_name).await?.urn())
}

fn from_api(ip: &PublicIp) -> DynamicValue {
    make_state(vec![
        ("id", string_value(&ip.uplink_ip)),
        ("public_ip", string_value(&ip.uplink_ip)),
        ("edge_name", string_value(&ip.edge_gateway_name)),
    ])
}

pub struct PublicIpResource;

#[async_trait::async_trait]
impl Resource for PublicIpResource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_publicip"
    }

    fn schema(&self) -> Schema {
        Schema::new(publicip_block())
    }

    async fn create(&self, client: &Client, plan: &DynamicValue) -> Result<DynamicValue> {
        let edge_name = get_string_attr(plan, "edge_name");
        let _lock = KV_MUTEX.lock(edge_lock_key(client, &edge_name).await?).await;
        let ip = client.create_public_ip(&edge_name).await?;
        Ok(from_api(&ip))
    }

    async fn read(&self, client: &Client, state: &DynamicValue) -> Result<DynamicValue> {
        let ip = client.get_public_ip(&get_string_attr(state, "id")).await?;
        Ok(from_api(&ip))
    }

    /// Every attribute forces replacement.
    async fn update(
        &self,
        client: &Client,
        _prior: &DynamicValue,
        plan: &DynamicValue,
    ) -> Result<DynamicValue> {
        self.read(client, plan).await
    }

    async fn delete(&self, client: &Client, state: &DynamicValue) -> Result<()> {
        let key = edge_lock_key(client, &get_string_attr(state, "edge_name")).await?;
        let _lock = KV_MUTEX.lock(key).await;
        client.delete_public_ip(&get_string_attr(state, "id")).await?;
        Ok(())
    }
}

pub struct PublicIpDataSource;

#[async_trait::async_trait]
impl DataSource for PublicIpDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_publicip"
    }

    fn schema(&self) -> Schema {
        Schema::new(publicip_block().computed_except(vec![Attribute::string("public_ip")
            .required()
            .validate(Validator::IpAddress)
            .describe("The public IP address.")]))
    }

    async fn read(&self, client: &Client, config: &DynamicValue) -> Result<DynamicValue> {
        let ip = client.get_public_ip(&get_string_attr(config, "public_ip")).await?;
        Ok(from_api(&ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ip_is_the_id() {
        let state = from_api(&PublicIp {
            uplink_ip: "203.0.113.10".into(),
            translated_ip: "10.0.0.1".into(),
            edge_gateway_name: "edge-01".into(),
        });
        assert_eq!(get_string_attr(&state, "id"), "203.0.113.10");
        assert_eq!(get_string_attr(&state, "edge_name"), "edge-01");
    }

    #[test]
    fn test_data_source_validates_address() {
        let config = make_state(vec![("public_ip", string_value("not-an-ip"))]);
        assert_eq!(PublicIpDataSource.schema().block.check(&config).len(), 1);
    }
}
