//! Routed network resource and data source

use anyhow::{anyhow, Result};
use cloudavenue_common::api::network::{
    IpRange, NetworkConnection, OrgVdcNetwork, Subnet, NAT_ROUTED,
};
use cloudavenue_common::{Client, EntityRef, Values, KV_MUTEX};

use super::{DataSource, Resource};
use crate::schema::{Attribute, Block, BlockValidator, Schema, Validator};
use crate::state::{
    empty_list_as, get_int_attr, get_list_attr, get_optional_string_attr, get_string_attr,
    int_value, list_value, make_state, null_value, optional_string_value, string_value,
    DynamicValue,
};

/// Subnet attributes shared by routed and isolated networks.
pub(super) fn subnet_attributes() -> Vec<Attribute> {
    vec![
        Attribute::string("gateway")
            .required()
            .force_new()
            .validate(Validator::IpAddress)
            .describe("The gateway IP address of the network."),
        Attribute::number("prefix_length")
            .required()
            .force_new()
            .validate(Validator::IntBetween(1, 32))
            .describe("The prefix length of the network."),
        Attribute::string("dns1")
            .optional()
            .validate(Validator::IpAddress)
            .describe("The primary DNS server."),
        Attribute::string("dns2")
            .optional()
            .validate(Validator::IpAddress)
            .describe("The secondary DNS server."),
        Attribute::string("dns_suffix")
            .optional()
            .describe("The DNS suffix."),
        Attribute::set_nested(
            "static_ip_pool",
            vec![
                Attribute::string("start_address")
                    .required()
                    .validate(Validator::IpAddress)
                    .describe("The first address of the range."),
                Attribute::string("end_address")
                    .required()
                    .validate(Validator::IpAddress)
                    .describe("The last address of the range."),
            ],
        )
        .optional()
        .describe("IP ranges used for static pool allocation in the network."),
    ]
}

pub(super) fn subnet_to_api(plan: &DynamicValue) -> Values<Subnet> {
    let ranges = get_list_attr(plan, "static_ip_pool")
        .iter()
        .map(|r| IpRange {
            start_address: get_string_attr(r, "start_address"),
            end_address: get_string_attr(r, "end_address"),
        })
        .collect();
    Values::new(vec![Subnet {
        gateway: get_string_attr(plan, "gateway"),
        prefix_length: get_int_attr(plan, "prefix_length", 0),
        dns_server1: get_string_attr(plan, "dns1"),
        dns_server2: get_string_attr(plan, "dns2"),
        dns_suffix: get_string_attr(plan, "dns_suffix"),
        enabled: true,
        ip_ranges: Values::new(ranges),
    }])
}

pub(super) fn subnet_to_state(
    network: &OrgVdcNetwork,
    known: &DynamicValue,
) -> Vec<(&'static str, DynamicValue)> {
    let subnet = network.subnets.values.first().cloned().unwrap_or_default();
    let pool = if subnet.ip_ranges.values.is_empty() {
        empty_list_as(known, "static_ip_pool")
    } else {
        list_value(
            subnet
                .ip_ranges
                .values
                .iter()
                .map(|r| {
                    make_state(vec![
                        ("start_address", string_value(&r.start_address)),
                        ("end_address", string_value(&r.end_address)),
                    ])
                })
                .collect(),
        )
    };
    vec![
        ("gateway", string_value(&subnet.gateway)),
        ("prefix_length", int_value(subnet.prefix_length)),
        ("dns1", optional_string_value(&subnet.dns_server1)),
        ("dns2", optional_string_value(&subnet.dns_server2)),
        ("dns_suffix", optional_string_value(&subnet.dns_suffix)),
        ("static_ip_pool", pool),
    ]
}

fn routed_block() -> Block {
    let mut attributes = vec![
        Attribute::id(),
        Attribute::string("name")
            .required()
            .describe("The name of the network."),
        Attribute::string("description")
            .optional_computed()
            .describe("The description of the network."),
        Attribute::string("edge_gateway_id")
            .optional_computed()
            .stable()
            .force_new()
            .validate(Validator::Urn("gateway"))
            .describe("The ID of the edge gateway the network is routed through."),
        Attribute::string("edge_gateway_name")
            .optional_computed()
            .stable()
            .force_new()
            .describe("The name of the edge gateway the network is routed through."),
    ];
    attributes.extend(subnet_attributes());
    Block::new("Provides a routed network attached to an edge gateway.", attributes)
        .validate(BlockValidator::ExactlyOneOf(&["edge_gateway_id", "edge_gateway_name"]))
}

fn from_api(network: &OrgVdcNetwork, edge_name: &str, known: &DynamicValue) -> DynamicValue {
    let edge = network
        .connection
        .as_ref()
        .map(|c| c.router_ref.clone())
        .unwrap_or_default();
    let mut attrs = vec![
        ("id", string_value(&network.id)),
        ("name", string_value(&network.name)),
        ("description", string_value(&network.description)),
        ("edge_gateway_id", string_value(&edge.id)),
        (
            "edge_gateway_name",
            string_value(if edge.name.is_empty() { edge_name } else { edge.name.as_str() }),
        ),
    ];
    attrs.extend(subnet_to_state(network, known));
    make_state(attrs)
}

/// Edge gateway URN and name, from whichever the config carries.
async fn resolve_edge(client: &Client, value: &DynamicValue) -> Result<(String, String)> {
    if let Some(id) = get_optional_string_attr(value, "edge_gateway_id") {
        let edge = client.get_edge_gateway(&id).await?;
        return Ok((edge.urn(), edge.edge_name));
    }
    let name = get_optional_string_attr(value, "edge_gateway_name")
        .ok_or_else(|| anyhow!("one of edge_gateway_id or edge_gateway_name must be set"))?;
    let edge = client.get_edge_gateway_by_name(&name).await?;
    Ok((edge.urn(), edge.edge_name))
}

async fn to_api(
    client: &Client,
    plan: &DynamicValue,
    edge_id: &str,
    edge_name: &str,
) -> Result<OrgVdcNetwork> {
    let owner = client.edge_gateway_owner(edge_id).await?;
    Ok(OrgVdcNetwork {
        id: String::new(),
        name: get_string_attr(plan, "name"),
        description: get_string_attr(plan, "description"),
        owner_ref: owner,
        network_type: NAT_ROUTED.to_string(),
        connection: Some(NetworkConnection {
            router_ref: EntityRef::named(edge_id, edge_name),
            connection_type: "INTERNAL".into(),
        }),
        subnets: subnet_to_api(plan),
        guest_vlan_allowed: false,
    })
}

pub struct NetworkRoutedResource;

#[async_trait::async_trait]
impl Resource for NetworkRoutedResource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_network_routed"
    }

    fn schema(&self) -> Schema {
        Schema::new(routed_block())
    }

    async fn create(&self, client: &Client, plan: &DynamicValue) -> Result<DynamicValue> {
        let (edge_id, edge_name) = resolve_edge(client, plan).await?;
        let network = to_api(client, plan, &edge_id, &edge_name).await?;
        let _lock = KV_MUTEX.lock(edge_id.clone()).await;
        let created = client.create_network(&network).await?;
        Ok(from_api(&created, &edge_name, plan))
    }

    async fn read(&self, client: &Client, state: &DynamicValue) -> Result<DynamicValue> {
        let network = match get_optional_string_attr(state, "id") {
            Some(id) => client.get_network(&id).await?,
            None => {
                let (edge_id, _) = resolve_edge(client, state).await?;
                let owner = client.edge_gateway_owner(&edge_id).await?;
                client
                    .get_network_by_name(&owner.id, &get_string_attr(state, "name"))
                    .await?
            }
        };
        Ok(from_api(&network, &get_string_attr(state, "edge_gateway_name"), state))
    }

    async fn update(
        &self,
        client: &Client,
        prior: &DynamicValue,
        plan: &DynamicValue,
    ) -> Result<DynamicValue> {
        let id = get_string_attr(prior, "id");
        let edge_id = get_string_attr(prior, "edge_gateway_id");
        let edge_name = get_string_attr(prior, "edge_gateway_name");
        let network = to_api(client, plan, &edge_id, &edge_name).await?;
        let _lock = KV_MUTEX.lock(edge_id.clone()).await;
        let updated = client.update_network(&id, &network).await?;
        Ok(from_api(&updated, &edge_name, plan))
    }

    async fn delete(&self, client: &Client, state: &DynamicValue) -> Result<()> {
        let _lock = KV_MUTEX.lock(get_string_attr(state, "edge_gateway_id")).await;
        client.delete_network(&get_string_attr(state, "id")).await?;
        Ok(())
    }

    /// `edgeGatewayName.networkName`
    fn import_state(&self, id: &str) -> Result<DynamicValue> {
        let parts = super::import_parts(id, &["edgeGatewayName", "networkName"])?;
        Ok(make_state(vec![
            ("edge_gateway_name", string_value(&parts[0])),
            ("name", string_value(&parts[1])),
        ]))
    }
}

pub struct NetworkRoutedDataSource;

#[async_trait::async_trait]
impl DataSource for NetworkRoutedDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_network_routed"
    }

    fn schema(&self) -> Schema {
        let block = routed_block();
        let lookups = vec![
            Attribute::string("name").required().describe("The name of the network."),
            Attribute::string("edge_gateway_id")
                .optional_computed()
                .validate(Validator::Urn("gateway"))
                .describe("The ID of the edge gateway."),
            Attribute::string("edge_gateway_name")
                .optional_computed()
                .describe("The name of the edge gateway."),
        ];
        Schema::new(
            block
                .computed_except(lookups)
                .validate(BlockValidator::ExactlyOneOf(&["edge_gateway_id", "edge_gateway_name"])),
        )
    }

    async fn read(&self, client: &Client, config: &DynamicValue) -> Result<DynamicValue> {
        NetworkRoutedResource.read(client, config).await
    }
}
