//! VDC resource and data sources

use anyhow::Result;
use cloudavenue_common::api::vdc::{
    vdc_urn, Vdc, VdcEnvelope, VdcStorageProfile, BILLING_MODELS, DISPONIBILITY_CLASSES,
    SERVICE_CLASSES, STORAGE_BILLING_MODELS, STORAGE_CLASSES,
};
use cloudavenue_common::{urn_uuid, Client};
use tracing::debug;

use super::{DataSource, Resource};
use crate::schema::{AttrType, Attribute, Block, Schema, Validator};
use crate::state::{
    bool_value, get_bool_attr, get_int_attr, get_list_attr, get_string_attr, int_value,
    list_value, make_state, string_value, DynamicValue,
};

pub struct VdcResource;

fn vdc_block() -> Block {
    Block::new(
        "Provides a Cloud Avenue VDC (Virtual Data Center).",
        vec![
            Attribute::id(),
            Attribute::string("name")
                .required()
                .force_new()
                .validate(Validator::LengthBetween(2, 27))
                .describe("The name of the VDC."),
            Attribute::string("description")
                .optional_computed()
                .describe("A description of the VDC."),
            Attribute::string("service_class")
                .required()
                .validate(Validator::OneOf(SERVICE_CLASSES))
                .describe("The service class of the VDC."),
            Attribute::string("disponibility_class")
                .required()
                .force_new()
                .validate(Validator::OneOf(DISPONIBILITY_CLASSES))
                .describe("The disponibility class of the VDC."),
            Attribute::string("billing_model")
                .required()
                .validate(Validator::OneOf(BILLING_MODELS))
                .describe("Choose Billing model of compute resources."),
            Attribute::number("cpu_speed_in_mhz")
                .required()
                .validate(Validator::IntBetween(1200, 2200))
                .describe("Specifies the clock frequency, in Mhz, for any virtual CPU that is allocated to a VM."),
            Attribute::number("cpu_allocated")
                .required()
                .describe("CPU capacity in *MHz* that is committed to be available or used as a limit in PAYG mode."),
            Attribute::number("memory_allocated")
                .required()
                .validate(Validator::IntBetween(1, 5000))
                .describe("Memory capacity in Gb that is committed to be available or used as a limit in PAYG mode."),
            Attribute::string("storage_billing_model")
                .required()
                .validate(Validator::OneOf(STORAGE_BILLING_MODELS))
                .describe("Choose Billing model of storage resources."),
            Attribute::set_nested(
                "storage_profiles",
                vec![
                    Attribute::string("class")
                        .required()
                        .validate(Validator::OneOf(STORAGE_CLASSES))
                        .describe("The storage class of the storage profile."),
                    Attribute::number("limit")
                        .required()
                        .validate(Validator::IntBetween(500, 10000))
                        .describe("Max number in *Gb* of units allocated for this storage profile."),
                    Attribute::bool("default")
                        .required()
                        .describe("Set this storage profile as default for this VDC. Only one storage profile can be default per VDC."),
                ],
            )
            .required()
            .describe("List of storage profiles for this VDC."),
        ],
    )
}

/// Builds the Cloud Avenue document from a plan.
fn to_api(plan: &DynamicValue) -> Vdc {
    Vdc {
        name: get_string_attr(plan, "name"),
        description: get_string_attr(plan, "description"),
        vdc_service_class: get_string_attr(plan, "service_class"),
        vdc_disponibility_class: get_string_attr(plan, "disponibility_class"),
        vdc_billing_model: get_string_attr(plan, "billing_model"),
        vcpu_in_mhz2: get_int_attr(plan, "cpu_speed_in_mhz", 0),
        cpu_allocated: get_int_attr(plan, "cpu_allocated", 0),
        memory_allocated: get_int_attr(plan, "memory_allocated", 0),
        vdc_storage_billing_model: get_string_attr(plan, "storage_billing_model"),
        vdc_storage_profiles: get_list_attr(plan, "storage_profiles")
            .iter()
            .map(|p| VdcStorageProfile {
                class: get_string_attr(p, "class"),
                limit: get_int_attr(p, "limit", 0),
                default: get_bool_attr(p, "default", false),
            })
            .collect(),
    }
}

fn from_api(envelope: &VdcEnvelope) -> DynamicValue {
    let vdc = &envelope.vdc;
    make_state(vec![
        ("id", string_value(vdc_urn(&envelope.vdc_uuid))),
        ("name", string_value(&vdc.name)),
        ("description", string_value(&vdc.description)),
        ("service_class", string_value(&vdc.vdc_service_class)),
        ("disponibility_class", string_value(&vdc.vdc_disponibility_class)),
        ("billing_model", string_value(&vdc.vdc_billing_model)),
        ("cpu_speed_in_mhz", int_value(vdc.vcpu_in_mhz2)),
        ("cpu_allocated", int_value(vdc.cpu_allocated)),
        ("memory_allocated", int_value(vdc.memory_allocated)),
        ("storage_billing_model", string_value(&vdc.vdc_storage_billing_model)),
        (
            "storage_profiles",
            list_value(
                vdc.vdc_storage_profiles
                    .iter()
                    .map(|p| {
                        make_state(vec![
                            ("class", string_value(&p.class)),
                            ("limit", int_value(p.limit)),
                            ("default", bool_value(p.default)),
                        ])
                    })
                    .collect(),
            ),
        ),
    ])
}

/// Finds the VDC name from state; imports only know the id.
async fn vdc_name(client: &Client, state: &DynamicValue) -> Result<String> {
    let name = get_string_attr(state, "name");
    if !name.is_empty() {
        return Ok(name);
    }
    let id = get_string_attr(state, "id");
    let uuid = urn_uuid(&id);
    client
        .list_vdcs()
        .await?
        .into_iter()
        .find(|v| v.vdc_uuid == uuid || v.vdc_name == id)
        .map(|v| v.vdc_name)
        .ok_or_else(|| cloudavenue_common::Error::not_found("VDC", id).into())
}

#[async_trait::async_trait]
impl Resource for VdcResource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_vdc"
    }

    fn schema(&self) -> Schema {
        Schema::new(vdc_block())
    }

    async fn create(&self, client: &Client, plan: &DynamicValue) -> Result<DynamicValue> {
        let created = client.create_vdc(&to_api(plan)).await?;
        Ok(from_api(&created))
    }

    async fn read(&self, client: &Client, state: &DynamicValue) -> Result<DynamicValue> {
        let name = vdc_name(client, state).await?;
        debug!(vdc = %name, "Reading VDC");
        Ok(from_api(&client.get_vdc(&name).await?))
    }

    async fn update(
        &self,
        client: &Client,
        prior: &DynamicValue,
        plan: &DynamicValue,
    ) -> Result<DynamicValue> {
        let name = get_string_attr(prior, "name");
        Ok(from_api(&client.update_vdc(&name, &to_api(plan)).await?))
    }

    async fn delete(&self, client: &Client, state: &DynamicValue) -> Result<()> {
        client.delete_vdc(&get_string_attr(state, "name")).await?;
        Ok(())
    }

    /// Imported by name.
    fn import_state(&self, id: &str) -> Result<DynamicValue> {
        Ok(make_state(vec![("name", string_value(id))]))
    }
}

pub struct VdcDataSource;

#[async_trait::async_trait]
impl DataSource for VdcDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_vdc"
    }

    fn schema(&self) -> Schema {
        Schema::new(vdc_block().computed_except(vec![Attribute::string("name")
            .required()
            .describe("The name of the VDC.")]))
    }

    async fn read(&self, client: &Client, config: &DynamicValue) -> Result<DynamicValue> {
        let name = get_string_attr(config, "name");
        Ok(from_api(&client.get_vdc(&name).await?))
    }
}

pub struct VdcsDataSource;

#[async_trait::async_trait]
impl DataSource for VdcsDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_vdcs"
    }

    fn schema(&self) -> Schema {
        Schema::new(Block::new(
            "Lists the VDCs of the organization.",
            vec![
                Attribute::string("id").computed(),
                Attribute::list_nested(
                    "vdcs",
                    vec![
                        Attribute::string("vdc_name").computed().describe("The name of the VDC."),
                        Attribute::string("vdc_uuid").computed().describe("The UUID of the VDC."),
                    ],
                )
                .computed(),
            ],
        ))
    }

    async fn read(&self, client: &Client, _config: &DynamicValue) -> Result<DynamicValue> {
        let vdcs = client.list_vdcs().await?;
        let names: Vec<&str> = vdcs.iter().map(|v| v.vdc_name.as_str()).collect();
        Ok(make_state(vec![
            ("id", string_value(names.join(","))),
            (
                "vdcs",
                list_value(
                    vdcs.iter()
                        .map(|v| {
                            make_state(vec![
                                ("vdc_name", string_value(&v.vdc_name)),
                                ("vdc_uuid", string_value(&v.vdc_uuid)),
                            ])
                        })
                        .collect(),
                ),
            ),
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> DynamicValue {
        make_state(vec![
            ("name", string_value("VDC_Test")),
            ("description", string_value("demo")),
            ("service_class", string_value("STD")),
            ("disponibility_class", string_value("ONE-ROOM")),
            ("billing_model", string_value("PAYG")),
            ("cpu_speed_in_mhz", int_value(2200)),
            ("cpu_allocated", int_value(22000)),
            ("memory_allocated", int_value(30)),
            ("storage_billing_model", string_value("PAYG")),
            (
                "storage_profiles",
                list_value(vec![make_state(vec![
                    ("class", string_value("gold")),
                    ("limit", int_value(500)),
                    ("default", bool_value(true)),
                ])]),
            ),
        ])
    }

    #[test]
    fn test_plan_maps_to_api_and_back() {
        let vdc = to_api(&plan());
        assert_eq!(vdc.vcpu_in_mhz2, 2200);
        assert_eq!(vdc.vdc_storage_profiles[0].class, "gold");

        let state = from_api(&VdcEnvelope {
            vdc,
            vdc_uuid: "1234".into(),
        });
        assert_eq!(get_string_attr(&state, "id"), "urn:vcloud:vdc:1234");
        let mut expected = plan();
        expected.set("id", string_value("urn:vcloud:vdc:1234"));
        assert_eq!(state, expected);
    }

    #[test]
    fn test_schema_rejects_unknown_storage_class() {
        let mut config = plan();
        config.set(
            "storage_profiles",
            list_value(vec![make_state(vec![
                ("class", string_value("bronze")),
                ("limit", int_value(500)),
                ("default", bool_value(true)),
            ])]),
        );
        let violations = VdcResource.schema().block.check(&config);
        assert_eq!(violations.len(), 1);
    }

    #[test]
    fn test_data_source_lookup_by_name() {
        let schema = VdcDataSource.schema();
        let name = schema.block.attribute("name").unwrap();
        assert!(name.required);
        let cpu = schema.block.attribute("cpu_allocated").unwrap();
        assert!(cpu.computed && !cpu.required);
    }
}
