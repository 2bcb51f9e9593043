//! Organization roles and their rights

use anyhow::Result;
use cloudavenue_common::api::iam::Role;
use cloudavenue_common::Client;

use super::{DataSource, Resource};
use crate::schema::{AttrType, Attribute, Block, BlockValidator, Schema, Validator};
use crate::state::{
    bool_value, get_optional_string_attr, get_string_attr, get_string_list_attr, make_state,
    string_list_value, string_value, DynamicValue,
};

fn role_block() -> Block {
    Block::new(
        "Provides a role of the organization with its set of rights.",
        vec![
            Attribute::id(),
            Attribute::string("name")
                .required()
                .describe("The name of the role."),
            Attribute::string("description")
                .required()
                .describe("The description of the role."),
            Attribute::set("rights", AttrType::String)
                .required()
                .describe("The names of the rights granted by the role."),
            Attribute::bool("read_only")
                .computed()
                .describe("Predefined roles are read only."),
        ],
    )
}

fn from_api(role: &Role, rights: Vec<String>) -> DynamicValue {
    make_state(vec![
        ("id", string_value(&role.id)),
        ("name", string_value(&role.name)),
        ("description", string_value(&role.description)),
        ("rights", string_list_value(rights)),
        ("read_only", bool_value(role.read_only)),
    ])
}

async fn read_role(client: &Client, role: Role) -> Result<DynamicValue> {
    let mut rights: Vec<String> = client
        .get_role_rights(&role.id)
        .await?
        .into_iter()
        .map(|r| r.name)
        .collect();
    rights.sort();
    Ok(from_api(&role, rights))
}

async fn write_rights(client: &Client, role_id: &str, plan: &DynamicValue) -> Result<()> {
    let names = get_string_list_attr(plan, "rights");
    let refs = client.resolve_rights(&names).await?;
    client.set_role_rights(role_id, refs).await?;
    Ok(())
}

pub struct RoleResource;

#[async_trait::async_trait]
impl Resource for RoleResource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_iam_role"
    }

    fn schema(&self) -> Schema {
        Schema::new(role_block())
    }

    async fn create(&self, client: &Client, plan: &DynamicValue) -> Result<DynamicValue> {
        let role = client
            .create_role(&Role {
                name: get_string_attr(plan, "name"),
                description: get_string_attr(plan, "description"),
                ..Default::default()
            })
            .await?;
        write_rights(client, &role.id, plan).await?;
        read_role(client, role).await
    }

    async fn read(&self, client: &Client, state: &DynamicValue) -> Result<DynamicValue> {
        let role = match get_optional_string_attr(state, "id") {
            Some(id) => client.get_role(&id).await?,
            None => client.get_role_by_name(&get_string_attr(state, "name")).await?,
        };
        read_role(client, role).await
    }

    async fn update(
        &self,
        client: &Client,
        prior: &DynamicValue,
        plan: &DynamicValue,
    ) -> Result<DynamicValue> {
        let id = get_string_attr(prior, "id");
        let role = client
            .update_role(
                &id,
                &Role {
                    name: get_string_attr(plan, "name"),
                    description: get_string_attr(plan, "description"),
                    ..Default::default()
                },
            )
            .await?;
        let sorted = |v: &DynamicValue| {
            let mut rights = get_string_list_attr(v, "rights");
            rights.sort();
            rights
        };
        if sorted(prior) != sorted(plan) {
            write_rights(client, &id, plan).await?;
        }
        read_role(client, role).await
    }

    async fn delete(&self, client: &Client, state: &DynamicValue) -> Result<()> {
        client.delete_role(&get_string_attr(state, "id")).await?;
        Ok(())
    }

    /// Imported by role name.
    fn import_state(&self, id: &str) -> Result<DynamicValue> {
        Ok(make_state(vec![("name", string_value(id))]))
    }
}

pub struct RoleDataSource;

#[async_trait::async_trait]
impl DataSource for RoleDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_iam_role"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            role_block()
                .computed_except(vec![
                    Attribute::string("id")
                        .optional_computed()
                        .validate(Validator::Urn("role"))
                        .describe("The ID of the role."),
                    Attribute::string("name")
                        .optional_computed()
                        .describe("The name of the role."),
                ])
                .validate(BlockValidator::ExactlyOneOf(&["id", "name"])),
        )
    }

    async fn read(&self, client: &Client, config: &DynamicValue) -> Result<DynamicValue> {
        RoleResource.read(client, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rights_are_a_set() {
        let schema = RoleResource.schema();
        assert_eq!(
            schema.block.attribute("rights").unwrap().type_label(),
            "Set of String"
        );
    }

    #[test]
    fn test_from_api() {
        let role = Role {
            id: "urn:vcloud:role:1".into(),
            name: "network-admin".into(),
            description: "Manages networks".into(),
            ..Default::default()
        };
        let state = from_api(&role, vec!["Organization vDC Network: View Properties".into()]);
        assert_eq!(get_string_list_attr(&state, "rights").len(), 1);
        assert_eq!(state.get("read_only"), Some(&bool_value(false)));
    }

    #[test]
    fn test_data_source_requires_id_xor_name() {
        let schema = RoleDataSource.schema();
        assert_eq!(schema.block.check(&make_state(vec![])).len(), 1);
        let by_name = make_state(vec![("name", string_value("network-admin"))]);
        assert!(schema.block.check(&by_name).is_empty());
    }
}
