//! Organization users
//!
//! The API never returns the password, so state keeps the configured one.

use anyhow::Result;
use cloudavenue_common::api::iam::User;
use cloudavenue_common::{Client, EntityRef};

use super::{DataSource, Resource};
use crate::schema::{Attribute, Block, Schema, Validator};
use crate::state::{
    bool_value, get_bool_attr, get_int_attr, get_optional_string_attr, get_string_attr,
    int_value, make_state, null_value, optional_string_value, string_value, DynamicValue,
};

fn user_block() -> Block {
    Block::new(
        "Provides a local user of the organization.",
        vec![
            Attribute::id(),
            Attribute::string("name")
                .required()
                .force_new()
                .describe("The login name of the user."),
            Attribute::string("role_name")
                .required()
                .describe("The name of the role assigned to the user."),
            Attribute::string("password")
                .required()
                .sensitive()
                .validate(Validator::LengthBetween(6, 128))
                .describe("The password of the user. Changing it resets the password."),
            Attribute::string("full_name")
                .optional()
                .describe("The full name of the user."),
            Attribute::string("email")
                .optional()
                .describe("The email address of the user."),
            Attribute::string("telephone")
                .optional()
                .describe("The phone number of the user."),
            Attribute::string("description")
                .optional_computed()
                .describe("The description of the user."),
            Attribute::bool("enabled")
                .default(bool_value(true))
                .describe("Whether the user can log in."),
            Attribute::number("deployed_vm_quota")
                .default(int_value(0))
                .validate(Validator::IntBetween(0, 1000))
                .describe("How many VMs the user can deploy. `0` means unlimited."),
            Attribute::number("stored_vm_quota")
                .default(int_value(0))
                .validate(Validator::IntBetween(0, 1000))
                .describe("How many VMs the user can store. `0` means unlimited."),
        ],
    )
}

async fn to_api(client: &Client, plan: &DynamicValue) -> Result<User> {
    let role = client
        .get_role_by_name(&get_string_attr(plan, "role_name"))
        .await?;
    let org = client.get_org().await?;
    Ok(User {
        id: String::new(),
        username: get_string_attr(plan, "name"),
        full_name: get_string_attr(plan, "full_name"),
        description: get_string_attr(plan, "description"),
        email: get_string_attr(plan, "email"),
        phone: get_string_attr(plan, "telephone"),
        role_entity_refs: vec![EntityRef::named(role.id, role.name)],
        org_entity_ref: EntityRef::named(org.id, org.name),
        password: get_optional_string_attr(plan, "password"),
        deployed_vm_quota: get_int_attr(plan, "deployed_vm_quota", 0),
        stored_vm_quota: get_int_attr(plan, "stored_vm_quota", 0),
        enabled: get_bool_attr(plan, "enabled", true),
        locked: false,
        provider_type: "LOCAL".to_string(),
    })
}

/// `known` supplies the password, which is write only.
fn from_api(user: &User, known: &DynamicValue) -> DynamicValue {
    let role_name = user
        .role_entity_refs
        .first()
        .map(|r| string_value(&r.name))
        .unwrap_or_else(null_value);
    let password = match get_optional_string_attr(known, "password") {
        Some(p) => string_value(p),
        None => null_value(),
    };
    make_state(vec![
        ("id", string_value(&user.id)),
        ("name", string_value(&user.username)),
        ("role_name", role_name),
        ("password", password),
        ("full_name", optional_string_value(&user.full_name)),
        ("email", optional_string_value(&user.email)),
        ("telephone", optional_string_value(&user.phone)),
        ("description", string_value(&user.description)),
        ("enabled", bool_value(user.enabled)),
        ("deployed_vm_quota", int_value(user.deployed_vm_quota)),
        ("stored_vm_quota", int_value(user.stored_vm_quota)),
    ])
}

pub struct UserResource;

#[async_trait::async_trait]
impl Resource for UserResource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_iam_user"
    }

    fn schema(&self) -> Schema {
        Schema::new(user_block())
    }

    async fn create(&self, client: &Client, plan: &DynamicValue) -> Result<DynamicValue> {
        let created = client.create_user(&to_api(client, plan).await?).await?;
        Ok(from_api(&created, plan))
    }

    async fn read(&self, client: &Client, state: &DynamicValue) -> Result<DynamicValue> {
        let user = match get_optional_string_attr(state, "id") {
            Some(id) => client.get_user(&id).await?,
            None => client.get_user_by_name(&get_string_attr(state, "name")).await?,
        };
        Ok(from_api(&user, state))
    }

    async fn update(
        &self,
        client: &Client,
        prior: &DynamicValue,
        plan: &DynamicValue,
    ) -> Result<DynamicValue> {
        let mut user = to_api(client, plan).await?;
        if get_optional_string_attr(prior, "password") == user.password {
            user.password = None;
        }
        let updated = client
            .update_user(&get_string_attr(prior, "id"), &user)
            .await?;
        Ok(from_api(&updated, plan))
    }

    async fn delete(&self, client: &Client, state: &DynamicValue) -> Result<()> {
        client.delete_user(&get_string_attr(state, "id")).await?;
        Ok(())
    }

    /// Imported by login name. The password must be set in config afterwards.
    fn import_state(&self, id: &str) -> Result<DynamicValue> {
        Ok(make_state(vec![("name", string_value(id))]))
    }
}

pub struct UserDataSource;

#[async_trait::async_trait]
impl DataSource for UserDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_iam_user"
    }

    fn schema(&self) -> Schema {
        Schema::new(user_block().without(&["password"]).computed_except(vec![
            Attribute::string("name")
                .required()
                .describe("The login name of the user."),
        ]))
    }

    async fn read(&self, client: &Client, config: &DynamicValue) -> Result<DynamicValue> {
        let user = client
            .get_user_by_name(&get_string_attr(config, "name"))
            .await?;
        let mut state = from_api(&user, &DynamicValue::Null);
        if let DynamicValue::Map(attrs) = &mut state {
            attrs.remove("password");
        }
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        User {
            id: "urn:vcloud:user:1".into(),
            username: "alice".into(),
            role_entity_refs: vec![EntityRef::named(
                "urn:vcloud:role:1",
                "Organization Administrator",
            )],
            enabled: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_password_comes_from_known_state() {
        let known = make_state(vec![("password", string_value("s3cret!"))]);
        let state = from_api(&user(), &known);
        assert_eq!(get_string_attr(&state, "password"), "s3cret!");
        assert_eq!(get_string_attr(&state, "role_name"), "Organization Administrator");
        assert!(state.get("email").unwrap().is_null());

        let imported = from_api(&user(), &UserResource.import_state("alice").unwrap());
        assert!(imported.get("password").unwrap().is_null());
    }

    #[test]
    fn test_data_source_hides_password() {
        let schema = UserDataSource.schema();
        assert!(schema.block.attribute("password").is_none());
        assert!(schema.block.attribute("role_name").unwrap().computed);
        assert!(schema.block.attribute("name").unwrap().required);
    }

    #[test]
    fn test_password_is_sensitive() {
        let schema = UserResource.schema();
        assert!(schema.block.attribute("password").unwrap().sensitive);
    }
}
