//! Organization data source

use anyhow::Result;
use cloudavenue_common::api::org::Org;
use cloudavenue_common::Client;

use super::{DataSource, PREFIX};
use crate::schema::{Attribute, Block, Schema};
use crate::state::{bool_value, make_state, string_value, DynamicValue};

pub struct OrgDataSource;

#[async_trait::async_trait]
impl DataSource for OrgDataSource {
    fn type_name(&self) -> &'static str {
        "cloudavenue_org"
    }

    fn schema(&self) -> Schema {
        Schema::new(Block::new(
            "The organization the provider is connected to.",
            vec![
                Attribute::string("id").computed().describe("The ID of the organization."),
                Attribute::string("name").computed().describe("The name of the organization."),
                Attribute::string("full_name")
                    .computed()
                    .describe("The display name of the organization."),
                Attribute::string("description").computed(),
                Attribute::bool("is_enabled")
                    .computed()
                    .describe("Whether the organization is enabled."),
            ],
        ))
    }

    async fn read(&self, client: &Client, _config: &DynamicValue) -> Result<DynamicValue> {
        let org = client.get_org().await?;
        Ok(from_api(&org))
    }
}

fn from_api(org: &Org) -> DynamicValue {
    make_state(vec![
        ("id", string_value(&org.id)),
        ("name", string_value(&org.name)),
        ("full_name", string_value(&org.display_name)),
        ("description", string_value(&org.description)),
        ("is_enabled", bool_value(org.is_enabled)),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::get_string_attr;

    #[test]
    fn test_from_api() {
        let org = Org {
            id: "urn:vcloud:org:1".into(),
            name: "cav01ev01ocb0001234".into(),
            display_name: "Demo".into(),
            ..Default::default()
        };
        let state = from_api(&org);
        assert_eq!(get_string_attr(&state, "full_name"), "Demo");
        assert!(OrgDataSource.type_name().starts_with(PREFIX));
    }
}
