//! Resource Implementations
//!
//! Implements the CRUD operations for each resource type, plus the data
//! sources that read the same objects.

pub mod backup;
pub mod bms;
pub mod certificate;
pub mod edgegateway;
pub mod iam_right;
pub mod iam_role;
pub mod iam_user;
pub mod network_isolated;
pub mod network_routed;
pub mod org;
pub mod publicip;
pub mod tier0;
pub mod vdc;
pub mod vdcg;
pub mod vdcg_app_port_profile;
pub mod vdcg_firewall;
pub mod vdcg_ip_set;
pub mod vdcg_security_group;

use std::sync::Arc;

use anyhow::{bail, Result};
use cloudavenue_common::api::vdcg::VdcGroup;
use cloudavenue_common::Client;

use crate::schema::{Attribute, Schema};
use crate::state::{get_optional_string_attr, make_state, string_value, DynamicValue};

/// Every type name carries the provider prefix.
pub const PREFIX: &str = "cloudavenue_";

/// Trait for resource operations
#[async_trait::async_trait]
pub trait Resource: Send + Sync {
    /// Resource type name
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Create a new resource
    async fn create(&self, client: &Client, plan: &DynamicValue) -> Result<DynamicValue>;

    /// Read an existing resource
    async fn read(&self, client: &Client, state: &DynamicValue) -> Result<DynamicValue>;

    /// Update an existing resource
    async fn update(
        &self,
        client: &Client,
        prior: &DynamicValue,
        plan: &DynamicValue,
    ) -> Result<DynamicValue>;

    /// Delete a resource
    async fn delete(&self, client: &Client, state: &DynamicValue) -> Result<()>;

    /// Turns an import id into the partial state `read` starts from.
    fn import_state(&self, id: &str) -> Result<DynamicValue> {
        Ok(make_state(vec![("id", string_value(id))]))
    }
}

/// Trait for data source reads
#[async_trait::async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn read(&self, client: &Client, config: &DynamicValue) -> Result<DynamicValue>;
}

pub fn resources() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(vdc::VdcResource),
        Arc::new(vdcg::VdcGroupResource),
        Arc::new(edgegateway::EdgeGatewayResource),
        Arc::new(publicip::PublicIpResource),
        Arc::new(network_routed::NetworkRoutedResource),
        Arc::new(network_isolated::NetworkIsolatedResource),
        Arc::new(vdcg_firewall::VdcGroupFirewallResource),
        Arc::new(vdcg_security_group::SecurityGroupResource),
        Arc::new(vdcg_ip_set::IpSetResource),
        Arc::new(vdcg_app_port_profile::AppPortProfileResource),
        Arc::new(iam_user::UserResource),
        Arc::new(iam_role::RoleResource),
        Arc::new(certificate::CertificateResource),
        Arc::new(backup::BackupResource),
    ]
}

pub fn data_sources() -> Vec<Arc<dyn DataSource>> {
    vec![
        Arc::new(org::OrgDataSource),
        Arc::new(vdc::VdcDataSource),
        Arc::new(vdc::VdcsDataSource),
        Arc::new(vdcg::VdcGroupDataSource),
        Arc::new(edgegateway::EdgeGatewayDataSource),
        Arc::new(tier0::Tier0VrfDataSource),
        Arc::new(tier0::Tier0VrfsDataSource),
        Arc::new(publicip::PublicIpDataSource),
        Arc::new(network_routed::NetworkRoutedDataSource),
        Arc::new(network_isolated::NetworkIsolatedDataSource),
        Arc::new(vdcg_firewall::VdcGroupFirewallDataSource),
        Arc::new(vdcg_security_group::SecurityGroupDataSource),
        Arc::new(vdcg_ip_set::IpSetDataSource),
        Arc::new(vdcg_app_port_profile::AppPortProfileDataSource),
        Arc::new(iam_user::UserDataSource),
        Arc::new(iam_role::RoleDataSource),
        Arc::new(iam_right::RightDataSource),
        Arc::new(certificate::CertificateDataSource),
        Arc::new(backup::BackupDataSource),
        Arc::new(bms::BmsDataSource),
    ]
}

/// Splits a dotted import id into exactly `names.len()` parts.
pub fn import_parts(id: &str, names: &[&str]) -> Result<Vec<String>> {
    let parts: Vec<String> = id.split('.').map(str::to_string).collect();
    if parts.len() != names.len() || parts.iter().any(String::is_empty) {
        bail!(
            "unexpected import identifier {:?}, expected {}",
            id,
            names.join(".")
        );
    }
    Ok(parts)
}

/// The pair of attributes locating the parent VDC group.
pub fn vdc_group_attributes(force_new: bool) -> Vec<Attribute> {
    let mut id = Attribute::string("vdc_group_id")
        .optional_computed()
        .stable()
        .describe("The ID of the VDC group. Exactly one of `vdc_group_id` or `vdc_group_name` must be set.")
        .validate(crate::schema::Validator::Urn("vdcGroup"));
    let mut name = Attribute::string("vdc_group_name")
        .optional_computed()
        .stable()
        .describe("The name of the VDC group. Exactly one of `vdc_group_id` or `vdc_group_name` must be set.");
    if force_new {
        id = id.force_new();
        name = name.force_new();
    }
    vec![id, name]
}

/// Resolves the parent VDC group from `vdc_group_id` or `vdc_group_name`.
pub async fn resolve_vdc_group(client: &Client, value: &DynamicValue) -> Result<VdcGroup> {
    if let Some(id) = get_optional_string_attr(value, "vdc_group_id") {
        return Ok(client.get_vdc_group(&id).await?);
    }
    if let Some(name) = get_optional_string_attr(value, "vdc_group_name") {
        return Ok(client.get_vdc_group_by_name(&name).await?);
    }
    bail!("one of vdc_group_id or vdc_group_name must be set")
}

/// Optional VDC name defaulting to the provider's `vdc`.
pub fn vdc_attribute() -> Attribute {
    Attribute::string("vdc")
        .optional_computed()
        .stable()
        .force_new()
        .describe("The name of the VDC. If omitted, the VDC configured on the provider is used.")
}

pub fn resolve_vdc(client: &Client, value: &DynamicValue) -> Result<String> {
    let explicit = get_optional_string_attr(value, "vdc");
    Ok(client.config().vdc_or(explicit.as_deref())?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_type_names_are_unique_and_prefixed() {
        let mut seen = HashSet::new();
        for name in resources().iter().map(|r| r.type_name()) {
            assert!(name.starts_with(PREFIX), "{name}");
            assert!(seen.insert(name), "duplicate resource {name}");
        }
        let mut seen = HashSet::new();
        for name in data_sources().iter().map(|d| d.type_name()) {
            assert!(name.starts_with(PREFIX), "{name}");
            assert!(seen.insert(name), "duplicate data source {name}");
        }
    }

    #[test]
    fn test_every_resource_has_a_stable_id() {
        for resource in resources() {
            let schema = resource.schema();
            let id = schema
                .block
                .attribute("id")
                .unwrap_or_else(|| panic!("{} has no id", resource.type_name()));
            assert!(id.computed && id.stable, "{}", resource.type_name());
        }
    }

    #[test]
    fn test_import_parts() {
        assert_eq!(
            import_parts("grp.web", &["vdcGroupName", "name"]).unwrap(),
            vec!["grp", "web"]
        );
        assert!(import_parts("grp", &["vdcGroupName", "name"]).is_err());
        assert!(import_parts("grp.", &["vdcGroupName", "name"]).is_err());
    }
}
