//! VDC Groups and their distributed firewall policies

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::api::firewall::DfwRule;
use crate::client::{fiql_escape, Client, CLOUDAPI};
use crate::error::{Error, Result};
use crate::types::{EntityRef, Values};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VdcGroup {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub org_id: String,
    #[serde(default)]
    pub local_egress: bool,
    #[serde(default)]
    pub participating_org_vdcs: Vec<ParticipatingVdc>,
    #[serde(rename = "type", default = "default_group_type")]
    pub group_type: String,
    #[serde(default = "default_network_provider")]
    pub network_provider_type: String,
    #[serde(default, skip_serializing)]
    pub status: String,
    #[serde(default)]
    pub dfw_enabled: bool,
}

fn default_group_type() -> String {
    "LOCAL".to_string()
}

fn default_network_provider() -> String {
    "NSX_T".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipatingVdc {
    pub vdc_ref: EntityRef,
    #[serde(default)]
    pub org_ref: EntityRef,
    #[serde(default)]
    pub site_ref: EntityRef,
    #[serde(default)]
    pub network_provider_scope: String,
    #[serde(default)]
    pub fault_domain_tag: String,
    #[serde(default, skip_serializing)]
    pub status: String,
}

/// A VDC that may join a group, as returned by `candidateVdcs`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateVdc {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub org_ref: EntityRef,
    #[serde(default)]
    pub site_ref: EntityRef,
    #[serde(default)]
    pub network_provider_scope: String,
    #[serde(default)]
    pub fault_domain_tag: String,
}

impl From<CandidateVdc> for ParticipatingVdc {
    fn from(c: CandidateVdc) -> Self {
        ParticipatingVdc {
            vdc_ref: EntityRef::named(c.id, c.name),
            org_ref: c.org_ref,
            site_ref: c.site_ref,
            network_provider_scope: c.network_provider_scope,
            fault_domain_tag: c.fault_domain_tag,
            status: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DfwPolicies {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_policy: Option<DfwPolicy>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DfwPolicy {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub enabled: bool,
}

impl VdcGroup {
    pub fn vdc_ids(&self) -> Vec<String> {
        self.participating_org_vdcs
            .iter()
            .map(|p| p.vdc_ref.id.clone())
            .collect()
    }
}

impl Client {
    pub async fn get_vdc_group(&self, id: &str) -> Result<VdcGroup> {
        self.get(&format!("{}/vdcGroups/{}", CLOUDAPI, id)).await
    }

    pub async fn get_vdc_group_by_name(&self, name: &str) -> Result<VdcGroup> {
        self.get_by_name(
            &format!("{}/vdcGroups", CLOUDAPI),
            "VDC group",
            &fiql_escape(name),
            None,
        )
        .await
    }

    /// Resolves a VDC group given either its URN or its name.
    pub async fn find_vdc_group(&self, id_or_name: &str) -> Result<VdcGroup> {
        if crate::types::is_urn(id_or_name, "vdcGroup") {
            self.get_vdc_group(id_or_name).await
        } else {
            self.get_vdc_group_by_name(id_or_name).await
        }
    }

    /// VDCs of the current organization that can join a local group.
    pub async fn candidate_vdcs(&self, org_id: &str) -> Result<Vec<CandidateVdc>> {
        let filter = format!("_context==LOCAL;_context=={}", org_id);
        self.get_all(
            &format!("{}/vdcGroups/networkingCandidateVdcs", CLOUDAPI),
            Some(&filter),
        )
        .await
    }

    /// Builds the participants list for the given VDC ids.
    pub async fn participants(
        &self,
        org_id: &str,
        vdc_ids: &[String],
    ) -> Result<Vec<ParticipatingVdc>> {
        let candidates = self.candidate_vdcs(org_id).await?;
        vdc_ids
            .iter()
            .map(|id| {
                candidates
                    .iter()
                    .find(|c| &c.id == id || &c.name == id)
                    .cloned()
                    .map(ParticipatingVdc::from)
                    .ok_or_else(|| Error::not_found("VDC group candidate VDC", id.clone()))
            })
            .collect()
    }

    pub async fn create_vdc_group(&self, group: &VdcGroup) -> Result<VdcGroup> {
        info!(vdc_group = %group.name, "Creating VDC group");
        let done = self.post(&format!("{}/vdcGroups", CLOUDAPI), group).await?;
        match done.entity_id {
            Some(id) => self.get_vdc_group(&id).await,
            None => self.get_vdc_group_by_name(&group.name).await,
        }
    }

    pub async fn update_vdc_group(&self, id: &str, group: &VdcGroup) -> Result<VdcGroup> {
        info!(vdc_group = %id, "Updating VDC group");
        self.put(&format!("{}/vdcGroups/{}", CLOUDAPI, id), group)
            .await?;
        self.get_vdc_group(id).await
    }

    pub async fn delete_vdc_group(&self, id: &str) -> Result<()> {
        info!(vdc_group = %id, "Deleting VDC group");
        self.execute::<()>(
            Method::DELETE,
            &format!("{}/vdcGroups/{}?force=true", CLOUDAPI, id),
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn get_dfw_policies(&self, vdcg_id: &str) -> Result<DfwPolicies> {
        self.get(&format!("{}/vdcGroups/{}/dfwPolicies", CLOUDAPI, vdcg_id))
            .await
    }

    pub async fn set_dfw_enabled(&self, vdcg_id: &str, enabled: bool) -> Result<()> {
        info!(vdc_group = %vdcg_id, enabled, "Switching distributed firewall");
        self.put(
            &format!("{}/vdcGroups/{}/dfwPolicies", CLOUDAPI, vdcg_id),
            &json!({ "enabled": enabled }),
        )
        .await?;
        Ok(())
    }

    /// Id of the group's default policy, which holds the managed rules.
    pub async fn default_dfw_policy(&self, vdcg_id: &str) -> Result<String> {
        self.get_dfw_policies(vdcg_id)
            .await?
            .default_policy
            .map(|p| p.id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::not_found("default firewall policy of VDC group", vdcg_id))
    }

    pub async fn get_dfw_rules(&self, vdcg_id: &str, policy_id: &str) -> Result<Vec<DfwRule>> {
        let rules: Values<DfwRule> = self
            .get(&format!(
                "{}/vdcGroups/{}/dfwPolicies/{}/rules",
                CLOUDAPI, vdcg_id, policy_id
            ))
            .await?;
        Ok(rules.values)
    }

    /// Replaces the whole rule list of the policy.
    pub async fn set_dfw_rules(
        &self,
        vdcg_id: &str,
        policy_id: &str,
        rules: Vec<DfwRule>,
    ) -> Result<Vec<DfwRule>> {
        info!(vdc_group = %vdcg_id, count = rules.len(), "Writing firewall rules");
        self.put(
            &format!(
                "{}/vdcGroups/{}/dfwPolicies/{}/rules",
                CLOUDAPI, vdcg_id, policy_id
            ),
            &Values::new(rules),
        )
        .await?;
        self.get_dfw_rules(vdcg_id, policy_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vdc_group_defaults() {
        let group: VdcGroup = serde_json::from_str(
            r#"{"id":"urn:vcloud:vdcGroup:1","name":"grp","participatingOrgVdcs":[
                {"vdcRef":{"name":"vdc1","id":"urn:vcloud:vdc:1"},"status":"REALIZED"}]}"#,
        )
        .unwrap();
        assert_eq!(group.group_type, "LOCAL");
        assert_eq!(group.network_provider_type, "NSX_T");
        assert_eq!(group.vdc_ids(), vec!["urn:vcloud:vdc:1".to_string()]);

        let body = serde_json::to_value(&group).unwrap();
        assert!(body.get("status").is_none());
        assert_eq!(body["type"], "LOCAL");
    }
}
