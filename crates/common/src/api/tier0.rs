//! Tier-0 VRFs

use serde::{Deserialize, Serialize};

use crate::client::{Client, CUSTOMERS_V2};
use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier0Vrf {
    pub name: String,
    #[serde(default)]
    pub tier0_provider: String,
    #[serde(default)]
    pub class_service: String,
    #[serde(default)]
    pub services: Vec<Tier0Service>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tier0Service {
    pub service: String,
    #[serde(default)]
    pub vlan_id: Option<serde_json::Value>,
}

impl Tier0Service {
    /// The API reports the VLAN either as a number or as a string.
    pub fn vlan(&self) -> String {
        match &self.vlan_id {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(serde_json::Value::Number(n)) => n.to_string(),
            _ => String::new(),
        }
    }
}

impl Client {
    pub async fn list_tier0_vrfs(&self) -> Result<Vec<String>> {
        self.get(&format!("{}/tier0/vrfs", CUSTOMERS_V2)).await
    }

    pub async fn get_tier0_vrf(&self, name: &str) -> Result<Tier0Vrf> {
        self.get(&format!("{}/tier0/vrfs/{}", CUSTOMERS_V2, name))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vlan_formats() {
        let vrf: Tier0Vrf = serde_json::from_str(
            r#"{"name":"prvrf01","tier0Provider":"pr01","classService":"VRF_STANDARD",
                "services":[{"service":"SVC1","vlanId":"101"},{"service":"SVC2","vlanId":202},
                            {"service":"SVC3"}]}"#,
        )
        .unwrap();
        let vlans: Vec<_> = vrf.services.iter().map(Tier0Service::vlan).collect();
        assert_eq!(vlans, vec!["101", "202", ""]);
    }
}
