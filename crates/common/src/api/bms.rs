//! Bare metal servers (read only)

use serde::{Deserialize, Serialize};

use crate::client::{Client, CUSTOMERS_V1};
use crate::error::Result;

/// Servers sharing one set of networks
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BmsGroup {
    #[serde(default)]
    pub network: Vec<BmsNetwork>,
    #[serde(default)]
    pub bms: Vec<BmsServer>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BmsNetwork {
    #[serde(default)]
    pub vlan_id: String,
    #[serde(default)]
    pub subnet: String,
    #[serde(default)]
    pub prefix: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BmsServer {
    pub hostname: String,
    #[serde(default)]
    pub bms_type: String,
    #[serde(default)]
    pub os: String,
    #[serde(default)]
    pub bios_configuration: String,
    #[serde(default)]
    pub storages: BmsStorage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BmsStorage {
    #[serde(default)]
    pub system: Option<BmsDisk>,
    #[serde(default)]
    pub data: Vec<BmsDisk>,
    #[serde(default)]
    pub shared: Vec<BmsDisk>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BmsDisk {
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub storage_class: String,
}

impl Client {
    pub async fn list_bms(&self) -> Result<Vec<BmsGroup>> {
        self.get(&format!("{}/bms", CUSTOMERS_V1)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bms_wire_format() {
        let groups: Vec<BmsGroup> = serde_json::from_str(
            r#"[{"network":[{"vlanId":"101","subnet":"10.0.0.0","prefix":"24"}],
                 "bms":[{"hostname":"bms-01","bmsType":"GPU","os":"ubuntu22",
                         "storages":{"system":{"size":"480GB","storageClass":"ssd"},
                                     "data":[{"size":"2TB","storageClass":"nvme"}]}}]}]"#,
        )
        .unwrap();
        let server = &groups[0].bms[0];
        assert_eq!(server.hostname, "bms-01");
        assert_eq!(server.storages.system.as_ref().unwrap().size, "480GB");
        assert!(server.storages.shared.is_empty());
    }
}
