//! Virtual Data Centers (Cloud Avenue API)

use reqwest::Method;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::{Client, CUSTOMERS_V2};
use crate::error::Result;

pub const SERVICE_CLASSES: &[&str] = &["ECO", "STD", "HP", "VOIP"];
pub const DISPONIBILITY_CLASSES: &[&str] = &["ONE-ROOM", "DUAL-ROOM", "HA-DUAL-ROOM"];
pub const BILLING_MODELS: &[&str] = &["PAYG", "DRAAS", "RESERVED"];
pub const STORAGE_BILLING_MODELS: &[&str] = &["PAYG", "RESERVED"];
pub const STORAGE_CLASSES: &[&str] = &[
    "silver",
    "silver_r1",
    "silver_r2",
    "gold",
    "gold_r1",
    "gold_r2",
    "gold_hm",
    "platinum3k",
    "platinum3k_r1",
    "platinum3k_r2",
    "platinum3k_hm",
    "platinum7k",
    "platinum7k_r1",
    "platinum7k_r2",
    "platinum7k_hm",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vdc {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub vdc_service_class: String,
    pub vdc_disponibility_class: String,
    pub vdc_billing_model: String,
    pub vcpu_in_mhz2: i64,
    pub cpu_allocated: i64,
    pub memory_allocated: i64,
    pub vdc_storage_billing_model: String,
    #[serde(default)]
    pub vdc_storage_profiles: Vec<VdcStorageProfile>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VdcStorageProfile {
    pub class: String,
    pub limit: i64,
    #[serde(default)]
    pub default: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VdcEnvelope {
    pub vdc: Vdc,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vdc_uuid: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VdcSummary {
    pub vdc_name: String,
    #[serde(default)]
    pub vdc_uuid: String,
}

/// vCD URN of a VDC from the UUID Cloud Avenue reports.
pub fn vdc_urn(uuid: &str) -> String {
    if uuid.starts_with("urn:") {
        uuid.to_string()
    } else {
        format!("urn:vcloud:vdc:{}", uuid)
    }
}

impl Client {
    pub async fn list_vdcs(&self) -> Result<Vec<VdcSummary>> {
        self.get(&format!("{}/vdcs", CUSTOMERS_V2)).await
    }

    pub async fn get_vdc(&self, name: &str) -> Result<VdcEnvelope> {
        self.get(&format!("{}/vdcs/{}", CUSTOMERS_V2, name)).await
    }

    pub async fn create_vdc(&self, vdc: &Vdc) -> Result<VdcEnvelope> {
        info!(vdc = %vdc.name, "Creating VDC");
        let body = VdcEnvelope {
            vdc: vdc.clone(),
            vdc_uuid: String::new(),
        };
        self.execute_job(Method::POST, &format!("{}/vdcs", CUSTOMERS_V2), &[], Some(&body))
            .await?;
        self.get_vdc(&vdc.name).await
    }

    pub async fn update_vdc(&self, name: &str, vdc: &Vdc) -> Result<VdcEnvelope> {
        info!(vdc = %name, "Updating VDC");
        let body = VdcEnvelope {
            vdc: vdc.clone(),
            vdc_uuid: String::new(),
        };
        self.execute_job(
            Method::PUT,
            &format!("{}/vdcs/{}", CUSTOMERS_V2, name),
            &[],
            Some(&body),
        )
        .await?;
        self.get_vdc(name).await
    }

    pub async fn delete_vdc(&self, name: &str) -> Result<()> {
        info!(vdc = %name, "Deleting VDC");
        self.execute_job::<()>(
            Method::DELETE,
            &format!("{}/vdcs/{}", CUSTOMERS_V2, name),
            &[],
            None,
        )
        .await
    }
}
