//! NetBackup protection of VDCs, vApps and VMs

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crate::client::NetBackupClient;
use crate::error::{Error, Result};

/// What a backup protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    Vdc,
    Vapp,
    Vm,
}

impl TargetKind {
    pub const ALL: &'static [&'static str] = &["vdc", "vapp", "vm"];

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "vdc" => Ok(TargetKind::Vdc),
            "vapp" => Ok(TargetKind::Vapp),
            "vm" => Ok(TargetKind::Vm),
            other => Err(Error::InvalidConfig(format!(
                "unknown backup target type {}",
                other
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TargetKind::Vdc => "vdc",
            TargetKind::Vapp => "vapp",
            TargetKind::Vm => "vm",
        }
    }

    fn collection(self) -> &'static str {
        match self {
            TargetKind::Vdc => "/v6/vcloud/vdcs",
            TargetKind::Vapp => "/v6/vcloud/vapps",
            TargetKind::Vm => "/v6/vcloud/vms",
        }
    }
}

/// A vCloud object as NetBackup inventories it
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupTarget {
    pub id: i64,
    pub name: String,
    /// vCD URN of the object
    #[serde(default)]
    pub identifier: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtectionLevel {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub code: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppliedProtection {
    pub protection_level_id: i64,
    pub protection_level_name: String,
}

impl NetBackupClient {
    /// Finds the inventory entry by vCD URN or by name.
    pub async fn find_target(&self, kind: TargetKind, id_or_name: &str) -> Result<BackupTarget> {
        let targets: Vec<BackupTarget> = self.get(kind.collection(), &[]).await?;
        targets
            .into_iter()
            .find(|t| t.identifier == id_or_name || t.name == id_or_name)
            .ok_or_else(|| Error::not_found(format!("backup {}", kind.as_str()), id_or_name))
    }

    pub async fn get_target(&self, kind: TargetKind, id: i64) -> Result<BackupTarget> {
        self.get(&format!("{}/{}", kind.collection(), id), &[]).await
    }

    pub async fn list_protection_levels(&self) -> Result<Vec<ProtectionLevel>> {
        self.get("/v6/vcloud/protectionlevels", &[]).await
    }

    pub async fn protection_level_by_name(&self, name: &str) -> Result<ProtectionLevel> {
        self.list_protection_levels()
            .await?
            .into_iter()
            .find(|l| l.name == name)
            .ok_or_else(|| Error::not_found("protection level", name))
    }

    pub async fn get_protection(
        &self,
        kind: TargetKind,
        id: i64,
    ) -> Result<Vec<AppliedProtection>> {
        self.get(&format!("{}/{}/protection", kind.collection(), id), &[])
            .await
    }

    pub async fn protect(&self, kind: TargetKind, id: i64, level_id: i64) -> Result<()> {
        info!(kind = kind.as_str(), target = id, level = level_id, "Protecting");
        self.post_job(
            &format!("{}/{}/protect", kind.collection(), id),
            &json!({ "protectionLevelId": level_id }),
        )
        .await?;
        Ok(())
    }

    pub async fn unprotect(&self, kind: TargetKind, id: i64, level_id: i64) -> Result<()> {
        info!(kind = kind.as_str(), target = id, level = level_id, "Unprotecting");
        self.post_job(
            &format!("{}/{}/unprotect", kind.collection(), id),
            &json!({ "protectionLevelId": level_id }),
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_kind() {
        assert_eq!(TargetKind::parse("vapp").unwrap(), TargetKind::Vapp);
        assert!(TargetKind::parse("org").is_err());
        assert_eq!(TargetKind::Vm.collection(), "/v6/vcloud/vms");
        for kind in TargetKind::ALL {
            assert_eq!(TargetKind::parse(kind).unwrap().as_str(), *kind);
        }
    }
}
