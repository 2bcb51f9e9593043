//! Organization certificate library

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::client::{fiql_escape, Client, CLOUDAPI};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateLibraryItem {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub alias: String,
    #[serde(default)]
    pub description: String,
    pub certificate: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key_passphrase: Option<String>,
}

/// Rough PEM shape check, enough to catch pasting the wrong file.
pub fn looks_like_pem(value: &str, label: &str) -> bool {
    let value = value.trim();
    value.starts_with("-----BEGIN ")
        && value.ends_with("-----")
        && value.contains(label)
}

impl Client {
    pub async fn get_certificate(&self, id: &str) -> Result<CertificateLibraryItem> {
        self.get(&format!("{}/ssl/certificateLibrary/{}", CLOUDAPI, id))
            .await
    }

    pub async fn get_certificate_by_alias(&self, alias: &str) -> Result<CertificateLibraryItem> {
        let filter = format!("alias=={}", fiql_escape(alias));
        let mut found: Vec<CertificateLibraryItem> = self
            .get_all(&format!("{}/ssl/certificateLibrary", CLOUDAPI), Some(&filter))
            .await?;
        if found.is_empty() {
            return Err(Error::not_found("certificate", alias));
        }
        Ok(found.remove(0))
    }

    pub async fn create_certificate(
        &self,
        item: &CertificateLibraryItem,
    ) -> Result<CertificateLibraryItem> {
        info!(alias = %item.alias, "Adding certificate to library");
        let done = self
            .post(&format!("{}/ssl/certificateLibrary", CLOUDAPI), item)
            .await?;
        match done.entity_id {
            Some(id) => self.get_certificate(&id).await,
            None => self.get_certificate_by_alias(&item.alias).await,
        }
    }

    pub async fn update_certificate(
        &self,
        id: &str,
        item: &CertificateLibraryItem,
    ) -> Result<CertificateLibraryItem> {
        info!(id = %id, "Updating certificate");
        let mut body = item.clone();
        body.id = id.to_string();
        self.put(&format!("{}/ssl/certificateLibrary/{}", CLOUDAPI, id), &body)
            .await?;
        self.get_certificate(id).await
    }

    pub async fn delete_certificate(&self, id: &str) -> Result<()> {
        info!(id = %id, "Deleting certificate");
        self.delete(&format!("{}/ssl/certificateLibrary/{}", CLOUDAPI, id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pem_shape() {
        let cert = "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n";
        assert!(looks_like_pem(cert, "CERTIFICATE"));
        assert!(!looks_like_pem(cert, "PRIVATE KEY"));
        assert!(!looks_like_pem("MIIB", "CERTIFICATE"));
    }
}
