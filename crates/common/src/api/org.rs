//! Organization

use serde::{Deserialize, Serialize};

use crate::client::{fiql_escape, Client, CLOUDAPI};
use crate::error::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Org {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub is_enabled: bool,
}

impl Client {
    /// Organization the provider is logged into.
    pub async fn get_org(&self) -> Result<Org> {
        let session_org = self.org().await?;
        if !session_org.id.is_empty() {
            return self
                .get(&format!("{}/orgs/{}", CLOUDAPI, session_org.id))
                .await;
        }
        let name = self.config().org.clone();
        self.get_by_name(&format!("{}/orgs", CLOUDAPI), "organization", &fiql_escape(&name), None)
            .await
    }
}
