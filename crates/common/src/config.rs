//! Provider configuration

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{Error, Result};

pub const DEFAULT_URL: &str = "https://console1.cloudavenue.orange-business.com";
pub const DEFAULT_NETBACKUP_URL: &str =
    "https://backup1.cloudavenue.orange-business.com/NetBackupSelfService/Api";

static ORG_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^cav\d{2}[a-z]{2}\d{2}[a-z]{3}\d{7}$").expect("organization pattern is valid")
});

/// Provider attribute name and the environment variable backing it.
pub const ENV_FALLBACKS: &[(&str, &str)] = &[
    ("url", "CLOUDAVENUE_URL"),
    ("user", "CLOUDAVENUE_USER"),
    ("password", "CLOUDAVENUE_PASSWORD"),
    ("org", "CLOUDAVENUE_ORG"),
    ("vdc", "CLOUDAVENUE_VDC"),
    ("netbackup_url", "NETBACKUP_URL"),
    ("netbackup_user", "NETBACKUP_USER"),
    ("netbackup_password", "NETBACKUP_PASSWORD"),
];

/// Provider configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Cloud Avenue console URL
    pub url: String,

    /// API user, without the organization suffix
    pub user: String,

    #[serde(skip_serializing)]
    pub password: String,

    /// Organization name (cavXXXXXXXXXXXXX)
    pub org: String,

    /// Default VDC used by resources that omit `vdc`
    pub vdc: Option<String>,

    /// NetBackup configuration, only needed by backup resources
    pub netbackup: Option<NetBackupConfig>,

    /// Async task/job polling
    pub polling: PollingConfig,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .field("org", &self.org)
            .field("vdc", &self.vdc)
            .field("netbackup", &self.netbackup)
            .finish_non_exhaustive()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_URL.to_string(),
            user: String::new(),
            password: String::new(),
            org: String::new(),
            vdc: None,
            netbackup: None,
            polling: PollingConfig::default(),
        }
    }
}

/// NetBackup credentials
#[derive(Clone, Serialize, Deserialize)]
pub struct NetBackupConfig {
    pub url: String,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl std::fmt::Debug for NetBackupConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetBackupConfig")
            .field("url", &self.url)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// How long to wait for vCD tasks and Cloud Avenue jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(30 * 60),
        }
    }
}

/// A configuration problem tied to one provider attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    pub attribute: String,
    pub message: String,
}

impl ProviderConfig {
    /// Builds the configuration from the attributes set in the provider
    /// block, falling back to the environment for anything left unset.
    pub fn resolve(attrs: &HashMap<String, String>) -> std::result::Result<Self, Vec<ConfigIssue>> {
        Self::resolve_with(attrs, |name| std::env::var(name).ok())
    }

    pub fn resolve_with(
        attrs: &HashMap<String, String>,
        env: impl Fn(&str) -> Option<String>,
    ) -> std::result::Result<Self, Vec<ConfigIssue>> {
        let lookup = |attr: &str| -> Option<String> {
            attrs
                .get(attr)
                .filter(|v| !v.is_empty())
                .cloned()
                .or_else(|| {
                    ENV_FALLBACKS
                        .iter()
                        .find(|(name, _)| *name == attr)
                        .and_then(|(_, var)| env(var))
                        .filter(|v| !v.is_empty())
                })
        };

        let config = ProviderConfig {
            url: lookup("url").unwrap_or_else(|| DEFAULT_URL.to_string()),
            user: lookup("user").unwrap_or_default(),
            password: lookup("password").unwrap_or_default(),
            org: lookup("org").unwrap_or_default(),
            vdc: lookup("vdc"),
            netbackup: match (lookup("netbackup_user"), lookup("netbackup_password")) {
                (Some(user), Some(password)) => Some(NetBackupConfig {
                    url: lookup("netbackup_url")
                        .unwrap_or_else(|| DEFAULT_NETBACKUP_URL.to_string()),
                    user,
                    password,
                }),
                _ => None,
            },
            polling: PollingConfig::default(),
        };

        let issues = config.validate();
        if issues.is_empty() {
            Ok(config)
        } else {
            Err(issues)
        }
    }

    /// Returns every problem found, attribute by attribute.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        let mut issue = |attribute: &str, message: String| {
            issues.push(ConfigIssue {
                attribute: attribute.to_string(),
                message,
            })
        };

        if !(self.url.starts_with("https://") || self.url.starts_with("http://")) {
            issue("url", format!("{} is not an http(s) URL", self.url));
        }
        if self.user.is_empty() {
            issue("user", "user is required (or set CLOUDAVENUE_USER)".to_string());
        }
        if self.password.is_empty() {
            issue(
                "password",
                "password is required (or set CLOUDAVENUE_PASSWORD)".to_string(),
            );
        }
        if self.org.is_empty() {
            issue("org", "org is required (or set CLOUDAVENUE_ORG)".to_string());
        } else if !ORG_PATTERN.is_match(&self.org) {
            issue(
                "org",
                format!(
                    "{} is not a valid organization name, expected the form cav01ev01ocb0001234",
                    self.org
                ),
            );
        }
        issues
    }

    /// VDC to use when a resource does not name one.
    pub fn vdc_or(&self, explicit: Option<&str>) -> Result<String> {
        explicit
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .or_else(|| self.vdc.clone())
            .ok_or_else(|| {
                Error::InvalidConfig(
                    "no vdc given on the resource and no default vdc in the provider".to_string(),
                )
            })
    }

    pub fn api_base(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attrs(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_resolve_from_attributes() {
        let config = ProviderConfig::resolve_with(
            &attrs(&[
                ("user", "alice"),
                ("password", "secret"),
                ("org", "cav01ev01ocb0001234"),
            ]),
            |_| None,
        )
        .unwrap();

        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.user, "alice");
        assert_eq!(config.org, "cav01ev01ocb0001234");
        assert!(config.vdc.is_none());
        assert!(config.netbackup.is_none());
    }

    #[test]
    fn test_env_fallback_and_precedence() {
        let env = |name: &str| match name {
            "CLOUDAVENUE_USER" => Some("from-env".to_string()),
            "CLOUDAVENUE_PASSWORD" => Some("env-secret".to_string()),
            "CLOUDAVENUE_ORG" => Some("cav01ev01ocb0001234".to_string()),
            "CLOUDAVENUE_VDC" => Some("VDC_Test".to_string()),
            "NETBACKUP_USER" => Some("nbu".to_string()),
            "NETBACKUP_PASSWORD" => Some("nbu-secret".to_string()),
            _ => None,
        };
        let config = ProviderConfig::resolve_with(&attrs(&[("user", "explicit")]), env).unwrap();

        assert_eq!(config.user, "explicit");
        assert_eq!(config.password, "env-secret");
        assert_eq!(config.vdc.as_deref(), Some("VDC_Test"));
        let nbu = config.netbackup.unwrap();
        assert_eq!(nbu.url, DEFAULT_NETBACKUP_URL);
        assert_eq!(nbu.user, "nbu");
    }

    #[test]
    fn test_invalid_configuration_reports_every_attribute() {
        let issues = ProviderConfig::resolve_with(
            &attrs(&[("url", "console.example"), ("org", "myorg")]),
            |_| None,
        )
        .unwrap_err();

        let names: Vec<_> = issues.iter().map(|i| i.attribute.as_str()).collect();
        assert_eq!(names, vec!["url", "user", "password", "org"]);
    }

    #[test]
    fn test_org_shape() {
        for org in ["cav01ev01ocb0001234", "cav02ev03abc7654321"] {
            assert!(ORG_PATTERN.is_match(org), "{org}");
        }
        for org in [
            "cavab01cd1234567",
            "cav01ev01ocb000123",
            "CAV01EV01OCB0001234",
            "xav01ev01ocb0001234",
        ] {
            assert!(!ORG_PATTERN.is_match(org), "{org}");
        }

        let issues = ProviderConfig::resolve_with(
            &attrs(&[("user", "alice"), ("password", "secret"), ("org", "cavab01cd1234567")]),
            |_| None,
        )
        .unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].attribute, "org");
    }

    #[test]
    fn test_vdc_fallback() {
        let config = ProviderConfig {
            vdc: Some("default-vdc".into()),
            ..Default::default()
        };
        assert_eq!(config.vdc_or(Some("other")).unwrap(), "other");
        assert_eq!(config.vdc_or(Some("")).unwrap(), "default-vdc");
        assert_eq!(config.vdc_or(None).unwrap(), "default-vdc");

        let config = ProviderConfig::default();
        assert!(config.vdc_or(None).is_err());
    }

    #[test]
    fn test_debug_hides_password() {
        let config = ProviderConfig {
            password: "hunter2".into(),
            ..Default::default()
        };
        assert!(!format!("{:?}", config).contains("hunter2"));
    }
}
