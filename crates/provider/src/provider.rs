//! Cloud Avenue Terraform Provider Implementation
//!
//! Implements the Terraform Plugin Protocol v6 Provider service.

use std::collections::HashMap;
use std::sync::Arc;

use cloudavenue_common::{is_not_found, Client, ProviderConfig};
use tokio::sync::RwLock;
use tonic::{Request, Response, Status};
use tracing::{debug, error, info, warn};

use crate::generated::tfplugin6::provider_server::Provider;
use crate::generated::tfplugin6::*;
use crate::plan::plan_change;
use crate::resources::{self, DataSource, Resource};
use crate::schema::{self, path_to_proto, PathStep, Schema, Violation};
use crate::state::{
    decode_dynamic_value, decode_json_state, encode_dynamic_value, get_optional_string_attr,
    DynamicValue as LocalDynamicValue,
};

type ResourceEntry = (Arc<dyn Resource>, Schema);
type DataSourceEntry = (Arc<dyn DataSource>, Schema);

/// Cloud Avenue Terraform Provider
pub struct CloudAvenueProvider {
    resources: HashMap<&'static str, ResourceEntry>,
    data_sources: HashMap<&'static str, DataSourceEntry>,
    /// Set by ConfigureProvider
    client: RwLock<Option<Arc<Client>>>,
}

impl Default for CloudAvenueProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CloudAvenueProvider {
    pub fn new() -> Self {
        Self {
            resources: resources::resources()
                .into_iter()
                .map(|r| {
                    let schema = r.schema();
                    (r.type_name(), (r, schema))
                })
                .collect(),
            data_sources: resources::data_sources()
                .into_iter()
                .map(|d| {
                    let schema = d.schema();
                    (d.type_name(), (d, schema))
                })
                .collect(),
            client: RwLock::new(None),
        }
    }

    /// Provider that skips ConfigureProvider and uses `client` directly.
    pub fn with_client(client: Client) -> Self {
        let mut provider = Self::new();
        provider.client = RwLock::new(Some(Arc::new(client)));
        provider
    }

    fn resource(&self, type_name: &str) -> Result<&ResourceEntry, Diagnostic> {
        self.resources
            .get(type_name)
            .ok_or_else(|| {
                error_diagnostic(
                    "Unknown resource type",
                    format!("The provider does not support resource type {:?}", type_name),
                )
            })
    }

    fn data_source(&self, type_name: &str) -> Result<&DataSourceEntry, Diagnostic> {
        self.data_sources
            .get(type_name)
            .ok_or_else(|| {
                error_diagnostic(
                    "Unknown data source type",
                    format!("The provider does not support data source type {:?}", type_name),
                )
            })
    }

    async fn get_client(&self) -> Result<Arc<Client>, Diagnostic> {
        self.client.read().await.clone().ok_or_else(|| {
            error_diagnostic(
                "Provider not configured",
                "The provider must be configured before resources or data sources are used",
            )
        })
    }

    /// Provider block values, with unset and empty strings left out.
    fn provider_attributes(config: &LocalDynamicValue) -> HashMap<String, String> {
        schema::provider_schema()
            .block
            .attributes
            .iter()
            .filter_map(|a| get_optional_string_attr(config, &a.name).map(|v| (a.name.clone(), v)))
            .collect()
    }

    /// Resolves the provider block against the environment.
    fn resolve_config(config: &LocalDynamicValue) -> Result<ProviderConfig, Vec<Diagnostic>> {
        ProviderConfig::resolve(&Self::provider_attributes(config)).map_err(|issues| {
            issues
                .into_iter()
                .map(|issue| {
                    attribute_diagnostic(
                        &[PathStep::Attribute(issue.attribute)],
                        "Invalid provider configuration",
                        issue.message,
                    )
                })
                .collect()
        })
    }
}

fn error_diagnostic(summary: impl Into<String>, detail: impl Into<String>) -> Diagnostic {
    Diagnostic {
        severity: diagnostic::Severity::Error as i32,
        summary: summary.into(),
        detail: detail.into(),
        attribute: None,
    }
}

fn attribute_diagnostic(
    path: &[PathStep],
    summary: impl Into<String>,
    detail: impl Into<String>,
) -> Diagnostic {
    Diagnostic {
        attribute: Some(path_to_proto(path)),
        ..error_diagnostic(summary, detail)
    }
}

fn violation_diagnostics(violations: Vec<Violation>) -> Vec<Diagnostic> {
    violations
        .into_iter()
        .map(|v| attribute_diagnostic(&v.path, v.summary, v.detail))
        .collect()
}

/// `{:#}` keeps the whole context chain of the error.
fn failure(summary: &str, err: &anyhow::Error) -> Diagnostic {
    error_diagnostic(summary, format!("{:#}", err))
}

fn decode(value: Option<&DynamicValue>) -> Result<LocalDynamicValue, Diagnostic> {
    let decoded = match value {
        None => Ok(LocalDynamicValue::Null),
        Some(v) if !v.msgpack.is_empty() => decode_dynamic_value(&v.msgpack),
        Some(v) => decode_json_state(&v.json),
    };
    decoded.map_err(|e| failure("Invalid value from Terraform", &e))
}

fn encode(value: &LocalDynamicValue) -> Result<DynamicValue, Diagnostic> {
    encode_dynamic_value(value)
        .map(|msgpack| DynamicValue {
            msgpack,
            json: vec![],
        })
        .map_err(|e| failure("Failed to encode state", &e))
}

#[tonic::async_trait]
impl Provider for CloudAvenueProvider {
    async fn get_metadata(
        &self,
        _request: Request<get_metadata::Request>,
    ) -> Result<Response<get_metadata::Response>, Status> {
        debug!("GetMetadata called");

        let mut resources: Vec<_> = self.resources.keys().collect();
        resources.sort();
        let mut data_sources: Vec<_> = self.data_sources.keys().collect();
        data_sources.sort();

        Ok(Response::new(get_metadata::Response {
            server_capabilities: Some(ServerCapabilities {
                plan_destroy: true,
                get_provider_schema_optional: false,
            }),
            diagnostics: vec![],
            data_sources: data_sources
                .into_iter()
                .map(|name| get_metadata::DataSourceMetadata {
                    type_name: name.to_string(),
                })
                .collect(),
            resources: resources
                .into_iter()
                .map(|name| get_metadata::ResourceMetadata {
                    type_name: name.to_string(),
                })
                .collect(),
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<get_provider_schema::Request>,
    ) -> Result<Response<get_provider_schema::Response>, Status> {
        info!("GetProviderSchema called");

        let response = get_provider_schema::Response {
            provider: Some(schema::provider_schema().to_proto()),
            resource_schemas: self
                .resources
                .iter()
                .map(|(name, (_, schema))| (name.to_string(), schema.to_proto()))
                .collect(),
            data_source_schemas: self
                .data_sources
                .iter()
                .map(|(name, (_, schema))| (name.to_string(), schema.to_proto()))
                .collect(),
            diagnostics: vec![],
            provider_meta: None,
            server_capabilities: Some(ServerCapabilities {
                plan_destroy: true,
                get_provider_schema_optional: false,
            }),
        };

        Ok(Response::new(response))
    }

    async fn validate_provider_config(
        &self,
        request: Request<validate_provider_config::Request>,
    ) -> Result<Response<validate_provider_config::Response>, Status> {
        debug!("ValidateProviderConfig called");

        let req = request.into_inner();
        let config = match decode(req.config.as_ref()) {
            Ok(config) => config,
            Err(d) => {
                return Ok(Response::new(validate_provider_config::Response {
                    diagnostics: vec![d],
                }))
            }
        };

        let mut diagnostics = violation_diagnostics(schema::provider_schema().block.check(&config));
        // Values known only at apply time are checked by ConfigureProvider.
        if diagnostics.is_empty() && config.is_wholly_known() {
            if let Err(issues) = Self::resolve_config(&config) {
                diagnostics.extend(issues);
            }
        }

        Ok(Response::new(validate_provider_config::Response { diagnostics }))
    }

    async fn validate_resource_config(
        &self,
        request: Request<validate_resource_config::Request>,
    ) -> Result<Response<validate_resource_config::Response>, Status> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "ValidateResourceConfig called");

        let diagnostics = match (self.resource(&req.type_name), decode(req.config.as_ref())) {
            (Ok((_, schema)), Ok(config)) => violation_diagnostics(schema.block.check(&config)),
            (Err(d), _) | (_, Err(d)) => vec![d],
        };

        Ok(Response::new(validate_resource_config::Response { diagnostics }))
    }

    async fn validate_data_resource_config(
        &self,
        request: Request<validate_data_resource_config::Request>,
    ) -> Result<Response<validate_data_resource_config::Response>, Status> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "ValidateDataResourceConfig called");

        let diagnostics = match (self.data_source(&req.type_name), decode(req.config.as_ref())) {
            (Ok((_, schema)), Ok(config)) => violation_diagnostics(schema.block.check(&config)),
            (Err(d), _) | (_, Err(d)) => vec![d],
        };

        Ok(Response::new(validate_data_resource_config::Response { diagnostics }))
    }

    async fn upgrade_resource_state(
        &self,
        request: Request<upgrade_resource_state::Request>,
    ) -> Result<Response<upgrade_resource_state::Response>, Status> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, version = req.version, "UpgradeResourceState called");

        let result = self.resource(&req.type_name).and_then(|(_, schema)| {
            let raw = req.raw_state.map(|raw| raw.json).unwrap_or_default();
            let state = decode_json_state(&raw).map_err(|e| failure("Invalid stored state", &e))?;
            encode(&schema.block.conform(&state))
        });

        Ok(Response::new(match result {
            Ok(upgraded) => upgrade_resource_state::Response {
                upgraded_state: Some(upgraded),
                diagnostics: vec![],
            },
            Err(d) => upgrade_resource_state::Response {
                upgraded_state: None,
                diagnostics: vec![d],
            },
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<configure_provider::Request>,
    ) -> Result<Response<configure_provider::Response>, Status> {
        let req = request.into_inner();
        info!(terraform_version = %req.terraform_version, "ConfigureProvider called");

        let config = match decode(req.config.as_ref()) {
            Ok(config) => config,
            Err(d) => {
                return Ok(Response::new(configure_provider::Response {
                    diagnostics: vec![d],
                }))
            }
        };
        let config = match Self::resolve_config(&config) {
            Ok(config) => config,
            Err(diagnostics) => {
                return Ok(Response::new(configure_provider::Response { diagnostics }))
            }
        };

        info!(url = %config.url, org = %config.org, "Connecting to Cloud Avenue");
        match Client::connect(config).await {
            Ok(client) => {
                *self.client.write().await = Some(Arc::new(client));
                info!("Connected to Cloud Avenue");
                Ok(Response::new(configure_provider::Response {
                    diagnostics: vec![],
                }))
            }
            Err(e) => {
                error!("Failed to connect to Cloud Avenue: {}", e);
                Ok(Response::new(configure_provider::Response {
                    diagnostics: vec![error_diagnostic(
                        "Unable to authenticate on Cloud Avenue",
                        e.to_string(),
                    )],
                }))
            }
        }
    }

    async fn read_resource(
        &self,
        request: Request<read_resource::Request>,
    ) -> Result<Response<read_resource::Response>, Status> {
        let req = request.into_inner();
        info!(type_name = %req.type_name, "ReadResource called");

        let current = req.current_state.clone();
        let respond = |new_state: Option<DynamicValue>, diagnostics: Vec<Diagnostic>| {
            Ok::<_, Status>(Response::new(read_resource::Response {
                new_state,
                diagnostics,
                private: req.private.clone(),
            }))
        };

        let (resource, schema) = match self.resource(&req.type_name) {
            Ok(entry) => entry,
            Err(d) => return respond(current, vec![d]),
        };
        let state = match decode(req.current_state.as_ref()) {
            Ok(state) if state.is_null() => return respond(current, vec![]),
            Ok(state) => state,
            Err(d) => return respond(current, vec![d]),
        };
        let client = match self.get_client().await {
            Ok(client) => client,
            Err(d) => return respond(current, vec![d]),
        };

        match resource.read(&client, &state).await {
            Ok(new_state) => match encode(&schema.block.conform(&new_state)) {
                Ok(encoded) => respond(Some(encoded), vec![]),
                Err(d) => respond(current, vec![d]),
            },
            Err(e) if is_not_found(&e) => {
                warn!(
                    type_name = %req.type_name,
                    "Resource no longer exists, removing it from state"
                );
                respond(encode(&LocalDynamicValue::Null).ok(), vec![])
            }
            Err(e) => respond(current, vec![failure("Failed to read resource", &e)]),
        }
    }

    async fn plan_resource_change(
        &self,
        request: Request<plan_resource_change::Request>,
    ) -> Result<Response<plan_resource_change::Response>, Status> {
        let req = request.into_inner();
        debug!(type_name = %req.type_name, "PlanResourceChange called");

        let planned = (|| {
            let (_, schema) = self.resource(&req.type_name)?;
            let prior = decode(req.prior_state.as_ref())?;
            let proposed = decode(req.proposed_new_state.as_ref())?;
            let config = decode(req.config.as_ref())?;
            let plan = plan_change(&schema.block, &prior, &proposed, &config);
            Ok::<_, Diagnostic>((encode(&plan.planned)?, plan.requires_replace))
        })();

        Ok(Response::new(match planned {
            Ok((planned_state, requires_replace)) => plan_resource_change::Response {
                planned_state: Some(planned_state),
                requires_replace: requires_replace.iter().map(|p| path_to_proto(p)).collect(),
                planned_private: req.prior_private,
                diagnostics: vec![],
                legacy_type_system: false,
            },
            Err(d) => plan_resource_change::Response {
                planned_state: None,
                requires_replace: vec![],
                planned_private: vec![],
                diagnostics: vec![d],
                legacy_type_system: false,
            },
        }))
    }

    async fn apply_resource_change(
        &self,
        request: Request<apply_resource_change::Request>,
    ) -> Result<Response<apply_resource_change::Response>, Status> {
        let req = request.into_inner();
        info!(type_name = %req.type_name, "ApplyResourceChange called");

        let respond = |new_state: Option<DynamicValue>, diagnostics: Vec<Diagnostic>| {
            Ok::<_, Status>(Response::new(apply_resource_change::Response {
                new_state,
                private: vec![],
                diagnostics,
                legacy_type_system: false,
            }))
        };

        let (resource, schema) = match self.resource(&req.type_name) {
            Ok(entry) => entry,
            Err(d) => return respond(None, vec![d]),
        };
        let (prior, planned) = match (
            decode(req.prior_state.as_ref()),
            decode(req.planned_state.as_ref()),
        ) {
            (Ok(prior), Ok(planned)) => (prior, planned),
            (Err(d), _) | (_, Err(d)) => return respond(req.prior_state, vec![d]),
        };
        let client = match self.get_client().await {
            Ok(client) => client,
            Err(d) => return respond(req.prior_state, vec![d]),
        };

        let result = match (prior.is_null(), planned.is_null()) {
            // Create
            (true, false) => resource.create(&client, &planned).await,
            // Delete
            (false, true) => resource
                .delete(&client, &prior)
                .await
                .map(|_| LocalDynamicValue::Null),
            // Update
            (false, false) => resource.update(&client, &prior, &planned).await,
            // No change
            (true, true) => Ok(LocalDynamicValue::Null),
        };

        match result {
            Ok(new_state) => match encode(&schema.block.conform(&new_state)) {
                Ok(encoded) => respond(Some(encoded), vec![]),
                Err(d) => respond(req.prior_state, vec![d]),
            },
            Err(e) => {
                error!(type_name = %req.type_name, "Apply failed: {:#}", e);
                let summary = match (prior.is_null(), planned.is_null()) {
                    (true, _) => "Failed to create resource",
                    (_, true) => "Failed to delete resource",
                    _ => "Failed to update resource",
                };
                // A failed create leaves nothing behind; otherwise keep the prior state.
                let keep = if prior.is_null() { None } else { req.prior_state };
                respond(keep, vec![failure(summary, &e)])
            }
        }
    }

    async fn import_resource_state(
        &self,
        request: Request<import_resource_state::Request>,
    ) -> Result<Response<import_resource_state::Response>, Status> {
        let req = request.into_inner();
        info!(type_name = %req.type_name, id = %req.id, "ImportResourceState called");

        let imported = async {
            let (resource, schema) = self.resource(&req.type_name)?;
            let client = self.get_client().await?;
            let initial = resource
                .import_state(&req.id)
                .map_err(|e| failure("Invalid import identifier", &e))?;
            let state = resource
                .read(&client, &initial)
                .await
                .map_err(|e| failure("Failed to import resource", &e))?;
            encode(&schema.block.conform(&state))
        }
        .await;

        Ok(Response::new(match imported {
            Ok(state) => import_resource_state::Response {
                imported_resources: vec![import_resource_state::ImportedResource {
                    type_name: req.type_name,
                    state: Some(state),
                    private: vec![],
                }],
                diagnostics: vec![],
            },
            Err(d) => import_resource_state::Response {
                imported_resources: vec![],
                diagnostics: vec![d],
            },
        }))
    }

    async fn read_data_source(
        &self,
        request: Request<read_data_source::Request>,
    ) -> Result<Response<read_data_source::Response>, Status> {
        let req = request.into_inner();
        info!(type_name = %req.type_name, "ReadDataSource called");

        let read = async {
            let (data_source, schema) = self.data_source(&req.type_name)?;
            let config = decode(req.config.as_ref())?;
            let client = self.get_client().await?;
            let state = data_source
                .read(&client, &config)
                .await
                .map_err(|e| failure("Failed to read data source", &e))?;
            encode(&schema.block.conform(&state))
        }
        .await;

        Ok(Response::new(match read {
            Ok(state) => read_data_source::Response {
                state: Some(state),
                diagnostics: vec![],
            },
            Err(d) => read_data_source::Response {
                state: None,
                diagnostics: vec![d],
            },
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<stop_provider::Request>,
    ) -> Result<Response<stop_provider::Response>, Status> {
        info!("StopProvider called");
        Ok(Response::new(stop_provider::Response {
            error: String::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{make_state, string_value};

    fn config_value(value: &LocalDynamicValue) -> Option<DynamicValue> {
        Some(encode(value).unwrap())
    }

    #[tokio::test]
    async fn test_metadata_lists_every_type() {
        let provider = CloudAvenueProvider::new();
        let metadata = provider
            .get_metadata(Request::new(get_metadata::Request {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(metadata.resources.len(), resources::resources().len());
        assert_eq!(metadata.data_sources.len(), resources::data_sources().len());
        assert!(metadata.server_capabilities.unwrap().plan_destroy);
    }

    #[tokio::test]
    async fn test_unknown_type_is_a_diagnostic() {
        let provider = CloudAvenueProvider::new();
        let response = provider
            .validate_resource_config(Request::new(validate_resource_config::Request {
                type_name: "cloudavenue_nope".into(),
                config: None,
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Unknown resource type");
    }

    #[tokio::test]
    async fn test_read_before_configure() {
        let provider = CloudAvenueProvider::new();
        let state = make_state(vec![("id", string_value("urn:vcloud:vdcGroup:1"))]);
        let response = provider
            .read_data_source(Request::new(read_data_source::Request {
                type_name: "cloudavenue_vdcg".into(),
                config: config_value(&state),
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.state.is_none());
        assert_eq!(response.diagnostics[0].summary, "Provider not configured");
    }

    #[tokio::test]
    async fn test_validation_errors_carry_paths() {
        let provider = CloudAvenueProvider::new();
        let config = make_state(vec![
            ("name", string_value("x")),
            ("service_class", string_value("PLATINUM")),
        ]);
        let response = provider
            .validate_resource_config(Request::new(validate_resource_config::Request {
                type_name: "cloudavenue_vdc".into(),
                config: config_value(&config),
            }))
            .await
            .unwrap()
            .into_inner();
        let paths: Vec<_> = response
            .diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_ref())
            .collect();
        assert!(paths.len() >= 2);
    }

    #[tokio::test]
    async fn test_upgrade_conforms_json_state() {
        let provider = CloudAvenueProvider::new();
        let response = provider
            .upgrade_resource_state(Request::new(upgrade_resource_state::Request {
                type_name: "cloudavenue_iam_role".into(),
                version: 0,
                raw_state: Some(RawState {
                    json: br#"{"id":"urn:vcloud:role:1","name":"r","obsolete":true}"#.to_vec(),
                    flatmap: HashMap::new(),
                }),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.diagnostics.is_empty());
        let state = decode_dynamic_value(&response.upgraded_state.unwrap().msgpack).unwrap();
        assert!(state.get("obsolete").is_none());
        assert!(state.get("rights").unwrap().is_null());
        assert_eq!(state.get("name"), Some(&string_value("r")));
    }

    #[tokio::test]
    async fn test_plan_destroy_is_null() {
        let provider = CloudAvenueProvider::new();
        let prior = make_state(vec![("id", string_value("urn:vcloud:role:1"))]);
        let response = provider
            .plan_resource_change(Request::new(plan_resource_change::Request {
                type_name: "cloudavenue_iam_role".into(),
                prior_state: config_value(&prior),
                proposed_new_state: config_value(&LocalDynamicValue::Null),
                config: config_value(&LocalDynamicValue::Null),
                prior_private: vec![],
                provider_meta: None,
            }))
            .await
            .unwrap()
            .into_inner();
        let planned = decode_dynamic_value(&response.planned_state.unwrap().msgpack).unwrap();
        assert!(planned.is_null());
    }

    #[test]
    fn test_provider_issues_are_attribute_scoped() {
        let config = make_state(vec![
            ("user", string_value("alice")),
            ("password", string_value("secret")),
            ("org", string_value("not-an-org")),
        ]);
        let errors = CloudAvenueProvider::resolve_config(&config).unwrap_err();
        assert!(errors.iter().any(|d| {
            d.attribute
                .as_ref()
                .map(|p| p.steps.len() == 1)
                .unwrap_or(false)
        }));
    }
}
