//! Apply and import driven through the gRPC trait, against an in-process
//! mock that records the writes it receives.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tonic::Request;

use cloudavenue_common::config::PollingConfig;
use cloudavenue_common::{Client, ProviderConfig, KV_MUTEX};
use terraform_provider_cloudavenue::plan::plan_change;
use terraform_provider_cloudavenue::resources::{self, Resource};
use terraform_provider_cloudavenue::schema::Block;
use terraform_provider_cloudavenue::state::{
    decode_dynamic_value, encode_dynamic_value, get_list_attr, get_string_attr,
    get_string_list_attr, list_value, make_state, string_list_value, string_value, DynamicValue,
};
use terraform_provider_cloudavenue::tfplugin6::provider_server::Provider;
use terraform_provider_cloudavenue::tfplugin6::{self, *};
use terraform_provider_cloudavenue::CloudAvenueProvider;

const ORG: &str = "cav01ev01ocb0001234";
const GROUP_ID: &str = "urn:vcloud:vdcGroup:1";
const EDGE_URN: &str = "urn:vcloud:gateway:e-1";

#[derive(Default)]
struct Recorded {
    dfw_enabled: bool,
    dfw_switches: Vec<bool>,
    rules: Vec<Value>,
    rule_writes: usize,
    ips: Vec<String>,
    /// Whether the parent lock was held during each write.
    locked_writes: Vec<bool>,
}

#[derive(Clone, Default)]
struct Mock {
    recorded: Arc<Mutex<Recorded>>,
}

impl Mock {
    fn with<T>(&self, f: impl FnOnce(&mut Recorded) -> T) -> T {
        f(&mut self.recorded.lock().unwrap())
    }
}

fn page(values: Vec<Value>) -> Json<Value> {
    Json(json!({
        "resultTotal": values.len(), "pageCount": 1, "page": 1, "pageSize": 128,
        "values": values
    }))
}

fn held(key: &str) -> bool {
    KV_MUTEX.try_lock(key).is_none()
}

async fn login() -> Response {
    (
        [("X-VMWARE-VCLOUD-ACCESS-TOKEN", "token-1")],
        Json(json!({ "org": { "name": ORG, "id": "urn:vcloud:org:1" } })),
    )
        .into_response()
}

async fn list_groups(Query(query): Query<HashMap<String, String>>) -> Json<Value> {
    let filter = query.get("filter").cloned().unwrap_or_default();
    if filter.contains("missing") {
        return page(vec![]);
    }
    page(vec![json!({ "id": GROUP_ID, "name": "grp" })])
}

async fn get_group(Path(id): Path<String>) -> Json<Value> {
    Json(json!({ "id": id, "name": "grp" }))
}

async fn get_policies(State(mock): State<Mock>) -> Json<Value> {
    let enabled = mock.with(|r| r.dfw_enabled);
    Json(json!({
        "enabled": enabled,
        "defaultPolicy": { "id": "policy-1", "name": "Default", "enabled": true }
    }))
}

async fn put_policies(State(mock): State<Mock>, Json(body): Json<Value>) -> StatusCode {
    let enabled = body["enabled"].as_bool().unwrap_or(false);
    mock.with(|r| {
        r.dfw_enabled = enabled;
        r.dfw_switches.push(enabled);
    });
    StatusCode::OK
}

async fn get_rules(State(mock): State<Mock>) -> Json<Value> {
    let rules = mock.with(|r| r.rules.clone());
    Json(json!({ "values": rules }))
}

async fn put_rules(State(mock): State<Mock>, Json(body): Json<Value>) -> StatusCode {
    let locked = held(GROUP_ID);
    let mut rules = body["values"].as_array().cloned().unwrap_or_default();
    for (i, rule) in rules.iter_mut().enumerate() {
        rule["id"] = json!(format!("rule-{}", i + 1));
    }
    mock.with(|r| {
        r.rules = rules;
        r.rule_writes += 1;
        r.locked_writes.push(locked);
    });
    StatusCode::OK
}

async fn group_summaries() -> Json<Value> {
    page(vec![json!({ "id": "urn:vcloud:firewallGroup:9", "name": "web" })])
}

async fn get_firewall_group(Path(id): Path<String>) -> Json<Value> {
    Json(json!({
        "id": id,
        "name": "web",
        "description": "",
        "ownerRef": { "id": GROUP_ID, "name": "grp" },
        "typeValue": "SECURITY_GROUP",
        "members": [{ "id": "urn:vcloud:network:1", "name": "net-web" }]
    }))
}

async fn list_edges() -> Json<Value> {
    Json(json!([{
        "edgeId": "e-1", "edgeName": "edge-01", "ownerType": "vdc", "ownerName": "vdc1"
    }]))
}

async fn list_ips(State(mock): State<Mock>) -> Json<Value> {
    let ips = mock.with(|r| r.ips.clone());
    let config: Vec<Value> = ips
        .iter()
        .map(|ip| {
            json!({ "uplinkIp": ip, "translatedIp": "", "edgeGatewayName": "edge-01" })
        })
        .collect();
    Json(json!({ "internalIp": "", "networkConfig": config }))
}

async fn order_ip(State(mock): State<Mock>) -> Json<Value> {
    let locked = held(EDGE_URN);
    mock.with(|r| {
        let ip = format!("203.0.113.{}", r.ips.len() + 10);
        r.ips.push(ip);
        r.locked_writes.push(locked);
    });
    Json(json!({ "jobId": "job-1" }))
}

async fn get_job() -> Json<Value> {
    Json(json!([{ "name": "order", "description": "", "status": "DONE" }]))
}

async fn start_mock(mock: Mock) -> SocketAddr {
    let app = Router::new()
        .route("/cloudapi/1.0.0/sessions", post(login))
        .route("/cloudapi/1.0.0/vdcGroups", get(list_groups))
        .route("/cloudapi/1.0.0/vdcGroups/:id", get(get_group))
        .route(
            "/cloudapi/1.0.0/vdcGroups/:id/dfwPolicies",
            get(get_policies).put(put_policies),
        )
        .route(
            "/cloudapi/1.0.0/vdcGroups/:id/dfwPolicies/:policy/rules",
            get(get_rules).put(put_rules),
        )
        .route("/cloudapi/1.0.0/firewallGroups/summaries", get(group_summaries))
        .route("/cloudapi/1.0.0/firewallGroups/:id", get(get_firewall_group))
        .route("/api/customers/v2.0/edges", get(list_edges))
        .route("/api/customers/v1.0/ip", get(list_ips).post(order_ip))
        .route("/api/customers/v1.0/jobs/:id", get(get_job))
        .with_state(mock);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn configured_provider(mock: Mock) -> CloudAvenueProvider {
    let addr = start_mock(mock).await;
    let config = ProviderConfig {
        url: format!("http://{}", addr),
        user: "alice".into(),
        password: "secret".into(),
        org: ORG.into(),
        polling: PollingConfig {
            interval: Duration::from_millis(10),
            timeout: Duration::from_secs(5),
        },
        ..Default::default()
    };
    CloudAvenueProvider::with_client(Client::new(config).unwrap())
}

fn wire(value: &DynamicValue) -> Option<tfplugin6::DynamicValue> {
    Some(tfplugin6::DynamicValue {
        msgpack: encode_dynamic_value(value).unwrap(),
        json: vec![],
    })
}

fn block_of(type_name: &str) -> Block {
    resources::resources()
        .into_iter()
        .find(|r| r.type_name() == type_name)
        .unwrap()
        .schema()
        .block
}

/// Planned value for creating `type_name` from `config`.
fn planned(type_name: &str, config: DynamicValue) -> DynamicValue {
    let block = block_of(type_name);
    let config = block.conform(&config);
    plan_change(&block, &DynamicValue::Null, &config, &config).planned
}

async fn apply(
    provider: &CloudAvenueProvider,
    type_name: &str,
    prior: &DynamicValue,
    planned: &DynamicValue,
) -> apply_resource_change::Response {
    provider
        .apply_resource_change(Request::new(apply_resource_change::Request {
            type_name: type_name.into(),
            prior_state: wire(prior),
            planned_state: wire(planned),
            config: wire(planned),
            planned_private: vec![],
            provider_meta: None,
        }))
        .await
        .unwrap()
        .into_inner()
}

fn firewall_config(group: &str) -> DynamicValue {
    make_state(vec![
        ("vdc_group_name", string_value(group)),
        (
            "rules",
            list_value(vec![make_state(vec![
                ("name", string_value("allow-web")),
                ("action", string_value("ALLOW")),
                ("source_ids", string_list_value(vec!["urn:vcloud:firewallGroup:9"])),
            ])]),
        ),
    ])
}

#[tokio::test]
async fn test_firewall_create_enables_dfw_and_writes_rules() {
    let mock = Mock::default();
    let provider = configured_provider(mock.clone()).await;
    let planned = planned("cloudavenue_vdcg_firewall", firewall_config("grp"));

    let response = apply(
        &provider,
        "cloudavenue_vdcg_firewall",
        &DynamicValue::Null,
        &planned,
    )
    .await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);

    mock.with(|r| {
        assert_eq!(r.dfw_switches, vec![true]);
        assert_eq!(r.rule_writes, 1);
        assert_eq!(r.rules.len(), 1);
        assert_eq!(r.rules[0]["name"], "allow-web");
        assert_eq!(
            r.rules[0]["sourceFirewallGroups"][0]["id"],
            "urn:vcloud:firewallGroup:9"
        );
        assert_eq!(r.locked_writes, vec![true]);
    });

    let state = decode_dynamic_value(&response.new_state.unwrap().msgpack).unwrap();
    assert_eq!(get_string_attr(&state, "id"), GROUP_ID);
    let rule = &get_list_attr(&state, "rules")[0];
    assert_eq!(get_string_attr(rule, "id"), "rule-1");
    assert_eq!(
        get_string_list_attr(rule, "source_ids"),
        vec!["urn:vcloud:firewallGroup:9"]
    );
}

#[tokio::test]
async fn test_firewall_create_keeps_enabled_dfw() {
    let mock = Mock::default();
    mock.with(|r| r.dfw_enabled = true);
    let provider = configured_provider(mock.clone()).await;
    let planned = planned("cloudavenue_vdcg_firewall", firewall_config("grp"));

    let response = apply(
        &provider,
        "cloudavenue_vdcg_firewall",
        &DynamicValue::Null,
        &planned,
    )
    .await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    mock.with(|r| {
        assert!(r.dfw_switches.is_empty());
        assert_eq!(r.rule_writes, 1);
    });
}

#[tokio::test]
async fn test_firewall_delete_empties_rules() {
    let mock = Mock::default();
    mock.with(|r| {
        r.dfw_enabled = true;
        r.rules = vec![json!({ "id": "rule-1", "name": "allow-web", "actionValue": "ALLOW" })];
    });
    let provider = configured_provider(mock.clone()).await;
    let prior = make_state(vec![
        ("id", string_value(GROUP_ID)),
        ("vdc_group_id", string_value(GROUP_ID)),
        ("vdc_group_name", string_value("grp")),
    ]);

    let response = apply(
        &provider,
        "cloudavenue_vdcg_firewall",
        &prior,
        &DynamicValue::Null,
    )
    .await;
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);

    let state = decode_dynamic_value(&response.new_state.unwrap().msgpack).unwrap();
    assert!(state.is_null());
    mock.with(|r| {
        assert!(r.rules.is_empty());
        assert_eq!(r.rule_writes, 1);
        assert_eq!(r.locked_writes, vec![true]);
    });
}

#[tokio::test]
async fn test_failed_create_leaves_no_state() {
    let mock = Mock::default();
    let provider = configured_provider(mock.clone()).await;
    let planned = planned("cloudavenue_vdcg_firewall", firewall_config("missing"));

    let response = apply(
        &provider,
        "cloudavenue_vdcg_firewall",
        &DynamicValue::Null,
        &planned,
    )
    .await;
    assert!(response.new_state.is_none());
    assert_eq!(response.diagnostics.len(), 1);
    assert_eq!(response.diagnostics[0].summary, "Failed to create resource");
    assert!(response.diagnostics[0].detail.contains("missing"));
    mock.with(|r| assert_eq!(r.rule_writes, 0));
}

#[tokio::test]
async fn test_import_security_group_by_names() {
    let provider = configured_provider(Mock::default()).await;
    let response = provider
        .import_resource_state(Request::new(import_resource_state::Request {
            type_name: "cloudavenue_vdcg_security_group".into(),
            id: "grp.web".into(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    assert_eq!(response.imported_resources.len(), 1);

    let imported = &response.imported_resources[0];
    assert_eq!(imported.type_name, "cloudavenue_vdcg_security_group");
    let state = decode_dynamic_value(&imported.state.as_ref().unwrap().msgpack).unwrap();
    assert_eq!(get_string_attr(&state, "id"), "urn:vcloud:firewallGroup:9");
    assert_eq!(get_string_attr(&state, "name"), "web");
    assert_eq!(get_string_attr(&state, "vdc_group_id"), GROUP_ID);
    assert_eq!(get_string_attr(&state, "vdc_group_name"), "grp");
    assert_eq!(
        get_string_list_attr(&state, "member_org_network_ids"),
        vec!["urn:vcloud:network:1"]
    );
}

#[tokio::test]
async fn test_import_rejects_malformed_id() {
    let provider = configured_provider(Mock::default()).await;
    let response = provider
        .import_resource_state(Request::new(import_resource_state::Request {
            type_name: "cloudavenue_vdcg_security_group".into(),
            id: "web".into(),
        }))
        .await
        .unwrap()
        .into_inner();
    assert!(response.imported_resources.is_empty());
    assert_eq!(response.diagnostics[0].summary, "Invalid import identifier");
}

#[tokio::test]
async fn test_public_ip_waits_for_edge_lock() {
    let mock = Mock::default();
    let provider = configured_provider(mock.clone()).await;
    let planned = planned(
        "cloudavenue_publicip",
        make_state(vec![("edge_name", string_value("edge-01"))]),
    );

    // Another writer holds the edge gateway.
    let guard = KV_MUTEX.lock(EDGE_URN).await;
    let task = tokio::spawn(async move {
        apply(&provider, "cloudavenue_publicip", &DynamicValue::Null, &planned).await
    });
    tokio::time::sleep(Duration::from_millis(200)).await;
    mock.with(|r| assert!(r.ips.is_empty(), "ordered while the edge was locked"));

    drop(guard);
    let response = task.await.unwrap();
    assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
    let state = decode_dynamic_value(&response.new_state.unwrap().msgpack).unwrap();
    assert_eq!(get_string_attr(&state, "public_ip"), "203.0.113.10");
    assert_eq!(get_string_attr(&state, "edge_name"), "edge-01");
    mock.with(|r| assert_eq!(r.locked_writes, vec![true]));
}
