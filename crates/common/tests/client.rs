//! REST client behaviour against an in-process mock of the Cloud Avenue API

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde_json::json;

use cloudavenue_common::api::vdc::{Vdc, VdcStorageProfile};
use cloudavenue_common::api::vdcg::VdcGroup;
use cloudavenue_common::config::PollingConfig;
use cloudavenue_common::{Client, Error, ProviderConfig};

const ORG: &str = "cav01ev01ocb0001234";

#[derive(Clone, Default)]
struct Mock {
    addr: Arc<std::sync::OnceLock<SocketAddr>>,
    logins: Arc<AtomicUsize>,
    task_polls: Arc<AtomicUsize>,
}

fn bearer(headers: &HeaderMap) -> String {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_string()
}

async fn login(State(mock): State<Mock>, headers: HeaderMap) -> Response {
    let expected = format!("Basic {}", BASE64.encode(format!("alice@{}:secret", ORG)));
    let given = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if given != expected {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let n = mock.logins.fetch_add(1, Ordering::SeqCst) + 1;
    (
        [("X-VMWARE-VCLOUD-ACCESS-TOKEN", format!("token-{}", n))],
        Json(json!({ "org": { "name": ORG, "id": "urn:vcloud:org:1" } })),
    )
        .into_response()
}

async fn list_groups(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Response {
    if bearer(&headers).is_empty() {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let page: u64 = query.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let name = format!("group-{}", page);
    Json(json!({
        "resultTotal": 2, "pageCount": 2, "page": page, "pageSize": 1,
        "values": [{ "id": format!("urn:vcloud:vdcGroup:{}", page), "name": name }]
    }))
    .into_response()
}

async fn create_group(State(mock): State<Mock>) -> Response {
    let addr = mock.addr.get().copied().unwrap();
    (
        StatusCode::ACCEPTED,
        [("Location", format!("http://{}/api/task/t1", addr))],
    )
        .into_response()
}

async fn task(State(mock): State<Mock>) -> Json<serde_json::Value> {
    let polls = mock.task_polls.fetch_add(1, Ordering::SeqCst);
    let status = if polls < 2 { "running" } else { "success" };
    Json(json!({
        "id": "urn:vcloud:task:t1",
        "status": status,
        "owner": { "id": "urn:vcloud:vdcGroup:new", "name": "new-group" }
    }))
}

async fn get_group(Path(id): Path<String>) -> Response {
    if id == "urn:vcloud:vdcGroup:missing" {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({ "minorErrorCode": "ACCESS_TO_RESOURCE_IS_FORBIDDEN",
                         "message": "[ 1 ] The VDC Group does not exist." })),
        )
            .into_response();
    }
    Json(json!({ "id": id, "name": "new-group", "dfwEnabled": true })).into_response()
}

async fn get_org(headers: HeaderMap) -> Response {
    // Only the second session is accepted, forcing one re-login.
    if bearer(&headers) != "token-2" {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    Json(json!({ "id": "urn:vcloud:org:1", "name": ORG, "isEnabled": true })).into_response()
}

async fn create_vdc() -> Json<serde_json::Value> {
    Json(json!({ "jobId": "j1" }))
}

async fn job() -> Json<serde_json::Value> {
    Json(json!([{
        "name": "CREATE_VDC", "description": "vdc creation", "status": "FAILED",
        "actions": [{ "name": "allocate", "status": "FAILED", "details": "quota exceeded" }]
    }]))
}

async fn start_mock() -> (Mock, Client) {
    let mock = Mock::default();
    let app = Router::new()
        .route("/cloudapi/1.0.0/sessions", post(login))
        .route("/cloudapi/1.0.0/vdcGroups", get(list_groups).post(create_group))
        .route("/cloudapi/1.0.0/vdcGroups/:id", get(get_group))
        .route("/cloudapi/1.0.0/orgs/:id", get(get_org))
        .route("/api/task/:id", get(task))
        .route("/api/customers/v2.0/vdcs", post(create_vdc))
        .route("/api/customers/v1.0/jobs/:id", get(job))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    mock.addr.set(addr).unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

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
    let client = Client::connect(config).await.unwrap();
    (mock, client)
}

#[tokio::test]
async fn test_login_rejects_bad_password() {
    let (mock, _client) = start_mock().await;
    let addr = mock.addr.get().copied().unwrap();
    let config = ProviderConfig {
        url: format!("http://{}", addr),
        user: "alice".into(),
        password: "wrong".into(),
        org: ORG.into(),
        ..Default::default()
    };
    let err = Client::connect(config).await.err().unwrap();
    assert!(matches!(err, Error::Auth(_)), "{err}");
}

#[tokio::test]
async fn test_get_all_follows_pages() {
    let (_mock, client) = start_mock().await;
    let groups: Vec<VdcGroup> = client
        .get_all("/cloudapi/1.0.0/vdcGroups", None)
        .await
        .unwrap();
    let names: Vec<_> = groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names, vec!["group-1", "group-2"]);
}

#[tokio::test]
async fn test_create_waits_for_task() {
    let (mock, client) = start_mock().await;
    let group = VdcGroup {
        name: "new-group".into(),
        ..Default::default()
    };
    let created = client.create_vdc_group(&group).await.unwrap();
    assert_eq!(created.id, "urn:vcloud:vdcGroup:new");
    assert!(created.dfw_enabled);
    assert_eq!(mock.task_polls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_missing_entity_is_not_found() {
    let (_mock, client) = start_mock().await;
    let err = client
        .get_vdc_group("urn:vcloud:vdcGroup:missing")
        .await
        .unwrap_err();
    assert!(err.is_not_found(), "{err}");
}

#[tokio::test]
async fn test_expired_session_logs_in_again() {
    let (mock, client) = start_mock().await;
    let org = client.get_org().await.unwrap();
    assert_eq!(org.name, ORG);
    assert_eq!(mock.logins.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_job_surfaces_action_detail() {
    let (_mock, client) = start_mock().await;
    let vdc = Vdc {
        name: "VDC_Test".into(),
        vdc_service_class: "STD".into(),
        vdc_disponibility_class: "ONE-ROOM".into(),
        vdc_billing_model: "PAYG".into(),
        vcpu_in_mhz2: 2200,
        cpu_allocated: 22000,
        memory_allocated: 30,
        vdc_storage_billing_model: "PAYG".into(),
        vdc_storage_profiles: vec![VdcStorageProfile {
            class: "gold".into(),
            limit: 500,
            default: true,
        }],
        ..Default::default()
    };
    let err = client.create_vdc(&vdc).await.unwrap_err();
    match err {
        Error::Task { id, message } => {
            assert_eq!(id, "j1");
            assert_eq!(message, "allocate: quota exceeded");
        }
        other => panic!("unexpected error {other}"),
    }
}
