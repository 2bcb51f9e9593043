//! Authenticated REST client for vCloud Director and Cloud Avenue
//!
//! Both APIs live behind the same console URL and accept the same bearer
//! token: `/cloudapi/1.0.0/...` is vCloud Director's OpenAPI,
//! `/api/customers/...` is the Cloud Avenue overlay. Long running vCD calls
//! answer `202` with a task to poll; Cloud Avenue calls answer with a job id.

pub mod netbackup;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::header::{HeaderValue, ACCEPT, AUTHORIZATION, LOCATION};
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{PollingConfig, ProviderConfig};
use crate::error::{Error, Result};
use crate::types::{EntityRef, Job, JobCreated, JobStatus, Page, Task, TaskStatus};

pub use netbackup::NetBackupClient;

/// Expands to the vCD API version literal, for use in `concat!`.
macro_rules! api_version {
    () => {
        "37.2"
    };
}

pub const API_VERSION: &str = api_version!();
pub const CLOUDAPI: &str = "/cloudapi/1.0.0";
pub const CUSTOMERS_V1: &str = "/api/customers/v1.0";
pub const CUSTOMERS_V2: &str = "/api/customers/v2.0";

const TOKEN_HEADER: &str = "X-VMWARE-VCLOUD-ACCESS-TOKEN";
const PAGE_SIZE: u64 = 128;

/// Authenticated session
#[derive(Debug, Clone)]
struct Session {
    token: String,
    org: EntityRef,
}

#[derive(Debug, Deserialize)]
struct SessionBody {
    #[serde(default)]
    org: EntityRef,
}

/// Outcome of a mutating call
#[derive(Debug, Clone, Default)]
pub struct Executed {
    /// Id of the entity the call created or touched, when the API tells us
    pub entity_id: Option<String>,
    /// Response body of synchronous calls
    pub body: Option<Value>,
}

/// Client wrapper for Cloud Avenue communication
pub struct Client {
    http: reqwest::Client,
    config: ProviderConfig,
    session: RwLock<Option<Session>>,
    netbackup: Option<NetBackupClient>,
}

impl Client {
    /// Builds the client without contacting the API.
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(
                "terraform-provider-cloudavenue/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()?;
        let netbackup = config
            .netbackup
            .clone()
            .map(|nbu| NetBackupClient::new(http.clone(), nbu, config.polling.clone()));

        Ok(Self {
            http,
            config,
            session: RwLock::new(None),
            netbackup,
        })
    }

    /// Builds the client and opens a session.
    pub async fn connect(config: ProviderConfig) -> Result<Self> {
        let client = Self::new(config)?;
        client.login().await?;
        Ok(client)
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn polling(&self) -> &PollingConfig {
        &self.config.polling
    }

    pub fn netbackup(&self) -> Result<&NetBackupClient> {
        self.netbackup.as_ref().ok_or_else(|| {
            Error::InvalidConfig(
                "netbackup_user and netbackup_password must be set to manage backups".to_string(),
            )
        })
    }

    /// Organization of the logged-in user.
    pub async fn org(&self) -> Result<EntityRef> {
        if let Some(session) = self.session.read().await.as_ref() {
            return Ok(session.org.clone());
        }
        self.login().await?;
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.org.clone())
            .ok_or_else(|| Error::Auth("no session after login".to_string()))
    }

    /// Exchanges basic credentials for a bearer token.
    pub async fn login(&self) -> Result<()> {
        let url = format!("{}{}/sessions", self.config.api_base(), CLOUDAPI);
        let credentials = format!(
            "{}@{}:{}",
            self.config.user, self.config.org, self.config.password
        );
        info!(url = %url, user = %self.config.user, org = %self.config.org, "Opening session");

        let resp = self
            .http
            .post(&url)
            .header(ACCEPT, accept_json())
            .header(AUTHORIZATION, format!("Basic {}", BASE64.encode(credentials)))
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED || resp.status() == StatusCode::FORBIDDEN {
            return Err(Error::Auth(format!(
                "{} rejected the credentials of {}@{}",
                self.config.url, self.config.user, self.config.org
            )));
        }
        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        let token = resp
            .headers()
            .get(TOKEN_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::Auth(format!("no {} header in login response", TOKEN_HEADER)))?;
        let body: SessionBody = resp.json().await.unwrap_or(SessionBody {
            org: EntityRef::default(),
        });

        *self.session.write().await = Some(Session {
            token,
            org: body.org,
        });
        debug!("Session opened");
        Ok(())
    }

    async fn token(&self) -> Result<String> {
        if let Some(session) = self.session.read().await.as_ref() {
            return Ok(session.token.clone());
        }
        self.login().await?;
        self.session
            .read()
            .await
            .as_ref()
            .map(|s| s.token.clone())
            .ok_or_else(|| Error::Auth("no session after login".to_string()))
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.config.api_base(), path)
        }
    }

    /// Sends one request, re-authenticating once on 401. Non-2xx answers are
    /// turned into errors.
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Response> {
        let mut retried = false;
        loop {
            let token = self.token().await?;
            let mut req = self
                .http
                .request(method.clone(), self.url(path))
                .bearer_auth(&token)
                .header(ACCEPT, accept_for(path));
            if !query.is_empty() {
                req = req.query(query);
            }
            if let Some(body) = body {
                req = req.json(body);
            }

            debug!(method = %method, path = %path, "request");
            let resp = req.send().await?;

            if resp.status() == StatusCode::UNAUTHORIZED && !retried {
                warn!("Session expired, logging in again");
                *self.session.write().await = None;
                retried = true;
                continue;
            }
            if !resp.status().is_success() {
                return Err(api_error(resp).await);
            }
            return Ok(resp);
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_with(path, &[]).await
    }

    pub async fn get_with<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let resp = self.send(Method::GET, path, query, None).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Fetches every page of a cloudapi collection, optionally filtered
    /// (FIQL, e.g. `name==my-group`).
    pub async fn get_all<T: DeserializeOwned>(
        &self,
        path: &str,
        filter: Option<&str>,
    ) -> Result<Vec<T>> {
        let mut all = Vec::new();
        let mut page = 1;
        loop {
            let mut query = vec![
                ("page", page.to_string()),
                ("pageSize", PAGE_SIZE.to_string()),
            ];
            if let Some(filter) = filter {
                query.push(("filter", filter.to_string()));
            }
            let result: Page<T> = self.get_with(path, &query).await?;
            all.extend(result.values);
            if page >= result.page_count {
                break;
            }
            page += 1;
        }
        Ok(all)
    }

    /// Looks up a single cloudapi entity by name.
    pub async fn get_by_name<T: DeserializeOwned>(
        &self,
        path: &str,
        kind: &str,
        name: &str,
        extra_filter: Option<&str>,
    ) -> Result<T> {
        let filter = match extra_filter {
            Some(extra) => format!("(name=={};{})", name, extra),
            None => format!("name=={}", name),
        };
        let mut found: Vec<T> = self.get_all(path, Some(&filter)).await?;
        match found.len() {
            0 => Err(Error::not_found(kind, name)),
            1 => Ok(found.remove(0)),
            n => Err(Error::Api {
                status: 409,
                message: format!("{} {} is ambiguous, {} objects share this name", kind, name, n),
            }),
        }
    }

    /// Runs a cloudapi mutation, waiting for the task when the API answers
    /// asynchronously.
    pub async fn execute<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Executed> {
        let body = body.map(serde_json::to_value).transpose()?;
        let resp = self.send(method, path, &[], body.as_ref()).await?;

        if resp.status() == StatusCode::ACCEPTED {
            if let Some(location) = resp.headers().get(LOCATION).and_then(|v| v.to_str().ok()) {
                let location = location.to_string();
                let task = self.wait_task(&location).await?;
                return Ok(Executed {
                    entity_id: task.owner.map(|o| o.id).filter(|id| !id.is_empty()),
                    body: None,
                });
            }
        }

        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Ok(Executed::default());
        }
        let value: Value = serde_json::from_slice(&bytes)?;
        Ok(Executed {
            entity_id: value.get("id").and_then(Value::as_str).map(str::to_string),
            body: Some(value),
        })
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<Executed> {
        self.execute(Method::POST, path, Some(body)).await
    }

    pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> Result<Executed> {
        self.execute(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.execute::<Value>(Method::DELETE, path, None).await?;
        Ok(())
    }

    /// Polls a vCD task until it finishes.
    pub async fn wait_task(&self, href: &str) -> Result<Task> {
        let started = Instant::now();
        loop {
            let task: Task = self.get(href).await?;
            debug!(task = %task.id, status = ?task.status, "task status");

            match task.status {
                TaskStatus::Success => return Ok(task),
                TaskStatus::Error | TaskStatus::Aborted => {
                    let message = task
                        .error
                        .as_ref()
                        .map(|e| e.message.clone())
                        .or_else(|| task.details.clone())
                        .unwrap_or_else(|| format!("task {:?}", task.status));
                    return Err(Error::Task {
                        id: task.id,
                        message,
                    });
                }
                _ => {}
            }

            if started.elapsed() >= self.polling().timeout {
                return Err(Error::Timeout {
                    seconds: self.polling().timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.polling().interval).await;
        }
    }

    /// Runs a Cloud Avenue mutation and waits for its job.
    pub async fn execute_job<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> Result<()> {
        let body = body.map(serde_json::to_value).transpose()?;
        let resp = self.send(method, path, query, body.as_ref()).await?;
        let bytes = resp.bytes().await?;
        if bytes.is_empty() {
            return Ok(());
        }

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Created {
            One(JobCreated),
            Many(Vec<JobCreated>),
        }

        let ids = match serde_json::from_slice::<Created>(&bytes)? {
            Created::One(job) => vec![job.job_id],
            Created::Many(jobs) => jobs.into_iter().map(|j| j.job_id).collect(),
        };
        for id in ids {
            self.wait_job(&id).await?;
        }
        Ok(())
    }

    /// Polls a Cloud Avenue job until it finishes.
    pub async fn wait_job(&self, id: &str) -> Result<Job> {
        let started = Instant::now();
        let path = format!("{}/jobs/{}", CUSTOMERS_V1, id);
        loop {
            let mut jobs: Vec<Job> = self.get(&path).await?;
            if jobs.is_empty() {
                return Err(Error::not_found("job", id));
            }
            let job = jobs.remove(0);
            debug!(job = %id, status = ?job.status, "job status");

            match job.status {
                JobStatus::Done => return Ok(job),
                JobStatus::Failed => {
                    return Err(Error::Task {
                        id: id.to_string(),
                        message: job.failure_message(),
                    })
                }
                _ => {}
            }

            if started.elapsed() >= self.polling().timeout {
                return Err(Error::Timeout {
                    seconds: self.polling().timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.polling().interval).await;
        }
    }
}

fn accept_json() -> HeaderValue {
    HeaderValue::from_static(concat!("application/json;version=", api_version!()))
}

/// The legacy `/api` (tasks) only answers to the vendor media type.
fn accept_for(path: &str) -> HeaderValue {
    if path.contains("/api/task") {
        HeaderValue::from_static(concat!("application/*+json;version=", api_version!()))
    } else {
        accept_json()
    }
}

/// Turns a failed response into an error, keeping the API's own message.
async fn api_error(resp: Response) -> Error {
    let status = resp.status().as_u16();
    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| {
            v.get("message")
                .or_else(|| v.get("reason"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or(text);

    if status == 404 {
        return Error::NotFound {
            kind: "object".to_string(),
            id: message,
        };
    }
    Error::Api { status, message }
}

/// Escapes a value for use inside a FIQL filter.
pub fn fiql_escape(value: &str) -> String {
    value
        .chars()
        .flat_map(|c| match c {
            ',' | ';' | '(' | ')' | '=' | '!' | '<' | '>' => vec!['\\', c],
            _ => vec![c],
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fiql_escape() {
        assert_eq!(fiql_escape("web"), "web");
        assert_eq!(fiql_escape("a,b;c"), "a\\,b\\;c");
    }

    #[test]
    fn test_absolute_urls_are_kept() {
        let client = Client::new(ProviderConfig {
            url: "https://console.example.com/".into(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            client.url("/cloudapi/1.0.0/vdcGroups"),
            "https://console.example.com/cloudapi/1.0.0/vdcGroups"
        );
        assert_eq!(
            client.url("https://console.example.com/api/task/1"),
            "https://console.example.com/api/task/1"
        );
    }

    #[test]
    fn test_accept_header_for_tasks() {
        assert_eq!(
            accept_for("https://x/api/task/42").to_str().unwrap(),
            "application/*+json;version=37.2"
        );
        assert_eq!(
            accept_for("/cloudapi/1.0.0/roles").to_str().unwrap(),
            "application/json;version=37.2"
        );
    }

    #[test]
    fn test_accept_header_follows_api_version() {
        for path in ["/api/task/1", "/cloudapi/1.0.0/roles"] {
            let accept = accept_for(path);
            let accept = accept.to_str().unwrap();
            assert_eq!(accept.rsplit_once("version=").unwrap().1, API_VERSION);
        }
    }

    #[test]
    fn test_netbackup_requires_credentials() {
        let client = Client::new(ProviderConfig::default()).unwrap();
        assert!(client.netbackup().is_err());
    }
}
