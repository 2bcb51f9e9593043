//! NetBackup self-service client
//!
//! Backups live behind a separate endpoint with its own credentials.

use reqwest::header::ACCEPT;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{NetBackupConfig, PollingConfig};
use crate::error::{Error, Result};

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(alias = "access_token")]
    token: String,
}

/// `{"data": ...}` envelope used by every NetBackup answer
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NbuJobRef {
    pub job_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NbuJob {
    pub id: i64,
    pub status: String,
    #[serde(default)]
    pub status_details: String,
}

/// Client for the NetBackup API
pub struct NetBackupClient {
    http: reqwest::Client,
    config: NetBackupConfig,
    polling: PollingConfig,
    token: RwLock<Option<String>>,
}

impl NetBackupClient {
    pub fn new(http: reqwest::Client, config: NetBackupConfig, polling: PollingConfig) -> Self {
        Self {
            http,
            config,
            polling,
            token: RwLock::new(None),
        }
    }

    pub async fn login(&self) -> Result<()> {
        let url = format!("{}/v6/iam/token", self.config.url.trim_end_matches('/'));
        info!(url = %url, user = %self.config.user, "Opening NetBackup session");

        let resp = self
            .http
            .post(&url)
            .header(ACCEPT, "application/json")
            .json(&TokenRequest {
                username: &self.config.user,
                password: &self.config.password,
            })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Auth(format!(
                "NetBackup rejected the credentials of {} ({})",
                self.config.user,
                resp.status()
            )));
        }
        let body: TokenResponse = resp.json().await?;
        *self.token.write().await = Some(body.token);
        Ok(())
    }

    async fn token(&self) -> Result<String> {
        if let Some(token) = self.token.read().await.as_ref() {
            return Ok(token.clone());
        }
        self.login().await?;
        self.token
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::Auth("no NetBackup session after login".to_string()))
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&Value>,
    ) -> Result<Vec<u8>> {
        let url = format!("{}{}", self.config.url.trim_end_matches('/'), path);
        let mut retried = false;
        loop {
            let token = self.token().await?;
            let mut req = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&token)
                .header(ACCEPT, "application/json");
            if !query.is_empty() {
                req = req.query(query);
            }
            if let Some(body) = body {
                req = req.json(body);
            }

            debug!(method = %method, path = %path, "netbackup request");
            let resp = req.send().await?;
            let status = resp.status();
            if status == StatusCode::UNAUTHORIZED && !retried {
                warn!("NetBackup session expired, logging in again");
                *self.token.write().await = None;
                retried = true;
                continue;
            }
            let bytes = resp.bytes().await?.to_vec();
            if !status.is_success() {
                let message = serde_json::from_slice::<Value>(&bytes)
                    .ok()
                    .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_else(|| String::from_utf8_lossy(&bytes).into_owned());
                if status == StatusCode::NOT_FOUND {
                    return Err(Error::not_found("netbackup object", message));
                }
                return Err(Error::Api {
                    status: status.as_u16(),
                    message,
                });
            }
            return Ok(bytes);
        }
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let bytes = self.send(Method::GET, path, query, None).await?;
        let envelope: Envelope<T> = serde_json::from_slice(&bytes)?;
        Ok(envelope.data)
    }

    /// Posts and waits for the job the call starts.
    pub async fn post_job<B: Serialize>(&self, path: &str, body: &B) -> Result<NbuJob> {
        let body = serde_json::to_value(body)?;
        let bytes = self.send(Method::POST, path, &[], Some(&body)).await?;
        let envelope: Envelope<NbuJobRef> = serde_json::from_slice(&bytes)?;
        self.wait_job(envelope.data.job_id).await
    }

    pub async fn wait_job(&self, id: i64) -> Result<NbuJob> {
        let started = Instant::now();
        let path = format!("/v6/jobs/{}", id);
        loop {
            let job: NbuJob = self.get(&path, &[]).await?;
            debug!(job = id, status = %job.status, "netbackup job status");
            match job.status.to_ascii_lowercase().as_str() {
                "success" | "done" => return Ok(job),
                "failed" | "error" | "canceled" => {
                    return Err(Error::Task {
                        id: id.to_string(),
                        message: job.status_details,
                    })
                }
                _ => {}
            }
            if started.elapsed() >= self.polling.timeout {
                return Err(Error::Timeout {
                    seconds: self.polling.timeout.as_secs(),
                });
            }
            tokio::time::sleep(self.polling.interval).await;
        }
    }
}
