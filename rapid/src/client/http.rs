//! reqwest-backed server client.

use serde::Deserialize;
use tracing::{debug, info};

use super::error::{ClientError, ClientResult};
use crate::config::ClientConfig;
use crate::job::{FetchRequest, Job};

/// The fetch endpoint answers either with the bare descriptor or wrapped in
/// a `{status, data}` envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum FetchResponse {
    Envelope { data: Job },
    Bare(Job),
}

impl FetchResponse {
    fn into_job(self) -> Job {
        match self {
            FetchResponse::Envelope { data } => data,
            FetchResponse::Bare(job) => job,
        }
    }
}

/// Client for the download server's HTTP endpoints.
#[derive(Debug, Clone)]
pub struct ServerClient {
    http: reqwest::Client,
    /// Download trigger client: bounded connect, no total timeout.
    trigger_http: reqwest::Client,
    config: ClientConfig,
}

impl ServerClient {
    /// Create a client using the timeout from `config`.
    ///
    /// The timeout bounds whole fetch and stop requests. The download
    /// trigger only has its connect phase bounded, since the server may hold
    /// that response open while the transfer runs.
    pub fn new(config: ClientConfig) -> ClientResult<Self> {
        let http = Self::builder(&config)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;
        let trigger_http = Self::builder(&config)
            .build()
            .map_err(|e| ClientError::Build(e.to_string()))?;
        Ok(Self {
            http,
            trigger_http,
            config,
        })
    }

    fn builder(config: &ClientConfig) -> reqwest::ClientBuilder {
        reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .user_agent(concat!("rapid/", env!("CARGO_PKG_VERSION")))
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn timeout_secs(&self) -> u64 {
        self.config.request_timeout.as_secs()
    }

    /// Ask the server to create a job for `request`.
    ///
    /// The request is tagged with this client's id unless it already names one.
    pub async fn fetch(&self, request: &FetchRequest) -> ClientResult<Job> {
        let url = self.config.fetch_url();
        let mut body = request.clone();
        if body.client.is_none() {
            body.client = Some(self.config.client_id.clone());
        }

        debug!(url = %url, target_url = %body.url, "Sending fetch request");
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&url, self.timeout_secs(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::from_reqwest(&url, self.timeout_secs(), e))?;
        let job = serde_json::from_slice::<FetchResponse>(&bytes)
            .map_err(|e| ClientError::Decode {
                url: url.clone(),
                reason: e.to_string(),
            })?
            .into_job();

        if job.id.is_empty() {
            return Err(ClientError::Decode {
                url,
                reason: "job descriptor has an empty id".to_string(),
            });
        }

        info!(
            job_id = %job.id,
            size = job.size,
            chunks = job.chunk_count,
            resumable = job.resumable,
            "Job created"
        );
        Ok(job)
    }

    /// Start the server-side transfer of `job_id`. The response body is not read.
    ///
    /// Resolves once response headers arrive, however long that takes.
    pub async fn start_download(&self, job_id: &str) -> ClientResult<()> {
        let url = self.config.download_url(job_id);
        debug!(url = %url, "Starting download");
        let response = self
            .trigger_http
            .get(&url)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&url, self.timeout_secs(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(())
    }

    /// Ask the server to abort `job_id`.
    pub async fn stop(&self, job_id: &str) -> ClientResult<()> {
        let url = self.config.stop_url(job_id);
        debug!(url = %url, "Sending stop request");
        let response = self
            .http
            .put(&url)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&url, self.timeout_secs(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                url,
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}
