//! HTTP/JSON query-execution gateway client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{JobStatus, QueryRequest, QueryService};
use crate::config::ServiceConfig;
use crate::error::ServiceError;

#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

/// Query service reached over HTTP
///
/// - `POST {base}/v1/queries` starts a query and returns `{"id": ...}`
/// - `GET {base}/v1/queries/{id}` returns a [`JobStatus`]
/// - `POST {base}/v1/queries/{id}/cancel` stops it
pub struct HttpQueryService {
    http: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpQueryService {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> Result<Self, ServiceError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        debug!(%base_url, ?timeout, "HttpQueryService::new: called");
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    /// Build from config, reading the API key from the configured environment variable
    pub fn from_config(config: &ServiceConfig) -> Result<Self, ServiceError> {
        let api_key = std::env::var(&config.api_key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            debug!(env = %config.api_key_env, "HttpQueryService::from_config: no API key set");
        }
        Self::new(&config.base_url, api_key, Duration::from_millis(config.timeout_ms))
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/queries{}", self.base_url, path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("Authorization", format!("Bearer {}", key)),
            None => builder,
        }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let message = response.text().await.unwrap_or_default();
        Err(ServiceError::Api { status, message })
    }
}

#[async_trait]
impl QueryService for HttpQueryService {
    async fn submit(&self, request: &QueryRequest) -> Result<String, ServiceError> {
        debug!(destination = %request.destination, "HttpQueryService::submit: called");
        let response = self
            .authorize(self.http.post(self.url("")))
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;
        let body: SubmitResponse = Self::check(response).await?.json().await?;
        if body.id.is_empty() {
            return Err(ServiceError::InvalidResponse("empty job id".to_string()));
        }
        Ok(body.id)
    }

    async fn get_status(&self, job_id: &str) -> Result<JobStatus, ServiceError> {
        debug!(%job_id, "HttpQueryService::get_status: called");
        let response = self
            .authorize(self.http.get(self.url(&format!("/{}", job_id))))
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn cancel(&self, job_id: &str) -> Result<(), ServiceError> {
        debug!(%job_id, "HttpQueryService::cancel: called");
        let response = self
            .authorize(self.http.post(self.url(&format!("/{}/cancel", job_id))))
            .send()
            .await?;
        if let Err(e) = Self::check(response).await {
            warn!(%job_id, error = %e, "Cancel rejected");
            return Err(e);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let service = HttpQueryService::new("http://gateway:8080/", None, Duration::from_secs(5)).unwrap();
        assert_eq!(service.url(""), "http://gateway:8080/v1/queries");
        assert_eq!(service.url("/q-1/cancel"), "http://gateway:8080/v1/queries/q-1/cancel");
    }

    #[test]
    fn test_from_config_without_key() {
        let config = ServiceConfig {
            api_key_env: "QUERYRUNNER_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..Default::default()
        };
        let service = HttpQueryService::from_config(&config).unwrap();
        assert!(service.api_key.is_none());
        assert_eq!(service.base_url, "http://localhost:8080");
    }
}
