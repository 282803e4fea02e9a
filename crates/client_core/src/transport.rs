use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};
use shared::error::ApiError;
use url::Url;

use crate::error::TransportError;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// JSON-over-HTTP access to the service rooted at `base_url`
/// (for example `http://127.0.0.1:5000/api`).
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let parsed =
            Url::parse(base_url).with_context(|| format!("invalid service url {base_url}"))?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build http client")?;
        Ok(Self {
            http,
            base_url: parsed.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, TransportError> {
        let response = self.send(path, self.http.get(self.url(path))).await?;
        decode(path, response).await
    }

    pub(crate) async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(path, self.http.post(self.url(path)).json(body))
            .await?;
        decode(path, response).await
    }

    /// POST without a request body, returning the decoded response.
    pub(crate) async fn post_empty<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, TransportError> {
        let response = self.send(path, self.http.post(self.url(path))).await?;
        decode(path, response).await
    }

    /// POST where only the status code matters.
    pub(crate) async fn post_unit<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), TransportError> {
        let mut request = self.http.post(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        self.send(path, request).await.map(drop)
    }

    pub(crate) async fn put_json<B, T>(&self, path: &str, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .send(path, self.http.put(self.url(path)).json(body))
            .await?;
        decode(path, response).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<(), TransportError> {
        self.send(path, self.http.delete(self.url(path)))
            .await
            .map(drop)
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Response, TransportError> {
        let response = request
            .send()
            .await
            .map_err(|source| TransportError::Request {
                endpoint: path.to_string(),
                source,
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(TransportError::Status {
            endpoint: path.to_string(),
            status: status.as_u16(),
            error: ApiError::from_body(status.as_u16(), &body),
        })
    }
}

async fn decode<T: DeserializeOwned>(path: &str, response: Response) -> Result<T, TransportError> {
    response
        .json::<T>()
        .await
        .map_err(|source| TransportError::Decode {
            endpoint: path.to_string(),
            source,
        })
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
