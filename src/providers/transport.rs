use reqwest::Client;
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use tracing::{debug, warn};

use super::RequestError;
use super::http_errors::network_error;

#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Value,
}

impl HttpRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Raw reply. A non-2xx status is still a successful transport call; the
/// provider decides what the status means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<HttpResponse, RequestError>> + 'a>>;

/// Performs one JSON `POST`.
pub trait Transport {
    fn post_json<'a>(&'a self, request: HttpRequest) -> TransportFuture<'a>;
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> reqwest::Result<Self> {
        let client = Client::builder().build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn post_json<'a>(&'a self, request: HttpRequest) -> TransportFuture<'a> {
        Box::pin(async move {
            let HttpRequest { url, headers, body } = request;
            let mut builder = self.client.post(&url);
            for (name, value) in &headers {
                builder = builder.header(*name, value);
            }

            let response = builder.json(&body).send().await.map_err(|err| {
                warn!(api_url = %url, error = %err, "http request failed");
                network_error(err, &url)
            })?;

            let status = response.status().as_u16();
            let body = response.text().await.map_err(|err| {
                warn!(api_url = %url, status, error = %err, "failed to read response body");
                network_error(err, &url)
            })?;
            debug!(api_url = %url, status, response_len = body.len(), "received http response");

            Ok(HttpResponse { status, body })
        })
    }
}
