//! Remote gazetteer speaking JSON over HTTP.
//!
//! Endpoints, relative to the base URL:
//!
//! - `POST /v1/locations` with `{"names": [..]}` answers
//!   `{"locations": {"<name>": [<location>, ..]}}`
//! - `POST /v1/locations/by-id` with `{"ids": [..]}` answers
//!   `{"locations": [<location>, ..]}`

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::LocationSource;
use crate::error::Result;
use crate::models::{Location, LocationId};

#[derive(Debug, Serialize)]
struct NamesRequest<'a> {
    names: &'a [String],
}

#[derive(Debug, Serialize)]
struct IdsRequest<'a> {
    ids: &'a [LocationId],
}

#[derive(Debug, Deserialize)]
struct NamesResponse {
    #[serde(default)]
    locations: HashMap<String, Vec<Location>>,
}

#[derive(Debug, Deserialize)]
struct IdsResponse {
    #[serde(default)]
    locations: Vec<Location>,
}

/// HTTP client for a remote gazetteer service.
pub struct HttpLocationSource {
    client: Client,
    base_url: String,
}

impl HttpLocationSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("toponym/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl LocationSource for HttpLocationSource {
    async fn retrieve_locations(&self, names: &[String]) -> Result<HashMap<String, Vec<Location>>> {
        if names.is_empty() {
            return Ok(HashMap::new());
        }
        let response: NamesResponse = self
            .client
            .post(self.endpoint("/v1/locations"))
            .json(&NamesRequest { names })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(
            "Gazetteer returned candidates for {} of {} names",
            response.locations.len(),
            names.len()
        );
        Ok(response.locations)
    }

    async fn retrieve_by_ids(&self, ids: &[LocationId]) -> Result<Vec<Location>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let response: IdsResponse = self
            .client
            .post(self.endpoint("/v1/locations/by-id"))
            .json(&IdsRequest { ids })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.locations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one request with a canned response; returns the base URL and the
    /// raw request text.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(header_end) = text.find("\r\n\r\n") {
                    let length = text[..header_end]
                        .lines()
                        .find_map(|l| {
                            let (k, v) = l.split_once(':')?;
                            k.eq_ignore_ascii_case("content-length").then(|| v.trim().parse::<usize>().ok())?
                        })
                        .unwrap_or(0);
                    if request.len() >= header_end + 4 + length {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&request).to_string()
        });
        (base, handle)
    }

    #[tokio::test]
    async fn test_retrieve_locations() {
        let body = r#"{"locations": {"Paris": [
            {"id": 3, "primary_name": "Paris", "type": "CITY", "population": 2100000,
             "coordinate": {"lat": 48.8566, "lon": 2.3522}, "ancestor_ids": [2, 1]}
        ]}}"#;
        let (base, server) = serve_once("200 OK", body).await;
        let source = HttpLocationSource::new(&format!("{}/", base), Duration::from_secs(5)).unwrap();

        let found = source
            .retrieve_locations(&["Paris".to_string(), "Atlantis".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["Paris"][0].ancestor_ids(), &[2, 1]);

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/locations HTTP/1.1"));
        assert!(request.contains(r#"{"names":["Paris","Atlantis"]}"#));
    }

    #[tokio::test]
    async fn test_retrieve_by_ids() {
        let body = r#"{"locations": [{"id": 2, "primary_name": "France", "type": "COUNTRY"}]}"#;
        let (base, server) = serve_once("200 OK", body).await;
        let source = HttpLocationSource::new(&base, Duration::from_secs(5)).unwrap();

        let found = source.retrieve_by_ids(&[2]).await.unwrap();
        assert_eq!(found[0].primary_name(), "France");
        let request = server.await.unwrap();
        assert!(request.starts_with("POST /v1/locations/by-id HTTP/1.1"));
        assert!(request.contains(r#"{"ids":[2]}"#));
    }

    #[tokio::test]
    async fn test_server_error_is_reported() {
        let (base, _server) = serve_once("503 Service Unavailable", "{}").await;
        let source = HttpLocationSource::new(&base, Duration::from_secs(5)).unwrap();
        let err = source.retrieve_locations(&["Paris".to_string()]).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }

    #[tokio::test]
    async fn test_empty_request_skips_network() {
        let source = HttpLocationSource::new("http://127.0.0.1:9", Duration::from_millis(100)).unwrap();
        assert!(source.retrieve_locations(&[]).await.unwrap().is_empty());
        assert!(source.retrieve_by_ids(&[]).await.unwrap().is_empty());
    }
}
