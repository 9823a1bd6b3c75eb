//! reqwest implementation of [`Backend`].

use crate::analytics::UsageRecord;
use crate::backend::{ApiResponse, Backend, ChannelQuery, UsageQuery};
use crate::channels::ChannelRow;
use crate::config::BackendConfig;
use crate::errors::{Error, Result};
use crate::pricing::PricingResponse;
use anyhow::anyhow;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, error, instrument};
use url::Url;

pub struct HttpBackend {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
    auth_header_name: String,
    auth_header_prefix: String,
    request_timeout: Duration,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        crate::install_crypto_provider();
        let client = Client::builder().timeout(config.request_timeout).build()?;

        Ok(Self {
            client,
            base_url: config.url.clone(),
            access_token: config.access_token.clone(),
            auth_header_name: config.auth_header_name.clone(),
            auth_header_prefix: config.auth_header_prefix.clone(),
            request_timeout: config.request_timeout,
        })
    }

    fn endpoint(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = ensure_slash(&self.base_url)
            .join(path)
            .map_err(|e| anyhow!("Failed to construct {path} URL: {e}"))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter().map(|(k, v)| (*k, v.as_str())));
        }
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("Fetching {}", url);
        let mut request = self.client.get(url.clone());
        if let Some(token) = &self.access_token {
            request = request.header(&self.auth_header_name, format!("{}{}", self.auth_header_prefix, token));
        }

        let response = request.timeout(self.request_timeout).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(%url, %status, "Backend request failed");
            return Err(Error::backend(format!("{status} - {body}")));
        }

        // Get the response body as text first for logging
        let body_text = response.text().await?;
        debug!("Backend response body: {}", body_text);

        serde_json::from_str::<T>(&body_text).map_err(|e| {
            error!(%url, "Failed to parse backend response as JSON. Error: {}", e);
            error!("Response body was: {}", body_text);
            Error::backend(format!("error decoding response body: {e}"))
        })
    }
}

/// Makes sure a url has a trailing slash.
///
/// Joining `/admin` with `api/pricing` gives `/api/pricing`, while joining `/admin/` gives
/// `/admin/api/pricing`. Call this before `.join`.
fn ensure_slash(url: &Url) -> Url {
    if url.path().ends_with('/') {
        url.clone()
    } else {
        let mut new_url = url.clone();
        let mut path = new_url.path().to_string();
        path.push('/');
        new_url.set_path(&path);
        new_url
    }
}

#[async_trait]
impl Backend for HttpBackend {
    #[instrument(skip(self), fields(granularity = %query.granularity))]
    async fn usage(&self, query: &UsageQuery) -> Result<Vec<UsageRecord>> {
        let url = self.endpoint(query.path(), &query.params())?;
        let records = self.get_json::<ApiResponse<Vec<UsageRecord>>>(url).await?.into_result()?;
        debug!(records = records.len(), "Fetched usage records");
        Ok(records)
    }

    #[instrument(skip(self))]
    async fn pricing(&self) -> Result<PricingResponse> {
        let url = self.endpoint("api/pricing", &[])?;
        let pricing: PricingResponse = self.get_json(url).await?;
        if !pricing.success {
            return Err(Error::backend(pricing.message));
        }
        debug!(models = pricing.data.len(), "Fetched pricing catalog");
        Ok(pricing)
    }

    #[instrument(skip(self))]
    async fn channels(&self, query: &ChannelQuery) -> Result<Vec<ChannelRow>> {
        let url = self.endpoint("api/channel/", &query.params())?;
        let channels = self.get_json::<ApiResponse<Vec<ChannelRow>>>(url).await?.into_result()?;
        debug!(channels = channels.len(), "Fetched channels");
        Ok(channels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::TimeGranularity;
    use crate::backend::UsageScope;
    use crate::channels::ChannelStatus;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> HttpBackend {
        let config = BackendConfig {
            url: Url::parse(&server.uri()).unwrap(),
            access_token: Some("sk-admin".to_string()),
            ..BackendConfig::default()
        };
        HttpBackend::new(&config).unwrap()
    }

    fn usage_query(scope: UsageScope) -> UsageQuery {
        UsageQuery {
            scope,
            start: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 1, 8, 0, 0, 0).unwrap(),
            granularity: TimeGranularity::Day,
        }
    }

    #[test]
    fn test_ensure_slash() {
        let url = Url::parse("http://gateway/admin").unwrap();
        assert_eq!(ensure_slash(&url).join("api/pricing").unwrap().as_str(), "http://gateway/admin/api/pricing");
        let url = Url::parse("http://gateway/").unwrap();
        assert_eq!(ensure_slash(&url).as_str(), "http://gateway/");
    }

    #[test_log::test(tokio::test)]
    async fn test_usage_fetch_sends_query_and_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/data/"))
            .and(query_param("username", "alice"))
            .and(query_param("start_timestamp", "1704067200"))
            .and(query_param("end_timestamp", "1704672000"))
            .and(query_param("default_time", "day"))
            .and(header("Authorization", "Bearer sk-admin"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "",
                "data": [
                    {"created_at": 1704067200, "model_name": "gpt-4", "quota": 100, "token_used": 10, "count": 1},
                    {"created_at": "oops", "model_name": "gpt-4", "quota": 5, "count": 1}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let records = backend(&server)
            .usage(&usage_query(UsageScope::All {
                username: Some("alice".into()),
            }))
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].quota, Some(100));
        assert_eq!(records[1].created_at, None);
    }

    #[tokio::test]
    async fn test_self_usage_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/data/self/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": null})))
            .expect(1)
            .mount(&server)
            .await;

        let records = backend(&server).usage(&usage_query(UsageScope::Own)).await.unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_success_false_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/channel/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false, "message": "no permission"})))
            .mount(&server)
            .await;

        let err = backend(&server).channels(&ChannelQuery::default()).await.unwrap_err();
        assert!(matches!(&err, Error::Backend { message } if message == "no permission"));
    }

    #[tokio::test]
    async fn test_http_error_status_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/pricing"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = backend(&server).pricing().await.unwrap_err();
        match err {
            Error::Backend { message } => {
                assert!(message.contains("502"), "{message}");
                assert!(message.contains("bad gateway"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_undecodable_body_is_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/pricing"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>login</html>"))
            .mount(&server)
            .await;

        let err = backend(&server).pricing().await.unwrap_err();
        assert!(matches!(&err, Error::Backend { message } if message.starts_with("error decoding response body")));
    }

    #[tokio::test]
    async fn test_channels_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/channel/"))
            .and(query_param("p", "2"))
            .and(query_param("page_size", "50"))
            .and(query_param("tag_mode", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "message": "",
                "data": [
                    {"id": 1, "name": "a", "tag": "east", "priority": 0, "weight": 1, "group": "default",
                     "used_quota": 10, "response_time": 120, "status": 1}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let query = ChannelQuery {
            page: 2,
            page_size: 50,
            tag_mode: true,
            ..ChannelQuery::default()
        };
        let channels = backend(&server).channels(&query).await.unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].tag, "east");
        assert_eq!(channels[0].status, ChannelStatus::Enabled);
    }

    #[tokio::test]
    async fn test_base_path_is_preserved() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/gateway/api/pricing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": [],
                "group_ratio": {"default": 1},
                "usable_group": {"default": "Default"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = BackendConfig {
            url: Url::parse(&format!("{}/gateway", server.uri())).unwrap(),
            ..BackendConfig::default()
        };
        let pricing = HttpBackend::new(&config).unwrap().pricing().await.unwrap();
        assert!(pricing.is_usable("default"));
    }
}
