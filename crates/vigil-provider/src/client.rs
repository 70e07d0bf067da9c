//! reqwest-backed [`ScreeningProvider`].

use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use vigil_config::ProviderConfig;

use crate::error::ProviderError;
use crate::response::ensure_success;
use crate::types::{
    Algorithm, AlgorithmsResponse, DeltaList, RawCatalog, SearchRequest, SearchResponse,
    parse_catalog, parse_match_response,
};
use crate::{ByteStream, ScreeningProvider};

/// HTTP client for the screening provider.
pub struct HttpScreeningProvider {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl HttpScreeningProvider {
    /// Build a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Http`] if the underlying `reqwest::Client`
    /// cannot be built.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("vigil/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    fn url(&self, path: &str) -> Result<String, ProviderError> {
        if !self.config.is_configured() {
            return Err(ProviderError::NotConfigured);
        }
        Ok(format!("{}{path}", self.config.base_url()))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if self.config.api_key.is_empty() {
            request
        } else {
            request.header(
                reqwest::header::AUTHORIZATION,
                format!("ApiKey {}", self.config.api_key),
            )
        }
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value, ProviderError> {
        let resp = ensure_success(self.authorize(self.http.get(url)).send().await?).await?;
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl ScreeningProvider for HttpScreeningProvider {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn is_self_hosted(&self) -> bool {
        self.config.self_hosted
    }

    async fn search(&self, request: &SearchRequest) -> Result<SearchResponse, ProviderError> {
        let url = format!("{}?{}", self.url("/match/default")?, request.match_query_string());
        tracing::debug!(
            algorithm = %request.config.algorithm,
            datasets = ?request.config.datasets,
            queries = request.queries.len(),
            "screening query"
        );
        let resp = ensure_success(
            self.authorize(self.http.post(&url))
                .json(&request.match_body())
                .send()
                .await?,
        )
        .await?;
        let raw: serde_json::Value = resp.json().await?;
        parse_match_response(raw, &request.whitelisted_entity_ids)
    }

    async fn algorithms(&self) -> Result<Vec<Algorithm>, ProviderError> {
        let raw = self.get_json(&self.url("/algorithms")?).await?;
        let parsed: AlgorithmsResponse = serde_json::from_value(raw)
            .map_err(|e| ProviderError::Parse(format!("algorithms: {e}")))?;
        Ok(parsed.algorithms)
    }

    async fn raw_catalog(&self) -> Result<RawCatalog, ProviderError> {
        parse_catalog(self.get_json(&self.url("/catalog")?).await?)
    }

    async fn enrich_entity(&self, entity_id: &str) -> Result<serde_json::Value, ProviderError> {
        let url = self.url(&format!("/entities/{}?nested=true", urlencoding::encode(entity_id)))?;
        self.get_json(&url).await
    }

    async fn fetch_delta_list(&self, url: &str) -> Result<DeltaList, ProviderError> {
        let raw = self.get_json(url).await?;
        serde_json::from_value(raw).map_err(|e| ProviderError::Parse(format!("delta list: {e}")))
    }

    async fn download(&self, url: &str) -> Result<ByteStream, ProviderError> {
        let resp = ensure_success(self.authorize(self.http.get(url)).send().await?).await?;
        Ok(Box::pin(resp.bytes_stream().map_err(ProviderError::from)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unconfigured_provider_refuses_requests() {
        let provider = HttpScreeningProvider::new(&ProviderConfig::default()).unwrap();
        assert!(!provider.is_configured());
        assert!(matches!(provider.url("/catalog"), Err(ProviderError::NotConfigured)));
    }

    #[test]
    fn urls_are_joined_to_base() {
        let provider = HttpScreeningProvider::new(&ProviderConfig {
            url: "http://yente:8000/".into(),
            self_hosted: true,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(provider.url("/algorithms").unwrap(), "http://yente:8000/algorithms");
        assert!(provider.is_self_hosted());
    }
}
