//! External image providers queried by free-text name.
#![allow(async_fn_in_trait)]

use crate::error::ProviderError;
use reqwest::{Client, Url};
use serde::Deserialize;

/// A read-only lookup returning the representative image of the first match.
pub trait ImageProvider {
    fn name(&self) -> &'static str;

    /// `Ok(None)` when the provider answered but had no image.
    async fn lookup(&self, query: &str) -> Result<Option<String>, ProviderError>;
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|s| !s.trim().is_empty())
}

// ── iNaturalist ──

#[derive(Debug, Deserialize)]
struct TaxaResponse {
    #[serde(default)]
    results: Vec<Taxon>,
}

#[derive(Debug, Deserialize)]
struct Taxon {
    default_photo: Option<TaxonPhoto>,
}

#[derive(Debug, Deserialize)]
struct TaxonPhoto {
    medium_url: Option<String>,
    url: Option<String>,
}

impl TaxaResponse {
    fn image(self) -> Option<String> {
        let photo = self.results.into_iter().next()?.default_photo?;
        non_empty(photo.medium_url).or_else(|| non_empty(photo.url))
    }
}

/// Species search on the iNaturalist taxa API.
pub struct INaturalist {
    client: Client,
    base_url: String,
}

impl INaturalist {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

impl ImageProvider for INaturalist {
    fn name(&self) -> &'static str {
        "inaturalist"
    }

    async fn lookup(&self, query: &str) -> Result<Option<String>, ProviderError> {
        let response = self
            .client
            .get(format!("{}/v1/taxa", self.base_url))
            .query(&[("q", query), ("rank", "species"), ("per_page", "1")])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }
        let body: TaxaResponse = response.json().await?;
        Ok(body.image())
    }
}

// ── Wikipedia ──

#[derive(Debug, Deserialize)]
struct PageSummary {
    thumbnail: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    source: Option<String>,
}

impl PageSummary {
    fn image(self) -> Option<String> {
        non_empty(self.thumbnail?.source)
    }
}

/// Page summary thumbnails from the Wikipedia REST API.
pub struct Wikipedia {
    client: Client,
    base_url: String,
}

impl Wikipedia {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn summary_url(&self, title: &str) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&format!("{}/api/rest_v1/page/summary", self.base_url))
            .map_err(|e| ProviderError::Url(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Url(self.base_url.clone()))?
            .push(title);
        Ok(url)
    }
}

impl ImageProvider for Wikipedia {
    fn name(&self) -> &'static str {
        "wikipedia"
    }

    async fn lookup(&self, title: &str) -> Result<Option<String>, ProviderError> {
        let response = self.client.get(self.summary_url(title)?).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }
        let body: PageSummary = response.json().await?;
        Ok(body.image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_taxa_prefers_medium_url() {
        let body: TaxaResponse = serde_json::from_str(
            r#"{"total_results": 1, "results": [{"name": "Turdus grayi",
                "default_photo": {"medium_url": "https://img/m.jpg", "url": "https://img/s.jpg"}}]}"#,
        )
        .unwrap();
        assert_eq!(body.image().as_deref(), Some("https://img/m.jpg"));
    }

    #[test]
    fn test_taxa_falls_back_to_url() {
        let body: TaxaResponse = serde_json::from_str(
            r#"{"results": [{"default_photo": {"medium_url": null, "url": "https://img/s.jpg"}}]}"#,
        )
        .unwrap();
        assert_eq!(body.image().as_deref(), Some("https://img/s.jpg"));
    }

    #[test]
    fn test_taxa_without_photo_or_results() {
        let none: TaxaResponse = serde_json::from_str(r#"{"results": []}"#).unwrap();
        assert_eq!(none.image(), None);
        let none: TaxaResponse =
            serde_json::from_str(r#"{"results": [{"default_photo": null}]}"#).unwrap();
        assert_eq!(none.image(), None);
        let none: TaxaResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(none.image(), None);
    }

    #[test]
    fn test_summary_thumbnail() {
        let body: PageSummary = serde_json::from_str(
            r#"{"title": "Clay-colored thrush", "thumbnail": {"source": "https://upload/t.jpg", "width": 320}}"#,
        )
        .unwrap();
        assert_eq!(body.image().as_deref(), Some("https://upload/t.jpg"));
        let body: PageSummary = serde_json::from_str(r#"{"title": "x"}"#).unwrap();
        assert_eq!(body.image(), None);
    }

    #[test]
    fn test_summary_url_encodes_title() {
        let wiki = Wikipedia::new(Client::new(), "https://en.wikipedia.org/");
        let url = wiki.summary_url("Lesson's motmot/x").unwrap();
        assert_eq!(
            url.as_str(),
            "https://en.wikipedia.org/api/rest_v1/page/summary/Lesson's%20motmot%2Fx"
        );
    }
}
