//! # ls-catalog-google
//!
//! `BookCatalog` implementation over the Google Books volumes API. A strict
//! pass-through: one request per call, no caching, no retry. Failures of any
//! kind (network, status, decode) are logged and reported as an empty
//! result, matching the catalog port's infallible contract.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::warn;

use ls_core::models::{BookDetail, BookIdentifier, BookSummary};
use ls_core::traits::BookCatalog;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/books/v1";

pub struct GoogleBooksCatalog {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
}

impl GoogleBooksCatalog {
    pub fn new(base_url: impl Into<String>, api_key: SecretString) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    async fn fetch_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        query: &[(&str, &str)],
    ) -> Option<T> {
        let response = match self
            .http
            .get(&url)
            .query(query)
            .query(&[("key", self.api_key.expose_secret())])
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(%url, error = %err, "catalog request failed");
                return None;
            }
        };
        if !response.status().is_success() {
            warn!(%url, status = %response.status(), "catalog request rejected");
            return None;
        }
        match response.json::<T>().await {
            Ok(value) => Some(value),
            Err(err) => {
                warn!(%url, error = %err, "catalog response did not parse");
                None
            }
        }
    }
}

#[async_trait]
impl BookCatalog for GoogleBooksCatalog {
    async fn search(&self, query: &str) -> Vec<BookSummary> {
        let url = format!("{}/volumes", self.base_url);
        let Some(response) = self
            .fetch_json::<VolumesResponse>(url, &[("q", query)])
            .await
        else {
            return vec![];
        };
        response
            .items
            .unwrap_or_default()
            .into_iter()
            .map(summary_from)
            .collect()
    }

    async fn volume(&self, id: &str) -> Option<BookDetail> {
        let url = format!("{}/volumes/{id}", self.base_url);
        self.fetch_json::<VolumeDoc>(url, &[]).await.map(detail_from)
    }
}

// ── Wire format ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct VolumesResponse {
    items: Option<Vec<VolumeDoc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeDoc {
    id: String,
    #[serde(default)]
    volume_info: VolumeInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VolumeInfo {
    title: Option<String>,
    subtitle: Option<String>,
    #[serde(default)]
    authors: Vec<String>,
    description: Option<String>,
    image_links: Option<ImageLinks>,
    preview_link: Option<String>,
    page_count: Option<u32>,
    average_rating: Option<f64>,
    ratings_count: Option<u32>,
    #[serde(default)]
    industry_identifiers: Vec<IndustryIdentifier>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageLinks {
    thumbnail: Option<String>,
    small_thumbnail: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IndustryIdentifier {
    #[serde(rename = "type")]
    kind: String,
    identifier: String,
}

fn thumbnail_of(info: &VolumeInfo) -> Option<String> {
    info.image_links
        .as_ref()
        .and_then(|links| links.thumbnail.clone().or_else(|| links.small_thumbnail.clone()))
}

fn summary_from(doc: VolumeDoc) -> BookSummary {
    let thumbnail = thumbnail_of(&doc.volume_info);
    BookSummary {
        id: doc.id,
        title: doc.volume_info.title.unwrap_or_else(|| "Untitled".into()),
        authors: doc.volume_info.authors,
        thumbnail,
    }
}

fn detail_from(doc: VolumeDoc) -> BookDetail {
    let thumbnail = thumbnail_of(&doc.volume_info);
    let info = doc.volume_info;
    BookDetail {
        id: doc.id,
        title: info.title.unwrap_or_else(|| "Untitled".into()),
        subtitle: info.subtitle,
        authors: info.authors,
        description_html: info.description,
        thumbnail,
        preview_link: info.preview_link,
        page_count: info.page_count,
        average_rating: info.average_rating,
        ratings_count: info.ratings_count,
        identifiers: info
            .industry_identifiers
            .into_iter()
            .map(|id| BookIdentifier {
                kind: id.kind,
                value: id.identifier,
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_volume_wire_format_maps_to_detail() {
        let doc: VolumeDoc = serde_json::from_value(serde_json::json!({
            "id": "zyTCAlFPjgYC",
            "volumeInfo": {
                "title": "The Google Story",
                "subtitle": "Inside the Hottest Business",
                "authors": ["David A. Vise", "Mark Malseed"],
                "description": "<p>Raw <b>markup</b> from the catalog.</p>",
                "pageCount": 207,
                "averageRating": 3.5,
                "ratingsCount": 136,
                "previewLink": "http://books.google.com/books?id=zyTCAlFPjgYC",
                "imageLinks": {
                    "smallThumbnail": "http://books.google.com/small.jpg",
                    "thumbnail": "http://books.google.com/thumb.jpg"
                },
                "industryIdentifiers": [
                    { "type": "ISBN_10", "identifier": "055380457X" }
                ]
            }
        }))
        .unwrap();

        let detail = detail_from(doc);
        assert_eq!(detail.title, "The Google Story");
        assert_eq!(detail.authors.len(), 2);
        assert_eq!(detail.thumbnail.as_deref(), Some("http://books.google.com/thumb.jpg"));
        assert_eq!(detail.page_count, Some(207));
        assert_eq!(detail.identifiers[0].kind, "ISBN_10");
        assert_eq!(
            detail.description_html.as_deref(),
            Some("<p>Raw <b>markup</b> from the catalog.</p>")
        );
    }

    #[test]
    fn test_sparse_volume_still_maps() {
        let doc: VolumeDoc =
            serde_json::from_value(serde_json::json!({ "id": "bare" })).unwrap();
        let summary = summary_from(doc);
        assert_eq!(summary.title, "Untitled");
        assert!(summary.authors.is_empty());
        assert!(summary.thumbnail.is_none());
    }
}
