//! JSON payloads of the v2 recent-search endpoint and their conversion
//! into [`SearchItem`]s.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use tidewatch_shared::{Geo, GeoPoint, Result, SearchItem, TidewatchError};

/// Body of a `GET /2/tweets/search/recent` response.
#[derive(Debug, Deserialize)]
pub(crate) struct SearchResponse {
    /// Absent (not empty) when nothing matched.
    #[serde(default)]
    pub data: Option<Vec<TweetPayload>>,
    #[serde(default)]
    pub errors: Vec<ApiProblem>,
    #[serde(default)]
    pub meta: Option<SearchMeta>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SearchMeta {
    #[serde(default)]
    pub result_count: Option<u32>,
    #[serde(default)]
    pub newest_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TweetPayload {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub geo: Option<GeoPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GeoPayload {
    #[serde(default)]
    pub place_id: Option<String>,
    #[serde(default)]
    pub coordinates: Option<PointPayload>,
}

/// GeoJSON point: `[longitude, latitude]`.
#[derive(Debug, Deserialize)]
pub(crate) struct PointPayload {
    #[serde(default)]
    pub coordinates: Vec<f64>,
}

/// Error object; the API uses both the problem-details shape
/// (`title`/`detail`) and the legacy `message` shape.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ApiProblem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<ApiProblem>,
}

impl ApiProblem {
    /// Most specific human-readable message available.
    pub fn summary(&self) -> Option<String> {
        self.detail
            .clone()
            .or_else(|| self.message.clone())
            .or_else(|| self.title.clone())
            .or_else(|| self.errors.iter().find_map(ApiProblem::summary))
    }
}

impl TweetPayload {
    /// Convert into the domain type. `author_id` and `created_at` are always
    /// requested, so their absence means the response is malformed.
    pub fn into_item(self) -> Result<SearchItem> {
        let author_id = self.author_id.ok_or_else(|| {
            TidewatchError::parse(format!("tweet {} has no author_id", self.id))
        })?;
        let created_at = self.created_at.ok_or_else(|| {
            TidewatchError::parse(format!("tweet {} has no created_at", self.id))
        })?;

        let geo = self.geo.map(|g| Geo {
            place_id: g.place_id,
            point: g.coordinates.and_then(|p| match p.coordinates.as_slice() {
                [longitude, latitude] => Some(GeoPoint {
                    longitude: *longitude,
                    latitude: *latitude,
                }),
                _ => None,
            }),
        });

        Ok(SearchItem {
            id: self.id,
            text: self.text,
            author_id,
            created_at,
            geo,
        })
    }
}

/// Decode a successful (2xx) body into items, preserving API order.
pub(crate) fn decode_search_body(body: &str) -> Result<Vec<SearchItem>> {
    let response: SearchResponse = serde_json::from_str(body)
        .map_err(|e| TidewatchError::parse(format!("invalid search response: {e}")))?;

    match response.data {
        Some(tweets) => {
            if !response.errors.is_empty() {
                tracing::warn!(
                    errors = response.errors.len(),
                    "search response carried partial errors"
                );
            }
            Ok(tweets.into_iter().filter_map(decode_tweet).collect())
        }
        None if !response.errors.is_empty() => {
            let message = response
                .errors
                .iter()
                .find_map(ApiProblem::summary)
                .unwrap_or_else(|| "unknown error".into());
            Err(TidewatchError::Api {
                status: 200,
                message,
            })
        }
        None => {
            if let Some(meta) = response.meta {
                tracing::debug!(
                    result_count = meta.result_count.unwrap_or(0),
                    newest_id = meta.newest_id.as_deref().unwrap_or("-"),
                    "search returned no data"
                );
            }
            Ok(Vec::new())
        }
    }
}

/// One malformed tweet is dropped with a warning; its siblings are kept.
fn decode_tweet(tweet: TweetPayload) -> Option<SearchItem> {
    match tweet.into_item() {
        Ok(item) => Some(item),
        Err(e) => {
            tracing::warn!(error = %e, "dropping unusable tweet");
            None
        }
    }
}

/// Extract a message from a non-2xx body, falling back to the raw text.
pub(crate) fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiProblem>(body)
        .ok()
        .and_then(|p| p.summary())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "empty response body".into()
            } else {
                trimmed.chars().take(200).collect()
            }
        })
}
