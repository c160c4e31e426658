//! Core domain types for Tidewatch mention ingestion.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, TidewatchError};

/// Source tag written on records when none is configured.
pub const DEFAULT_SOURCE_TAG: &str = "twitter";

// ---------------------------------------------------------------------------
// SearchItem
// ---------------------------------------------------------------------------

/// A single post returned by the search API, already decoded from the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchItem {
    /// Platform identifier; the natural key for deduplication.
    pub id: String,
    /// Raw post text.
    pub text: String,
    /// Platform identifier of the author.
    pub author_id: String,
    /// Creation time as reported by the platform.
    pub created_at: DateTime<Utc>,
    /// Location data, present only when the author attached one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo: Option<Geo>,
}

/// Geo tag attached to a post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geo {
    /// Platform place identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    /// Exact point, if the author shared precise location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point: Option<GeoPoint>,
}

/// A longitude/latitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub longitude: f64,
    pub latitude: f64,
}

// ---------------------------------------------------------------------------
// MentionRecord
// ---------------------------------------------------------------------------

/// A persisted mention, one per `external_id`.
///
/// Created once on first sighting and never rewritten by the ingestion loop.
/// `processed` belongs to the downstream consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentionRecord {
    /// Row identifier (UUID v7).
    pub id: String,
    /// Natural key copied from [`SearchItem::id`].
    pub external_id: String,
    /// Raw post text.
    pub text: String,
    /// Author identifier on the source platform.
    pub author_id: String,
    /// Source-reported creation time.
    pub created_at: DateTime<Utc>,
    /// Origin tag, e.g. `"twitter"`.
    pub source: String,
    /// Whether a downstream consumer has handled this mention.
    pub processed: bool,
    /// When this record was written.
    pub ingested_at: DateTime<Utc>,
}

impl MentionRecord {
    /// Build an unprocessed record for a freshly seen item.
    pub fn from_item(item: &SearchItem, source: &str) -> Result<Self> {
        if item.id.trim().is_empty() {
            return Err(TidewatchError::validation("search item has an empty id"));
        }

        Ok(Self {
            id: Uuid::now_v7().to_string(),
            external_id: item.id.clone(),
            text: item.text.clone(),
            author_id: item.author_id.clone(),
            created_at: item.created_at,
            source: source.to_string(),
            processed: false,
            ingested_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> SearchItem {
        SearchItem {
            id: id.into(),
            text: "Oil spill reported off the Chennai coast".into(),
            author_id: "42".into(),
            created_at: "2024-03-01T10:15:00Z".parse().unwrap(),
            geo: None,
        }
    }

    #[test]
    fn record_from_item_starts_unprocessed() {
        let record = MentionRecord::from_item(&item("1760000000000000001"), "twitter").unwrap();
        assert_eq!(record.external_id, "1760000000000000001");
        assert_eq!(record.source, "twitter");
        assert!(!record.processed);
        assert_eq!(record.author_id, "42");
        assert_eq!(record.created_at.to_rfc3339(), "2024-03-01T10:15:00+00:00");
        assert!(Uuid::parse_str(&record.id).is_ok());
    }

    #[test]
    fn record_uses_configured_source_tag() {
        let record = MentionRecord::from_item(&item("7"), "x-archive").unwrap();
        assert_eq!(record.source, "x-archive");
    }

    #[test]
    fn record_rejects_blank_id() {
        let err = MentionRecord::from_item(&item("  "), DEFAULT_SOURCE_TAG).unwrap_err();
        assert!(err.to_string().contains("empty id"));
    }

    #[test]
    fn search_item_geo_is_optional_in_json() {
        let json = r#"{
            "id": "9",
            "text": "red tide at Vizag",
            "author_id": "3",
            "created_at": "2024-03-01T10:15:00Z"
        }"#;
        let parsed: SearchItem = serde_json::from_str(json).unwrap();
        assert!(parsed.geo.is_none());
        assert!(!serde_json::to_string(&parsed).unwrap().contains("geo"));
    }
}
