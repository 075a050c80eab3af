//! Pattern and queue records.
//!
//! A pattern moves through three distinct records, each built from the last
//! by a pure conversion: [`RawPattern`] (AI output) → [`EnrichedPattern`]
//! (cleaned text + id) → [`FinishedProduct`] (fulfillment ids). None of them
//! is mutated in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One AI-proposed t-shirt design.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPattern {
    /// Listing title.
    pub product_name: String,
    /// Listing description.
    pub description: String,
    /// Text printed on the shirt.
    pub tshirt_text: String,
    /// Marketing tags for the listing.
    pub marketing_tags: Vec<String>,
}

impl RawPattern {
    /// Reject patterns with blank required fields.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("product_name", &self.product_name),
            ("description", &self.description),
            ("tshirt_text", &self.tshirt_text),
        ] {
            if value.trim().is_empty() {
                return Err(format!("pattern field `{field}` is empty"));
            }
        }
        Ok(())
    }

    /// Attach an id and strip wrapping quotes from the shirt text.
    pub fn enrich(self, id: Uuid) -> EnrichedPattern {
        EnrichedPattern {
            id,
            tshirt_text: remove_surrounding_quotes(&self.tshirt_text).to_owned(),
            product_name: self.product_name,
            description: self.description,
            marketing_tags: self.marketing_tags,
        }
    }
}

/// A pattern ready for rendering and fulfillment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedPattern {
    /// Generated id; also the image file stem.
    pub id: Uuid,
    pub product_name: String,
    pub description: String,
    pub tshirt_text: String,
    pub marketing_tags: Vec<String>,
}

impl EnrichedPattern {
    /// Attach fulfillment ids.
    pub fn finish(self, product_id: String, image_ids: Vec<String>) -> FinishedProduct {
        FinishedProduct {
            pattern_id: self.id,
            product_name: self.product_name,
            description: self.description,
            tshirt_text: self.tshirt_text,
            marketing_tags: self.marketing_tags,
            product_id,
            image_ids,
        }
    }
}

/// The persisted product record, written once per `product_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishedProduct {
    pub pattern_id: Uuid,
    pub product_name: String,
    pub description: String,
    pub tshirt_text: String,
    pub marketing_tags: Vec<String>,
    pub product_id: String,
    /// Fulfillment image ids, one per text color, in color order.
    pub image_ids: Vec<String>,
}

/// A queue entry before the store assigns it an id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewQueueItem {
    pub idea: String,
    pub patterns: u32,
    pub enqueued_at: DateTime<Utc>,
}

/// A pending idea in the work queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Store-assigned id; breaks ties between equal timestamps.
    pub id: i64,
    pub idea: String,
    pub patterns: u32,
    pub enqueued_at: DateTime<Utc>,
}

/// Remove one pair of wrapping `"` or `\"` quotes.
pub fn remove_surrounding_quotes(s: &str) -> &str {
    let s = s.trim();
    if s.len() >= 4 && s.starts_with("\\\"") && s.ends_with("\\\"") {
        return &s[2..s.len() - 2];
    }
    if s.len() >= 2 && s.starts_with('"') && s.ends_with('"') {
        return &s[1..s.len() - 1];
    }
    s
}
