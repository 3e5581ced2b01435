use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output column order. Matches the field order of [`SaleRecord`].
pub const COLUMNS: [&str; 11] = [
    "item_id",
    "title",
    "price",
    "date",
    "platform",
    "seller",
    "condition",
    "grading_company",
    "image_url",
    "listing_url",
    "search_url",
];

/// One sold item as returned by the archive, normalized to the output schema.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SaleRecord {
    pub item_id: String,
    pub title: String,
    pub price: String,
    pub date: String,
    pub platform: String,
    pub seller: String,
    pub condition: String,
    pub grading_company: String,
    pub image_url: String,
    pub listing_url: String,
    /// Request URL of the page this record came from.
    pub search_url: String,
}

impl SaleRecord {
    /// Maps a raw API hit onto the canonical fields. Absent keys become empty.
    pub fn from_hit(hit: &Value, search_url: &str) -> Self {
        let field = |keys: &[&str]| {
            keys.iter()
                .filter_map(|k| hit.get(*k))
                .map(scalar_text)
                .find(|s| !s.is_empty())
                .unwrap_or_default()
        };

        SaleRecord {
            item_id: field(&["itemId", "item_id", "id"]),
            title: field(&["title"]),
            price: field(&["price"]),
            date: field(&["date"]),
            platform: field(&["platform"]),
            seller: field(&["seller"]),
            condition: field(&["condition"]),
            grading_company: field(&["gradingCompany", "grading_company"]),
            image_url: field(&["image", "imageUrl", "image_url"]),
            listing_url: field(&["url", "listingUrl", "listing_url"]),
            search_url: search_url.to_string(),
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.trim().to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}
