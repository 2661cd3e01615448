use serde::{Deserialize, Serialize};

/// Storefront product body for an external (affiliate) listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductPayload {
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: String,
    pub status: ListingStatus,
    pub description: String,
    pub short_description: String,
    pub regular_price: String,
    pub external_url: String,
    pub button_text: String,
    pub meta_data: Vec<MetaData>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Publish,
    Draft,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaData {
    pub key: String,
    pub value: String,
}

/// The only part of the storefront's reply we rely on.
#[derive(Debug, Deserialize)]
pub struct ProductBody {
    pub id: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProductResponse {
    pub id: String,
    /// Raw response text, kept for the sync log.
    pub body: String,
}
