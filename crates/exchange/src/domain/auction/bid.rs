use {
    super::ImpressionId,
    crate::domain::currency::Currency,
    rust_decimal::Decimal,
    serde::{Deserialize, Serialize},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MediaType {
    Banner,
    Video,
    Audio,
    Native,
}

/// A bid as understood by the exchange, after an adapter translated it from
/// its partner's wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypedBid {
    pub id: String,
    pub impression: ImpressionId,
    /// Price per impression in `currency`, as quoted by the partner.
    pub price: Decimal,
    pub currency: Currency,
    pub media_type: MediaType,
    /// Ad markup.
    pub creative: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creative_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    /// Seconds.
    pub duration: u32,
    #[serde(default)]
    pub primary_category: Option<String>,
}
