use serde::{Deserialize, Serialize};

/// One receipt row: a product, how many of it were detected, and the price math.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct LineItem {
    pub product: String,
    pub quantity: u32,
    pub price: u32,
    pub subtotal: u32,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ReceiptResponse {
    pub products: Vec<LineItem>,
    pub total: u32,
    pub model_used: bool,
}

/// Failure body for a prediction request. Same shape as a receipt so clients
/// can always read `products`/`total`, plus the `error` field that marks it.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
    pub products: Vec<LineItem>,
    pub total: u32,
}

impl ErrorResponse {
    pub fn new(message: String) -> Self {
        Self {
            error: message,
            products: Vec::new(),
            total: 0,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum PredictionResult {
    Receipt(ReceiptResponse),
    Error(ErrorResponse),
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ProductInfo {
    pub id: u32,
    pub name: String,
    pub price: u32,
}

/// Inbound websocket frame. Anything without `"type": "image"` is skipped
/// without a reply.
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum InboundFrame {
    #[serde(rename = "image")]
    Image { image: String },
    #[serde(other)]
    Other,
}

/// Outbound websocket frame, serialized as `{"type": "prediction", "data": ...}`.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename = "prediction")]
pub struct PredictionFrame {
    pub data: PredictionResult,
}
