use serde::{Deserialize, Serialize};

pub use shorturl_core::{BatchItem, BatchResult};

#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ShortenResponse {
    pub result: String,
}
