//! # Remote Gateway
//!
//! The two calls the engine makes against the product API.
//!
//! ## Wire Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET  {base}/get                                                        │
//! │       ◄── [ { image, price, product_name, product_type, tax }, ... ]   │
//! │                                                                         │
//! │  POST {base}/add   multipart/form-data                                  │
//! │       ──► product_name   text                                           │
//! │       ──► product_type   text                                           │
//! │       ──► price          text  ("10.0")                                 │
//! │       ──► tax            text  ("5.0")                                  │
//! │       ──► files[]        image/jpeg, zero or one part                   │
//! │       ◄── { message, product_details, product_id, success }            │
//! │                                                                         │
//! │  Non-2xx       → RemoteRejected(body.message or reason phrase)         │
//! │  success=false → RemoteRejected(message)                               │
//! │  send error    → TransportFailure                                      │
//! │  bad JSON      → MalformedResponse                                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use stockline_core::{NewProduct, Product};

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};

/// Content type of the `files[]` part.
pub const IMAGE_CONTENT_TYPE: &str = "image/jpeg";

// =============================================================================
// Request Types
// =============================================================================

/// Text fields of a create request.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductFields {
    pub name: String,
    pub product_type: String,
    pub price: f64,
    pub tax: f64,
}

impl From<&NewProduct> for ProductFields {
    fn from(request: &NewProduct) -> Self {
        ProductFields {
            name: request.name.clone(),
            product_type: request.product_type.clone(),
            price: request.price,
            tax: request.tax,
        }
    }
}

/// An image read into memory, ready to attach.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageAttachment {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Formats a decimal the way the API expects it: plain positional digits,
/// always with a fraction digit, so `10` goes out as `"10.0"`.
pub fn format_decimal(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{text}.0")
    } else {
        text
    }
}

// =============================================================================
// Gateway Trait
// =============================================================================

/// The remote product service.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Fetches the full product list.
    async fn fetch_all(&self) -> SyncResult<Vec<Product>>;

    /// Creates a product, optionally with one image.
    async fn create_product(&self, fields: &ProductFields, image: Option<ImageAttachment>) -> SyncResult<Product>;
}

// =============================================================================
// Wire DTOs
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RemoteProduct {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    price: f64,
    product_name: String,
    #[serde(default)]
    product_type: String,
    #[serde(default)]
    tax: f64,
}

impl RemoteProduct {
    fn into_product(self, id: Option<i64>) -> Product {
        Product {
            id,
            name: self.product_name,
            product_type: self.product_type,
            price: self.price,
            tax: self.tax,
            image: self.image.filter(|url| !url.trim().is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct AddProductResponse {
    #[serde(default)]
    message: String,
    #[serde(default)]
    product_details: Option<RemoteProduct>,
    #[serde(default)]
    product_id: Option<i64>,
    #[serde(default)]
    success: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

// =============================================================================
// HTTP Gateway
// =============================================================================

/// reqwest implementation of [`RemoteGateway`].
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpGateway {
    /// Creates a gateway rooted at `base_url`.
    ///
    /// ## Arguments
    /// * `base_url` - Must end in `/` so `get` and `add` resolve under it
    /// * `request_timeout` - Whole-request timeout
    /// * `connect_timeout` - Connection establishment timeout
    pub fn new(base_url: Url, request_timeout: Duration, connect_timeout: Duration) -> SyncResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| SyncError::InvalidConfig(e.to_string()))?;

        Ok(HttpGateway { client, base_url })
    }

    /// Creates a gateway from the `[remote]` section.
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        Self::new(config.base_url()?, config.request_timeout(), config.connect_timeout())
    }

    fn endpoint(&self, path: &str) -> SyncResult<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Turns a non-2xx response into `RemoteRejected`.
    async fn rejection(response: Response) -> SyncError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| reason_phrase(status));

        warn!(status = %status, message = %message, "Remote rejected request");
        SyncError::rejected(message)
    }
}

fn reason_phrase(status: StatusCode) -> String {
    status
        .canonical_reason()
        .map(str::to_string)
        .unwrap_or_else(|| status.as_u16().to_string())
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn fetch_all(&self) -> SyncResult<Vec<Product>> {
        let url = self.endpoint("get")?;
        debug!(url = %url, "Fetching product list");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body = response.text().await?;
        let remote: Vec<RemoteProduct> = serde_json::from_str(&body)?;

        info!(count = remote.len(), "Fetched product list");
        Ok(remote.into_iter().map(|p| p.into_product(None)).collect())
    }

    async fn create_product(&self, fields: &ProductFields, image: Option<ImageAttachment>) -> SyncResult<Product> {
        let url = self.endpoint("add")?;

        let mut form = Form::new()
            .text("product_name", fields.name.clone())
            .text("product_type", fields.product_type.clone())
            .text("price", format_decimal(fields.price))
            .text("tax", format_decimal(fields.tax));

        let has_image = image.is_some();
        if let Some(image) = image {
            let part = Part::bytes(image.bytes)
                .file_name(image.file_name)
                .mime_str(IMAGE_CONTENT_TYPE)?;
            form = form.part("files[]", part);
        }

        debug!(url = %url, product_name = %fields.name, has_image, "Posting product");

        let response = self.client.post(url).multipart(form).send().await?;
        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        let body = response.text().await?;
        let parsed: AddProductResponse = serde_json::from_str(&body)?;

        if !parsed.success {
            let message = if parsed.message.trim().is_empty() {
                "Product was not added".to_string()
            } else {
                parsed.message
            };
            return Err(SyncError::rejected(message));
        }

        info!(product_name = %fields.name, product_id = ?parsed.product_id, "Product created remotely");

        let product = match parsed.product_details {
            Some(details) => details.into_product(parsed.product_id),
            None => Product {
                id: parsed.product_id,
                name: fields.name.clone(),
                product_type: fields.product_type.clone(),
                price: fields.price,
                tax: fields.tax,
                image: None,
            },
        };
        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_decimal_keeps_fraction() {
        assert_eq!(format_decimal(10.0), "10.0");
        assert_eq!(format_decimal(5.0), "5.0");
        assert_eq!(format_decimal(10.5), "10.5");
        assert_eq!(format_decimal(0.0), "0.0");
    }

    #[test]
    fn test_format_decimal_never_uses_exponent() {
        assert_eq!(format_decimal(1e20), "100000000000000000000.0");
        assert_eq!(format_decimal(1e-7), "0.0000001");
        assert_eq!(format_decimal(12_345_678.25), "12345678.25");
    }

    #[test]
    fn test_remote_product_blank_image_is_none() {
        let json = r#"{"image":"","price":10.0,"product_name":"Pen","product_type":"Stationery","tax":5.0}"#;
        let remote: RemoteProduct = serde_json::from_str(json).unwrap();
        let product = remote.into_product(None);
        assert_eq!(product.image, None);
        assert_eq!(product.name, "Pen");
    }

    #[test]
    fn test_add_response_parses_partial_body() {
        let parsed: AddProductResponse =
            serde_json::from_str(r#"{"message":"Product added","success":true,"product_id":2735}"#).unwrap();
        assert!(parsed.success);
        assert_eq!(parsed.product_id, Some(2735));
        assert!(parsed.product_details.is_none());
    }

    #[test]
    fn test_reason_phrase() {
        assert_eq!(reason_phrase(StatusCode::INTERNAL_SERVER_ERROR), "Internal Server Error");
    }

    #[test]
    fn test_fields_from_request() {
        let fields = ProductFields::from(&NewProduct::new("Pen", "Stationery", 10.0, 5.0));
        assert_eq!(fields.name, "Pen");
        assert_eq!(fields.tax, 5.0);
    }
}
