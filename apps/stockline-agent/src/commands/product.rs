//! # Product Commands

use std::fmt;
use std::path::PathBuf;

use futures_util::StreamExt;
use serde::Serialize;

use stockline_core::{Caller, LoadState, NewProduct, Product};
use stockline_sync::{AddOutcome, SyncEngine};

use crate::error::{ApiError, ApiResult, ErrorCode};

/// Result of `add`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddReport {
    /// "delivered" or "queued"
    pub status: &'static str,
    pub product_name: String,
    pub product_id: Option<i64>,
    pub pending_id: Option<i64>,
}

impl fmt::Display for AddReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, self.pending_id) {
            ("queued", Some(id)) => write!(f, "{} queued for upload (#{id})", self.product_name),
            _ => write!(f, "{} uploaded", self.product_name),
        }
    }
}

/// Adds a product, straight to the server or into the queue.
///
/// ## Arguments
/// * `image` - Optional path or `file://` URI of a JPEG
pub async fn add(
    engine: &SyncEngine,
    name: String,
    product_type: String,
    price: f64,
    tax: f64,
    image: Option<PathBuf>,
) -> ApiResult<AddReport> {
    let mut request = NewProduct::new(name, product_type, price, tax);
    if let Some(path) = image {
        request = request.with_image(path.to_string_lossy().into_owned());
    }
    let product_name = request.name.clone();

    let report = match engine.add_product(request, Caller::Foreground).await? {
        AddOutcome::Delivered(product) => AddReport {
            status: "delivered",
            product_name,
            product_id: product.id,
            pending_id: None,
        },
        AddOutcome::Queued { pending_id } => AddReport {
            status: "queued",
            product_name,
            product_id: None,
            pending_id: Some(pending_id),
        },
    };
    Ok(report)
}

/// Result of `list`.
#[derive(Debug, Clone, Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
}

impl fmt::Display for ProductList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.products.is_empty() {
            return write!(f, "No products");
        }
        for (i, p) in self.products.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{:<30} {:<16} {:>10.2}  tax {:>5.1}%", p.name, p.product_type, p.price, p.tax)?;
        }
        Ok(())
    }
}

/// Lists products: refreshes when online, then reads the cache.
///
/// ## Arguments
/// * `search` - Optional filter on name, type or price
pub async fn list(engine: &SyncEngine, search: Option<String>) -> ApiResult<ProductList> {
    let mut states = engine.list_products();

    while let Some(state) = states.next().await {
        match state {
            LoadState::Loading => continue,
            LoadState::Ready(products) => {
                let products = match search.as_deref() {
                    Some(query) => products.into_iter().filter(|p| p.matches(query)).collect(),
                    None => products,
                };
                return Ok(ProductList { products });
            }
            LoadState::Failed(message) => return Err(ApiError::new(ErrorCode::StorageError, message)),
        }
    }

    Err(ApiError::internal("Product list ended without a result"))
}

/// Result of `refresh`.
#[derive(Debug, Clone, Serialize)]
pub struct RefreshReport {
    pub refreshed: bool,
    pub cached: u64,
}

impl fmt::Display for RefreshReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.refreshed {
            write!(f, "Refreshed, {} products cached", self.cached)
        } else {
            write!(f, "Not refreshed (offline or server unreachable), {} products cached", self.cached)
        }
    }
}

/// Pull-to-refresh.
pub async fn refresh(engine: &SyncEngine) -> ApiResult<RefreshReport> {
    let refreshed = engine.refresh_products().await;
    let cached = engine.db().products().count().await?;
    Ok(RefreshReport { refreshed, cached })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_report_display() {
        let queued = AddReport {
            status: "queued",
            product_name: "Pen".into(),
            product_id: None,
            pending_id: Some(3),
        };
        assert_eq!(queued.to_string(), "Pen queued for upload (#3)");

        let delivered = AddReport {
            status: "delivered",
            product_name: "Pen".into(),
            product_id: Some(9),
            pending_id: None,
        };
        assert_eq!(delivered.to_string(), "Pen uploaded");
    }

    #[test]
    fn test_empty_product_list_display() {
        assert_eq!(ProductList { products: vec![] }.to_string(), "No products");
    }
}
