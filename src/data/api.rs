//! Product API integration.
//!
//! The API returns the whole catalogue as one JSON array. Records are handed to
//! validation untouched, so this module only checks transport and top-level shape.

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::AppError;

pub const DEFAULT_API_URL: &str = "https://fakestoreapi.com/products";

pub struct ProductApiClient {
    client: Client,
    url: String,
}

impl ProductApiClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
        }
    }

    /// Fetch all raw product records.
    ///
    /// A transport error or a non-success status aborts the run.
    pub fn fetch_products(&self) -> Result<Vec<Value>, AppError> {
        debug!(url = %self.url, "fetching products");

        let resp = self
            .client
            .get(&self.url)
            .send()
            .map_err(|e| AppError::runtime(format!("Product API request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(AppError::runtime(format!(
                "Failed to fetch data. Status code: {}",
                resp.status().as_u16()
            )));
        }

        let body = resp
            .text()
            .map_err(|e| AppError::runtime(format!("Failed to read product API response: {e}")))?;

        let products = parse_products(&body)?;
        info!("Number of products fetched: {}", products.len());
        Ok(products)
    }
}

/// Parse a response body into its top-level records.
pub fn parse_products(body: &str) -> Result<Vec<Value>, AppError> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| AppError::runtime(format!("Failed to parse product API response: {e}")))?;

    match value {
        Value::Array(items) => Ok(items),
        other => Err(AppError::runtime(format!(
            "Product API response must be a JSON array, got {}.",
            json_kind(&other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_products_returns_array_elements() {
        let body = r#"[{"id": 1, "title": "a", "price": 1.5}, {"id": 2}]"#;
        let products = parse_products(body).unwrap();
        assert_eq!(products.len(), 2);
        assert_eq!(products[1]["id"], 2);
    }

    #[test]
    fn parse_products_rejects_non_array_bodies() {
        let err = parse_products(r#"{"error": "rate limited"}"#).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_RUNTIME);
        assert!(err.message().contains("an object"));

        assert!(parse_products("<html>").is_err());
    }
}
