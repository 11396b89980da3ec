//! Record validation and normalization.
//!
//! Turns raw API records into flattened `ProductRecord`s. Validation never
//! fails the run: a record that does not match the schema is classified
//! invalid, logged, and kept exactly as fetched for the archive.
//!
//! Rules:
//! - required: `id` (integer), `title` (string), `price` (number, finite, >= 0)
//! - optional strings: `category`, `description`, `image`
//! - optional `rating` object with optional `rate` (number) and `count` (integer)
//! - unknown fields are ignored

use chrono::NaiveDateTime;
use serde_json::{Map, Value};
use tracing::warn;

use crate::domain::{InvalidRecord, ProductRecord, ValidatedBatch, ValidationOutcome};

/// Classify one raw record.
pub fn validate_record(raw: &Value, loaded_at: NaiveDateTime) -> ValidationOutcome {
    match normalize(raw, loaded_at) {
        Ok(record) => ValidationOutcome::Valid(record),
        Err(reason) => ValidationOutcome::Invalid(InvalidRecord {
            record: raw.clone(),
            reason,
        }),
    }
}

/// Classify a whole fetched batch, stamping valid records with `loaded_at`.
pub fn validate_batch(raw: &[Value], loaded_at: NaiveDateTime) -> ValidatedBatch {
    let mut valid = Vec::new();
    let mut invalid = Vec::new();

    for (idx, value) in raw.iter().enumerate() {
        match validate_record(value, loaded_at) {
            ValidationOutcome::Valid(record) => valid.push(record),
            ValidationOutcome::Invalid(rec) => {
                warn!(index = idx, id = %display_id(value), "invalid record: {}", rec.reason);
                invalid.push(rec);
            }
        }
    }

    ValidatedBatch {
        loaded_at,
        fetched: raw.len(),
        valid,
        invalid,
    }
}

fn normalize(raw: &Value, loaded_at: NaiveDateTime) -> Result<ProductRecord, String> {
    let obj = raw
        .as_object()
        .ok_or_else(|| "Record is not a JSON object.".to_string())?;

    let id = obj
        .get("id")
        .ok_or_else(|| "Missing required field `id`.".to_string())?
        .as_i64()
        .ok_or_else(|| "`id` must be an integer.".to_string())?;

    let title = obj
        .get("title")
        .ok_or_else(|| "Missing required field `title`.".to_string())?
        .as_str()
        .ok_or_else(|| "`title` must be a string.".to_string())?
        .to_string();

    let price = obj
        .get("price")
        .ok_or_else(|| "Missing required field `price`.".to_string())?
        .as_f64()
        .ok_or_else(|| "`price` must be a number.".to_string())?;
    if !price.is_finite() || price < 0.0 {
        return Err(format!("`price` must be finite and non-negative (got {price})."));
    }

    let category = optional_string(obj, "category")?;
    let description = optional_string(obj, "description")?;
    let image = optional_string(obj, "image")?;

    let (rating_rate, rating_count) = match obj.get("rating") {
        None => (None, None),
        Some(Value::Object(rating)) => flatten_rating(rating)?,
        Some(_) => return Err("`rating` must be an object.".to_string()),
    };

    Ok(ProductRecord {
        id,
        title,
        price,
        category,
        description,
        image,
        rating_rate,
        rating_count,
        loaded_at,
    })
}

fn optional_string(obj: &Map<String, Value>, name: &str) -> Result<Option<String>, String> {
    match obj.get(name) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(format!("`{name}` must be a string.")),
    }
}

fn flatten_rating(rating: &Map<String, Value>) -> Result<(Option<f64>, Option<i64>), String> {
    let rate = match rating.get("rate") {
        None => None,
        Some(v) => Some(
            v.as_f64()
                .ok_or_else(|| "`rating.rate` must be a number.".to_string())?,
        ),
    };

    let count = match rating.get("count") {
        None => None,
        Some(v) => Some(
            v.as_i64()
                .ok_or_else(|| "`rating.count` must be an integer.".to_string())?,
        ),
    };

    Ok((rate, count))
}

fn display_id(value: &Value) -> String {
    value
        .get("id")
        .map(|v| v.to_string())
        .unwrap_or_else(|| "?".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn ts() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 1)
            .unwrap()
            .and_hms_opt(12, 30, 0)
            .unwrap()
    }

    fn product() -> Value {
        json!({
            "id": 1,
            "title": "Fjallraven Backpack",
            "price": 109.95,
            "description": "Your perfect pack for everyday use",
            "category": "men's clothing",
            "image": "https://example.com/1.jpg",
            "rating": { "rate": 3.9, "count": 120 }
        })
    }

    fn expect_valid(value: &Value) -> ProductRecord {
        match validate_record(value, ts()) {
            ValidationOutcome::Valid(r) => r,
            ValidationOutcome::Invalid(r) => panic!("expected valid, got invalid: {}", r.reason),
        }
    }

    #[test]
    fn valid_record_is_flattened_and_stamped() {
        let record = expect_valid(&product());
        assert_eq!(record.id, 1);
        assert_eq!(record.title, "Fjallraven Backpack");
        assert_eq!(record.category.as_deref(), Some("men's clothing"));
        assert_eq!(record.rating_rate, Some(3.9));
        assert_eq!(record.rating_count, Some(120));
        assert_eq!(record.loaded_at, ts());
    }

    #[test]
    fn missing_required_fields_are_invalid() {
        for field in ["id", "title", "price"] {
            let mut value = product();
            value.as_object_mut().unwrap().remove(field);
            assert!(!validate_record(&value, ts()).is_valid(), "missing `{field}` should be invalid");
        }
    }

    #[test]
    fn wrong_typed_required_fields_are_invalid() {
        let cases = [
            ("id", json!("1")),
            ("id", json!(1.5)),
            ("title", Value::Null),
            ("title", json!(42)),
            ("price", json!("invalid")),
            ("price", json!(-1.0)),
        ];
        for (field, bad) in cases {
            let mut value = product();
            value[field] = bad.clone();
            assert!(
                !validate_record(&value, ts()).is_valid(),
                "`{field}` = {bad} should be invalid"
            );
        }
    }

    #[test]
    fn wrong_typed_rating_is_invalid() {
        let mut value = product();
        value["rating"]["rate"] = json!("invalid");
        assert!(!validate_record(&value, ts()).is_valid());

        let mut value = product();
        value["rating"]["count"] = json!(2.5);
        assert!(!validate_record(&value, ts()).is_valid());

        let mut value = product();
        value["rating"] = json!([3.9, 120]);
        assert!(!validate_record(&value, ts()).is_valid());
    }

    #[test]
    fn partial_or_missing_rating_is_valid_with_nulls() {
        let mut no_count = product();
        no_count["rating"].as_object_mut().unwrap().remove("count");
        let r = expect_valid(&no_count);
        assert_eq!((r.rating_rate, r.rating_count), (Some(3.9), None));

        let mut no_rate = product();
        no_rate["rating"].as_object_mut().unwrap().remove("rate");
        let r = expect_valid(&no_rate);
        assert_eq!((r.rating_rate, r.rating_count), (None, Some(120)));

        let mut no_rating = product();
        no_rating.as_object_mut().unwrap().remove("rating");
        let r = expect_valid(&no_rating);
        assert_eq!((r.rating_rate, r.rating_count), (None, None));
    }

    #[test]
    fn invalid_record_is_preserved_unchanged() {
        let mut value = product();
        value["price"] = json!("invalid");
        match validate_record(&value, ts()) {
            ValidationOutcome::Invalid(rec) => {
                assert_eq!(rec.record, value);
                assert!(rec.reason.contains("price"));
            }
            ValidationOutcome::Valid(_) => panic!("expected invalid"),
        }
    }

    #[test]
    fn batch_keeps_input_order_and_counts() {
        let mut bad = product();
        bad["title"] = Value::Null;
        let mut second = product();
        second["id"] = json!(2);

        let batch = validate_batch(&[product(), bad, second, json!("not an object")], ts());
        assert_eq!(batch.fetched, 4);
        assert_eq!(batch.valid.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(batch.invalid.len(), 2);
    }
}
