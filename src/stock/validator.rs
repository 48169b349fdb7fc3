use serde_json::{Map, Value};
use tracing::warn;

use crate::domain::{RawStockUpdate, StockUpdate};
use crate::error::ValidationError;

const FIELDS: [&str; 3] = ["product_id", "warehouse_id", "stock"];

/// Largest integer a JSON number can carry without losing precision.
const MAX_SAFE_INTEGER: i64 = (1 << 53) - 1;

/// Checks one incoming item against the stock update schema.
///
/// The item must be an object with exactly `product_id`, `warehouse_id` and
/// `stock`, all integers, and `stock >= 0`. Integral floats (`10.0`) and
/// strings holding an integer (`"10"`) are converted.
pub fn validate(item: &RawStockUpdate) -> Result<StockUpdate, ValidationError> {
    let object = item.as_object().ok_or(ValidationError::NotAnObject)?;

    if let Some(unknown) = object.keys().find(|k| !FIELDS.contains(&k.as_str())) {
        return Err(ValidationError::UnknownField(unknown.clone()));
    }

    let product_id = integer_field(object, "product_id")?;
    let warehouse_id = integer_field(object, "warehouse_id")?;
    let stock = integer_field(object, "stock")?;
    if stock < 0 {
        return Err(ValidationError::NegativeStock);
    }

    Ok(StockUpdate::new(product_id, warehouse_id, stock))
}

fn integer_field(object: &Map<String, Value>, field: &'static str) -> Result<i64, ValidationError> {
    let value = object.get(field).ok_or(ValidationError::Missing(field))?;
    as_integer(value)
        .filter(|n| (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER).contains(n))
        .ok_or(ValidationError::NotAnInteger(field))
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(f: f64) -> Option<i64> {
    (f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_SAFE_INTEGER as f64).then(|| f as i64)
}

/// Splits a batch into the updates that passed validation, in arrival order,
/// and the number of items that were dropped.
pub fn partition(batch: &[RawStockUpdate]) -> (Vec<StockUpdate>, usize) {
    let mut valid = Vec::with_capacity(batch.len());
    let mut invalid = 0;
    for item in batch {
        match validate(item) {
            Ok(update) => valid.push(update),
            Err(e) => {
                warn!(item = %item, error = %e, "Dropping invalid stock update");
                invalid += 1;
            }
        }
    }
    (valid, invalid)
}
