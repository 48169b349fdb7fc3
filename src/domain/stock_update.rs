use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::LotKey;

/// One item of an incoming batch, exactly as the caller sent it.
pub type RawStockUpdate = Value;

/// A stock update that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockUpdate {
    pub product_id: i64,
    pub warehouse_id: i64,
    pub stock: i64,
}

impl StockUpdate {
    pub fn new(product_id: i64, warehouse_id: i64, stock: i64) -> Self {
        Self {
            product_id,
            warehouse_id,
            stock,
        }
    }

    pub fn key(&self) -> LotKey {
        LotKey {
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
        }
    }
}

pub const STOCK_UPDATED_MESSAGE: &str = "Stock updated successfully";

/// Outcome of one bulk update request, aggregated over all of its chunks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkUpdateResult {
    pub message: String,
    #[serde(rename = "total_stocks_updated")]
    pub total_updated: usize,
    #[serde(rename = "total_stocks_invalids")]
    pub total_invalid: usize,
    #[serde(rename = "total_stocks_received")]
    pub total_received: usize,
    #[serde(rename = "total_stocks_valid")]
    pub total_valid: usize,
}

impl BulkUpdateResult {
    pub fn new(total_received: usize, total_valid: usize, total_updated: usize) -> Self {
        Self {
            message: STOCK_UPDATED_MESSAGE.to_string(),
            total_updated,
            total_invalid: total_received - total_valid,
            total_received,
            total_valid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_uses_wire_field_names() {
        let result = BulkUpdateResult::new(3, 2, 1);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["message"], "Stock updated successfully");
        assert_eq!(json["total_stocks_received"], 3);
        assert_eq!(json["total_stocks_valid"], 2);
        assert_eq!(json["total_stocks_invalids"], 1);
        assert_eq!(json["total_stocks_updated"], 1);
    }
}
