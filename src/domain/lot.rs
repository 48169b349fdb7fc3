use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A persisted lot: the stock of one product held in one warehouse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LotRecord {
    pub id: i64,
    pub product_id: i64,
    pub warehouse_id: i64,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
    /// Fields written by other tools that this crate does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Composite key used by the bulk update path to locate a lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LotKey {
    pub product_id: i64,
    pub warehouse_id: i64,
}

impl LotRecord {
    pub fn new(id: i64, product_id: i64, warehouse_id: i64, stock: i64) -> Self {
        Self {
            id,
            product_id,
            warehouse_id,
            stock,
            created_at: Utc::now(),
            updated_at: None,
            deleted_at: None,
            extra: Map::new(),
        }
    }

    pub fn key(&self) -> LotKey {
        LotKey {
            product_id: self.product_id,
            warehouse_id: self.warehouse_id,
        }
    }

    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lot_record_keeps_unknown_fields() {
        let json = r#"{
            "id": 7,
            "product_id": 1,
            "warehouse_id": 2,
            "stock": 30,
            "created_at": "2025-09-07T10:30:00.000Z",
            "updated_at": null,
            "deleted_at": null,
            "batch_code": "A-17"
        }"#;
        let lot: LotRecord = serde_json::from_str(json).unwrap();
        assert_eq!(lot.key(), LotKey { product_id: 1, warehouse_id: 2 });
        assert!(lot.is_active());

        let back = serde_json::to_value(&lot).unwrap();
        assert_eq!(back["batch_code"], "A-17");
        assert_eq!(back["updated_at"], Value::Null);
    }

    #[test]
    fn test_missing_optional_timestamps_default_to_none() {
        let json = r#"{"id":1,"product_id":1,"warehouse_id":1,"stock":0,"created_at":"2025-01-01T00:00:00Z"}"#;
        let lot: LotRecord = serde_json::from_str(json).unwrap();
        assert_eq!(lot.updated_at, None);
        assert_eq!(lot.deleted_at, None);
    }
}
