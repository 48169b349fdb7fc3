mod app_system;
mod clients;
mod domain;
mod error;
mod queue;
mod stock;
mod store;

#[cfg(test)]
mod mock_framework;

use serde_json::json;
use tracing::{error, info, Instrument};

use crate::app_system::{setup_tracing, AppConfig, StockSystem};
use crate::domain::RawStockUpdate;

async fn load_batch(path: Option<String>) -> Result<Vec<RawStockUpdate>, String> {
    match path {
        Some(path) => {
            let data = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| format!("Cannot read {}: {}", path, e))?;
            serde_json::from_str(&data).map_err(|e| format!("{} is not a JSON array: {}", path, e))
        }
        None => Ok(vec![
            json!({"product_id": 1, "warehouse_id": 1, "stock": 10}),
            json!({"product_id": 2, "warehouse_id": 2, "stock": 20}),
            json!({"product_id": 3, "warehouse_id": 3}),
        ]),
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    setup_tracing();

    let config = AppConfig::from_env();
    info!(lots_path = %config.lots_path.display(), "Starting stock update service");

    let system = StockSystem::new(&config).map_err(|e| e.to_string())?;
    let batch = load_batch(std::env::args().nth(1)).await?;

    let span = tracing::info_span!("bulk_update");
    let outcome = async {
        info!("Submitting stock update batch");
        system.stock_client.submit_stock_updates(batch).await
    }
    .instrument(span)
    .await;

    match outcome {
        Ok(result) => info!(
            received = result.total_received,
            valid = result.total_valid,
            invalid = result.total_invalid,
            updated = result.total_updated,
            "{}",
            result.message
        ),
        Err(e) => error!(error = %e, "Bulk stock update failed"),
    }

    let status = system.stock_client.queue_status();
    match serde_json::to_string_pretty(&status) {
        Ok(json) => println!("{}", json),
        Err(e) => error!(error = %e, "Cannot render queue status"),
    }

    system.shutdown().await?;
    info!("Stock update service stopped");
    Ok(())
}
