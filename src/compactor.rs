use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::engine::{Engine, EngineError};

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Background task that rewrites the WAL once enough appends piled up.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_needed(&engine, threshold).await {
            tracing::error!("WAL compaction failed: {e}");
        }
    }
}

/// Compact when more than `threshold` appends landed since the last
/// compaction. Returns whether a compaction ran.
pub async fn compact_if_needed(engine: &Engine, threshold: u64) -> Result<bool, EngineError> {
    let appends = engine.wal_appends_since_compact().await?;
    if appends <= threshold {
        return Ok(false);
    }
    engine.compact_wal().await?;
    info!("compacted WAL after {appends} appends");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::engine::EngineConfig;
    use crate::model::*;
    use std::path::PathBuf;

    fn test_wal_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("hotelbook_test_compactor");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    #[tokio::test]
    async fn compacts_only_past_threshold() {
        let hotel = Hotel {
            id: HotelId::new(1).unwrap(),
            name: "Alpha".into(),
            province: "Bangkok".into(),
            district: "Pathum Wan".into(),
            price_per_night: 1000,
            pictures: vec![],
        };
        let catalog = Arc::new(InMemoryCatalog::from_hotels([hotel]));
        let engine = Engine::open(test_wal_path("threshold.wal"), catalog, EngineConfig::default()).unwrap();

        let hotel_id = HotelId::new(1).unwrap();
        let from = parse_date("2025-06-01").unwrap();
        for i in 0..3u64 {
            let to = from + chrono::Days::new(i + 1);
            engine.provision_calendar(hotel_id, from, to, 2).await.unwrap();
        }
        assert_eq!(engine.wal_appends_since_compact().await.unwrap(), 3);

        assert!(!compact_if_needed(&engine, 3).await.unwrap());
        assert_eq!(engine.wal_appends_since_compact().await.unwrap(), 3);

        assert!(compact_if_needed(&engine, 2).await.unwrap());
        assert_eq!(engine.wal_appends_since_compact().await.unwrap(), 0);
    }
}
