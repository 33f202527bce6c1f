use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::engine::Engine;

/// Compact the journal whenever at least `threshold` appends have piled up
/// since the last compaction. Checks every `every`. Runs until aborted.
pub async fn run_compactor(engine: Arc<Engine>, threshold: u64, every: Duration) {
    let mut interval = tokio::time::interval(every);
    loop {
        interval.tick().await;
        let pending = engine.journal_appends_since_compact().await;
        if pending < threshold.max(1) {
            continue;
        }
        match engine.compact_journal().await {
            Ok(()) => info!(pending, "compactor rewrote journal"),
            Err(e) => warn!("journal compaction failed: {e}"),
        }
    }
}

/// `None` for an in-memory engine; there is nothing to compact.
pub fn spawn_compactor(engine: Arc<Engine>, config: &EngineConfig) -> Option<JoinHandle<()>> {
    if !engine.is_durable() {
        debug!("no journal, compactor not started");
        return None;
    }
    Some(tokio::spawn(run_compactor(
        engine,
        config.compact_threshold,
        config.compact_interval(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RoomDraft;
    use std::path::PathBuf;

    fn test_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("confbook_test_compactor").join(name);
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[tokio::test]
    async fn compacts_once_threshold_is_reached() {
        let config = EngineConfig {
            data_dir: test_dir("threshold"),
            compact_threshold: 3,
            ..EngineConfig::default()
        };
        let engine = Arc::new(Engine::open(&config).unwrap());
        for i in 0..3 {
            engine
                .create_room(RoomDraft::new(format!("R-{i}"), "Sala", "Planta 1", 20, "Seminar"))
                .await
                .unwrap();
        }
        assert_eq!(engine.journal_appends_since_compact().await, 3);

        let task = tokio::spawn(run_compactor(
            engine.clone(),
            config.compact_threshold,
            Duration::from_millis(10),
        ));
        let mut compacted = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if engine.journal_appends_since_compact().await == 0 {
                compacted = true;
                break;
            }
        }
        task.abort();
        assert!(compacted);
    }

    #[tokio::test]
    async fn in_memory_engine_gets_no_compactor() {
        let engine = Arc::new(Engine::in_memory());
        assert!(spawn_compactor(engine, &EngineConfig::in_memory()).is_none());
    }
}
