//! State persistence
//!
//! One JSON checkpoint file per agent, written at explicit checkpoints by
//! the driver. The engine stays storage-agnostic: it only hands over and
//! accepts [`EngineState`] values, and a save/load round-trip is identity.

use crate::engine::EngineState;
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct StateStore {
    dir: PathBuf,
}

impl StateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, agent: &str) -> PathBuf {
        let file = format!("{}_state.json", agent.replace(' ', "_").to_lowercase());
        self.dir.join(file)
    }

    /// Persist a checkpoint. Writes to a temp file first so a crash
    /// mid-write never truncates the previous checkpoint.
    pub async fn save(&self, state: &EngineState) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&state.agent);
        let tmp = path.with_extension("json.tmp");

        let body = serde_json::to_string_pretty(state)?;
        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(agent = %state.agent, path = %path.display(), "checkpoint saved");
        Ok(())
    }

    /// Load the latest checkpoint, or `None` when the agent has none.
    pub async fn load(&self, agent: &str) -> Result<Option<EngineState>> {
        let path = self.path_for(agent);
        if !path.exists() {
            return Ok(None);
        }
        let body = tokio::fs::read_to_string(&path).await?;
        Ok(Some(serde_json::from_str(&body)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{FeeSchedule, TradingEngine};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn save_load_round_trip_is_identity() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());

        let mut engine =
            TradingEngine::new("DeepSeek Trader", dec!(1_000_000), FeeSchedule::default(), 100);
        engine.initialize(date("2025-06-02"));
        engine
            .buy(date("2025-06-02"), "AAA", "Triple A", dec!(10), 500, "entry")
            .unwrap();
        engine.record_snapshot().unwrap();

        let state = engine.state();
        store.save(&state).await.unwrap();

        let loaded = store.load("DeepSeek Trader").await.unwrap().unwrap();
        assert_eq!(loaded, state);

        let restored = TradingEngine::restore(loaded);
        assert_eq!(restored, engine);
    }

    #[tokio::test]
    async fn missing_checkpoint_is_none() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());
        assert!(store.load("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces_the_previous_checkpoint() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path());

        let mut engine = TradingEngine::new("a", dec!(1_000_000), FeeSchedule::default(), 100);
        engine.initialize(date("2025-06-02"));
        store.save(&engine.state()).await.unwrap();

        engine
            .buy(date("2025-06-02"), "AAA", "Triple A", dec!(10), 100, "")
            .unwrap();
        store.save(&engine.state()).await.unwrap();

        let loaded = store.load("a").await.unwrap().unwrap();
        assert_eq!(loaded.ledger.trades().len(), 1);
        // No stray temp file left behind
        assert!(!dir.path().join("a_state.json.tmp").exists());
    }
}
