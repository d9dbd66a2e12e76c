use crate::db::Store;
use crate::error::Result;
use crate::schema::{Source, SourceType, VerdictStatus};
use tracing::{debug, info};

/// Score of a source with no recorded verdicts.
pub const NEUTRAL_SCORE: u8 = 50;

/// `round(100 * reliable / total)`, rounding halves up; `NEUTRAL_SCORE` when
/// nothing has been recorded.
pub fn reliability_score(reliable: u64, unreliable: u64, misleading: u64) -> u8 {
    let total = u128::from(reliable) + u128::from(unreliable) + u128::from(misleading);
    if total == 0 {
        return NEUTRAL_SCORE;
    }
    let scaled = (200 * u128::from(reliable) + total) / (2 * total);
    u8::try_from(scaled).unwrap_or(100)
}

/// Per-source verdict counters and the score derived from them.
#[derive(Clone)]
pub struct ReliabilityLedger {
    store: Store,
}

impl ReliabilityLedger {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Folds one resolved verdict into the source's record. Returns `None`
    /// when there was nothing to record.
    pub fn record(
        &self,
        source_name: &str,
        source_type: SourceType,
        status: VerdictStatus,
    ) -> Result<Option<Source>> {
        if source_name.trim().is_empty() {
            debug!(status = %status, "skipping ledger update for unnamed source");
            return Ok(None);
        }
        let Some(rating) = status.rating() else {
            debug!(source = source_name, "skipping ledger update for pending verdict");
            return Ok(None);
        };

        let source = self.store.record_verdict(source_name, source_type, rating)?;
        info!(
            source = %source.name,
            status = %status,
            score = source.reliability_score,
            "reliability score updated"
        );
        Ok(Some(source))
    }

    pub fn ranking(&self) -> Result<Vec<Source>> {
        Ok(self.store.sources()?)
    }

    pub fn source(&self, name: &str) -> Result<Option<Source>> {
        Ok(self.store.source(name)?)
    }
}
