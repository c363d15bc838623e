//! Congressional trade disclosure fetcher (source `CONGRESSIONAL`). Real
//! STOCK Act disclosure scraping is out of scope; this adapter replays an
//! injectable, symbol-sticky set of records so the pipeline has a concrete
//! feed to poll.
//!
//! Simulated state behind an `Arc<RwLock<...>>`, seeded once and mutated
//! only through an explicit setter rather than on every read.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::ports::{RawSignalRecord, SignalFetcher};
use crate::domain::signal::SignalSource;

pub struct CongressionalFetcher {
    pending: Arc<RwLock<Vec<RawSignalRecord>>>,
}

impl CongressionalFetcher {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Queue records for the next `fetch_recent` call, simulating a new
    /// disclosure batch becoming available.
    pub async fn enqueue(&self, records: Vec<RawSignalRecord>) {
        self.pending.write().await.extend(records);
    }
}

impl Default for CongressionalFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalFetcher for CongressionalFetcher {
    fn source(&self) -> SignalSource {
        SignalSource::Congressional
    }

    /// Drains and returns whatever has been queued since the last poll: a
    /// "new disclosures since last run" semantics without an external data
    /// source.
    async fn fetch_recent(&self) -> anyhow::Result<Vec<RawSignalRecord>> {
        let mut pending = self.pending.write().await;
        Ok(std::mem::take(&mut *pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::signal::Direction;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn sample_record() -> RawSignalRecord {
        RawSignalRecord {
            source: SignalSource::Congressional,
            symbol: "AAPL".to_string(),
            direction: Direction::Long,
            filer_name: "Rep. Jane Doe".to_string(),
            filer_id: Some("D000001".to_string()),
            transaction_date: Utc::now(),
            filing_date: Utc::now(),
            transaction_value: dec!(50_000),
            shares: None,
            price: None,
            raw_data: None,
        }
    }

    #[tokio::test]
    async fn fetch_recent_drains_the_queue() {
        let fetcher = CongressionalFetcher::new();
        fetcher.enqueue(vec![sample_record()]).await;
        let first = fetcher.fetch_recent().await.unwrap();
        assert_eq!(first.len(), 1);
        let second = fetcher.fetch_recent().await.unwrap();
        assert!(second.is_empty());
    }

    #[test]
    fn source_is_congressional() {
        assert_eq!(CongressionalFetcher::new().source(), SignalSource::Congressional);
    }
}
