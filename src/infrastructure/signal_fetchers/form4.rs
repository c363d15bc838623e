//! SEC Form 4 fetcher (source `INSIDER_FORM4`). Real EDGAR polling is out of
//! scope; see `congressional::CongressionalFetcher` for the shared
//! queue-and-drain simulation pattern this adapter follows.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::ports::{RawSignalRecord, SignalFetcher};
use crate::domain::signal::SignalSource;

pub struct Form4Fetcher {
    pending: Arc<RwLock<Vec<RawSignalRecord>>>,
}

impl Form4Fetcher {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub async fn enqueue(&self, records: Vec<RawSignalRecord>) {
        self.pending.write().await.extend(records);
    }
}

impl Default for Form4Fetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SignalFetcher for Form4Fetcher {
    fn source(&self) -> SignalSource {
        SignalSource::InsiderForm4
    }

    async fn fetch_recent(&self) -> anyhow::Result<Vec<RawSignalRecord>> {
        let mut pending = self.pending.write().await;
        Ok(std::mem::take(&mut *pending))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_is_insider_form4() {
        assert_eq!(Form4Fetcher::new().source(), SignalSource::InsiderForm4);
    }
}
